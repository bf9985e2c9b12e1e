//! Demo scenarios.
//!
//! Each scenario builds its own bus (and audit chain, where needed) from the
//! loaded `TelemetryConfig` and prints what a diagnostics operator would see.

pub mod audit_chain;
pub mod export;
pub mod overflow;

use std::time::Duration;

/// Give spawned drain and delivery tasks time to run.
pub(crate) async fn settle(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
