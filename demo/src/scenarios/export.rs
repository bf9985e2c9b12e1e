//! Snapshot export.
//!
//! Records the demo sessions, then prints the requested session's snapshot as
//! pretty JSON on stdout.  The snapshot is verified first so a broken chain is
//! never exported silently.

use skybridge_contracts::{
    config::TelemetryConfig,
    error::{TelemetryError, TelemetryResult},
};

use super::audit_chain::record_demo_sessions;

pub async fn run_scenario(config: &TelemetryConfig, session_id: &str) -> TelemetryResult<()> {
    let (_bus, chain) = record_demo_sessions(config).await?;

    let snapshot = chain
        .snapshot(session_id)
        .ok_or_else(|| TelemetryError::SessionNotFound {
            session_id: session_id.to_string(),
        })?;
    snapshot.verify()?;

    println!("{}", snapshot.to_json()?);
    Ok(())
}
