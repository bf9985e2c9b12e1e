//! # skybridge-core
//!
//! The in-process security event bus for SkyBridge.
//!
//! ## Overview
//!
//! Every security observation (failed authentication, unusable signing key,
//! rate-limit breach, anomaly, ...) is published to one `EventBus` and fanned
//! out to every subscriber.  The bus is built around three guarantees:
//!
//! - **Producers never block.**  Both the main queue and each subscriber queue
//!   are bounded; a full queue drops the new event instead of waiting.
//! - **Loss is always signalled, but never floods.**  Drops from any queue feed
//!   one shared gate that emits at most one `EventQueueOverflow` meta-event per
//!   interval.  Meta-events bypass every queue, so they cannot themselves
//!   overflow anything.
//! - **Per-subscriber FIFO.**  Each subscriber sees its events in publish order,
//!   one at a time, independently of every other subscriber.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use skybridge_core::{EventBus, FnListener, SecurityEvent};
//! use skybridge_contracts::event::{SecurityEventType, Severity};
//!
//! let bus = EventBus::default();
//! bus.subscribe(FnListener::new(|event| async move {
//!     eprintln!("[{}] {}", event.severity(), event.message());
//! }));
//!
//! bus.publish(
//!     SecurityEvent::new(SecurityEventType::AuthenticationFailed, Severity::Warning, "bad PIN")
//!         .for_session("session-42"),
//! )
//! .await;
//! ```

pub mod bus;
pub mod channel;
pub mod event;
mod overflow;
pub mod traits;

pub use bus::{BusStats, EventBus, PublishOutcome};
pub use channel::{SubscriberStats, SubscriptionId};
pub use event::SecurityEvent;
pub use traits::{FnListener, SecurityEventListener};

// ── Tests ─────────────────────────────────────────────────────────────────────
