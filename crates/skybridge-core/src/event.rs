//! The security event record.
//!
//! A `SecurityEvent` is immutable once built.  Producers construct it with
//! `SecurityEvent::new` and the `with_*` builders; those paths always produce
//! a regular event.  Meta-events (loss reports) can only be minted inside this
//! crate, which keeps the bus the sole producer of them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use skybridge_contracts::event::{
    OverflowSource, SecurityEventType, Severity, CONTEXT_DROPPED_COUNT, CONTEXT_OVERFLOW_QUEUE,
    CONTEXT_SESSION_ID, GLOBAL_SESSION_ID,
};

/// One security-relevant occurrence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    id: Uuid,
    #[serde(rename = "type")]
    event_type: SecurityEventType,
    severity: Severity,
    message: String,
    context: HashMap<String, String>,
    timestamp: DateTime<Utc>,
    is_meta_event: bool,
}

impl SecurityEvent {
    /// Create a regular event stamped with a fresh id and the current time.
    pub fn new(event_type: SecurityEventType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            severity,
            message: message.into(),
            context: HashMap::new(),
            timestamp: Utc::now(),
            is_meta_event: false,
        }
    }

    /// Attach one context pair, replacing any previous value for `key`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach every pair from `context`.
    pub fn with_context_map(mut self, context: HashMap<String, String>) -> Self {
        self.context.extend(context);
        self
    }

    /// Route this event to the audit chain of `session_id`.
    pub fn for_session(self, session_id: impl Into<String>) -> Self {
        self.with_context(CONTEXT_SESSION_ID, session_id)
    }

    /// Override the creation time.  Used when replaying or importing events.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the loss report the bus emits when a bounded queue rejects events.
    pub(crate) fn overflow_report(source: OverflowSource, dropped: u64) -> Self {
        let mut event = Self::new(
            SecurityEventType::EventQueueOverflow,
            Severity::Warning,
            format!("{dropped} security event(s) dropped: {source} queue full"),
        )
        .with_context(CONTEXT_OVERFLOW_QUEUE, source.to_string())
        .with_context(CONTEXT_DROPPED_COUNT, dropped.to_string());
        event.is_meta_event = true;
        event
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_type(&self) -> SecurityEventType {
        self.event_type
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Unordered context map.  Anything that hashes it must sort the keys.
    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Milliseconds since the Unix epoch, as used by the audit payload.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// True only for events the bus produced to report loss.
    pub fn is_meta_event(&self) -> bool {
        self.is_meta_event
    }

    /// The audit session this event belongs to.
    ///
    /// Falls back to `GLOBAL_SESSION_ID` when the context has no session id or
    /// the id is blank.
    pub fn session_id(&self) -> &str {
        match self.context.get(CONTEXT_SESSION_ID) {
            Some(id) if !id.trim().is_empty() => id,
            _ => GLOBAL_SESSION_ID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_events_are_never_meta() {
        let event = SecurityEvent::new(
            SecurityEventType::EventQueueOverflow,
            Severity::Warning,
            "forged loss report",
        );
        assert!(!event.is_meta_event(), "public constructor must not mint meta-events");
    }

    #[test]
    fn overflow_report_carries_source_and_count() {
        let event = SecurityEvent::overflow_report(OverflowSource::Subscriber(4), 12);
        assert!(event.is_meta_event());
        assert_eq!(event.event_type(), SecurityEventType::EventQueueOverflow);
        assert_eq!(event.context()[CONTEXT_OVERFLOW_QUEUE], "subscriber-4");
        assert_eq!(event.context()[CONTEXT_DROPPED_COUNT], "12");
    }

    #[test]
    fn ids_are_unique() {
        let a = SecurityEvent::new(SecurityEventType::AnomalyDetected, Severity::High, "a");
        let b = SecurityEvent::new(SecurityEventType::AnomalyDetected, Severity::High, "a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn session_id_defaults_to_global() {
        let plain = SecurityEvent::new(SecurityEventType::RateLimitExceeded, Severity::Info, "x");
        assert_eq!(plain.session_id(), GLOBAL_SESSION_ID);

        let blank = plain.clone().for_session("   ");
        assert_eq!(blank.session_id(), GLOBAL_SESSION_ID);

        let routed = plain.for_session("S1");
        assert_eq!(routed.session_id(), "S1");
    }
}
