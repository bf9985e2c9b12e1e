//! # skybridge-audit
//!
//! Session-anchored, append-only, SHA-256 hash-chained audit trail for
//! SkyBridge security events.
//!
//! ## Overview
//!
//! Every security event tied to a session is folded into that session's
//! chain: `head = SHA-256(head ‖ payload)`, starting from the session's
//! anchor (the handshake transcript hash, or 32 zero bytes when the session
//! was never anchored).  Modifying any recorded field breaks the hash of that
//! entry and the link of every entry after it, which `verify_entries` and
//! `AuditSnapshot::verify` detect.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use skybridge_audit::AuditChain;
//! use skybridge_core::EventBus;
//!
//! let bus = EventBus::default();
//! let chain = Arc::new(AuditChain::default());
//! chain.attach(&bus);
//! chain.begin_session("session-42", &transcript_hash)?;
//!
//! // ... producers publish events with `.for_session("session-42")` ...
//!
//! let snapshot = chain.snapshot("session-42").unwrap();
//! snapshot.verify()?;
//! ```

pub mod chain;
pub mod entry;
pub mod memory;

pub use chain::{chain_hash, encode_event_payload, encode_payload, verify_entries, PayloadFields};
pub use entry::{AnchorKind, AuditEntry, AuditSnapshot};
pub use memory::AuditChain;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use skybridge_contracts::{
        config::{AuditConfig, BusConfig},
        error::TelemetryError,
        event::{SecurityEventType, Severity, GLOBAL_SESSION_ID},
    };
    use skybridge_core::{EventBus, SecurityEvent};

    use super::{
        chain::{ZERO_ANCHOR, PAYLOAD_VERSION},
        chain_hash, encode_event_payload, encode_payload, verify_entries, AnchorKind, AuditChain,
        PayloadFields,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn chain_with_cap(max_entries_per_session: usize) -> AuditChain {
        AuditChain::new(AuditConfig {
            enabled: true,
            max_entries_per_session,
        })
    }

    fn session_event(session: &str, kind: SecurityEventType, message: &str) -> SecurityEvent {
        SecurityEvent::new(kind, Severity::Warning, message)
            .for_session(session)
            .with_context("k", "v")
    }

    fn zero_hex() -> String {
        "0".repeat(64)
    }

    // ── Chain structure ───────────────────────────────────────────────────────

    /// Three events in an explicitly anchored session give seq 1, 2, 3.
    #[test]
    fn test_three_event_session() {
        let chain = chain_with_cap(100);
        chain.begin_session("S1", &[0u8; 32]).unwrap();

        for kind in [
            SecurityEventType::AuthenticationFailed,
            SecurityEventType::SignatureVerificationFailed,
            SecurityEventType::CryptoDowngrade,
        ] {
            chain.record(&session_event("S1", kind, "observed"));
        }

        let snapshot = chain.snapshot("S1").unwrap();
        assert_eq!(snapshot.entry_count, 3);
        assert_eq!(snapshot.anchor_kind, AnchorKind::Handshake);
        let seqs: Vec<u64> = snapshot.entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(snapshot.entries[0].context["k"], "v");
        assert!(snapshot.verify().is_ok());
    }

    /// Entry 1 links to the anchor; every later entry links to its predecessor.
    #[test]
    fn test_prev_hash_linkage() {
        let chain = chain_with_cap(100);
        let anchor = [0xabu8; 32];
        chain.begin_session("S2", &anchor).unwrap();

        for n in 0..10 {
            chain.record(&session_event("S2", SecurityEventType::RateLimitExceeded, &format!("burst {n}")));
        }

        let snapshot = chain.snapshot("S2").unwrap();
        assert_eq!(snapshot.anchor_hex, hex::encode(anchor));
        assert_eq!(snapshot.entries[0].prev_hash_hex, snapshot.anchor_hex);
        for pair in snapshot.entries.windows(2) {
            assert_eq!(pair[1].prev_hash_hex, pair[0].hash_hex);
        }
        assert_eq!(snapshot.head_hash_hex, snapshot.entries.last().unwrap().hash_hex);
    }

    /// Recomputing each entry's hash from its own fields reproduces it.
    #[test]
    fn test_hash_recomputes_from_entry() {
        let chain = chain_with_cap(100);
        chain.begin_session("S3", &[7u8; 32]).unwrap();
        for n in 0..5 {
            chain.record(
                &session_event("S3", SecurityEventType::AnomalyDetected, &format!("spike {n}"))
                    .with_context("peer", "mac-mini")
                    .with_context("score", n.to_string()),
            );
        }

        let snapshot = chain.snapshot("S3").unwrap();
        for entry in &snapshot.entries {
            let prev = hex::decode(&entry.prev_hash_hex).unwrap();
            let payload = encode_payload(&PayloadFields::from_entry(entry));
            assert_eq!(hex::encode(chain_hash(&prev, &payload)), entry.hash_hex);
        }
        assert!(verify_entries("S3", &snapshot.anchor_hex, &snapshot.entries).is_ok());
    }

    /// Changing a recorded field is detected.
    #[test]
    fn test_tamper_detection() {
        let chain = chain_with_cap(100);
        chain.begin_session("S4", &[1u8; 32]).unwrap();
        for n in 0..3 {
            chain.record(&session_event("S4", SecurityEventType::AuthenticationFailed, &format!("try {n}")));
        }

        let mut snapshot = chain.snapshot("S4").unwrap();
        snapshot.entries[1].message = "nothing to see here".to_string();

        match snapshot.verify() {
            Err(TelemetryError::ChainIntegrity { sequence, .. }) => assert_eq!(sequence, 2),
            other => panic!("expected ChainIntegrity at seq 2, got {:?}", other),
        }
    }

    /// Removing an entry from the middle breaks the linkage.
    #[test]
    fn test_deleted_entry_detected() {
        let chain = chain_with_cap(100);
        for n in 0..3 {
            chain.record(&session_event("S5", SecurityEventType::PathTraversalBlocked, &format!("path {n}")));
        }

        let mut snapshot = chain.snapshot("S5").unwrap();
        snapshot.entries.remove(1);
        assert!(snapshot.verify().is_err());
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    /// A session first seen by `record` gets the zero, unauthenticated anchor.
    #[test]
    fn test_implicit_session_uses_zero_anchor() {
        let chain = chain_with_cap(100);
        chain.record(&session_event("fresh", SecurityEventType::HandshakeFailed, "timeout"));

        let snapshot = chain.snapshot("fresh").unwrap();
        assert_eq!(snapshot.anchor_kind, AnchorKind::Unauthenticated);
        assert_eq!(snapshot.anchor_hex, zero_hex());
        assert_eq!(snapshot.entries[0].prev_hash_hex, zero_hex());
    }

    /// Events without a session id land in the global session.
    #[test]
    fn test_missing_or_blank_session_routes_to_global() {
        let chain = chain_with_cap(100);
        chain.record(&SecurityEvent::new(SecurityEventType::TlsConfigurationError, Severity::High, "weak cipher"));
        chain.record(
            &SecurityEvent::new(SecurityEventType::KeychainAccessFailed, Severity::High, "denied")
                .for_session("  "),
        );

        assert_eq!(chain.session_ids(), vec![GLOBAL_SESSION_ID.to_string()]);
        assert_eq!(chain.snapshot(GLOBAL_SESSION_ID).unwrap().entry_count, 2);
    }

    /// `reset_all` then `record` rebuilds an anchor-zero chain.
    #[test]
    fn test_reset_all_then_record() {
        let chain = chain_with_cap(100);
        chain.begin_session("S6", &[9u8; 32]).unwrap();
        chain.record(&session_event("S6", SecurityEventType::NotarizationFailed, "unsigned"));

        chain.reset_all();
        assert!(chain.snapshot("S6").is_none());

        chain.record(&session_event("S6", SecurityEventType::NotarizationFailed, "unsigned"));
        let snapshot = chain.snapshot("S6").unwrap();
        assert_eq!(snapshot.entries[0].seq, 1);
        assert_eq!(snapshot.entries[0].prev_hash_hex, zero_hex());
        assert_eq!(snapshot.anchor_kind, AnchorKind::Unauthenticated);
    }

    /// `begin_session` on an existing session discards its chain.
    #[test]
    fn test_begin_session_resets_existing_chain() {
        let chain = chain_with_cap(100);
        chain.record(&session_event("S7", SecurityEventType::InvalidSigningKey, "expired"));
        chain.record(&session_event("S7", SecurityEventType::InvalidSigningKey, "expired"));

        let anchor = [0x42u8; 32];
        chain.begin_session("S7", &anchor).unwrap();
        let snapshot = chain.snapshot("S7").unwrap();
        assert_eq!(snapshot.entry_count, 0);
        assert_eq!(snapshot.next_sequence, 1);
        assert_eq!(snapshot.head_hash_hex, hex::encode(anchor));
        assert!(snapshot.verify().is_ok(), "an empty chain is valid");

        chain.record(&session_event("S7", SecurityEventType::InvalidSigningKey, "expired"));
        assert_eq!(chain.snapshot("S7").unwrap().entries[0].prev_hash_hex, hex::encode(anchor));
    }

    #[test]
    fn test_empty_anchor_rejected() {
        let chain = chain_with_cap(100);
        assert!(matches!(
            chain.begin_session("S8", &[]),
            Err(TelemetryError::InvalidAnchor { .. })
        ));
        assert!(chain.snapshot("S8").is_none());
    }

    #[test]
    fn test_unknown_session() {
        let chain = chain_with_cap(100);
        assert!(chain.snapshot("ghost").is_none());
        assert!(!chain.reset("ghost"));
    }

    /// A disabled chain records nothing and creates no sessions.
    #[test]
    fn test_disabled_chain_is_noop() {
        let chain = AuditChain::new(AuditConfig {
            enabled: false,
            max_entries_per_session: 10,
        });
        assert!(chain.record(&session_event("S9", SecurityEventType::AnomalyDetected, "x")).is_none());
        assert!(chain.session_ids().is_empty());

        chain.set_enabled(true);
        assert!(chain.record(&session_event("S9", SecurityEventType::AnomalyDetected, "x")).is_some());
    }

    // ── Retention ─────────────────────────────────────────────────────────────

    /// Trimming drops the oldest entries but the head keeps advancing.
    #[test]
    fn test_trim_keeps_head_and_verifies_window() {
        let chain = chain_with_cap(3);
        chain.begin_session("S10", &[3u8; 32]).unwrap();
        let mut last = None;
        for n in 0..5 {
            last = chain.record(&session_event("S10", SecurityEventType::ConnectionApprovalDenied, &format!("peer {n}")));
        }

        let snapshot = chain.snapshot("S10").unwrap();
        assert_eq!(snapshot.entry_count, 3);
        assert_eq!(snapshot.next_sequence, 6);
        let seqs: Vec<u64> = snapshot.entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
        assert_eq!(snapshot.head_hash_hex, last.unwrap().hash_hex);
        assert!(!snapshot.is_complete());
        assert!(snapshot.verify().is_ok(), "the retained window still verifies");
    }

    // ── Payload encoding ──────────────────────────────────────────────────────

    /// The byte layout is fixed field by field.
    #[test]
    fn test_payload_layout() {
        let fields = PayloadFields {
            session_id: "s",
            sequence: 1,
            timestamp_ms: 2,
            event_type: "t",
            severity: "i",
            message: "",
            event_id: "x",
            is_meta_event: true,
            context: vec![("b", "2"), ("a", "1")],
        };

        let mut expected = vec![PAYLOAD_VERSION];
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&2i64.to_le_bytes());
        for s in ["s", "t", "i", "", "x"] {
            expected.extend_from_slice(&(s.len() as u32).to_le_bytes());
            expected.extend_from_slice(s.as_bytes());
        }
        expected.push(1);
        expected.extend_from_slice(&2u32.to_le_bytes());
        for s in ["a", "1", "b", "2"] {
            expected.extend_from_slice(&1u32.to_le_bytes());
            expected.extend_from_slice(s.as_bytes());
        }

        assert_eq!(encode_payload(&fields), expected);
    }

    /// Fixed vector: any implementation of the layout must reach this digest.
    #[test]
    fn test_payload_hash_vector() {
        let fields = PayloadFields {
            session_id: "S1",
            sequence: 1,
            timestamp_ms: 1_700_000_000_000,
            event_type: SecurityEventType::HandshakeFailed.as_tag(),
            severity: Severity::Critical.as_tag(),
            message: "KEM decapsulation failed",
            event_id: "00000000-0000-0000-0000-000000000001",
            is_meta_event: false,
            context: vec![("sessionId", "S1"), ("peer", "mac-mini")],
        };

        let payload = encode_payload(&fields);
        assert_eq!(payload.len(), 166);
        assert_eq!(
            hex::encode(chain_hash(&ZERO_ANCHOR, &payload)),
            "ff6d08b444a2ee2c2bafc2b2f6c7d528173e1241ee0dc989e0e11c54c730ea9d"
        );
    }

    /// Context insertion order never changes the payload.
    #[test]
    fn test_context_order_independence() {
        let base = SecurityEvent::new(SecurityEventType::CryptoDowngrade, Severity::Critical, "suite forced")
            .with_timestamp(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        let keys = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];

        let forward = keys
            .iter()
            .fold(base.clone(), |event, key| event.with_context(*key, key.to_uppercase()));
        let backward = keys
            .iter()
            .rev()
            .fold(base, |event, key| event.with_context(*key, key.to_uppercase()));

        let a = encode_event_payload("S1", 1, &forward);
        let b = encode_event_payload("S1", 1, &backward);
        assert_eq!(a, b);
        assert_eq!(chain_hash(&ZERO_ANCHOR, &a), chain_hash(&ZERO_ANCHOR, &b));
    }

    #[test]
    fn test_snapshot_json_uses_hex_fields() {
        let chain = chain_with_cap(10);
        chain.begin_session("S11", &[0xffu8; 32]).unwrap();
        chain.record(&session_event("S11", SecurityEventType::HandshakeFallback, "classical suite"));

        let json = chain.snapshot("S11").unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["anchorHex"], "f".repeat(64));
        assert_eq!(value["entryCount"], 1);
        assert_eq!(value["entries"][0]["eventType"], "handshakeFallback");
        assert_eq!(value["entries"][0]["prevHashHex"], "f".repeat(64));
    }

    // ── Bus integration ───────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_chain_records_bus_events() {
        let bus = EventBus::new(BusConfig {
            main_queue_capacity: 2,
            subscriber_capacity: 64,
            meta_event_min_interval_ms: 1000,
        });
        let chain = Arc::new(chain_with_cap(100));
        chain.attach(&bus);
        chain.begin_session("S12", &[5u8; 32]).unwrap();

        for n in 0..3 {
            bus.publish(session_event("S12", SecurityEventType::AuthenticationFailed, &format!("pin {n}")))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = chain.snapshot("S12").unwrap();
        assert_eq!(snapshot.entry_count, 2, "the third publish overflowed the main queue");
        assert!(snapshot.verify().is_ok());

        // The overflow meta-event carries no session, so it lands in global.
        let global = chain.snapshot(GLOBAL_SESSION_ID).unwrap();
        assert_eq!(global.entry_count, 1);
        assert!(global.entries[0].is_meta_event);
        assert_eq!(global.entries[0].event_type, SecurityEventType::EventQueueOverflow);
        assert!(global.verify().is_ok());
    }
}
