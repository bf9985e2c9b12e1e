//! Hash-chain primitives: deterministic payload encoding, hashing, and chain
//! verification.
//!
//! Each entry's hash is `SHA-256(prev_head ‖ payload)`, where `prev_head` is the
//! raw bytes of the previous head (the session anchor for entry 1) and
//! `payload` is the encoding below.  The layout is fixed so an independent
//! implementation hashing the same logical event gets the same digest.
//!
//! Payload layout (bytes, in order; all integers little-endian):
//!   1. version marker, 1 byte (`PAYLOAD_VERSION`)
//!   2. sequence, 8 bytes
//!   3. timestamp in Unix milliseconds, 8 bytes (signed)
//!   4. session id, event type tag, severity tag, message, event id:
//!      each a 4-byte length followed by UTF-8 bytes
//!   5. meta-event flag, 1 byte (1 or 0)
//!   6. context entry count, 4 bytes, then each pair sorted by key ascending:
//!      length-prefixed key, length-prefixed value

use sha2::{Digest, Sha256};

use skybridge_contracts::error::{TelemetryError, TelemetryResult};
use skybridge_core::SecurityEvent;

use crate::entry::AuditEntry;

/// Version marker written as the first payload byte.
pub const PAYLOAD_VERSION: u8 = 1;

/// Length of a SHA-256 digest, and of a standard session anchor.
pub const HASH_LEN: usize = 32;

/// Anchor used for sessions that were never bound to a handshake.
pub const ZERO_ANCHOR: [u8; HASH_LEN] = [0u8; HASH_LEN];

/// The fields that feed one entry's payload, borrowed from wherever they live.
#[derive(Debug, Clone)]
pub struct PayloadFields<'a> {
    pub session_id: &'a str,
    pub sequence: u64,
    pub timestamp_ms: i64,
    pub event_type: &'a str,
    pub severity: &'a str,
    pub message: &'a str,
    pub event_id: &'a str,
    pub is_meta_event: bool,
    /// Context pairs in any order; `encode_payload` sorts them.
    pub context: Vec<(&'a str, &'a str)>,
}

impl<'a> PayloadFields<'a> {
    /// Borrow the payload fields of a recorded entry.
    pub fn from_entry(entry: &'a AuditEntry) -> Self {
        Self {
            session_id: &entry.session_id,
            sequence: entry.seq,
            timestamp_ms: entry.timestamp_ms,
            event_type: entry.event_type.as_tag(),
            severity: entry.severity.as_tag(),
            message: &entry.message,
            event_id: &entry.event_id,
            is_meta_event: entry.is_meta_event,
            context: entry
                .context
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        }
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    // Lengths beyond u32 cannot occur for in-memory security events.
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Encode `fields` into the deterministic payload byte layout.
pub fn encode_payload(fields: &PayloadFields<'_>) -> Vec<u8> {
    let mut context = fields.context.clone();
    context.sort_unstable();

    let mut buf = Vec::with_capacity(
        64 + fields.message.len() + context.iter().map(|(k, v)| 8 + k.len() + v.len()).sum::<usize>(),
    );
    buf.push(PAYLOAD_VERSION);
    buf.extend_from_slice(&fields.sequence.to_le_bytes());
    buf.extend_from_slice(&fields.timestamp_ms.to_le_bytes());
    put_str(&mut buf, fields.session_id);
    put_str(&mut buf, fields.event_type);
    put_str(&mut buf, fields.severity);
    put_str(&mut buf, fields.message);
    put_str(&mut buf, fields.event_id);
    buf.push(u8::from(fields.is_meta_event));
    buf.extend_from_slice(&(context.len() as u32).to_le_bytes());
    for (key, value) in context {
        put_str(&mut buf, key);
        put_str(&mut buf, value);
    }
    buf
}

/// Encode the payload an event would produce at `sequence` in `session_id`.
pub fn encode_event_payload(session_id: &str, sequence: u64, event: &SecurityEvent) -> Vec<u8> {
    let event_id = event.id().to_string();
    encode_payload(&PayloadFields {
        session_id,
        sequence,
        timestamp_ms: event.timestamp_ms(),
        event_type: event.event_type().as_tag(),
        severity: event.severity().as_tag(),
        message: event.message(),
        event_id: &event_id,
        is_meta_event: event.is_meta_event(),
        context: event
            .context()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect(),
    })
}

/// Compute the next chain head: `SHA-256(prev_head ‖ payload)`.
pub fn chain_hash(prev_head: &[u8], payload: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(prev_head);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Verify linkage and hash correctness of a run of retained entries.
///
/// When the first entry has `seq == 1` its `prev_hash_hex` must equal
/// `anchor_hex`.  When older entries were trimmed, the first retained entry's
/// own `prev_hash_hex` is taken as the starting point.  For every entry the
/// hash is recomputed from its fields, and each `prev_hash_hex` must equal
/// the preceding `hash_hex`.  An empty slice is valid.
pub fn verify_entries(session_id: &str, anchor_hex: &str, entries: &[AuditEntry]) -> TelemetryResult<()> {
    let Some(first) = entries.first() else {
        return Ok(());
    };

    let mut expected_prev = if first.seq == 1 {
        anchor_hex.to_string()
    } else {
        first.prev_hash_hex.clone()
    };
    let mut expected_seq = first.seq;

    for entry in entries {
        let violation = |reason: String| TelemetryError::ChainIntegrity {
            session_id: session_id.to_string(),
            sequence: entry.seq,
            reason,
        };

        if entry.session_id != session_id {
            return Err(violation(format!("entry belongs to session '{}'", entry.session_id)));
        }
        if entry.seq != expected_seq {
            return Err(violation(format!("expected seq {}", expected_seq)));
        }
        if entry.prev_hash_hex != expected_prev {
            return Err(violation("prev hash does not link to the preceding head".to_string()));
        }

        let prev = hex::decode(&entry.prev_hash_hex)
            .map_err(|e| violation(format!("prev hash is not valid hex: {}", e)))?;
        let recomputed = hex::encode(chain_hash(&prev, &encode_payload(&PayloadFields::from_entry(entry))));
        if recomputed != entry.hash_hex {
            return Err(violation("hash does not match entry contents".to_string()));
        }

        expected_prev = entry.hash_hex.clone();
        expected_seq = entry.seq.saturating_add(1);
    }

    Ok(())
}
