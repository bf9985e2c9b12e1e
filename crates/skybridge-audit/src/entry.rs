//! Audit entry and snapshot types.
//!
//! `AuditEntry` is one link in a session's chain.  It keeps every field that
//! feeds the deterministic payload, so a snapshot alone is enough to
//! recompute and check each hash.  `AuditSnapshot` is the export view handed
//! to diagnostics tooling; all byte values are lowercase hex.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use skybridge_contracts::{
    error::{TelemetryError, TelemetryResult},
    event::{SecurityEventType, Severity},
};

use crate::chain::verify_entries;

/// A single entry in a session's SHA-256 hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub session_id: String,

    /// Position in the session's chain, starting at 1.
    pub seq: u64,

    /// Event creation time, Unix milliseconds.
    pub timestamp_ms: i64,

    pub event_type: SecurityEventType,

    pub severity: Severity,

    pub message: String,

    /// Context as recorded; ordered by key.
    pub context: BTreeMap<String, String>,

    /// Id of the event this entry records.
    pub event_id: String,

    pub is_meta_event: bool,

    /// Chain head before this entry (the anchor, for seq 1).
    pub prev_hash_hex: String,

    /// Chain head after this entry.
    pub hash_hex: String,
}

/// Where a session's anchor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    /// Set by `begin_session` from handshake material.
    Handshake,
    /// All-zero anchor created implicitly by the first `record`.
    Unauthenticated,
}

/// Export view of one session's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSnapshot {
    pub session_id: String,
    pub anchor_hex: String,
    pub anchor_kind: AnchorKind,
    pub head_hash_hex: String,
    /// Number of retained entries (not the total ever recorded).
    pub entry_count: usize,
    /// Sequence number the next recorded entry will get.
    pub next_sequence: u64,
    pub entries: Vec<AuditEntry>,
}

impl AuditSnapshot {
    /// Recompute every retained entry and check that the last one ends at
    /// `head_hash_hex`.
    pub fn verify(&self) -> TelemetryResult<()> {
        verify_entries(&self.session_id, &self.anchor_hex, &self.entries)?;

        let tail = self
            .entries
            .last()
            .map(|e| e.hash_hex.as_str())
            .unwrap_or(self.anchor_hex.as_str());
        if tail != self.head_hash_hex {
            return Err(TelemetryError::ChainIntegrity {
                session_id: self.session_id.clone(),
                sequence: self.next_sequence.saturating_sub(1),
                reason: "head hash does not match the last retained entry".to_string(),
            });
        }
        Ok(())
    }

    /// True when no entry has been trimmed, so the chain can be checked all
    /// the way back to the anchor.
    pub fn is_complete(&self) -> bool {
        self.entries.first().map_or(self.next_sequence == 1, |e| e.seq == 1)
    }

    /// Pretty-printed JSON for export.
    pub fn to_json(&self) -> TelemetryResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TelemetryError::Serialization {
            reason: format!("failed to serialize audit snapshot: {}", e),
        })
    }
}
