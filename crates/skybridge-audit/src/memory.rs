//! In-memory, session-keyed audit chain.
//!
//! `AuditChain` keeps one rolling hash chain per session behind a single
//! `Mutex`.  Only a bounded window of entries is retained per session; the
//! head keeps advancing after old entries are trimmed.
//!
//! The chain is usually driven by the event bus (`attach`), but `record` can
//! also be called directly.  Recording never fails from the caller's point of
//! view: an audit problem must not interrupt the security event behind it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, trace};

use skybridge_contracts::{
    config::AuditConfig,
    error::{TelemetryError, TelemetryResult},
};
use skybridge_core::{EventBus, SecurityEvent, SecurityEventListener, SubscriptionId};

use crate::{
    chain::{chain_hash, encode_payload, PayloadFields, ZERO_ANCHOR},
    entry::{AnchorKind, AuditEntry, AuditSnapshot},
};

// ── Internal mutable state ────────────────────────────────────────────────────

struct SessionChain {
    anchor: Vec<u8>,
    anchor_kind: AnchorKind,
    head: Vec<u8>,
    /// Last sequence number assigned; 0 before any entry.
    sequence: u64,
    entries: VecDeque<AuditEntry>,
}

impl SessionChain {
    fn new(anchor: Vec<u8>, anchor_kind: AnchorKind) -> Self {
        Self {
            head: anchor.clone(),
            anchor,
            anchor_kind,
            sequence: 0,
            entries: VecDeque::new(),
        }
    }

    fn snapshot(&self, session_id: &str) -> AuditSnapshot {
        AuditSnapshot {
            session_id: session_id.to_string(),
            anchor_hex: hex::encode(&self.anchor),
            anchor_kind: self.anchor_kind,
            head_hash_hex: hex::encode(&self.head),
            entry_count: self.entries.len(),
            next_sequence: self.sequence.saturating_add(1),
            entries: self.entries.iter().cloned().collect(),
        }
    }
}

// ── Public chain ──────────────────────────────────────────────────────────────

/// Per-session tamper-evident record of security events.
pub struct AuditChain {
    max_entries_per_session: usize,
    enabled: AtomicBool,
    sessions: Mutex<HashMap<String, SessionChain>>,
}

impl AuditChain {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            max_entries_per_session: config.max_entries_per_session.max(1),
            enabled: AtomicBool::new(config.enabled),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, SessionChain>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe this chain to `bus` so every published event is recorded.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> SubscriptionId {
        bus.subscribe(Arc::clone(self))
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        info!(enabled, "audit chain recording toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Start (or restart) `session_id` anchored to handshake material.
    ///
    /// Any previous chain state for the session is discarded.  The anchor is
    /// normally a 32-byte transcript hash; an empty anchor is rejected.
    pub fn begin_session(&self, session_id: impl Into<String>, anchor: &[u8]) -> TelemetryResult<()> {
        let session_id = session_id.into();
        if anchor.is_empty() {
            return Err(TelemetryError::InvalidAnchor {
                reason: format!("empty anchor for session '{}'", session_id),
            });
        }

        let replaced = self
            .lock_sessions()
            .insert(session_id.clone(), SessionChain::new(anchor.to_vec(), AnchorKind::Handshake))
            .is_some();

        info!(
            session_id = %session_id,
            anchor = %hex::encode(anchor),
            replaced,
            "audit session anchored"
        );
        Ok(())
    }

    /// Append `event` to its session's chain.
    ///
    /// The session comes from the event's `sessionId` context key, falling back
    /// to the global session.  A session seen for the first time is created
    /// with the all-zero, unauthenticated anchor.  Returns the new entry, or
    /// `None` when recording is disabled.
    pub fn record(&self, event: &SecurityEvent) -> Option<AuditEntry> {
        if !self.is_enabled() {
            trace!(event_id = %event.id(), "audit chain disabled, event not recorded");
            return None;
        }

        let session_id = event.session_id();
        let mut sessions = self.lock_sessions();
        let chain = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id = %session_id, "audit session created with unauthenticated anchor");
            SessionChain::new(ZERO_ANCHOR.to_vec(), AnchorKind::Unauthenticated)
        });

        chain.sequence = chain.sequence.saturating_add(1);

        let mut entry = AuditEntry {
            session_id: session_id.to_string(),
            seq: chain.sequence,
            timestamp_ms: event.timestamp_ms(),
            event_type: event.event_type(),
            severity: event.severity(),
            message: event.message().to_string(),
            context: event
                .context()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            event_id: event.id().to_string(),
            is_meta_event: event.is_meta_event(),
            prev_hash_hex: hex::encode(&chain.head),
            hash_hex: String::new(),
        };

        let new_head = chain_hash(&chain.head, &encode_payload(&PayloadFields::from_entry(&entry)));
        entry.hash_hex = hex::encode(new_head);
        chain.head = new_head.to_vec();
        chain.entries.push_back(entry.clone());

        let mut trimmed = 0usize;
        while chain.entries.len() > self.max_entries_per_session {
            chain.entries.pop_front();
            trimmed += 1;
        }

        debug!(
            session_id = %entry.session_id,
            seq = entry.seq,
            event_type = %entry.event_type,
            hash = %entry.hash_hex,
            trimmed,
            "audit entry recorded"
        );

        Some(entry)
    }

    /// Export view of `session_id`, or `None` if the session is unknown.
    pub fn snapshot(&self, session_id: &str) -> Option<AuditSnapshot> {
        self.lock_sessions()
            .get(session_id)
            .map(|chain| chain.snapshot(session_id))
    }

    /// Ids of every session with chain state, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop one session's chain.  Returns false if it did not exist.
    pub fn reset(&self, session_id: &str) -> bool {
        let removed = self.lock_sessions().remove(session_id).is_some();
        if removed {
            info!(session_id = %session_id, "audit session reset");
        }
        removed
    }

    /// Drop every session's chain.
    pub fn reset_all(&self) {
        let count = {
            let mut sessions = self.lock_sessions();
            let count = sessions.len();
            sessions.clear();
            count
        };
        info!(sessions = count, "all audit sessions reset");
    }
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

#[async_trait]
impl SecurityEventListener for AuditChain {
    async fn on_event(&self, event: Arc<SecurityEvent>) {
        self.record(&event);
    }
}
