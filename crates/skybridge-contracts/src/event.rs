//! Event classification types.
//!
//! These enums are the closed vocabulary every producer uses to describe a
//! security observation.  Their string tags are part of the audit chain's
//! deterministic payload, so a tag must never change once released.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Context key that routes an event to a session's audit chain.
pub const CONTEXT_SESSION_ID: &str = "sessionId";

/// Context key naming which queue overflowed, set on overflow meta-events.
pub const CONTEXT_OVERFLOW_QUEUE: &str = "queue";

/// Context key carrying the number of events dropped since the last signal.
pub const CONTEXT_DROPPED_COUNT: &str = "droppedCount";

/// The audit session used when an event carries no (or a blank) session id.
pub const GLOBAL_SESSION_ID: &str = "global";

/// The kind of security occurrence an event describes.
///
/// `EventQueueOverflow` is reserved for meta-events minted by the bus itself;
/// external producers never emit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityEventType {
    /// A peer failed to authenticate.
    AuthenticationFailed,
    /// A code or message signature did not verify.
    SignatureVerificationFailed,
    /// Notarization of a binary could not be confirmed.
    NotarizationFailed,
    /// A configured signing key is malformed, expired, or otherwise unusable.
    InvalidSigningKey,
    /// The keychain refused or failed a key access.
    KeychainAccessFailed,
    /// A caller exceeded its rate limit.
    RateLimitExceeded,
    /// The anomaly detector flagged unusual behaviour.
    AnomalyDetected,
    /// A user or policy refused an incoming connection.
    ConnectionApprovalDenied,
    /// The session handshake could not complete.
    HandshakeFailed,
    /// The handshake fell back to a weaker suite.
    HandshakeFallback,
    /// A peer attempted to force a weaker crypto suite.
    CryptoDowngrade,
    /// A path escaped its sandbox root and was rejected.
    PathTraversalBlocked,
    /// TLS configuration was rejected.
    TlsConfigurationError,
    /// Events were dropped because a queue was full (meta-event only).
    EventQueueOverflow,
}

impl SecurityEventType {
    /// Stable tag used in logs and in the audit payload encoding.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authenticationFailed",
            Self::SignatureVerificationFailed => "signatureVerificationFailed",
            Self::NotarizationFailed => "notarizationFailed",
            Self::InvalidSigningKey => "invalidSigningKey",
            Self::KeychainAccessFailed => "keychainAccessFailed",
            Self::RateLimitExceeded => "rateLimitExceeded",
            Self::AnomalyDetected => "anomalyDetected",
            Self::ConnectionApprovalDenied => "connectionApprovalDenied",
            Self::HandshakeFailed => "handshakeFailed",
            Self::HandshakeFallback => "handshakeFallback",
            Self::CryptoDowngrade => "cryptoDowngrade",
            Self::PathTraversalBlocked => "pathTraversalBlocked",
            Self::TlsConfigurationError => "tlsConfigurationError",
            Self::EventQueueOverflow => "eventQueueOverflow",
        }
    }

    /// True for kinds only the bus may produce.
    pub fn is_reserved_meta_kind(&self) -> bool {
        matches!(self, Self::EventQueueOverflow)
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// How urgent an event is.  Variants are declared in ascending order so the
/// derived `Ord` gives `Info < Warning < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl Severity {
    /// Stable tag used in logs and in the audit payload encoding.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Which bounded queue rejected an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverflowSource {
    /// The bus's main queue, before fan-out.
    MainQueue,
    /// One subscriber's pending queue, identified by its subscription id.
    Subscriber(u64),
}

impl fmt::Display for OverflowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainQueue => f.write_str("main"),
            Self::Subscriber(id) => write!(f, "subscriber-{id}"),
        }
    }
}
