//! Error types for the SkyBridge telemetry crates.
//!
//! Publishing and recording never fail from a producer's point of view, so
//! these variants only surface from configuration loading, chain
//! verification, and snapshot export.

use thiserror::Error;

/// The unified error type for SkyBridge telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A configuration document could not be read, parsed, or validated.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A session anchor was rejected.
    #[error("invalid session anchor: {reason}")]
    InvalidAnchor { reason: String },

    /// A retained audit entry does not match its recomputed hash or link.
    #[error("audit chain integrity violation in session '{session_id}' at seq {sequence}: {reason}")]
    ChainIntegrity {
        session_id: String,
        sequence: u64,
        reason: String,
    },

    /// The requested audit session does not exist.
    #[error("audit session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// A snapshot could not be serialized for export.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

/// Convenience alias used throughout the SkyBridge telemetry crates.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
