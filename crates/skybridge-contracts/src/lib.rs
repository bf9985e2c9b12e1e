//! # skybridge-contracts
//!
//! Shared types, configuration, and error contracts for SkyBridge security
//! telemetry.
//!
//! The bus and the audit chain both import from here.  No business logic
//! lives in this crate; only data definitions and error types.

pub mod config;
pub mod error;
pub mod event;
