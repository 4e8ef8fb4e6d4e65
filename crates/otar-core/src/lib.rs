//! Core OTAR protocol types, wire records, and configuration.
//!
//! This crate provides:
//! - Wire records for key transport and application messages
//! - Protocol configuration with documented defaults
//! - Shared protocol constants
//!
//! The cryptographic operations that produce and consume these records live
//! in `otar-crypto`; network transport of the records is out of scope and
//! belongs to the embedding application.

#![forbid(unsafe_code)]

pub mod config;
pub mod wire;

pub use config::{HashAlgorithm, ProtocolConfig};
pub use wire::{KeyTransportRecord, MessageEnvelope, WireError};

/// Size of a session key in bytes (256 bits).
pub const SESSION_KEY_SIZE: usize = 32;
