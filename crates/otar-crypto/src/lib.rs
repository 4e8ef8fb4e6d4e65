//! Cryptographic core for OTAR (over-the-air rekeying).
//!
//! This crate provides:
//! - RSA identity keypairs and fingerprints
//! - Authenticated session key transport (OAEP encrypt, PSS sign over the
//!   ciphertext)
//! - An encrypt-then-MAC session channel with embedded freshness checking
//! - Pure freshness-window evaluation
//!
//! # Design
//!
//! Correctness here is about operation ordering, and the API is shaped so
//! the safe orderings are the obvious ones:
//! - key transport verifies the sender's signature *before* decrypting,
//!   and never adopts a key on failure;
//! - the signature covers the transport ciphertext, never the plaintext
//!   key;
//! - channel messages are encrypted then tagged, and
//!   [`SecureChannel::open_envelope`] verifies the detached tag before any
//!   decryption is attempted;
//! - staleness surfaces as a typed error, never as bytes in the payload
//!   position.
//!
//! Network transport, key storage, and multi-party distribution are the
//! embedding application's concern.

#![forbid(unsafe_code)]

pub mod channel;
pub mod freshness;
pub mod identity;
pub mod transport;

pub use channel::SecureChannel;
pub use freshness::FreshnessMarker;
pub use identity::{Fingerprint, IdentityKeypair, PublicIdentity};
pub use transport::SessionKey;
