//! Session key transport.
//!
//! One-shot delivery of a freshly generated symmetric key from a holder to
//! a recipient:
//!
//! 1. The holder encrypts the raw key bytes under the *recipient's* public
//!    key (OAEP).
//! 2. The holder signs the resulting ciphertext (never the plaintext key)
//!    with its own private key (PSS). Signing the ciphertext binds
//!    authenticity to the exact bytes transmitted and avoids producing a
//!    signature over secret material.
//! 3. The recipient verifies the signature against the holder's public
//!    identity, and only then decrypts with its own private key.
//!
//! On any verification failure the protocol aborts and the candidate key is
//! never adopted. The holder side adopts the generated key directly; only
//! the recipient runs [`open`].
//!
//! Re-running the transport is the explicit rekey path: the recovered key
//! replaces a channel's session key wholesale via
//! [`SecureChannel::rekey`](crate::channel::SecureChannel::rekey).

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use otar_core::config::HashAlgorithm;
use otar_core::wire::KeyTransportRecord;
use otar_core::SESSION_KEY_SIZE;

use crate::identity::{IdentityKeypair, PublicIdentity};

/// Key transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session key generation failed: {0}")]
    KeyGeneration(String),

    #[error("session key encryption failed: {0}")]
    Encryption(String),

    #[error("session key signing failed: {0}")]
    Signing(String),

    /// The record's signature does not verify over its ciphertext. The
    /// carried key must not be adopted.
    #[error("signature verification failed: session key rejected")]
    SignatureVerification,

    #[error("session key unwrap failed")]
    Decryption,

    #[error("recovered session key has wrong length: {0} bytes")]
    KeyLength(usize),
}

/// Short-lived symmetric session key.
///
/// 32 opaque bytes, created once per transport run. Each party owns an
/// equal-value copy; the key is replaced wholesale on rekey, never
/// partially mutated, and is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh key from the OS CSPRNG.
    pub fn generate() -> Result<Self, TransportError> {
        let mut bytes = [0u8; SESSION_KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TransportError::KeyGeneration(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([redacted])")
    }
}

/// Package a session key for the recipient: OAEP-encrypt under
/// `recipient`'s public key, then PSS-sign the ciphertext with `sender`'s
/// private key.
pub fn seal(
    sender: &IdentityKeypair,
    recipient: &PublicIdentity,
    key: &SessionKey,
    hash: HashAlgorithm,
) -> Result<KeyTransportRecord, TransportError> {
    let ciphertext = recipient
        .encrypt_to(key.as_bytes(), hash)
        .map_err(|e| TransportError::Encryption(e.to_string()))?;

    let signature = sender
        .sign(&ciphertext, hash)
        .map_err(|e| TransportError::Signing(e.to_string()))?;

    Ok(KeyTransportRecord {
        ciphertext,
        signature,
    })
}

/// Recover the session key from a received record.
///
/// The signature check comes first: an unauthenticated ciphertext is never
/// decrypted, and on any failure the carried key is never adopted.
pub fn open(
    record: &KeyTransportRecord,
    sender: &PublicIdentity,
    recipient: &IdentityKeypair,
    hash: HashAlgorithm,
) -> Result<SessionKey, TransportError> {
    sender
        .verify(&record.ciphertext, &record.signature, hash)
        .map_err(|_| TransportError::SignatureVerification)?;

    let mut bytes = recipient
        .decrypt(&record.ciphertext, hash)
        .map_err(|_| TransportError::Decryption)?;

    let len = bytes.len();
    let key: Result<[u8; SESSION_KEY_SIZE], _> = bytes.as_slice().try_into();
    bytes.zeroize();

    match key {
        Ok(key) => Ok(SessionKey::from_bytes(key)),
        Err(_) => Err(TransportError::KeyLength(len)),
    }
}
