//! Authenticated session channel.
//!
//! A [`SecureChannel`] binds one established [`SessionKey`] to the
//! encrypt-then-MAC message path:
//!
//! - outbound: a freshness marker is appended to the plaintext, the result
//!   is sealed with XChaCha20-Poly1305 (random nonce, prepended so the
//!   ciphertext is self-contained), and a detached HMAC tag is computed
//!   over the *ciphertext*;
//! - inbound: the tag must be verified first, then the ciphertext is
//!   opened and the embedded marker checked against the freshness window.
//!
//! [`decrypt`](SecureChannel::decrypt) does not itself check the detached
//! tag: callers are contractually required to call
//! [`verify_tag`](SecureChannel::verify_tag) over the ciphertext, and see
//! it succeed, before decrypting. [`open_envelope`](SecureChannel::open_envelope)
//! composes the two in the required order and is the recommended entry
//! point.
//!
//! # Replay protection limits
//!
//! Freshness is clock-based only: a captured message replayed *within* the
//! window is accepted, and the check tolerates clock skew up to the window
//! in either direction. Pairing the marker with a per-session sequence
//! number would close this gap but changes the wire format.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Sha256, Sha512};
use thiserror::Error;
use zeroize::Zeroize;

use otar_core::config::{HashAlgorithm, ProtocolConfig};
use otar_core::wire::MessageEnvelope;

use crate::freshness::{self, FreshnessMarker};
use crate::transport::SessionKey;

/// XChaCha20 nonce size in bytes, prepended to every ciphertext.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size in bytes.
const POLY1305_TAG_SIZE: usize = 16;

/// Session channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("message encryption failed")]
    Encryption,

    #[error("message decryption failed")]
    Decryption,

    /// Detached tag mismatch. The associated ciphertext must be discarded
    /// without attempting decryption.
    #[error("integrity tag mismatch")]
    Integrity,

    /// Decryption succeeded but the payload carries no parseable freshness
    /// marker.
    #[error("message carries no parseable freshness marker")]
    MalformedMarker,

    /// The embedded marker is outside the freshness window. The message
    /// must be discarded; its plaintext is never returned.
    #[error("stale message: marker is {age:?} from local clock")]
    Stale { age: Duration },
}

/// Two-party session channel over one established key.
///
/// The key is the only mutable state and is replaced wholesale by
/// [`rekey`](Self::rekey) under an exclusive lock, so concurrent
/// encrypt/decrypt/tag calls on other threads never observe a half-set
/// key. The channel is `Send + Sync`; independent sessions need no shared
/// state at all.
pub struct SecureChannel {
    key: RwLock<SessionKey>,
    config: ProtocolConfig,
}

impl SecureChannel {
    /// Bind a channel to an established session key.
    pub fn new(key: SessionKey, config: ProtocolConfig) -> Self {
        Self {
            key: RwLock::new(key),
            config,
        }
    }

    /// Replace the session key wholesale (explicit rekey).
    ///
    /// Mutually exclusive with in-flight channel operations; the write
    /// lock is held only for the swap. Envelopes sealed under the old key
    /// no longer open afterwards.
    pub fn rekey(&self, new_key: SessionKey) {
        let mut guard = self.key.write().unwrap_or_else(PoisonError::into_inner);
        *guard = new_key;
    }

    /// Encrypt a plaintext for the peer.
    ///
    /// Appends a freshness marker using the configured delimiter, then
    /// seals with XChaCha20-Poly1305 under a random nonce. The nonce is
    /// prepended to the returned ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ChannelError> {
        encrypt_with(&self.read_key(), &self.config, plaintext)
    }

    /// Decrypt a received ciphertext and check its freshness marker.
    ///
    /// Precondition: [`verify_tag`](Self::verify_tag) has been called over
    /// this ciphertext and succeeded.
    ///
    /// Staleness is a typed failure ([`ChannelError::Stale`]); the payload
    /// position never carries diagnostic bytes.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ChannelError> {
        decrypt_with(&self.read_key(), &self.config, ciphertext)
    }

    /// Compute a detached tag over arbitrary bytes (typically a
    /// ciphertext), keyed by the session key.
    pub fn tag(&self, data: &[u8]) -> Vec<u8> {
        tag_with(&self.read_key(), self.config.hash, data)
    }

    /// Verify a detached tag in constant time.
    ///
    /// Must be called, and must succeed, before [`decrypt`](Self::decrypt)
    /// on the corresponding ciphertext.
    pub fn verify_tag(&self, data: &[u8], tag: &[u8]) -> Result<(), ChannelError> {
        verify_tag_with(&self.read_key(), self.config.hash, data, tag)
    }

    /// Encrypt and tag in one step, producing a wire envelope.
    pub fn seal_envelope(&self, plaintext: &[u8]) -> Result<MessageEnvelope, ChannelError> {
        let key = self.read_key();
        let ciphertext = encrypt_with(&key, &self.config, plaintext)?;
        let tag = tag_with(&key, self.config.hash, &ciphertext);
        Ok(MessageEnvelope { ciphertext, tag })
    }

    /// Verify-then-decrypt a received envelope.
    ///
    /// The tag check happens first; on [`ChannelError::Integrity`] the
    /// ciphertext is never decrypted.
    pub fn open_envelope(&self, envelope: &MessageEnvelope) -> Result<Vec<u8>, ChannelError> {
        let key = self.read_key();
        verify_tag_with(&key, self.config.hash, &envelope.ciphertext, &envelope.tag)?;
        decrypt_with(&key, &self.config, &envelope.ciphertext)
    }

    fn read_key(&self) -> RwLockReadGuard<'_, SessionKey> {
        self.key.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encrypt_with(
    key: &SessionKey,
    config: &ProtocolConfig,
    plaintext: &[u8],
) -> Result<Vec<u8>, ChannelError> {
    let marker = FreshnessMarker::now().render();

    let mut payload =
        Vec::with_capacity(plaintext.len() + config.freshness_delimiter.len() + marker.len());
    payload.extend_from_slice(plaintext);
    payload.extend_from_slice(config.freshness_delimiter.as_bytes());
    payload.extend_from_slice(marker.as_bytes());

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let sealed = cipher.encrypt(XNonce::from_slice(&nonce), payload.as_slice());
    payload.zeroize();
    let sealed = sealed.map_err(|_| ChannelError::Encryption)?;

    let mut ciphertext = Vec::with_capacity(NONCE_SIZE + sealed.len());
    ciphertext.extend_from_slice(&nonce);
    ciphertext.extend_from_slice(&sealed);
    Ok(ciphertext)
}

fn decrypt_with(
    key: &SessionKey,
    config: &ProtocolConfig,
    ciphertext: &[u8],
) -> Result<Vec<u8>, ChannelError> {
    if ciphertext.len() < NONCE_SIZE + POLY1305_TAG_SIZE {
        return Err(ChannelError::Decryption);
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let mut payload = cipher
        .decrypt(XNonce::from_slice(nonce), sealed)
        .map_err(|_| ChannelError::Decryption)?;

    let Some((plaintext_len, marker)) =
        split_marker(&payload, config.freshness_delimiter.as_bytes())
    else {
        payload.zeroize();
        return Err(ChannelError::MalformedMarker);
    };

    let now = Utc::now();
    if !freshness::is_fresh(&marker, now, config.freshness_window) {
        payload.zeroize();
        return Err(ChannelError::Stale {
            age: marker.age(now),
        });
    }

    payload.truncate(plaintext_len);
    Ok(payload)
}

/// Locate the marker after the delimiter's *last* occurrence, so delimiter
/// bytes inside the payload proper stay harmless.
fn split_marker(payload: &[u8], delimiter: &[u8]) -> Option<(usize, FreshnessMarker)> {
    if delimiter.is_empty() || payload.len() < delimiter.len() {
        return None;
    }

    let at = payload
        .windows(delimiter.len())
        .rposition(|window| window == delimiter)?;

    let marker = std::str::from_utf8(&payload[at + delimiter.len()..]).ok()?;
    let marker = FreshnessMarker::parse(marker).ok()?;

    Some((at, marker))
}

fn tag_with(key: &SessionKey, hash: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match hash {
        HashAlgorithm::Sha256 => mac_over::<Hmac<Sha256>>(key.as_bytes(), data)
            .finalize()
            .into_bytes()
            .to_vec(),
        HashAlgorithm::Sha512 => mac_over::<Hmac<Sha512>>(key.as_bytes(), data)
            .finalize()
            .into_bytes()
            .to_vec(),
    }
}

fn verify_tag_with(
    key: &SessionKey,
    hash: HashAlgorithm,
    data: &[u8],
    tag: &[u8],
) -> Result<(), ChannelError> {
    let result = match hash {
        HashAlgorithm::Sha256 => mac_over::<Hmac<Sha256>>(key.as_bytes(), data).verify_slice(tag),
        HashAlgorithm::Sha512 => mac_over::<Hmac<Sha512>>(key.as_bytes(), data).verify_slice(tag),
    };
    result.map_err(|_| ChannelError::Integrity)
}

fn mac_over<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> M {
    let Ok(mut mac) = <M as KeyInit>::new_from_slice(key) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(data);
    mac
}
