//! Protocol configuration.
//!
//! Key size, hash choice, and the freshness window are deployment-specific
//! trade-offs, so they are carried in an explicit configuration structure
//! rather than hard-coded. `ProtocolConfig::default()` is the documented
//! baseline; every field can be overridden by the embedding application.

use std::time::Duration;

/// Default RSA modulus size in bits.
pub const DEFAULT_ASYMMETRIC_KEY_BITS: usize = 2048;

/// Default maximum accepted age of a freshness marker.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// Default delimiter separating payload from its freshness marker.
///
/// Chosen as a token not expected to occur at the tail of legitimate
/// payloads; the marker is split off at the delimiter's *last* occurrence,
/// so earlier occurrences inside the payload are harmless.
pub const DEFAULT_FRESHNESS_DELIMITER: &str = " ~ ";

/// Digest suite used across the protocol.
///
/// Selects the hash for OAEP encryption padding, PSS signature padding, and
/// the detached HMAC tag together. Mixing digests between those operations
/// buys nothing and invites interop mistakes, so there is one knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256 (default).
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Digest output length in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

/// Tunable protocol parameters.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// RSA modulus size for identity key generation.
    pub asymmetric_key_bits: usize,

    /// Digest suite for OAEP, PSS, and the detached HMAC tag.
    pub hash: HashAlgorithm,

    /// Maximum accepted age of an embedded freshness marker, in either
    /// direction of the verifier's clock.
    pub freshness_window: Duration,

    /// Delimiter between payload and freshness marker inside a plaintext.
    /// Must be non-empty.
    pub freshness_delimiter: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            asymmetric_key_bits: DEFAULT_ASYMMETRIC_KEY_BITS,
            hash: HashAlgorithm::Sha256,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            freshness_delimiter: DEFAULT_FRESHNESS_DELIMITER.to_string(),
        }
    }
}
