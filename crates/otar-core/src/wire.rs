//! Wire records exchanged between parties.
//!
//! Two record types cross the (external) transport:
//!
//! - [`KeyTransportRecord`] delivers a freshly generated session key:
//!   `ciphertext` is the key encrypted under the recipient's public key,
//!   `signature` is the sender's signature over that ciphertext. The
//!   consumer must verify the signature before decrypting.
//! - [`MessageEnvelope`] carries one application message: `ciphertext` is
//!   the authenticated symmetric ciphertext, `tag` is a detached MAC over
//!   it. The consumer must verify the tag before decrypting.
//!
//! Both encode to a compact binary form via bincode. How the bytes move
//! between parties is the embedding application's concern.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire encoding/decoding errors.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// One key-transport run on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTransportRecord {
    /// Session key bytes encrypted under the recipient's public key.
    pub ciphertext: Vec<u8>,
    /// Sender's signature over `ciphertext` (not over the plaintext key).
    pub signature: Vec<u8>,
}

impl KeyTransportRecord {
    /// Encode to bytes for transmission.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serialize(self).map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Decode a received record.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        bincode::deserialize(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }
}

/// One application message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Self-contained authenticated ciphertext (nonce prepended).
    pub ciphertext: Vec<u8>,
    /// Detached MAC over `ciphertext`, keyed by the session key.
    pub tag: Vec<u8>,
}

impl MessageEnvelope {
    /// Encode to bytes for transmission.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serialize(self).map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Decode a received envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        bincode::deserialize(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_record_roundtrip() {
        let record = KeyTransportRecord {
            ciphertext: vec![1, 2, 3, 4],
            signature: vec![5, 6, 7],
        };

        let bytes = record.encode().unwrap();
        let decoded = KeyTransportRecord::decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = MessageEnvelope {
            ciphertext: vec![0xAA; 64],
            tag: vec![0xBB; 32],
        };

        let bytes = envelope.encode().unwrap();
        let decoded = MessageEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(MessageEnvelope::decode(&[0xFF]).is_err());
    }
}
