//! RSA identity keys and fingerprints.
//!
//! Each party holds a long-term [`IdentityKeypair`] used for authentication
//! and key transport, never for bulk data. The public half travels to peers
//! as a [`PublicIdentity`] (DER or PEM encoded, distributed out of band) and
//! is summarized by a short [`Fingerprint`].
//!
//! Signatures are RSA-PSS with MGF1 and a maximum-length random salt, so
//! signing is probabilistic: two signatures over identical input differ in
//! bytes and both verify. Encryption is RSA-OAEP.
//!
//! # Example
//!
//! ```
//! use otar_core::config::HashAlgorithm;
//! use otar_crypto::identity::IdentityKeypair;
//!
//! let keypair = IdentityKeypair::generate(2048).unwrap();
//!
//! let signature = keypair.sign(b"challenge", HashAlgorithm::Sha256).unwrap();
//! assert!(keypair
//!     .public()
//!     .verify(b"challenge", &signature, HashAlgorithm::Sha256)
//!     .is_ok());
//! ```

use std::fmt;
use std::fs;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use zeroize::Zeroizing;

use otar_core::config::HashAlgorithm;

/// Smallest accepted modulus: the smallest size that can OAEP-wrap a
/// 32-byte session key under SHA-256. Production deployments should use the
/// configured default of 2048.
pub const MIN_ASYMMETRIC_KEY_BITS: usize = 1024;

/// Identity key errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("asymmetric encryption failed: {0}")]
    Encryption(String),

    /// Padding and structure failures are reported identically; the error
    /// must not reveal which check rejected the ciphertext.
    #[error("asymmetric decryption failed")]
    Decryption,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("key encoding error: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Short identifier for a public identity.
///
/// Base64url-encoded SHA-256 of the DER public key (43 characters). Always
/// SHA-256 regardless of the configured protocol digest: this is a stable
/// identifier, not a protocol operation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

/// Long-term RSA identity keypair.
///
/// The private half never leaves this struct except through [`save`]
/// (restricted-permission PEM) and is zeroized on drop by the underlying
/// key type. It is never logged: there is no `Debug` impl.
///
/// [`save`]: Self::save
pub struct IdentityKeypair {
    private: RsaPrivateKey,
    public: PublicIdentity,
}

impl IdentityKeypair {
    /// Generate a fresh keypair of `bits` modulus size from the OS CSPRNG.
    ///
    /// # Errors
    /// `IdentityError::KeyGeneration` if `bits` is below
    /// [`MIN_ASYMMETRIC_KEY_BITS`] or the underlying generation fails.
    pub fn generate(bits: usize) -> Result<Self, IdentityError> {
        if bits < MIN_ASYMMETRIC_KEY_BITS {
            return Err(IdentityError::KeyGeneration(format!(
                "modulus too small: {} bits (minimum {})",
                bits, MIN_ASYMMETRIC_KEY_BITS
            )));
        }

        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;
        let public = PublicIdentity::from_key(private.to_public_key());

        Ok(Self { private, public })
    }

    /// The public half, for distribution to peers.
    pub fn public(&self) -> &PublicIdentity {
        &self.public
    }

    /// Sign arbitrary bytes with RSA-PSS (maximum-length random salt).
    ///
    /// Probabilistic: repeated signs over the same input yield different
    /// signatures, all of which verify.
    pub fn sign(&self, message: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, IdentityError> {
        let digest = digest_message(message, hash);
        let scheme = pss_scheme(self.public.key.size(), hash);

        self.private
            .sign_with_rng(&mut OsRng, scheme, &digest)
            .map_err(|e| IdentityError::Signing(e.to_string()))
    }

    /// Decrypt an RSA-OAEP ciphertext produced against this key's public
    /// half.
    ///
    /// # Errors
    /// `IdentityError::Decryption` if the ciphertext was not produced for
    /// this key or has been altered in any way.
    pub fn decrypt(&self, ciphertext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, IdentityError> {
        self.private
            .decrypt(oaep_scheme(hash), ciphertext)
            .map_err(|_| IdentityError::Decryption)
    }

    /// Save the keypair as PEM files.
    ///
    /// The private key is written with restricted permissions (0600 on
    /// Unix).
    pub fn save(&self, private_path: &str, public_path: &str) -> Result<(), IdentityError> {
        let private_pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;

        fs::write(private_path, private_pem.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(private_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(private_path, perms)?;
        }

        fs::write(public_path, self.public.to_pem()?)?;

        Ok(())
    }

    /// Load a keypair from a private key PEM file.
    pub fn load(private_path: &str) -> Result<Self, IdentityError> {
        let pem = Zeroizing::new(fs::read_to_string(private_path)?);

        let private = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;
        let public = PublicIdentity::from_key(private.to_public_key());

        Ok(Self { private, public })
    }

    /// Load only the public half (for verification and encryption).
    pub fn load_public(public_path: &str) -> Result<PublicIdentity, IdentityError> {
        let pem = fs::read_to_string(public_path)?;
        PublicIdentity::from_pem(&pem)
    }
}

/// Public identity (verifying/encrypting key only).
///
/// Holds no private state; every operation is a pure function of its
/// inputs, usable by anyone the key was distributed to.
#[derive(Clone)]
pub struct PublicIdentity {
    key: RsaPublicKey,
}

impl PublicIdentity {
    fn from_key(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` with RSA-OAEP under this public key.
    pub fn encrypt_to(&self, plaintext: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, IdentityError> {
        self.key
            .encrypt(&mut OsRng, oaep_scheme(hash), plaintext)
            .map_err(|e| IdentityError::Encryption(e.to_string()))
    }

    /// Verify an RSA-PSS signature over `message`.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        hash: HashAlgorithm,
    ) -> Result<(), IdentityError> {
        let digest = digest_message(message, hash);
        let scheme = pss_scheme(self.key.size(), hash);

        self.key
            .verify(scheme, &digest, signature)
            .map_err(|_| IdentityError::SignatureVerification)
    }

    /// Export as DER (SubjectPublicKeyInfo).
    pub fn to_der(&self) -> Result<Vec<u8>, IdentityError> {
        let doc = self
            .key
            .to_public_key_der()
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;
        Ok(doc.into_vec())
    }

    /// Export as PEM.
    pub fn to_pem(&self) -> Result<String, IdentityError> {
        self.key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| IdentityError::Encoding(e.to_string()))
    }

    /// Import from DER.
    pub fn from_der(der: &[u8]) -> Result<Self, IdentityError> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    /// Import from PEM.
    pub fn from_pem(pem: &str) -> Result<Self, IdentityError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    /// Short stable identifier for this identity.
    pub fn fingerprint(&self) -> Result<Fingerprint, IdentityError> {
        let der = self.to_der()?;
        let digest = Sha256::digest(&der);
        Ok(Fingerprint(URL_SAFE_NO_PAD.encode(digest)))
    }
}

fn digest_message(message: &[u8], hash: HashAlgorithm) -> Vec<u8> {
    match hash {
        HashAlgorithm::Sha256 => Sha256::digest(message).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(message).to_vec(),
    }
}

fn oaep_scheme(hash: HashAlgorithm) -> Oaep {
    match hash {
        HashAlgorithm::Sha256 => Oaep::new::<Sha256>(),
        HashAlgorithm::Sha512 => Oaep::new::<Sha512>(),
    }
}

/// PSS with the maximum salt the modulus admits. Signer and verifier both
/// derive the length from the public key, so it never travels on the wire.
fn pss_scheme(key_bytes: usize, hash: HashAlgorithm) -> Pss {
    let salt_len = key_bytes.saturating_sub(hash.output_len() + 2);
    match hash {
        HashAlgorithm::Sha256 => Pss::new_with_salt::<Sha256>(salt_len),
        HashAlgorithm::Sha512 => Pss::new_with_salt::<Sha512>(salt_len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: HashAlgorithm = HashAlgorithm::Sha256;

    fn test_keypair() -> IdentityKeypair {
        IdentityKeypair::generate(MIN_ASYMMETRIC_KEY_BITS).unwrap()
    }

    #[test]
    fn test_sign_verify() {
        let keypair = test_keypair();
        let message = b"over-the-air challenge";

        let signature = keypair.sign(message, HASH).unwrap();
        assert!(keypair.public().verify(message, &signature, HASH).is_ok());

        // Wrong message must fail
        assert!(matches!(
            keypair.public().verify(b"wrong message", &signature, HASH),
            Err(IdentityError::SignatureVerification)
        ));
    }

    #[test]
    fn test_signatures_are_probabilistic() {
        let keypair = test_keypair();
        let message = b"same input";

        let sig1 = keypair.sign(message, HASH).unwrap();
        let sig2 = keypair.sign(message, HASH).unwrap();

        // Random salt: same input, different bytes, both valid
        assert_ne!(sig1, sig2);
        assert!(keypair.public().verify(message, &sig1, HASH).is_ok());
        assert!(keypair.public().verify(message, &sig2, HASH).is_ok());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let keypair = test_keypair();
        let plaintext = b"short secret";

        let ciphertext = keypair.public().encrypt_to(plaintext, HASH).unwrap();
        assert_ne!(&ciphertext, plaintext);

        let recovered = keypair.decrypt(&ciphertext, HASH).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let intended = test_keypair();
        let other = test_keypair();

        let ciphertext = intended.public().encrypt_to(b"secret", HASH).unwrap();

        assert!(matches!(
            other.decrypt(&ciphertext, HASH),
            Err(IdentityError::Decryption)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let keypair = test_keypair();
        let mut ciphertext = keypair.public().encrypt_to(b"secret", HASH).unwrap();
        ciphertext[0] ^= 0x01;

        assert!(matches!(
            keypair.decrypt(&ciphertext, HASH),
            Err(IdentityError::Decryption)
        ));
    }

    #[test]
    fn test_generate_rejects_tiny_modulus() {
        assert!(matches!(
            IdentityKeypair::generate(512),
            Err(IdentityError::KeyGeneration(_))
        ));
    }

    #[test]
    fn test_public_identity_der_roundtrip() {
        let keypair = test_keypair();
        let der = keypair.public().to_der().unwrap();

        let imported = PublicIdentity::from_der(&der).unwrap();
        assert_eq!(imported.to_der().unwrap(), der);
    }

    #[test]
    fn test_public_identity_pem_roundtrip() {
        let keypair = test_keypair();
        let pem = keypair.public().to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let imported = PublicIdentity::from_pem(&pem).unwrap();
        assert_eq!(
            imported.fingerprint().unwrap(),
            keypair.public().fingerprint().unwrap()
        );
    }

    #[test]
    fn test_fingerprint_is_stable_and_distinct() {
        let a = test_keypair();
        let b = test_keypair();

        // 32 bytes base64url without padding
        assert_eq!(a.public().fingerprint().unwrap().as_str().len(), 43);
        assert_eq!(
            a.public().fingerprint().unwrap(),
            a.public().fingerprint().unwrap()
        );
        assert_ne!(
            a.public().fingerprint().unwrap(),
            b.public().fingerprint().unwrap()
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("otar-identity-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let private_path = dir.join("party.key");
        let public_path = dir.join("party.pub");

        let keypair = test_keypair();
        keypair
            .save(private_path.to_str().unwrap(), public_path.to_str().unwrap())
            .unwrap();

        let loaded = IdentityKeypair::load(private_path.to_str().unwrap()).unwrap();
        assert_eq!(
            loaded.public().fingerprint().unwrap(),
            keypair.public().fingerprint().unwrap()
        );

        let public = IdentityKeypair::load_public(public_path.to_str().unwrap()).unwrap();
        assert_eq!(
            public.fingerprint().unwrap(),
            keypair.public().fingerprint().unwrap()
        );

        fs::remove_dir_all(&dir).unwrap();
    }
}
