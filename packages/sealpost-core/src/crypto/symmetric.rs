//! # Symmetric Encryption
//!
//! One-time AES-256-GCM session keys for message bodies.
//!
//! ## Seal / Open
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MESSAGE BODY ENCRYPTION                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Generate Session Key (once per message)                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Random 32 bytes from OsRng                                  │       │
//! │  │  (Never persisted, never reused for another message)        │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Generate Nonce (once per encryption)                          │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Random 12 bytes from OsRng                                  │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: Encrypt                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM(key, nonce, utf8(plaintext))                    │       │
//! │  │           ↓                                                  │       │
//! │  │  Ciphertext || 16-byte Auth Tag                              │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Output: (ciphertext_with_tag, nonce)                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Opening either returns the complete plaintext or
//! [`Error::AuthenticationFailed`]; partially decrypted data is never
//! released.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the session key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// ## Critical Security Requirement
///
/// **NEVER reuse a nonce with the same key!**
///
/// Session keys are single-use, and every encryption draws a fresh
/// random nonce on top of that.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Result<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::EncryptionFailed(format!("OS random source failed: {}", e)))?;
        Ok(Self(bytes))
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a decoded wire field, checking its length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidEncoding(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// A single-use AES-256-GCM session key
///
/// Not `Clone`: a session key belongs to exactly one message. Zeroized
/// when dropped.
#[derive(ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh random session key
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::KeyGenerationFailed(format!("OS random source failed: {}", e)))?;
        Ok(Self(bytes))
    }

    /// Export the raw key bytes (for wrapping)
    ///
    /// The returned buffer is zeroized when dropped.
    pub fn export_raw(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        Zeroizing::new(self.0)
    }

    /// Import raw key bytes (after unwrapping)
    pub fn import_raw(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::MalformedKey(format!(
                "session key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| Error::MalformedKey(format!("Invalid session key: {}", e)))
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}

/// Encrypt bytes with AES-256-GCM under a fresh random nonce
///
/// Returns `(nonce, ciphertext_with_tag)`.
pub fn encrypt(key: &SessionKey, plaintext: &[u8], aad: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random()?;
    let cipher = key.cipher()?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(nonce.as_bytes()), payload)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))?;

    Ok((nonce, ciphertext))
}

/// Decrypt bytes with AES-256-GCM
///
/// ## Errors
///
/// Returns `AuthenticationFailed` if:
/// - The ciphertext or tag was tampered with
/// - The key is wrong
/// - The nonce is wrong
/// - The AAD doesn't match
pub fn decrypt(key: &SessionKey, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = key.cipher()?;

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(AesNonce::from_slice(nonce.as_bytes()), payload)
        .map_err(|_| Error::AuthenticationFailed)
}

/// Seal a text message body under a session key
///
/// Returns `(ciphertext_with_tag, nonce)`. Message bodies carry no
/// associated data on the wire, so none is bound here.
pub fn seal(plaintext: &str, key: &SessionKey) -> Result<(Vec<u8>, Nonce)> {
    let (nonce, ciphertext) = encrypt(key, plaintext.as_bytes(), &[])?;
    Ok((ciphertext, nonce))
}

/// Open a sealed text message body
pub fn open(ciphertext: &[u8], key: &SessionKey, nonce: &Nonce) -> Result<String> {
    let plaintext = Zeroizing::new(decrypt(key, nonce, ciphertext, &[])?);
    String::from_utf8(plaintext.to_vec())
        .map_err(|_| Error::InvalidMessageContent("body is not valid UTF-8".into()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seal_open_round_trip() {
        let key = SessionKey::generate().unwrap();

        let (ciphertext, nonce) = seal("Hello, World!", &key).unwrap();
        let plaintext = open(&ciphertext, &key, &nonce).unwrap();

        assert_eq!(plaintext, "Hello, World!");
    }

    #[test]
    fn test_seal_open_empty_and_unicode() {
        let key = SessionKey::generate().unwrap();

        for text in ["", "héllo wörld", "日本語のメッセージ 🔐"] {
            let (ciphertext, nonce) = seal(text, &key).unwrap();
            assert_eq!(ciphertext.len(), text.len() + TAG_SIZE);
            assert_eq!(open(&ciphertext, &key, &nonce).unwrap(), text);
        }
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SessionKey::generate().unwrap();
        let (mut ciphertext, nonce) = seal("Hello, World!", &key).unwrap();

        ciphertext[0] ^= 0x01;

        let result = open(&ciphertext, &key, &nonce);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_tag_fails() {
        let key = SessionKey::generate().unwrap();
        let (mut ciphertext, nonce) = seal("Hello, World!", &key).unwrap();

        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x80;

        assert!(matches!(
            open(&ciphertext, &key, &nonce),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = SessionKey::generate().unwrap();
        let key2 = SessionKey::generate().unwrap();
        let (ciphertext, nonce) = seal("secret", &key1).unwrap();

        assert!(matches!(
            open(&ciphertext, &key2, &nonce),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = SessionKey::generate().unwrap();
        let (ciphertext, _) = seal("secret", &key).unwrap();
        let other = Nonce::random().unwrap();

        assert!(open(&ciphertext, &key, &other).is_err());
    }

    #[test]
    fn test_nonces_are_distinct() {
        let key = SessionKey::generate().unwrap();
        let mut seen = HashSet::new();

        for _ in 0..256 {
            let (_, nonce) = seal("same text", &key).unwrap();
            assert!(seen.insert(nonce), "nonce repeated");
        }
    }

    #[test]
    fn test_raw_export_import() {
        let key = SessionKey::generate().unwrap();
        let raw = key.export_raw();
        let restored = SessionKey::import_raw(&raw[..]).unwrap();

        let (ciphertext, nonce) = seal("carried over", &key).unwrap();
        assert_eq!(open(&ciphertext, &restored, &nonce).unwrap(), "carried over");
    }

    #[test]
    fn test_import_raw_rejects_wrong_length() {
        assert!(matches!(
            SessionKey::import_raw(&[0u8; 16]),
            Err(Error::MalformedKey(_))
        ));
        assert!(matches!(
            SessionKey::import_raw(&[]),
            Err(Error::MalformedKey(_))
        ));
    }

    #[test]
    fn test_nonce_from_slice_rejects_wrong_length() {
        assert!(Nonce::from_slice(&[0u8; NONCE_SIZE]).is_ok());
        assert!(matches!(
            Nonce::from_slice(&[0u8; 16]),
            Err(Error::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_non_utf8_body_is_rejected() {
        let key = SessionKey::generate().unwrap();
        let (nonce, ciphertext) = encrypt(&key, &[0xff, 0xfe, 0xfd], &[]).unwrap();

        assert!(matches!(
            open(&ciphertext, &key, &nonce),
            Err(Error::InvalidMessageContent(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SessionKey::generate().unwrap();
        assert_eq!(format!("{:?}", key), "SessionKey([REDACTED])");
    }
}
