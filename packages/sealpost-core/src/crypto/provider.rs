//! # Crypto Provider
//!
//! The capability seam between the message pipeline and the primitives.
//!
//! Everything above this trait is written against `dyn CryptoProvider`, so
//! a context without access to cryptography (a server render, a headless
//! job) gets [`DisabledCryptoProvider`] and fails fast instead of producing
//! empty keys that would later look like valid ones.
//!
//! | Provider | Behaviour |
//! |----------|-----------|
//! | [`NativeCryptoProvider`] | RustCrypto RSA-OAEP + AES-256-GCM |
//! | [`DisabledCryptoProvider`] | Every operation returns `KeyUnavailable` |

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::asymmetric::{self, KeyPair, PrivateKey, PublicKey};
use super::symmetric::{self, Nonce, SessionKey};
use crate::error::{Error, Result};

/// Asynchronous cryptographic operations used by the message pipeline
///
/// Every method is a suspension point. Implementations must be usable from
/// several tasks at once.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Whether this provider can perform cryptography at all
    fn is_available(&self) -> bool {
        true
    }

    /// Generate a fresh identity key pair
    async fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Export a public key in the publication format (JWK)
    async fn export_public_key(&self, key: &PublicKey) -> Result<String>;

    /// Export a private key for the local key store (JWK)
    async fn export_private_key(&self, key: &PrivateKey) -> Result<Zeroizing<String>>;

    /// Import a peer's published public key
    async fn import_public_key(&self, text: &str) -> Result<PublicKey>;

    /// Import the local private key
    async fn import_private_key(&self, text: &str) -> Result<PrivateKey>;

    /// Generate a one-time session key
    async fn generate_session_key(&self) -> Result<SessionKey>;

    /// Wrap a session key for the holder of `public_key`
    async fn wrap_session_key(&self, key: &SessionKey, public_key: &PublicKey) -> Result<Vec<u8>>;

    /// Recover a session key wrapped for the holder of `private_key`
    async fn unwrap_session_key(&self, wrapped: &[u8], private_key: &PrivateKey)
        -> Result<SessionKey>;

    /// Seal a text body, returning `(ciphertext_with_tag, nonce)`
    async fn seal(&self, plaintext: &str, key: &SessionKey) -> Result<(Vec<u8>, Nonce)>;

    /// Open a sealed text body
    async fn open(&self, ciphertext: &[u8], key: &SessionKey, nonce: &Nonce) -> Result<String>;
}

// ============================================================================
// NATIVE
// ============================================================================

/// Provider backed by the in-process RustCrypto implementations
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCryptoProvider;

impl NativeCryptoProvider {
    /// Create a native provider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CryptoProvider for NativeCryptoProvider {
    async fn generate_key_pair(&self) -> Result<KeyPair> {
        KeyPair::generate()
    }

    async fn export_public_key(&self, key: &PublicKey) -> Result<String> {
        asymmetric::export_public_key(key)
    }

    async fn export_private_key(&self, key: &PrivateKey) -> Result<Zeroizing<String>> {
        asymmetric::export_private_key(key)
    }

    async fn import_public_key(&self, text: &str) -> Result<PublicKey> {
        asymmetric::import_public_key(text)
    }

    async fn import_private_key(&self, text: &str) -> Result<PrivateKey> {
        asymmetric::import_private_key(text)
    }

    async fn generate_session_key(&self) -> Result<SessionKey> {
        SessionKey::generate()
    }

    async fn wrap_session_key(&self, key: &SessionKey, public_key: &PublicKey) -> Result<Vec<u8>> {
        let raw = key.export_raw();
        asymmetric::wrap_key(&raw[..], public_key)
    }

    async fn unwrap_session_key(
        &self,
        wrapped: &[u8],
        private_key: &PrivateKey,
    ) -> Result<SessionKey> {
        let raw = asymmetric::unwrap_key(wrapped, private_key)?;
        SessionKey::import_raw(&raw)
    }

    async fn seal(&self, plaintext: &str, key: &SessionKey) -> Result<(Vec<u8>, Nonce)> {
        symmetric::seal(plaintext, key)
    }

    async fn open(&self, ciphertext: &[u8], key: &SessionKey, nonce: &Nonce) -> Result<String> {
        symmetric::open(ciphertext, key, nonce)
    }
}

// ============================================================================
// DISABLED
// ============================================================================

/// Provider for contexts where cryptography is not available
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCryptoProvider;

impl DisabledCryptoProvider {
    /// Create a disabled provider
    pub fn new() -> Self {
        Self
    }

    fn unavailable<T>() -> Result<T> {
        Err(Error::KeyUnavailable(
            "cryptography is not available in this context".into(),
        ))
    }
}

#[async_trait]
impl CryptoProvider for DisabledCryptoProvider {
    fn is_available(&self) -> bool {
        false
    }

    async fn generate_key_pair(&self) -> Result<KeyPair> {
        Self::unavailable()
    }

    async fn export_public_key(&self, _key: &PublicKey) -> Result<String> {
        Self::unavailable()
    }

    async fn export_private_key(&self, _key: &PrivateKey) -> Result<Zeroizing<String>> {
        Self::unavailable()
    }

    async fn import_public_key(&self, _text: &str) -> Result<PublicKey> {
        Self::unavailable()
    }

    async fn import_private_key(&self, _text: &str) -> Result<PrivateKey> {
        Self::unavailable()
    }

    async fn generate_session_key(&self) -> Result<SessionKey> {
        Self::unavailable()
    }

    async fn wrap_session_key(&self, _key: &SessionKey, _public_key: &PublicKey) -> Result<Vec<u8>> {
        Self::unavailable()
    }

    async fn unwrap_session_key(
        &self,
        _wrapped: &[u8],
        _private_key: &PrivateKey,
    ) -> Result<SessionKey> {
        Self::unavailable()
    }

    async fn seal(&self, _plaintext: &str, _key: &SessionKey) -> Result<(Vec<u8>, Nonce)> {
        Self::unavailable()
    }

    async fn open(&self, _ciphertext: &[u8], _key: &SessionKey, _nonce: &Nonce) -> Result<String> {
        Self::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_native_session_key_wrap_round_trip() {
        let provider = NativeCryptoProvider::new();
        let pair = provider.generate_key_pair().await.unwrap();
        let session_key = provider.generate_session_key().await.unwrap();

        let (ciphertext, nonce) = provider.seal("over the wire", &session_key).await.unwrap();
        let wrapped = provider
            .wrap_session_key(&session_key, pair.public())
            .await
            .unwrap();
        drop(session_key);

        let recovered = provider
            .unwrap_session_key(&wrapped, pair.private())
            .await
            .unwrap();
        let plaintext = provider.open(&ciphertext, &recovered, &nonce).await.unwrap();

        assert_eq!(plaintext, "over the wire");
        assert!(provider.is_available());
    }

    #[tokio::test]
    async fn test_disabled_provider_fails_fast() {
        let provider = DisabledCryptoProvider::new();
        assert!(!provider.is_available());

        let err = provider.generate_key_pair().await.unwrap_err();
        assert!(err.requires_reauthentication());

        assert!(matches!(
            provider.generate_session_key().await,
            Err(Error::KeyUnavailable(_))
        ));
        assert!(matches!(
            provider.import_public_key("{}").await,
            Err(Error::KeyUnavailable(_))
        ));
        assert!(matches!(
            provider.import_private_key("{}").await,
            Err(Error::KeyUnavailable(_))
        ));
    }
}
