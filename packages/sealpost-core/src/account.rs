//! # Account
//!
//! A local identity wired to its key store, crypto provider and relay.
//!
//! ```text
//! ┌──────────────┐   register / logout   ┌────────────────────┐
//! │              │──────────────────────►│  KeyMaterialStore  │
//! │              │                       └────────────────────┘
//! │   Account    │   seal / open         ┌────────────────────┐
//! │  ("alice")   │──────────────────────►│ MessageCrypto-     │
//! │              │                       │ Pipeline           │
//! │              │   keys / envelopes    └────────────────────┘
//! │              │──────────────────────►┌────────────────────┐
//! └──────────────┘                       │     RelayApi       │
//!                                        └────────────────────┘
//! ```

use std::sync::Arc;

use crate::crypto::CryptoProvider;
use crate::envelope::{parse_envelope, ParsedEnvelope};
use crate::error::{Error, Result, SendError};
use crate::messaging::{DecryptedMessage, MessageCryptoPipeline};
use crate::network::RelayApi;
use crate::storage::KeyMaterialStore;

/// A local user of the relay
pub struct Account {
    identity: String,
    store: Arc<dyn KeyMaterialStore>,
    pipeline: MessageCryptoPipeline,
    relay: Arc<dyn RelayApi>,
}

impl Account {
    /// Create an account handle; nothing is generated or fetched yet
    pub fn new(
        identity: impl Into<String>,
        store: Arc<dyn KeyMaterialStore>,
        provider: Arc<dyn CryptoProvider>,
        relay: Arc<dyn RelayApi>,
    ) -> Self {
        Self {
            identity: identity.into(),
            store,
            pipeline: MessageCryptoPipeline::new(provider),
            relay,
        }
    }

    /// This account's identity
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The pipeline used for sealing and opening
    pub fn pipeline(&self) -> &MessageCryptoPipeline {
        &self.pipeline
    }

    /// Generate a key pair, store the private half, publish the public half
    ///
    /// Refuses with [`Error::KeyAlreadyStored`] if a private key is already
    /// stored; call [`logout`](Self::logout) first to replace it. The private
    /// key is saved before anything is sent to the relay, and erased again if
    /// publishing fails. Returns the published public key text.
    pub async fn register(&self) -> Result<String> {
        if self.store.contains()? {
            return Err(Error::KeyAlreadyStored(self.identity.clone()));
        }

        let provider = self.pipeline.provider();

        let pair = provider.generate_key_pair().await?;
        let private_text = provider.export_private_key(pair.private()).await?;
        let public_text = provider.export_public_key(pair.public()).await?;
        drop(pair);

        self.store.save(&private_text)?;
        drop(private_text);

        if let Err(e) = self.relay.publish_public_key(&self.identity, &public_text).await {
            tracing::warn!(identity = %self.identity, error = %e, "Publishing public key failed");
            if let Err(erase_err) = self.store.erase() {
                tracing::error!(
                    identity = %self.identity,
                    error = %erase_err,
                    "Failed to erase unpublished private key"
                );
            }
            return Err(e);
        }

        tracing::info!(identity = %self.identity, "Registered");
        Ok(public_text)
    }

    /// Whether a private key is stored for this account
    pub fn is_logged_in(&self) -> Result<bool> {
        self.store.contains()
    }

    /// Encrypt `plaintext` for `recipient` and hand it to the relay
    ///
    /// Returns the relay-assigned message id.
    pub async fn send_message(
        &self,
        recipient: &str,
        plaintext: &str,
    ) -> std::result::Result<u64, SendError> {
        let result = async {
            let public_key = self.relay.fetch_public_key(recipient).await?;
            let envelope = self
                .pipeline
                .seal(plaintext, &public_key, &self.identity, recipient)
                .await?;
            self.relay.send(envelope.into()).await
        }
        .await;

        result.map_err(|e| {
            tracing::debug!(recipient, error = %e, "Send failed");
            SendError::new(e)
        })
    }

    /// Fetch and open every message addressed to this account
    ///
    /// Messages come back newest first. Undecryptable messages are
    /// included as placeholders.
    pub async fn inbox(&self) -> Result<Vec<DecryptedMessage>> {
        let envelopes: Vec<ParsedEnvelope> = self
            .relay
            .fetch_messages(&self.identity)
            .await?
            .into_iter()
            .map(parse_envelope)
            .collect();

        Ok(self
            .pipeline
            .open_batch(&envelopes, self.store.as_ref())
            .await)
    }

    /// Erase the stored private key
    pub fn logout(&self) -> Result<()> {
        self.store.erase()?;
        tracing::info!(identity = %self.identity, "Logged out");
        Ok(())
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{DisabledCryptoProvider, NativeCryptoProvider};
    use crate::messaging::DecryptionOutcome;
    use crate::network::MemoryRelay;
    use crate::storage::MemoryKeyStore;
    use std::error::Error as _;
    use zeroize::Zeroizing;

    /// Memory store whose erase always fails
    struct StuckStore(MemoryKeyStore);

    impl KeyMaterialStore for StuckStore {
        fn save(&self, private_key_text: &str) -> Result<()> {
            self.0.save(private_key_text)
        }

        fn load(&self) -> Result<Option<Zeroizing<String>>> {
            self.0.load()
        }

        fn erase(&self) -> Result<()> {
            Err(Error::StorageWriteError("read-only".into()))
        }
    }

    fn account(identity: &str, relay: &Arc<MemoryRelay>) -> (Account, Arc<MemoryKeyStore>) {
        let store = Arc::new(MemoryKeyStore::new());
        let account = Account::new(
            identity,
            store.clone(),
            Arc::new(NativeCryptoProvider::new()),
            relay.clone(),
        );
        (account, store)
    }

    #[tokio::test]
    async fn test_register_stores_private_and_publishes_public() {
        let relay = Arc::new(MemoryRelay::new());
        let (alice, store) = account("alice", &relay);

        assert!(!alice.is_logged_in().unwrap());
        let public = alice.register().await.unwrap();

        assert!(alice.is_logged_in().unwrap());
        assert_eq!(relay.fetch_public_key("alice").await.unwrap(), public);
        assert!(!public.contains("\"d\""));

        let private = store.load().unwrap().unwrap();
        assert!(private.contains("\"d\""));
    }

    #[tokio::test]
    async fn test_failed_publish_rolls_back_key() {
        let relay = Arc::new(MemoryRelay::new());
        relay.set_offline(true);
        let (alice, _store) = account("alice", &relay);

        let err = alice.register().await.unwrap_err();
        assert!(matches!(err, Error::TransportError(_)));
        assert!(!alice.is_logged_in().unwrap());
    }

    #[tokio::test]
    async fn test_register_twice_keeps_existing_key() {
        let relay = Arc::new(MemoryRelay::new());
        let (alice, _) = account("alice", &relay);
        let (bob, store) = account("bob", &relay);
        alice.register().await.unwrap();
        let published = bob.register().await.unwrap();
        let saved = store.load().unwrap().unwrap();

        alice.send_message("bob", "hello").await.unwrap();

        let err = bob.register().await.unwrap_err();
        assert!(matches!(err, Error::KeyAlreadyStored(ref id) if id == "bob"));
        assert!(bob.is_logged_in().unwrap());
        assert_eq!(store.load().unwrap().unwrap().as_str(), saved.as_str());
        assert_eq!(relay.fetch_public_key("bob").await.unwrap(), published);

        let inbox = bob.inbox().await.unwrap();
        assert_eq!(inbox[0].outcome(), DecryptionOutcome::Decrypted);
        assert_eq!(inbox[0].body.as_text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_register_after_logout_replaces_key() {
        let relay = Arc::new(MemoryRelay::new());
        let (alice, _) = account("alice", &relay);
        alice.register().await.unwrap();
        alice.logout().unwrap();

        // The relay still holds the first public key
        let err = alice.register().await.unwrap_err();
        assert!(matches!(err, Error::IdentityExists(_)));
        assert!(!alice.is_logged_in().unwrap());
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_publish_error() {
        let relay = Arc::new(MemoryRelay::new());
        relay.set_offline(true);
        let alice = Account::new(
            "alice",
            Arc::new(StuckStore(MemoryKeyStore::new())),
            Arc::new(NativeCryptoProvider::new()),
            relay.clone(),
        );

        let err = alice.register().await.unwrap_err();
        assert!(matches!(err, Error::TransportError(_)));
    }

    #[tokio::test]
    async fn test_send_failure_is_generic() {
        let relay = Arc::new(MemoryRelay::new());
        let (alice, _) = account("alice", &relay);
        alice.register().await.unwrap();

        let err = alice.send_message("nobody", "hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to send message. Please try again.");
        assert!(matches!(err.cause(), Error::UnknownUser(_)));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_logout_degrades_inbox() {
        let relay = Arc::new(MemoryRelay::new());
        let (alice, _) = account("alice", &relay);
        let (bob, _) = account("bob", &relay);
        alice.register().await.unwrap();
        bob.register().await.unwrap();

        alice.send_message("bob", "before logout").await.unwrap();
        bob.logout().unwrap();
        assert!(!bob.is_logged_in().unwrap());

        let inbox = bob.inbox().await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].outcome(), DecryptionOutcome::KeyUnavailable);
    }

    #[tokio::test]
    async fn test_disabled_provider_cannot_register() {
        let relay = Arc::new(MemoryRelay::new());
        let store = Arc::new(MemoryKeyStore::new());
        let account = Account::new(
            "server",
            store.clone(),
            Arc::new(DisabledCryptoProvider::new()),
            relay.clone(),
        );

        assert!(matches!(account.register().await, Err(Error::KeyUnavailable(_))));
        assert!(store.load().unwrap().is_none());
        assert!(relay.fetch_public_key("server").await.is_err());
    }
}
