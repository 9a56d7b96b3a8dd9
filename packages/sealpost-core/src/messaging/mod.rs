//! # Messaging Module
//!
//! The message crypto pipeline: plaintext to envelope and back.
//!
//! ## Seal
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MESSAGE ENCRYPTION                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sender (Alice)                                                        │
//! │  ─────────────────────────────────────────────────────────────         │
//! │                                                                         │
//! │  Input: "Hello Bob!", Bob's published public key                       │
//! │                                                                         │
//! │  1. Import Bob's public key          (errors propagate)                │
//! │  2. Generate a one-time session key                                    │
//! │  3. AES-256-GCM(session key, random nonce, "Hello Bob!")               │
//! │  4. RSA-OAEP(Bob's public key, session key bytes) = wrapped key        │
//! │  5. base64 every binary field, assemble the Envelope                   │
//! │                                                                         │
//! │  The session key is zeroized when seal() returns.                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Open
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MESSAGE DECRYPTION                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Recipient (Bob)                                                       │
//! │  ─────────────────────────────────────────────────────────────         │
//! │                                                                         │
//! │  Partial envelope? ──────────────────────► MissingEncryptionData       │
//! │         │ no                                                            │
//! │  Private key stored? ── no ──────────────► KeyUnavailable              │
//! │         │ yes                                                           │
//! │  import key, decode, unwrap, open ── err ► DecryptionFailed            │
//! │         │ ok                                                            │
//! │         ▼                                                               │
//! │     Plaintext                                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `open` never fails: every decrypt-side error becomes a placeholder for
//! the affected message only.

use std::fmt;
use std::sync::Arc;

use crate::crypto::{CryptoProvider, NativeCryptoProvider, Nonce, PrivateKey};
use crate::envelope::{self, build_envelope, Envelope, EnvelopeFields, ParsedEnvelope};
use crate::error::{Error, Result};
use crate::storage::KeyMaterialStore;

// ============================================================================
// OUTCOMES
// ============================================================================

/// What happened when a message was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecryptionOutcome {
    /// The plaintext was recovered
    Decrypted,
    /// The envelope carried no wrapped key or nonce
    MissingEncryptionData,
    /// No local private key (or no cryptography) was available
    KeyUnavailable,
    /// Unwrapping, decoding or authentication failed
    DecryptionFailed,
}

impl DecryptionOutcome {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DecryptionOutcome::Decrypted => "decrypted",
            DecryptionOutcome::MissingEncryptionData => "missing_encryption_data",
            DecryptionOutcome::KeyUnavailable => "key_unavailable",
            DecryptionOutcome::DecryptionFailed => "decryption_failed",
        }
    }
}

/// Text shown in place of a message that could not be decrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// Legacy or partial envelope
    MissingEncryptionData,
    /// The user needs to log in again to restore their key
    KeyUnavailable,
    /// The message could not be decrypted
    DecryptionFailed,
}

impl Placeholder {
    /// Fixed display text for this placeholder
    pub fn display_text(&self) -> &'static str {
        match self {
            Placeholder::MissingEncryptionData => "[Cannot decrypt - missing encryption data]",
            Placeholder::KeyUnavailable => "[Private key not found - please log in again]",
            Placeholder::DecryptionFailed => "[Unable to decrypt message]",
        }
    }

    /// The outcome this placeholder stands for
    pub fn outcome(&self) -> DecryptionOutcome {
        match self {
            Placeholder::MissingEncryptionData => DecryptionOutcome::MissingEncryptionData,
            Placeholder::KeyUnavailable => DecryptionOutcome::KeyUnavailable,
            Placeholder::DecryptionFailed => DecryptionOutcome::DecryptionFailed,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

/// Body of an opened message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Authenticated plaintext
    Plaintext(String),
    /// Stand-in for a message that could not be decrypted
    Placeholder(Placeholder),
}

impl MessageBody {
    /// Get text content if this is real plaintext
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageBody::Plaintext(s) => Some(s),
            MessageBody::Placeholder(_) => None,
        }
    }

    /// Text to show the user
    pub fn display_text(&self) -> &str {
        match self {
            MessageBody::Plaintext(s) => s,
            MessageBody::Placeholder(p) => p.display_text(),
        }
    }
}

/// A message after an open attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    /// Relay-assigned id
    pub id: Option<u64>,
    /// Sender identity
    pub sender: String,
    /// Plaintext or placeholder
    pub body: MessageBody,
    /// Encrypted body as received, kept for diagnostics
    pub encrypted_msg: String,
}

impl DecryptedMessage {
    fn new(envelope: &ParsedEnvelope, body: MessageBody) -> Self {
        Self {
            id: envelope.id(),
            sender: envelope.sender().to_string(),
            body,
            encrypted_msg: envelope.encrypted_msg().to_string(),
        }
    }

    /// Outcome of the open attempt
    pub fn outcome(&self) -> DecryptionOutcome {
        match &self.body {
            MessageBody::Plaintext(_) => DecryptionOutcome::Decrypted,
            MessageBody::Placeholder(p) => p.outcome(),
        }
    }

    /// Whether the plaintext was recovered
    pub fn is_decrypted(&self) -> bool {
        self.outcome() == DecryptionOutcome::Decrypted
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Local private key state for one open call or one batch
enum LocalKey {
    Ready(PrivateKey),
    Unavailable,
    Unusable,
}

/// Seals outgoing messages and opens incoming ones
///
/// Stateless apart from the injected [`CryptoProvider`].
#[derive(Clone)]
pub struct MessageCryptoPipeline {
    provider: Arc<dyn CryptoProvider>,
}

impl MessageCryptoPipeline {
    /// Create a pipeline over the given provider
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Create a pipeline over [`NativeCryptoProvider`]
    pub fn native() -> Self {
        Self::new(Arc::new(NativeCryptoProvider::new()))
    }

    /// The provider this pipeline uses
    pub fn provider(&self) -> &Arc<dyn CryptoProvider> {
        &self.provider
    }

    /// Encrypt `plaintext` for the holder of `recipient_public_key`
    ///
    /// ## Errors
    ///
    /// Key import errors (`MalformedKey`, `UnsupportedKey`), provider
    /// unavailability and encryption failures all propagate.
    pub async fn seal(
        &self,
        plaintext: &str,
        recipient_public_key: &str,
        sender: &str,
        recipient: &str,
    ) -> Result<Envelope> {
        tracing::debug!(sender, recipient, "Sealing message");

        let public_key = self.provider.import_public_key(recipient_public_key).await?;
        let session_key = self.provider.generate_session_key().await?;

        let (ciphertext, nonce) = self.provider.seal(plaintext, &session_key).await?;
        tracing::debug!(len = ciphertext.len(), "Body sealed");

        let wrapped_key = self
            .provider
            .wrap_session_key(&session_key, &public_key)
            .await?;
        drop(session_key);
        tracing::debug!("Session key wrapped");

        Ok(build_envelope(EnvelopeFields {
            sender: sender.to_string(),
            receiver: recipient.to_string(),
            encrypted_msg: ciphertext,
            wrapped_key,
            nonce,
        }))
    }

    /// Open a single envelope with the local private key text, if any
    pub async fn open(
        &self,
        envelope: &ParsedEnvelope,
        private_key_text: Option<&str>,
    ) -> DecryptedMessage {
        if !envelope.is_complete() {
            let error = Error::MissingEncryptionData;
            return self.fail(envelope, &error, Placeholder::MissingEncryptionData);
        }

        let local_key = self.import_local_key(private_key_text).await;
        self.open_with(envelope, &local_key).await
    }

    /// Open envelopes in order, loading and importing the private key once
    ///
    /// Exactly one result per envelope, in input order.
    pub async fn open_batch(
        &self,
        envelopes: &[ParsedEnvelope],
        store: &dyn KeyMaterialStore,
    ) -> Vec<DecryptedMessage> {
        let local_key = if envelopes.iter().any(ParsedEnvelope::is_complete) {
            let text = match store.load() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read private key");
                    None
                }
            };
            self.import_local_key(text.as_deref().map(String::as_str)).await
        } else {
            LocalKey::Unavailable
        };

        let mut messages = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            messages.push(self.open_with(envelope, &local_key).await);
        }

        tracing::debug!(
            count = messages.len(),
            decrypted = messages.iter().filter(|m| m.is_decrypted()).count(),
            "Batch opened"
        );
        messages
    }

    async fn import_local_key(&self, text: Option<&str>) -> LocalKey {
        let Some(text) = text else {
            return LocalKey::Unavailable;
        };

        match self.provider.import_private_key(text).await {
            Ok(key) => LocalKey::Ready(key),
            Err(Error::KeyUnavailable(reason)) => {
                tracing::warn!(%reason, "Private key cannot be used");
                LocalKey::Unavailable
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored private key is not importable");
                LocalKey::Unusable
            }
        }
    }

    async fn open_with(&self, envelope: &ParsedEnvelope, local_key: &LocalKey) -> DecryptedMessage {
        let complete = match envelope {
            ParsedEnvelope::Complete(e) => e,
            ParsedEnvelope::Partial(_) => {
                let error = Error::MissingEncryptionData;
                return self.fail(envelope, &error, Placeholder::MissingEncryptionData);
            }
        };

        let private_key = match local_key {
            LocalKey::Ready(key) => key,
            LocalKey::Unavailable => return self.degrade(envelope, Placeholder::KeyUnavailable),
            LocalKey::Unusable => return self.degrade(envelope, Placeholder::DecryptionFailed),
        };

        match self.decrypt(complete, private_key).await {
            Ok(plaintext) => {
                tracing::debug!(id = ?envelope.id(), "Message decrypted");
                DecryptedMessage::new(envelope, MessageBody::Plaintext(plaintext))
            }
            Err(e) => self.fail(envelope, &e, Placeholder::DecryptionFailed),
        }
    }

    fn fail(
        &self,
        envelope: &ParsedEnvelope,
        error: &Error,
        placeholder: Placeholder,
    ) -> DecryptedMessage {
        tracing::debug!(id = ?envelope.id(), code = error.code(), error = %error, "Decryption error");
        self.degrade(envelope, placeholder)
    }

    async fn decrypt(&self, envelope: &Envelope, private_key: &PrivateKey) -> Result<String> {
        let wrapped_key = envelope::decode_binary(envelope.encrypted_key())?;
        let nonce = Nonce::from_slice(&envelope::decode_binary(envelope.iv())?)?;

        let session_key = self
            .provider
            .unwrap_session_key(&wrapped_key, private_key)
            .await?;

        let ciphertext = envelope::decode_binary(envelope.encrypted_msg())?;
        self.provider.open(&ciphertext, &session_key, &nonce).await
    }

    fn degrade(&self, envelope: &ParsedEnvelope, placeholder: Placeholder) -> DecryptedMessage {
        tracing::warn!(
            id = ?envelope.id(),
            sender = envelope.sender(),
            outcome = placeholder.outcome().as_str(),
            "Message shown as placeholder"
        );
        DecryptedMessage::new(envelope, MessageBody::Placeholder(placeholder))
    }
}

impl fmt::Debug for MessageCryptoPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCryptoPipeline")
            .field("available", &self.provider.is_available())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
