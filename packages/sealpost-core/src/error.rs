//! # Error Handling
//!
//! Error types for SealPost Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key Errors                                                        │
//! │  │   ├── MalformedKey          - Key text is not a valid key           │
//! │  │   ├── UnsupportedKey        - Wrong algorithm / size / usage        │
//! │  │   ├── KeyUnavailable        - No local private key (or no crypto)   │
//! │  │   ├── KeyGenerationFailed   - RNG failure while generating          │
//! │  │   └── KeyAlreadyStored      - Registering over an existing key      │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── Unwrap                - Session key could not be unwrapped    │
//! │  │   ├── AuthenticationFailed  - AEAD tag did not verify               │
//! │  │   ├── EncryptionFailed      - Wrap or seal failed                   │
//! │  │   └── MissingEncryptionData - Envelope lacks wrapped key / IV       │
//! │  │                                                                      │
//! │  ├── Encoding Errors                                                   │
//! │  │   ├── InvalidEncoding       - Field is not valid base64             │
//! │  │   ├── InvalidMessageContent - Decrypted body is not text            │
//! │  │   ├── SerializationError                                            │
//! │  │   └── DeserializationError                                          │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageReadError                                              │
//! │  │   ├── StorageWriteError                                             │
//! │  │   └── InvalidIdentity       - Identity unusable as a storage key    │
//! │  │                                                                      │
//! │  └── Relay Errors                                                      │
//! │      ├── UnknownUser           - Relay has no such identity            │
//! │      ├── PublicKeyNotFound     - Identity never published a key        │
//! │      └── TransportError        - Relay could not be reached            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decrypt-side errors never reach callers of
//! [`MessageCryptoPipeline::open`](crate::messaging::MessageCryptoPipeline::open):
//! they are folded into a placeholder outcome for the affected message.

use thiserror::Error;

/// Result type alias for SealPost Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for SealPost Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Key Errors (100-199)
    // ========================================================================

    /// Key text could not be parsed into a key
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Key parsed but does not match RSA-OAEP-256 / 2048-bit expectations
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    /// No local private key, or cryptography is unavailable in this context
    #[error("Key material unavailable: {0}")]
    KeyUnavailable(String),

    /// Key generation failed (entropy source failure)
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// A private key is already stored for this identity
    #[error("A private key is already stored for {0}")]
    KeyAlreadyStored(String),

    // ========================================================================
    // Crypto Errors (200-299)
    // ========================================================================

    /// The wrapped session key could not be recovered.
    ///
    /// Carries no detail, so the error value does not distinguish a wrong
    /// private key from a corrupted wrapped key. Timing is not covered; see
    /// [`unwrap_key`](crate::crypto::unwrap_key).
    #[error("Unable to unwrap session key")]
    Unwrap,

    /// The AEAD authentication tag did not verify
    #[error("Message authentication failed")]
    AuthenticationFailed,

    /// Wrapping or sealing failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Envelope has no wrapped session key or nonce
    #[error("Envelope is missing encryption data")]
    MissingEncryptionData,

    // ========================================================================
    // Encoding Errors (300-399)
    // ========================================================================

    /// A binary field is not valid base64 or has the wrong length
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Authenticated body is not valid UTF-8 text
    #[error("Invalid message content: {0}")]
    InvalidMessageContent(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Identity cannot be used to key local storage
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    // ========================================================================
    // Relay Errors (500-599)
    // ========================================================================

    /// Relay does not know this identity
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Identity exists but has no published public key
    #[error("Public key not available for {0}")]
    PublicKeyNotFound(String),

    /// Identity is already registered on the relay
    #[error("Identity already registered: {0}")]
    IdentityExists(String),

    /// Relay could not be reached or rejected the request
    #[error("Transport error: {0}")]
    TransportError(String),
}

impl Error {
    /// Stable numeric error code
    ///
    /// - 100-199: Keys
    /// - 200-299: Crypto
    /// - 300-399: Encoding
    /// - 400-499: Storage
    /// - 500-599: Relay
    pub fn code(&self) -> i32 {
        match self {
            // Keys (100-199)
            Error::MalformedKey(_) => 100,
            Error::UnsupportedKey(_) => 101,
            Error::KeyUnavailable(_) => 102,
            Error::KeyGenerationFailed(_) => 103,
            Error::KeyAlreadyStored(_) => 104,

            // Crypto (200-299)
            Error::Unwrap => 200,
            Error::AuthenticationFailed => 201,
            Error::EncryptionFailed(_) => 202,
            Error::MissingEncryptionData => 203,

            // Encoding (300-399)
            Error::InvalidEncoding(_) => 300,
            Error::InvalidMessageContent(_) => 301,
            Error::SerializationError(_) => 302,
            Error::DeserializationError(_) => 303,

            // Storage (400-499)
            Error::StorageReadError(_) => 400,
            Error::StorageWriteError(_) => 401,
            Error::InvalidIdentity(_) => 402,

            // Relay (500-599)
            Error::UnknownUser(_) => 500,
            Error::PublicKeyNotFound(_) => 501,
            Error::IdentityExists(_) => 502,
            Error::TransportError(_) => 503,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can potentially be resolved by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransportError(_))
    }

    /// Check if this error requires the user to log in again
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::KeyUnavailable(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::InvalidEncoding(err.to_string())
    }
}

// ============================================================================
// SEND ERROR
// ============================================================================

/// User-facing failure of a send.
///
/// Displays a fixed, generic message; the underlying cause is only
/// reachable through [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("Failed to send message. Please try again.")]
pub struct SendError {
    #[source]
    cause: Error,
}

impl SendError {
    /// Wrap the underlying failure
    pub fn new(cause: Error) -> Self {
        Self { cause }
    }

    /// The underlying failure
    pub fn cause(&self) -> &Error {
        &self.cause
    }

    /// Whether retrying the send could succeed
    pub fn is_retryable(&self) -> bool {
        self.cause.is_recoverable()
    }
}

// ============================================================================
// TESTS
// ============================================================================
