//! # SealPost Core
//!
//! End-to-end encrypted message envelopes for a store-and-forward relay
//! that never sees plaintext.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SEALPOST CORE MODULES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         Account                                  │  │
//! │  │        register · send_message · inbox · logout                  │  │
//! │  └───────┬──────────────────────┬──────────────────────┬────────────┘  │
//! │          │                      │                      │               │
//! │  ┌───────▼──────┐   ┌───────────▼──────────┐   ┌───────▼───────────┐  │
//! │  │   Storage    │   │      Messaging       │   │     Network       │  │
//! │  │              │   │                      │   │                   │  │
//! │  │ - Private    │   │ - seal               │   │ - RelayApi        │  │
//! │  │   key only   │   │ - open / open_batch  │   │ - MemoryRelay     │  │
//! │  │ - Memory     │   │ - Placeholders       │   │                   │  │
//! │  │ - File       │   │                      │   │                   │  │
//! │  └──────────────┘   └─────┬──────────┬─────┘   └───────────────────┘  │
//! │                           │          │                                 │
//! │                ┌──────────▼───┐  ┌───▼──────────┐                      │
//! │                │    Crypto    │  │   Envelope   │                      │
//! │                │              │  │              │                      │
//! │                │ - RSA-OAEP   │  │ - base64     │                      │
//! │                │ - AES-GCM    │  │ - Wire JSON  │                      │
//! │                │ - Provider   │  │ - Partial    │                      │
//! │                └──────────────┘  └──────────────┘                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Key pairs, session keys, the provider seam
//! - [`envelope`] - Wire format and binary transcoding
//! - [`storage`] - Local private key stores
//! - [`messaging`] - The seal / open pipeline
//! - [`network`] - Relay interface and in-memory relay
//! - [`account`] - Registration, sending, inbox, logout
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Per-Message Confidentiality (AES-256-GCM)                    │
//! │  ───────────────────────────────────────────────────                    │
//! │  Each message body is sealed under its own random session key and     │
//! │  nonce. The tag detects any modification of the ciphertext.           │
//! │                                                                         │
//! │  Layer 2: Key Transport (RSA-OAEP-256)                                 │
//! │  ─────────────────────────────────────                                  │
//! │  The session key travels wrapped under the recipient's public key.    │
//! │  Only the recipient's device holds the matching private key.          │
//! │                                                                         │
//! │  Layer 3: Local Key Custody                                            │
//! │  ──────────────────────────                                             │
//! │  The private key is written to an owner-only store before the public   │
//! │  key is published and erased on logout.                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sealpost_core::{Account, MemoryKeyStore, MemoryRelay, NativeCryptoProvider};
//!
//! let relay = Arc::new(MemoryRelay::new());
//! let alice = Account::new(
//!     "alice",
//!     Arc::new(MemoryKeyStore::new()),
//!     Arc::new(NativeCryptoProvider::new()),
//!     relay.clone(),
//! );
//! alice.register().await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod account;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod messaging;
pub mod network;
pub mod storage;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use account::Account;
pub use crypto::{
    CryptoProvider, DisabledCryptoProvider, KeyPair, NativeCryptoProvider, PrivateKey, PublicKey,
};
pub use envelope::{Envelope, ParsedEnvelope, WireEnvelope};
pub use error::{Error, Result, SendError};
pub use messaging::{
    DecryptedMessage, DecryptionOutcome, MessageBody, MessageCryptoPipeline, Placeholder,
};
pub use network::{MemoryRelay, RelayApi};
pub use storage::{FileKeyStore, KeyMaterialStore, MemoryKeyStore};

// ============================================================================
// CONFIGURATION
// ============================================================================

use std::path::PathBuf;

/// Configuration for a SealPost client
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// Directory for private key files (platform default if None)
    pub key_dir: Option<PathBuf>,
    /// Enable verbose logging
    pub verbose_logging: bool,
}

impl CoreConfig {
    /// Key directory, falling back to the given platform default
    pub fn key_dir_or(&self, default: impl Into<PathBuf>) -> PathBuf {
        self.key_dir.clone().unwrap_or_else(|| default.into())
    }
}

/// Fixed cryptographic parameters of the envelope format
#[derive(Debug, Clone, Copy)]
pub struct KeyParams;

impl KeyParams {
    /// RSA modulus length in bits
    pub const MODULUS_BITS: usize = crypto::MODULUS_BITS;
    /// RSA public exponent
    pub const PUBLIC_EXPONENT: u32 = 65_537;
    /// JWK `alg` of published keys
    pub const JWK_ALGORITHM: &'static str = crypto::JWK_ALGORITHM;
    /// Session key length in bytes
    pub const SESSION_KEY_BYTES: usize = crypto::KEY_SIZE;
    /// Nonce length in bytes
    pub const NONCE_BYTES: usize = crypto::NONCE_SIZE;
    /// Authentication tag length in bytes
    pub const TAG_BYTES: usize = crypto::TAG_SIZE;
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of SealPost Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_key_dir_fallback() {
        let config = CoreConfig::default();
        assert_eq!(config.key_dir_or("/tmp/keys"), PathBuf::from("/tmp/keys"));

        let config = CoreConfig {
            key_dir: Some(PathBuf::from("/custom")),
            ..CoreConfig::default()
        };
        assert_eq!(config.key_dir_or("/tmp/keys"), PathBuf::from("/custom"));
    }

    #[test]
    fn test_key_params() {
        assert_eq!(KeyParams::MODULUS_BITS, 2048);
        assert_eq!(KeyParams::JWK_ALGORITHM, "RSA-OAEP-256");
        assert_eq!(KeyParams::SESSION_KEY_BYTES, 32);
    }
}
