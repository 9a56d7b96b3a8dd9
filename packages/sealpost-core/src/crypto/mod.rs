//! # Cryptography Module
//!
//! All cryptographic primitives used by SealPost Core.
//!
//! ## Hybrid Encryption
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    IDENTITY KEYS (asymmetric)                   │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  RSA 2048-bit, e = 65537                                       │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────────┐         ┌─────────────────┐              │   │
//! │  │  │  Public Key     │         │  Private Key    │              │   │
//! │  │  │                 │         │                 │              │   │
//! │  │  │ • Published     │         │ • Local store   │              │   │
//! │  │  │ • Wraps keys    │         │ • Unwraps keys  │              │   │
//! │  │  └─────────────────┘         └─────────────────┘              │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 PER-MESSAGE ENCRYPTION                          │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  1. Session key: 32 random bytes, one message only             │   │
//! │  │                                                                 │   │
//! │  │  2. Body: AES-256-GCM(session key, random 96-bit nonce)        │   │
//! │  │     • 128-bit authentication tag appended                      │   │
//! │  │                                                                 │   │
//! │  │  3. Key wrap: RSA-OAEP(recipient public key, SHA-256)          │   │
//! │  │     • 256-byte output, randomized padding                      │   │
//! │  │                                                                 │   │
//! │  │  Envelope = (ciphertext, wrapped session key, nonce)           │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose | Notes |
//! |-----------|---------|-------|
//! | RSA-OAEP-256 | Key wrapping | Interoperable with WebCrypto JWKs |
//! | AES-256-GCM | Body encryption | AEAD, 96-bit nonce, 128-bit tag |
//! | SHA-256 | OAEP hash / MGF1, fingerprints | |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: session keys and private keys are zeroized when dropped
//! 2. **Blinding**: RSA decryption is blinded
//! 3. **Secure Random**: `rand::rngs::OsRng` for keys, nonces and padding
//! 4. **No Key Reuse**: one session key and one nonce per message

pub mod asymmetric;
mod provider;
pub mod symmetric;

pub use asymmetric::{
    export_private_key, export_private_key_pem, export_public_key, export_public_key_pem,
    import_private_key, import_public_key, unwrap_key, wrap_key, KeyPair, PrivateKey, PublicKey,
    JWK_ALGORITHM, MODULUS_BITS, WRAPPED_KEY_SIZE,
};
pub use provider::{CryptoProvider, DisabledCryptoProvider, NativeCryptoProvider};
pub use symmetric::{Nonce, SessionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
