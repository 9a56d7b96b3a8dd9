//! # Storage Module
//!
//! Local storage for the one secret this library keeps: the user's private
//! key.
//!
//! ## Key Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      PRIVATE KEY LIFECYCLE                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  register()                                                            │
//! │     │                                                                   │
//! │     ├──► generate key pair                                             │
//! │     ├──► save(private JWK)      ◄── before anything leaves the device  │
//! │     └──► publish(public JWK)                                           │
//! │                                                                         │
//! │  inbox()                                                               │
//! │     └──► load()  ──► Some(text) ──► decrypt batch                      │
//! │                  ──► None       ──► KeyUnavailable placeholders        │
//! │                                                                         │
//! │  logout()                                                              │
//! │     └──► erase()                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Implementations
//!
//! | Store | Backing | Used by |
//! |-------|---------|---------|
//! | [`MemoryKeyStore`] | Process memory | Tests, headless sessions |
//! | [`FileKeyStore`] | One file per identity, owner-only | CLI |

mod key_store;

pub use key_store::{FileKeyStore, MemoryKeyStore};

use zeroize::Zeroizing;

use crate::error::Result;

/// Owner of the local private key text
///
/// The key text never leaves the store except through [`load`](Self::load),
/// and callers are handed a buffer that is zeroized on drop. `save` and
/// `erase` are exclusive with respect to each other.
pub trait KeyMaterialStore: Send + Sync {
    /// Persist the private key text, replacing any previous key
    fn save(&self, private_key_text: &str) -> Result<()>;

    /// Read the private key text; `None` if nothing is stored
    fn load(&self) -> Result<Option<Zeroizing<String>>>;

    /// Remove the stored key. Erasing an empty store is not an error.
    fn erase(&self) -> Result<()>;

    /// Whether a key is currently stored
    fn contains(&self) -> Result<bool> {
        Ok(self.load()?.is_some())
    }
}
