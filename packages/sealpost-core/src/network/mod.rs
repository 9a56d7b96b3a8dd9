//! # Network Module
//!
//! The relay seam: how envelopes and public keys reach other users.
//!
//! ## Relay Role
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       STORE-AND-FORWARD RELAY                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Alice                       Relay                        Bob         │
//! │     │                           │                            │          │
//! │     │                           │◄── publish_public_key ─────│          │
//! │     │── fetch_public_key(bob) ─►│                            │          │
//! │     │◄──────── JWK text ────────│                            │          │
//! │     │                           │                            │          │
//! │     │── send(WireEnvelope) ────►│  stores opaque envelope    │          │
//! │     │                           │                            │          │
//! │     │                           │◄── fetch_messages(bob) ────│          │
//! │     │                           │─── [WireEnvelope] ────────►│          │
//! │                                                                         │
//! │  The relay never holds a private key and never decrypts anything.      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod memory_relay;

pub use memory_relay::MemoryRelay;

use async_trait::async_trait;

use crate::envelope::WireEnvelope;
use crate::error::Result;

/// Operations the client needs from the relay
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Publish the public key text for `identity`
    async fn publish_public_key(&self, identity: &str, key_text: &str) -> Result<()>;

    /// Fetch the published public key text of `identity`
    async fn fetch_public_key(&self, identity: &str) -> Result<String>;

    /// Hand an envelope to the relay, returning the id it was stored under
    async fn send(&self, envelope: WireEnvelope) -> Result<u64>;

    /// Fetch envelopes addressed to `identity`, newest first
    async fn fetch_messages(&self, identity: &str) -> Result<Vec<WireEnvelope>>;
}
