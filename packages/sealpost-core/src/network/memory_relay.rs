//! In-process relay.
//!
//! Behaves like the hosted relay: it keeps published public keys per
//! identity and envelopes per receiver, assigns increasing ids, serves
//! newest first and treats every envelope field as opaque text.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::RelayApi;
use crate::envelope::WireEnvelope;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct RelayState {
    /// identity -> published public key (None for legacy accounts)
    users: HashMap<String, Option<String>>,
    messages: Vec<WireEnvelope>,
    next_id: u64,
    offline: bool,
}

/// A store-and-forward relay living in process memory
#[derive(Debug, Default)]
pub struct MemoryRelay {
    state: RwLock<RelayState>,
}

impl MemoryRelay {
    /// Create an empty relay
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that has not published a key
    pub fn register_user(&self, identity: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.users.contains_key(identity) {
            return Err(Error::IdentityExists(identity.to_string()));
        }
        state.users.insert(identity.to_string(), None);
        Ok(())
    }

    /// Simulate the relay becoming unreachable
    pub fn set_offline(&self, offline: bool) {
        self.state.write().offline = offline;
    }

    /// Number of stored envelopes
    pub fn message_count(&self) -> usize {
        self.state.read().messages.len()
    }

    fn check_online(state: &RelayState) -> Result<()> {
        if state.offline {
            return Err(Error::TransportError("relay unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayApi for MemoryRelay {
    async fn publish_public_key(&self, identity: &str, key_text: &str) -> Result<()> {
        let mut state = self.state.write();
        Self::check_online(&state)?;

        let entry = state.users.entry(identity.to_string()).or_insert(None);
        if entry.is_some() {
            return Err(Error::IdentityExists(identity.to_string()));
        }
        *entry = Some(key_text.to_string());

        tracing::debug!(identity, "Public key published");
        Ok(())
    }

    async fn fetch_public_key(&self, identity: &str) -> Result<String> {
        let state = self.state.read();
        Self::check_online(&state)?;

        match state.users.get(identity) {
            Some(Some(key)) => Ok(key.clone()),
            Some(None) => Err(Error::PublicKeyNotFound(identity.to_string())),
            None => Err(Error::UnknownUser(identity.to_string())),
        }
    }

    async fn send(&self, mut envelope: WireEnvelope) -> Result<u64> {
        let mut state = self.state.write();
        Self::check_online(&state)?;

        for identity in [&envelope.sender, &envelope.receiver] {
            if !state.users.contains_key(identity.as_str()) {
                return Err(Error::UnknownUser(identity.clone()));
            }
        }

        state.next_id += 1;
        let id = state.next_id;
        envelope.id = Some(id);
        state.messages.push(envelope);

        tracing::debug!(id, "Envelope stored");
        Ok(id)
    }

    async fn fetch_messages(&self, identity: &str) -> Result<Vec<WireEnvelope>> {
        let state = self.state.read();
        Self::check_online(&state)?;

        if !state.users.contains_key(identity) {
            return Err(Error::UnknownUser(identity.to_string()));
        }

        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.receiver == identity)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(sender: &str, receiver: &str, body: &str) -> WireEnvelope {
        WireEnvelope {
            id: Some(999),
            sender: sender.into(),
            receiver: receiver.into(),
            encrypted_msg: body.into(),
            encrypted_key: Some("a2V5".into()),
            iv: Some("aXY=".into()),
        }
    }

    async fn relay_with(users: &[&str]) -> MemoryRelay {
        let relay = MemoryRelay::new();
        for user in users {
            relay.publish_public_key(user, &format!("key-of-{}", user)).await.unwrap();
        }
        relay
    }

    #[tokio::test]
    async fn test_public_keys() {
        let relay = relay_with(&["alice"]).await;
        relay.register_user("legacy").unwrap();

        assert_eq!(relay.fetch_public_key("alice").await.unwrap(), "key-of-alice");
        assert!(matches!(
            relay.fetch_public_key("legacy").await,
            Err(Error::PublicKeyNotFound(_))
        ));
        assert!(matches!(
            relay.fetch_public_key("nobody").await,
            Err(Error::UnknownUser(_))
        ));
        assert!(matches!(
            relay.publish_public_key("alice", "other").await,
            Err(Error::IdentityExists(_))
        ));
        assert!(matches!(relay.register_user("alice"), Err(Error::IdentityExists(_))));
    }

    #[tokio::test]
    async fn test_send_assigns_ids_and_serves_newest_first() {
        let relay = relay_with(&["alice", "bob", "carol"]).await;

        assert_eq!(relay.send(envelope("alice", "bob", "one")).await.unwrap(), 1);
        assert_eq!(relay.send(envelope("carol", "alice", "x")).await.unwrap(), 2);
        assert_eq!(relay.send(envelope("carol", "bob", "two")).await.unwrap(), 3);

        let inbox = relay.fetch_messages("bob").await.unwrap();
        let bodies: Vec<_> = inbox.iter().map(|m| m.encrypted_msg.as_str()).collect();
        assert_eq!(bodies, vec!["two", "one"]);
        assert_eq!(inbox[0].id, Some(3));
        assert_eq!(inbox[0].encrypted_key.as_deref(), Some("a2V5"));
    }

    #[tokio::test]
    async fn test_unknown_users_rejected() {
        let relay = relay_with(&["alice"]).await;

        assert!(matches!(
            relay.send(envelope("alice", "ghost", "hi")).await,
            Err(Error::UnknownUser(_))
        ));
        assert!(matches!(
            relay.send(envelope("ghost", "alice", "hi")).await,
            Err(Error::UnknownUser(_))
        ));
        assert!(matches!(
            relay.fetch_messages("ghost").await,
            Err(Error::UnknownUser(_))
        ));
        assert_eq!(relay.message_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_is_transport_error() {
        let relay = relay_with(&["alice", "bob"]).await;
        relay.set_offline(true);

        let err = relay.send(envelope("alice", "bob", "hi")).await.unwrap_err();
        assert!(err.is_recoverable());

        relay.set_offline(false);
        assert!(relay.send(envelope("alice", "bob", "hi")).await.is_ok());
    }
}
