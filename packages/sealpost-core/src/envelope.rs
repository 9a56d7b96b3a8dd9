//! # Envelope Codec
//!
//! Wire format for sealed messages and the binary/text transcoding of every
//! field that crosses the relay boundary.
//!
//! ## Wire Envelope
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          WIRE ENVELOPE (JSON)                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  {                                                                      │
//! │    "id":            42,            ◄── assigned by the relay on fetch  │
//! │    "sender":        "alice",                                            │
//! │    "receiver":      "bob",                                              │
//! │    "encrypted_msg": "<base64>",    ◄── ciphertext || 16-byte tag       │
//! │    "encrypted_key": "<base64>",    ◄── 256-byte RSA-OAEP block         │
//! │    "iv":            "<base64>"     ◄── 12-byte nonce                   │
//! │  }                                                                      │
//! │                                                                         │
//! │  encrypted_key / iv absent or empty ──► ParsedEnvelope::Partial         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Binary fields use standard base64 with padding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::crypto::Nonce;
use crate::error::{Error, Result};

/// Encode bytes as wire text
pub fn encode_binary(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode wire text back into bytes
pub fn decode_binary(text: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(text)?)
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

/// An envelope exactly as the relay stores and serves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Relay-assigned message id (absent before the relay has seen it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Sender identity
    pub sender: String,
    /// Recipient identity
    pub receiver: String,
    /// Base64 ciphertext with tag
    pub encrypted_msg: String,
    /// Base64 wrapped session key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
    /// Base64 nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl WireEnvelope {
    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::DeserializationError(e.to_string()))
    }

    /// Parse a JSON array of envelopes, as returned by the relay
    pub fn batch_from_json(text: &str) -> Result<Vec<Self>> {
        serde_json::from_str(text).map_err(|e| Error::DeserializationError(e.to_string()))
    }
}

// ============================================================================
// ENVELOPES
// ============================================================================

/// Binary parts of a freshly sealed message
#[derive(Debug)]
pub struct EnvelopeFields {
    /// Sender identity
    pub sender: String,
    /// Recipient identity
    pub receiver: String,
    /// Ciphertext with tag
    pub encrypted_msg: Vec<u8>,
    /// Wrapped session key
    pub wrapped_key: Vec<u8>,
    /// Nonce used for the body
    pub nonce: Nonce,
}

/// A complete envelope: body, wrapped key and nonce all present
///
/// Fields hold wire text and cannot be modified after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    id: Option<u64>,
    sender: String,
    receiver: String,
    encrypted_msg: String,
    encrypted_key: String,
    iv: String,
}

impl Envelope {
    /// Relay-assigned id, if fetched from the relay
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Sender identity
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Recipient identity
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Base64 ciphertext with tag
    pub fn encrypted_msg(&self) -> &str {
        &self.encrypted_msg
    }

    /// Base64 wrapped session key
    pub fn encrypted_key(&self) -> &str {
        &self.encrypted_key
    }

    /// Base64 nonce
    pub fn iv(&self) -> &str {
        &self.iv
    }

    /// Wire representation
    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            id: self.id,
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            encrypted_msg: self.encrypted_msg.clone(),
            encrypted_key: Some(self.encrypted_key.clone()),
            iv: Some(self.iv.clone()),
        }
    }
}

impl From<Envelope> for WireEnvelope {
    fn from(envelope: Envelope) -> Self {
        WireEnvelope {
            id: envelope.id,
            sender: envelope.sender,
            receiver: envelope.receiver,
            encrypted_msg: envelope.encrypted_msg,
            encrypted_key: Some(envelope.encrypted_key),
            iv: Some(envelope.iv),
        }
    }
}

/// An envelope without a wrapped key or nonce
///
/// Produced by legacy clients that sent bodies without hybrid encryption
/// data. Only the routing fields and the opaque body survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialEnvelope {
    id: Option<u64>,
    sender: String,
    receiver: String,
    encrypted_msg: String,
}

impl PartialEnvelope {
    /// Relay-assigned id, if fetched from the relay
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Sender identity
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Recipient identity
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// The body as received
    pub fn encrypted_msg(&self) -> &str {
        &self.encrypted_msg
    }
}

/// Result of reading a wire envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEnvelope {
    /// All encryption data present
    Complete(Envelope),
    /// Wrapped key or nonce missing
    Partial(PartialEnvelope),
}

impl ParsedEnvelope {
    /// Relay-assigned id
    pub fn id(&self) -> Option<u64> {
        match self {
            ParsedEnvelope::Complete(e) => e.id(),
            ParsedEnvelope::Partial(e) => e.id(),
        }
    }

    /// Sender identity
    pub fn sender(&self) -> &str {
        match self {
            ParsedEnvelope::Complete(e) => e.sender(),
            ParsedEnvelope::Partial(e) => e.sender(),
        }
    }

    /// Body as received
    pub fn encrypted_msg(&self) -> &str {
        match self {
            ParsedEnvelope::Complete(e) => e.encrypted_msg(),
            ParsedEnvelope::Partial(e) => e.encrypted_msg(),
        }
    }

    /// Whether the envelope can be decrypted at all
    pub fn is_complete(&self) -> bool {
        matches!(self, ParsedEnvelope::Complete(_))
    }
}

impl From<Envelope> for ParsedEnvelope {
    fn from(envelope: Envelope) -> Self {
        ParsedEnvelope::Complete(envelope)
    }
}

/// Assemble a complete envelope, transcoding binary fields to text
pub fn build_envelope(fields: EnvelopeFields) -> Envelope {
    Envelope {
        id: None,
        sender: fields.sender,
        receiver: fields.receiver,
        encrypted_msg: encode_binary(&fields.encrypted_msg),
        encrypted_key: encode_binary(&fields.wrapped_key),
        iv: encode_binary(fields.nonce.as_bytes()),
    }
}

/// Classify a wire envelope as complete or partial
///
/// Never fails: field contents are only decoded when the envelope is opened.
pub fn parse_envelope(wire: WireEnvelope) -> ParsedEnvelope {
    let present = |field: Option<String>| field.filter(|value| !value.is_empty());

    match (present(wire.encrypted_key), present(wire.iv)) {
        (Some(encrypted_key), Some(iv)) => ParsedEnvelope::Complete(Envelope {
            id: wire.id,
            sender: wire.sender,
            receiver: wire.receiver,
            encrypted_msg: wire.encrypted_msg,
            encrypted_key,
            iv,
        }),
        _ => ParsedEnvelope::Partial(PartialEnvelope {
            id: wire.id,
            sender: wire.sender,
            receiver: wire.receiver,
            encrypted_msg: wire.encrypted_msg,
        }),
    }
}

/// Parse a relay JSON array straight into classified envelopes
pub fn parse_envelopes_json(text: &str) -> Result<Vec<ParsedEnvelope>> {
    Ok(WireEnvelope::batch_from_json(text)?
        .into_iter()
        .map(parse_envelope)
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================
