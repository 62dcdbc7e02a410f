//! Relay wire messages, bincode-encoded.
//!
//! Every message a room fans out is encoded once and shared between
//! subscribers as `Arc<Vec<u8>>`. Patches travel the other way as a direct
//! call carrying an [`EditOperation`] against a known version.

use rtform_core::EditOperation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};

/// Peer identity with display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: Uuid,
    pub name: String,
}

impl PeerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Create with explicit peer_id (for testing)
    pub fn with_id(peer_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            peer_id,
            name: name.into(),
        }
    }
}

/// A patch submitted against `base_version` of a channel's document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchRequest {
    pub peer_id: Uuid,
    pub base_version: u64,
    pub op: EditOperation,
}

/// Messages fanned out to every subscriber of a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelayMessage {
    PeerJoined {
        channel: String,
        peer: PeerInfo,
    },
    PeerLeft {
        channel: String,
        peer_id: Uuid,
    },
    /// A patch was accepted; `document` is the new authoritative text.
    Update {
        channel: String,
        author: Uuid,
        version: u64,
        document: String,
    },
    /// A patch from `peer_id` was refused; carries the current state so the
    /// author can resynchronize.
    Rejected {
        channel: String,
        peer_id: Uuid,
        version: u64,
        document: String,
        reason: String,
    },
    /// The channel is gone. Subscribers must stop.
    Abort {
        channel: String,
        reason: String,
    },
}

impl RelayMessage {
    pub fn channel(&self) -> &str {
        match self {
            Self::PeerJoined { channel, .. }
            | Self::PeerLeft { channel, .. }
            | Self::Update { channel, .. }
            | Self::Rejected { channel, .. }
            | Self::Abort { channel, .. } => channel,
        }
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> RelayResult<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| RelayError::Serialization(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> RelayResult<Self> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| RelayError::Deserialization(e.to_string()))?;
        Ok(msg)
    }
}
