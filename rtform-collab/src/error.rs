//! Error types for rtform-collab

use rtform_core::FormError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Channel {0} is full")]
    RoomFull(String),

    #[error("Peer {0} has not joined this channel")]
    NotJoined(Uuid),

    #[error("Initial state is not a valid document")]
    InvalidDocument,

    #[error("Not connected")]
    NotConnected,

    #[error(transparent)]
    Form(#[from] FormError),
}

pub type RelayResult<T> = Result<T, RelayError>;
