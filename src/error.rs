//! Error types for the synchronization engine.

use thiserror::Error;

use crate::game::MoveRejection;

/// Errors that can occur while driving channels or dispatching intents.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// The connector could not establish a transport for a channel.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Failed to serialize or deserialize a wire message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No live connection exists for the channel.
    #[error("channel {0} is not connected")]
    NotConnected(String),

    /// A channel id did not match `lobby`, `room:<id>` or `match:<id>`.
    #[error("invalid channel id: {0:?}")]
    InvalidChannelId(String),

    /// No token or username is available; retrying cannot succeed.
    #[error("missing credentials: a token and a username are required")]
    MissingCredentials,

    /// A local intent was rejected before reaching the server.
    #[error("move rejected: {0}")]
    MoveRejected(MoveRejection),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MoveRejection> for SyncError {
    fn from(rejection: MoveRejection) -> Self {
        SyncError::MoveRejected(rejection)
    }
}

/// A specialized [`Result`] type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
