//! Transport abstraction for a single channel connection.
//!
//! A [`Transport`] is a bidirectional text message pipe carrying JSON
//! envelopes (`{"event": ..., "data": ...}`) for exactly one logical channel.
//! Framing is the implementation's concern.
//!
//! # Connection Setup
//!
//! Connection setup is not part of [`Transport`]; it lives in [`Connector`],
//! which the [`ChannelRegistry`](crate::registry::ChannelRegistry) calls every
//! time a channel needs a fresh transport (first connect and every reconnect).
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use goban_sync::channel::ChannelId;
//! use goban_sync::credentials::Credentials;
//! use goban_sync::error::SyncError;
//! use goban_sync::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), SyncError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, SyncError>> {
//!         // Return None when the server closes the connection on purpose
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), SyncError> {
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(
//!         &self,
//!         channel: &ChannelId,
//!         credentials: &Credentials,
//!     ) -> Result<Box<dyn Transport>, SyncError> {
//!         Ok(Box::new(MyTransport {}))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::channel::ChannelId;
use crate::credentials::Credentials;
use crate::error::SyncError;

/// A bidirectional text message transport for one channel.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the registry's
/// link task polls it inside `tokio::select!`.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), SyncError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — the connection broke; the channel will be retried
    /// - `None` — the server closed the connection deliberately; no retry
    async fn recv(&mut self) -> Option<Result<String, SyncError>>;

    /// Close the connection gracefully. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources must still be
    /// released.
    async fn close(&mut self) -> Result<(), SyncError>;
}

/// Factory that opens an authenticated [`Transport`] for a channel.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport for `channel`, presenting `credentials`.
    ///
    /// The registry bounds this call with its connect timeout; an
    /// implementation does not need its own.
    ///
    /// # Errors
    ///
    /// Any error is treated as a failed attempt (and, during reconnection,
    /// counts toward the retry ceiling).
    async fn connect(
        &self,
        channel: &ChannelId,
        credentials: &Credentials,
    ) -> Result<Box<dyn Transport>, SyncError>;
}
