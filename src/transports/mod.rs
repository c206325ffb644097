//! Concrete [`Transport`](crate::transport::Transport) and
//! [`Connector`](crate::transport::Connector) implementations behind feature
//! gates.
//!
//! | Feature                | Connector              | Transport              |
//! |------------------------|------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketConnector`] | [`WebSocketTransport`] |

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
