//! # goban-sync
//!
//! Client-side realtime synchronization engine for an online Go service.
//!
//! The crate keeps one supervised transport per logical channel (the global
//! lobby, a pre-game room, a live match), fans decoded server events out over
//! an in-process bus, and folds them into room and game state that stays
//! consistent with the authoritative server across disconnects, duplicate
//! messages and out-of-order snapshots.
//!
//! ## Features
//!
//! - **Channel registry**: one [`Transport`] per [`ChannelId`], coalesced
//!   connects, bounded fixed-delay reconnection
//! - **Pure reducers**: [`room::reduce`] and [`game::reduce`] are total and
//!   leave state unchanged on malformed input
//! - **Byo-yomi clock**: local per-second countdown that server timer
//!   snapshots always overwrite
//! - **Replay and export**: step through the [`HistoryLog`] and render it as SGF
//! - **WebSocket built-in**: default `transport-websocket` feature provides
//!   [`WebSocketConnector`](transports::WebSocketConnector)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), goban_sync::SyncError> {
//! use goban_sync::transports::WebSocketConnector;
//! use goban_sync::{
//!     ChannelRegistry, Credentials, EventBus, RegistryConfig, Session, SessionConfig,
//!     StaticCredentials,
//! };
//!
//! let registry = ChannelRegistry::new(
//!     WebSocketConnector::new("wss://go.example.com"),
//!     StaticCredentials::new(Credentials::new("token", "alice")),
//!     EventBus::new(),
//!     RegistryConfig::default(),
//! );
//! let session = Session::new(registry, SessionConfig::default());
//!
//! session.join_lobby().await?;
//! session.join_room("r1").await?;
//! session.set_ready("r1", true)?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod channel;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod event;
pub mod game;
pub mod history;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod session;
pub mod supervisor;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use bus::{EventBus, EventStream, Subscription};
pub use channel::{ChannelId, ChannelSnapshot, ChannelStatus};
pub use clock::{ClockConfig, ClockDriver};
pub use credentials::{CredentialSource, Credentials, StaticCredentials};
pub use error::{Result, SyncError};
pub use event::{CloseReason, EventName, SyncEvent};
pub use game::{GameAction, GameState, MoveRejection};
pub use history::{HistoryEntry, HistoryLog, Move};
pub use protocol::{ClientMessage, GameSnapshot, ServerEvent, Stone, TimerSnapshot};
pub use registry::{ChannelRegistry, Connection, RegistryConfig};
pub use room::{RoomAction, RoomState, RoomsState};
pub use session::{Session, SessionConfig};
pub use supervisor::ReconnectPolicy;
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
