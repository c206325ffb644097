//! # Lobby Session Demo
//!
//! Logs in, joins the lobby and prints the room list every time the server
//! sends one. Optionally joins a room and marks the player ready.
//!
//! ## Running
//!
//! ```sh
//! GOBAN_TOKEN=... GOBAN_USER=alice cargo run --example lobby_session
//!
//! # Join a room as well:
//! GOBAN_ROOM=r1 GOBAN_URL=ws://localhost:8000 cargo run --example lobby_session
//! ```

use goban_sync::{
    ChannelRegistry, Credentials, EventBus, EventName, RegistryConfig, Session, SessionConfig,
    StaticCredentials, SyncEvent, WebSocketConnector,
};

/// Default server URL when `GOBAN_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=goban_sync=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("GOBAN_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let token = std::env::var("GOBAN_TOKEN").unwrap_or_default();
    let username = std::env::var("GOBAN_USER").unwrap_or_else(|_| "guest".to_string());
    let room = std::env::var("GOBAN_ROOM").ok();
    tracing::info!("Connecting to {url} as {username}");

    let registry = ChannelRegistry::new(
        WebSocketConnector::new(&url),
        StaticCredentials::new(Credentials::new(token, username)),
        EventBus::new(),
        RegistryConfig::default(),
    );
    let mut events = registry.bus().stream(&[
        EventName::LobbyUpdate,
        EventName::RoomUpdate,
        EventName::Disconnect,
        EventName::MaxReconnectAttemptsReached,
    ]);
    let session = Session::new(registry, SessionConfig::default());

    // ── Join ────────────────────────────────────────────────────────
    session.join_lobby().await?;
    if let Some(room) = room.as_deref() {
        session.join_room(room).await?;
        session.set_ready(room, true)?;
    }

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SyncEvent::Server { .. } => {
                        let rooms = session.rooms();
                        for room in &rooms.rooms {
                            let names: Vec<&str> =
                                room.players.iter().map(|p| p.username.as_str()).collect();
                            println!("{:<12} {}", room.room_id, names.join(", "));
                        }
                        if let Some(current) = &rooms.current_room {
                            println!("in room {} (all ready: {})", current.room_id, current.all_ready());
                        }
                    }
                    SyncEvent::Disconnected { channel, reason } => {
                        tracing::warn!("{channel} disconnected: {reason:?}");
                    }
                    SyncEvent::MaxReconnectAttemptsReached { channel, attempts } => {
                        tracing::error!("{channel} gave up after {attempts} attempts");
                        break;
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    if let Some(room) = room.as_deref() {
        session.leave_room(room);
    }
    session.registry().disconnect_all();
    Ok(())
}
