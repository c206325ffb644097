//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] maps each channel to its endpoint under a base URL
//! and opens one [`WebSocketTransport`] per channel, authenticating with a
//! bearer token. Both `ws://` and `wss://` URLs are supported; TLS is handled
//! transparently via [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! | Channel           | Endpoint                  |
//! |-------------------|---------------------------|
//! | `lobby`           | `<base>/ws/lobby`         |
//! | `room:<id>`       | `<base>/ws/rooms/<id>`    |
//! | `match:<id>`      | `<base>/ws/matches/<id>`  |
//!
//! Requires the default `transport-websocket` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), goban_sync::SyncError> {
//! use goban_sync::{ChannelRegistry, EventBus, RegistryConfig, StaticCredentials, Credentials};
//! use goban_sync::transports::WebSocketConnector;
//!
//! let connector = WebSocketConnector::new("ws://localhost:8000");
//! let credentials = StaticCredentials::new(Credentials::new("token", "alice"));
//! let registry = ChannelRegistry::new(connector, credentials, EventBus::new(), RegistryConfig::default());
//! registry.connect(&goban_sync::ChannelId::Lobby).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::channel::ChannelId;
use crate::credentials::Credentials;
use crate::error::SyncError;
use crate::transport::{Connector, Transport};

/// Type alias for the underlying WebSocket stream.
///
/// Public so that callers can wrap a stream they opened themselves via
/// [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// One channel's WebSocket.
///
/// Only text frames are delivered; pings are answered by tungstenite and
/// binary frames are skipped. `recv` holds no partial state between polls,
/// so the registry's link task can race it against its outbound queue.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket to `url`, sending `Authorization: Bearer <token>` when
    /// a token is given.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConnectFailed`] if the URL or token cannot form a
    /// request, and [`SyncError::Io`] if the connection cannot be established.
    /// When the underlying error is an I/O error its
    /// [`ErrorKind`](std::io::ErrorKind) is preserved; all other errors are
    /// mapped to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str, token: Option<&str>) -> Result<Self, SyncError> {
        tracing::debug!(url = %url, "connecting to WebSocket server");

        let mut request = url
            .into_client_request()
            .map_err(|e| SyncError::ConnectFailed(format!("invalid url {url:?}: {e}")))?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| SyncError::ConnectFailed(format!("invalid token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _response) = tokio_tungstenite::connect_async(request).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            SyncError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "WebSocket connection established");

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), SyncError> {
        if self.closed {
            return Err(SyncError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| SyncError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, SyncError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(SyncError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                Message::Binary(_) => {
                    tracing::warn!("skipping binary frame, the game protocol is text only");
                }
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| SyncError::TransportSend(e.to_string()))
    }
}

/// [`Connector`] that opens one WebSocket per channel under `base_url`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    base_url: String,
}

impl WebSocketConnector {
    /// `base_url` is scheme plus authority, e.g. `wss://go.example.com`.
    /// A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint for `channel`.
    pub fn url_for(&self, channel: &ChannelId) -> String {
        match channel {
            ChannelId::Lobby => format!("{}/ws/lobby", self.base_url),
            ChannelId::Room(room_id) => format!("{}/ws/rooms/{room_id}", self.base_url),
            ChannelId::Match(match_id) => format!("{}/ws/matches/{match_id}", self.base_url),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        channel: &ChannelId,
        credentials: &Credentials,
    ) -> Result<Box<dyn Transport>, SyncError> {
        let url = self.url_for(channel);
        let transport = WebSocketTransport::connect(&url, Some(&credentials.token)).await?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn channel_urls() {
        let connector = WebSocketConnector::new("wss://go.example.com/");
        assert_eq!(connector.base_url(), "wss://go.example.com");
        assert_eq!(
            connector.url_for(&ChannelId::Lobby),
            "wss://go.example.com/ws/lobby"
        );
        assert_eq!(
            connector.url_for(&ChannelId::room("r1")),
            "wss://go.example.com/ws/rooms/r1"
        );
        assert_eq!(
            connector.url_for(&ChannelId::match_("m1")),
            "wss://go.example.com/ws/matches/m1"
        );
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ConnectFailed(_) | SyncError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }

    // ── Mock-server helpers ──────────────────────────────────────────────

    /// Start a local WebSocket server on `path`, run `handler` on the
    /// accepted connection, and return the base URL plus the bearer header
    /// the client presented.
    async fn start_mock_server<F, Fut>(
        handler: F,
    ) -> (String, tokio::sync::oneshot::Receiver<Option<String>>)
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (auth_tx, auth_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = auth_tx.send(auth);
                Ok(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();
            handler(ws).await;
        });

        (format!("ws://{addr}"), auth_rx)
    }

    #[tokio::test]
    async fn connector_presents_bearer_token() {
        let (base, auth) = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"event":"game_error","data":{"message":"hi"}}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let connector = WebSocketConnector::new(base);
        let mut transport = connector
            .connect(&ChannelId::Lobby, &Credentials::new("secret", "alice"))
            .await
            .unwrap();

        assert_eq!(auth.await.unwrap().as_deref(), Some("Bearer secret"));
        let frame = transport.recv().await.unwrap().unwrap();
        assert!(frame.contains("game_error"));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let (url, _auth) = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url, None).await.unwrap();
        let msg = transport.recv().await.unwrap().unwrap();
        assert_eq!(msg, "after_binary");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let (url, _auth) = start_mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url, None).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, SyncError::TransportClosed));
    }

    #[tokio::test]
    async fn send_round_trip() {
        let (url, _auth) = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url, None).await.unwrap();
        transport.send("echo".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "echo");
    }
}
