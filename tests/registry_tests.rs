#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Integration tests for `ChannelRegistry`: connect coalescing, handshakes,
//! inbound dispatch and the reconnect supervisor, all against
//! [`MockConnector`] with paused time.

mod common;

use std::time::Duration;

use common::*;
use goban_sync::{
    ChannelId, ChannelStatus, ClientMessage, CloseReason, EventName, StaticCredentials,
    SyncError, SyncEvent,
};
use tokio_test::{assert_err, assert_ok};

const LIFECYCLE: &[EventName] = &[
    EventName::Connect,
    EventName::Disconnect,
    EventName::Error,
    EventName::MaxReconnectAttemptsReached,
];

// ════════════════════════════════════════════════════════════════════
// Connect
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn lobby_connect_sends_handshake() {
    let connector = MockConnector::new();
    let registry = registry(&connector);

    let conn = assert_ok!(registry.connect(&ChannelId::Lobby).await);
    settle().await;

    assert!(conn.is_open());
    let server = connector.server(&ChannelId::Lobby);
    assert_eq!(server.sent_events(), ["join_lobby", "get_rooms"]);
    assert_eq!(server.last_sent("join_lobby").unwrap()["username"], "alice");
    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Connected);
    assert_eq!(registry.reconnect_attempts(&ChannelId::Lobby), 0);
}

#[tokio::test(start_paused = true)]
async fn room_and_match_handshakes() {
    let connector = MockConnector::new();
    let registry = registry(&connector);

    registry.connect(&ChannelId::room("r1")).await.unwrap();
    registry.connect(&ChannelId::match_("m1")).await.unwrap();
    settle().await;

    let room = connector.server(&ChannelId::room("r1"));
    assert_eq!(room.sent_events(), ["join_custom_room", "pull_room_info"]);
    assert_eq!(room.last_sent("pull_room_info").unwrap()["room_id"], "r1");

    let game = connector.server(&ChannelId::match_("m1"));
    assert_eq!(game.sent_events(), ["joinGame"]);
    assert_eq!(game.last_sent("joinGame").unwrap()["match_id"], "m1");
}

#[tokio::test(start_paused = true)]
async fn connect_reuses_live_connection() {
    let connector = MockConnector::new();
    let registry = registry(&connector);

    let first = registry.connect(&ChannelId::Lobby).await.unwrap();
    let second = registry.connect(&ChannelId::Lobby).await.unwrap();

    assert!(first.same_link(&second));
    assert_eq!(connector.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_share_one_attempt() {
    let connector = MockConnector::scripted(vec![Outcome::Delay(Duration::from_millis(100))]);
    let registry = registry(&connector);
    let lobby = ChannelId::Lobby;

    let (a, b) = tokio::join!(registry.connect(&lobby), registry.connect(&lobby));

    assert!(a.unwrap().same_link(&b.unwrap()));
    assert_eq!(connector.calls(), 1);
    assert_eq!(connector.servers().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_connect_times_out() {
    let connector = MockConnector::scripted(vec![Outcome::Hang]);
    let registry = registry(&connector);

    let err = assert_err!(registry.connect(&ChannelId::Lobby).await);

    assert!(matches!(err, SyncError::Timeout));
    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Disconnected);
    assert!(registry.channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_connect_reports_error_without_retrying() {
    let connector = MockConnector::scripted(vec![Outcome::Reject("refused".into())]);
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);

    let err = registry.connect(&ChannelId::room("r1")).await.unwrap_err();
    assert!(matches!(err, SyncError::ConnectFailed(ref m) if m.contains("refused")));

    let event = next_named(&mut events, EventName::Error).await;
    assert_eq!(event.channel(), &ChannelId::room("r1"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.calls(), 1);
    assert_eq!(registry.status(&ChannelId::room("r1")), ChannelStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn connect_without_credentials_is_refused() {
    let connector = MockConnector::new();
    let registry = registry_with(&connector, StaticCredentials::empty());

    let err = registry.connect(&ChannelId::Lobby).await.unwrap_err();

    assert!(matches!(err, SyncError::MissingCredentials));
    assert_eq!(connector.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn live_connection_outlasts_cleared_credentials() {
    let connector = MockConnector::new();
    let credentials = alice();
    let registry = registry_with(&connector, credentials.clone());

    let first = registry.connect(&ChannelId::Lobby).await.unwrap();
    credentials.clear();

    let again = assert_ok!(registry.connect(&ChannelId::Lobby).await);
    assert!(first.same_link(&again));
    assert_eq!(connector.calls(), 1);

    let err = registry.connect(&ChannelId::room("r1")).await.unwrap_err();
    assert!(matches!(err, SyncError::MissingCredentials));
}

#[tokio::test(start_paused = true)]
async fn disconnect_fails_pending_connect() {
    let connector = MockConnector::scripted(vec![Outcome::Delay(Duration::from_secs(1))]);
    let registry = registry(&connector);

    let pending = tokio::spawn({
        let registry = registry.clone();
        async move { registry.connect(&ChannelId::Lobby).await }
    });
    settle().await;
    registry.disconnect(&ChannelId::Lobby);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, SyncError::NotConnected(_)));

    // The late transport is closed instead of adopted.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(connector.server(&ChannelId::Lobby).is_closed());
    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Disconnected);
}

// ════════════════════════════════════════════════════════════════════
// Traffic
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn inbound_frames_reach_the_bus() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let mut events = registry.bus().stream(&[EventName::GameUpdate]);
    let channel = ChannelId::match_("m1");

    registry.connect(&channel).await.unwrap();
    let server = connector.server(&channel);
    server.push("this is not json");
    server.push(game_update_json("m1", &[(3, 3, "black")], "white", 1));

    let event = next_named(&mut events, EventName::GameUpdate).await;
    assert_eq!(event.channel(), &channel);
    assert!(events.try_recv().is_none());
    assert_eq!(registry.status(&channel), ChannelStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn send_goes_to_the_channel_transport() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let room = ChannelId::room("r1");

    registry.connect(&room).await.unwrap();
    registry.send(
        &room,
        &ClientMessage::SetReady {
            room_id: "r1".into(),
            username: "alice".into(),
            ready: true,
        },
    );
    registry.send_event(&room, "custom_ping", &serde_json::json!({ "n": 1 }));
    settle().await;

    let server = connector.server(&room);
    assert_eq!(
        server.sent_events(),
        ["join_custom_room", "pull_room_info", "set_ready", "custom_ping"]
    );
    assert_eq!(server.last_sent("set_ready").unwrap()["ready"], true);
}

#[tokio::test(start_paused = true)]
async fn send_without_connection_is_dropped() {
    let connector = MockConnector::new();
    let registry = registry(&connector);

    registry.send(&ChannelId::room("nowhere"), &ClientMessage::GetRooms);

    assert_eq!(connector.calls(), 0);
    assert!(registry.channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn connection_handle_fails_after_disconnect() {
    let connector = MockConnector::new();
    let registry = registry(&connector);

    let conn = registry.connect(&ChannelId::Lobby).await.unwrap();
    assert_ok!(conn.send(&ClientMessage::GetRooms));

    registry.disconnect(&ChannelId::Lobby);
    settle().await;

    assert!(!conn.is_open());
    assert!(matches!(
        conn.send(&ClientMessage::GetRooms),
        Err(SyncError::NotConnected(_))
    ));
}

// ════════════════════════════════════════════════════════════════════
// Disconnect
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);

    registry.connect(&ChannelId::Lobby).await.unwrap();
    registry.disconnect(&ChannelId::Lobby);
    registry.disconnect(&ChannelId::Lobby);
    settle().await;

    assert!(connector.server(&ChannelId::Lobby).is_closed());
    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Disconnected);

    assert!(matches!(events.try_recv(), Some(SyncEvent::Connected { .. })));
    assert!(matches!(
        events.try_recv(),
        Some(SyncEvent::Disconnected {
            reason: CloseReason::Local,
            ..
        })
    ));
    assert!(events.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn disconnect_all_closes_every_channel() {
    let connector = MockConnector::new();
    let registry = registry(&connector);

    registry.connect(&ChannelId::Lobby).await.unwrap();
    registry.connect(&ChannelId::match_("m1")).await.unwrap();
    let listed: Vec<ChannelId> = registry.channels().into_iter().map(|s| s.id).collect();
    assert_eq!(listed, [ChannelId::Lobby, ChannelId::match_("m1")]);

    registry.disconnect_all();
    registry.disconnect_all();
    settle().await;

    assert!(registry.channels().is_empty());
    assert!(connector.servers().iter().all(|s| s.is_closed()));
}

#[tokio::test(start_paused = true)]
async fn server_close_is_not_retried() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);

    registry.connect(&ChannelId::Lobby).await.unwrap();
    connector.server(&ChannelId::Lobby).close();

    let event = next_named(&mut events, EventName::Disconnect).await;
    assert!(matches!(
        event,
        SyncEvent::Disconnected {
            reason: CloseReason::Server,
            ..
        }
    ));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.calls(), 1);
    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Disconnected);
}

// ════════════════════════════════════════════════════════════════════
// Reconnect
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn unexpected_drop_reconnects_and_rejoins() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);
    let channel = ChannelId::match_("m1");

    registry.connect(&channel).await.unwrap();
    next_named(&mut events, EventName::Connect).await;
    connector.server(&channel).fail("connection reset");

    let event = next_named(&mut events, EventName::Disconnect).await;
    assert!(matches!(
        event,
        SyncEvent::Disconnected {
            reason: CloseReason::Unexpected(_),
            ..
        }
    ));
    assert_eq!(registry.status(&channel), ChannelStatus::Reconnecting);
    assert_eq!(registry.reconnect_attempts(&channel), 1);

    next_named(&mut events, EventName::Connect).await;
    settle().await;

    assert_eq!(connector.calls(), 2);
    assert_eq!(registry.status(&channel), ChannelStatus::Connected);
    assert_eq!(registry.reconnect_attempts(&channel), 0);
    assert_eq!(connector.server(&channel).sent_events(), ["joinGame"]);
}

#[tokio::test(start_paused = true)]
async fn connect_during_backoff_waits_for_the_retry() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);

    let first = registry.connect(&ChannelId::Lobby).await.unwrap();
    connector.server(&ChannelId::Lobby).fail("reset");
    next_named(&mut events, EventName::Disconnect).await;

    let second = registry.connect(&ChannelId::Lobby).await.unwrap();

    assert!(!first.same_link(&second));
    assert!(second.is_open());
    assert_eq!(connector.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_five_consecutive_failures() {
    let connector = MockConnector::scripted(vec![
        Outcome::Accept,
        Outcome::Reject("down".into()),
        Outcome::Reject("down".into()),
        Outcome::Reject("down".into()),
        Outcome::Reject("down".into()),
    ]);
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);
    let channel = ChannelId::room("r1");

    registry.connect(&channel).await.unwrap();
    next_named(&mut events, EventName::Connect).await;
    connector.server(&channel).fail("reset");

    next_named(&mut events, EventName::Disconnect).await;
    for _ in 0..4 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.name(), EventName::Error);
    }
    let event = next_named(&mut events, EventName::MaxReconnectAttemptsReached).await;
    assert_eq!(
        event,
        SyncEvent::MaxReconnectAttemptsReached {
            channel: channel.clone(),
            attempts: 5,
        }
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(events.try_recv().is_none());
    assert_eq!(connector.calls(), 5);
    assert_eq!(registry.status(&channel), ChannelStatus::Failed);
    assert_eq!(registry.reconnect_attempts(&channel), 5);

    // A fresh connect starts over.
    registry.connect(&channel).await.unwrap();
    assert_eq!(registry.status(&channel), ChannelStatus::Connected);
    assert_eq!(registry.reconnect_attempts(&channel), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);

    registry.connect(&ChannelId::Lobby).await.unwrap();
    connector.server(&ChannelId::Lobby).fail("reset");
    next_named(&mut events, EventName::Disconnect).await;

    registry.disconnect(&ChannelId::Lobby);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(connector.calls(), 1);
    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Disconnected);
    assert!(events.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn lost_credentials_end_reconnection() {
    let connector = MockConnector::new();
    let credentials = alice();
    let registry = registry_with(&connector, credentials.clone());
    let mut events = registry.bus().stream(LIFECYCLE);

    registry.connect(&ChannelId::Lobby).await.unwrap();
    credentials.clear();
    connector.server(&ChannelId::Lobby).fail("reset");

    next_named(&mut events, EventName::Disconnect).await;
    let event = next_named(&mut events, EventName::Error).await;
    assert!(matches!(event, SyncEvent::Error { ref message, .. } if message.contains("credentials")));

    assert_eq!(connector.calls(), 1);
    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn channels_reconnect_independently() {
    let connector = MockConnector::new();
    let registry = registry(&connector);
    let mut events = registry.bus().stream(LIFECYCLE);

    registry.connect(&ChannelId::Lobby).await.unwrap();
    registry.connect(&ChannelId::room("r1")).await.unwrap();
    connector.server(&ChannelId::room("r1")).fail("reset");
    next_named(&mut events, EventName::Disconnect).await;

    assert_eq!(registry.status(&ChannelId::Lobby), ChannelStatus::Connected);
    assert_eq!(registry.reconnect_attempts(&ChannelId::Lobby), 0);
    assert_eq!(registry.status(&ChannelId::room("r1")), ChannelStatus::Reconnecting);
}
