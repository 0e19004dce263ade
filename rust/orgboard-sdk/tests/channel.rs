mod support;

use async_trait::async_trait;
use orgboard_sdk::frame::Command;
use orgboard_sdk::{
    room_topic, send_destination, ApiError, Channel, ChannelConfig, ChannelError, ChannelState,
    ChatBackend, ChatMessage, ChatRoom, ChatSession, DisconnectReason, MemorySessionStore, Session,
};
use serde_json::json;
use std::time::Duration;
use support::{wait_for, Broker};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

fn channel_for(broker: &Broker, token: &str) -> (Channel, Session) {
    let session = Session::new(MemorySessionStore::with_token(token));
    let config = ChannelConfig::default().with_reconnect_delay(Duration::from_millis(100));
    (Channel::new(&broker.url, config, session.clone()), session)
}

#[tokio::test]
async fn test_connect_sends_bearer_token() {
    let broker = Broker::start().await;
    let (channel, _) = channel_for(&broker, "t1");

    assert_eq!(channel.state(), ChannelState::Idle);
    channel.connect();
    channel
        .wait_connected(CONNECT_TIMEOUT)
        .await
        .expect("should connect");

    assert_eq!(broker.auth_headers(), vec![Some("Bearer t1".to_string())]);
    channel.disconnect();
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let broker = Broker::start().await;
    let (channel, _) = channel_for(&broker, "t1");

    channel.connect();
    channel.connect();
    channel.clone().connect();
    channel
        .wait_connected(CONNECT_TIMEOUT)
        .await
        .expect("should connect");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(broker.connection_count(), 1, "only one socket should be opened");
    channel.disconnect();
}

#[tokio::test]
async fn test_publish_reaches_subscriber() {
    let broker = Broker::start().await;
    let (channel, _) = channel_for(&broker, "t1");
    channel.connect();
    channel.wait_connected(CONNECT_TIMEOUT).await.unwrap();

    let mut sub = channel.subscribe(&room_topic(7)).expect("should subscribe");
    channel
        .publish_json(&send_destination(7), &json!({"roomId": 7, "content": "hello"}))
        .expect("should publish");

    let msg = tokio::time::timeout(CONNECT_TIMEOUT, sub.next_message())
        .await
        .expect("message should arrive")
        .expect("subscription should be open");
    assert_eq!(msg.topic, "/topic/chat/room/7");
    let body: serde_json::Value = msg.json().unwrap();
    assert_eq!(body["content"], "hello");

    channel.disconnect();
}

#[tokio::test]
async fn test_shared_topic_uses_one_wire_subscription() {
    let broker = Broker::start().await;
    let (channel, _) = channel_for(&broker, "t1");
    channel.connect();
    channel.wait_connected(CONNECT_TIMEOUT).await.unwrap();

    let first = channel.subscribe(&room_topic(1)).unwrap();
    let second = channel.subscribe(&room_topic(1)).unwrap();
    assert!(wait_for(|| broker.active_destinations() == vec![room_topic(1)]).await);
    assert_eq!(broker.frames(Command::Subscribe).len(), 1);

    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(broker.frames(Command::Unsubscribe).is_empty());

    second.unsubscribe();
    assert!(wait_for(|| broker.active_destinations().is_empty()).await);
    assert_eq!(broker.frames(Command::Unsubscribe).len(), 1);
    assert!(channel.active_topics().is_empty());

    channel.disconnect();
}

#[tokio::test]
async fn test_publish_after_disconnect_is_noop() {
    let broker = Broker::start().await;
    let (channel, _) = channel_for(&broker, "t1");
    channel.connect();
    channel.wait_connected(CONNECT_TIMEOUT).await.unwrap();

    channel.disconnect();
    assert_eq!(
        channel.state(),
        ChannelState::Disconnected(DisconnectReason::Requested)
    );
    assert!(matches!(
        channel.publish(&send_destination(1), "{}"),
        Err(ChannelError::NotConnected)
    ));
    assert!(matches!(
        channel.subscribe(&room_topic(1)),
        Err(ChannelError::NotConnected)
    ));

    assert!(wait_for(|| !broker.frames(Command::Disconnect).is_empty()).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(broker.frames(Command::Send).is_empty());
    assert_eq!(broker.connection_count(), 1, "no reconnect after disconnect");
}

#[tokio::test]
async fn test_reconnect_uses_current_token_and_resubscribes() {
    let broker = Broker::start().await;
    let (channel, session) = channel_for(&broker, "t1");
    channel.connect();
    channel.wait_connected(CONNECT_TIMEOUT).await.unwrap();

    let mut sub = channel.subscribe(&room_topic(3)).unwrap();
    assert!(wait_for(|| broker.frames(Command::Subscribe).len() == 1).await);

    session.sign_in("t2").unwrap();
    broker.drop_connections();

    assert!(
        wait_for(|| broker.frames(Command::Subscribe).len() == 2).await,
        "subscription should be replayed after reconnect"
    );
    channel.wait_connected(CONNECT_TIMEOUT).await.unwrap();

    assert_eq!(
        broker.auth_headers(),
        vec![Some("Bearer t1".to_string()), Some("Bearer t2".to_string())]
    );
    let ids: Vec<_> = broker
        .frames(Command::Subscribe)
        .iter()
        .map(|f| f.get_header("id").map(str::to_string))
        .collect();
    assert_eq!(ids[0], ids[1]);

    assert_eq!(broker.publish(&room_topic(3), r#"{"content":"back"}"#), 1);
    let msg = tokio::time::timeout(CONNECT_TIMEOUT, sub.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.body, r#"{"content":"back"}"#);

    channel.disconnect();
}

#[tokio::test]
async fn test_state_transitions_are_observable() {
    let broker = Broker::start().await;
    let (channel, _) = channel_for(&broker, "t1");
    let mut states = channel.watch_state();

    channel.connect();
    channel.wait_connected(CONNECT_TIMEOUT).await.unwrap();
    broker.drop_connections();

    let lost = tokio::time::timeout(CONNECT_TIMEOUT, async {
        loop {
            states.changed().await.unwrap();
            if let ChannelState::Disconnected(reason) = states.borrow_and_update().clone() {
                return reason;
            }
        }
    })
    .await
    .expect("should observe the drop");
    assert_eq!(lost, DisconnectReason::Closed);

    channel.disconnect();
}

struct RoomsOnly;

#[async_trait]
impl ChatBackend for RoomsOnly {
    async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ApiError> {
        Ok(Vec::new())
    }

    async fn load_history(&self, _room_id: i64) -> Result<Vec<ChatMessage>, ApiError> {
        Ok(Vec::new())
    }

    async fn mark_read(&self, _room_id: i64) -> Result<(), ApiError> {
        Ok(())
    }
}

fn room(id: i64) -> ChatRoom {
    ChatRoom {
        id,
        name: format!("room-{}", id),
        unread_count: 0,
    }
}

#[tokio::test]
async fn test_chat_session_over_live_channel() {
    let broker = Broker::start().await;
    let (channel, _) = channel_for(&broker, "t1");
    channel.connect();
    channel.wait_connected(CONNECT_TIMEOUT).await.unwrap();

    let chat = ChatSession::new(RoomsOnly, channel.clone());
    let mut inbound = chat.subscribe_messages();

    chat.select_room(room(1)).await.unwrap();
    chat.select_room(room(2)).await.unwrap();
    assert!(
        wait_for(|| broker.active_destinations() == vec![room_topic(2)]).await,
        "only the selected room should stay subscribed"
    );

    chat.send_message("ping").unwrap();
    let echoed = tokio::time::timeout(CONNECT_TIMEOUT, inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed.content, "ping");
    assert_eq!(echoed.room_id, 2);
    assert_eq!(chat.messages().len(), 1);

    chat.leave().await;
    assert!(wait_for(|| broker.active_destinations().is_empty()).await);
    channel.disconnect();
}
