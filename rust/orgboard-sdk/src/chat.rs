//! Chat rooms: room list and history over HTTP, live messages over the realtime channel.

use crate::channel::Realtime;
use crate::error::{ApiError, ChannelError, ChatError};
use crate::http::ApiClient;
use crate::subscription::Subscription;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub room_id: i64,
    #[serde(default)]
    pub sender: String,
    pub content: String,
    #[serde(default)]
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage<'a> {
    pub room_id: i64,
    pub content: &'a str,
}

pub fn room_topic(room_id: i64) -> String {
    format!("/topic/chat/room/{}", room_id)
}

pub fn send_destination(room_id: i64) -> String {
    format!("/app/chat/send/{}", room_id)
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ApiError>;
    async fn load_history(&self, room_id: i64) -> Result<Vec<ChatMessage>, ApiError>;
    async fn mark_read(&self, room_id: i64) -> Result<(), ApiError>;
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ApiError> {
        self.get_json(self.endpoint("chat/rooms")?).await
    }

    async fn load_history(&self, room_id: i64) -> Result<Vec<ChatMessage>, ApiError> {
        let url = self.endpoint(&format!("chat/rooms/{}/messages", room_id))?;
        self.get_json(url).await
    }

    async fn mark_read(&self, room_id: i64) -> Result<(), ApiError> {
        self.post_empty(&format!("chat/rooms/{}/read", room_id))
            .await
    }
}

#[derive(Default)]
struct RoomView {
    room: Option<ChatRoom>,
    messages: Vec<ChatMessage>,
}

type SharedView = Arc<Mutex<RoomView>>;

fn lock_view(view: &SharedView) -> std::sync::MutexGuard<'_, RoomView> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}

struct ActiveRoom {
    room_id: i64,
    subscription: Subscription,
    pump: JoinHandle<()>,
}

impl ActiveRoom {
    fn close(self) {
        self.pump.abort();
        tracing::debug!("Leaving room {}", self.room_id);
        self.subscription.unsubscribe();
    }
}

/// One user's view of the chat: at most one selected room, its messages in
/// arrival order, and exactly one live subscription for it.
pub struct ChatSession<B, R> {
    backend: B,
    channel: R,
    view: SharedView,
    active: tokio::sync::Mutex<Option<ActiveRoom>>,
    events: broadcast::Sender<ChatMessage>,
}

impl<B: ChatBackend, R: Realtime> ChatSession<B, R> {
    pub fn new(backend: B, channel: R) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            backend,
            channel,
            view: Arc::new(Mutex::new(RoomView::default())),
            active: tokio::sync::Mutex::new(None),
            events,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn channel(&self) -> &R {
        &self.channel
    }

    pub async fn rooms(&self) -> Result<Vec<ChatRoom>, ChatError> {
        Ok(self.backend.list_rooms().await?)
    }

    /// Switches to `room`: drop the previous subscription, load history,
    /// subscribe to the room topic, mark it read. Stops at the first failing
    /// step. Concurrent calls run one after another.
    pub async fn select_room(&self, room: ChatRoom) -> Result<(), ChatError> {
        let mut active = self.active.lock().await;
        let room_id = room.id;

        if let Some(previous) = active.take() {
            previous.close();
        }
        {
            let mut view = lock_view(&self.view);
            view.room = None;
            view.messages.clear();
        }

        let history = self
            .backend
            .load_history(room_id)
            .await
            .map_err(|source| {
                tracing::warn!("Failed to load history for room {}: {}", room_id, source);
                ChatError::History { room_id, source }
            })?;

        let mut subscription = self
            .channel
            .subscribe(&room_topic(room_id))
            .map_err(|source| {
                tracing::warn!("Failed to subscribe to room {}: {}", room_id, source);
                ChatError::Subscribe { room_id, source }
            })?;

        // Inbound frames queue on the subscription until the pump starts, so
        // committing the view first loses nothing.
        {
            let mut view = lock_view(&self.view);
            view.room = Some(room);
            view.messages = history;
        }
        let pump = match subscription.take_messages() {
            Some(mut rx) => {
                let view = self.view.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    while let Some(inbound) = rx.recv().await {
                        let mut message: ChatMessage = match inbound.json() {
                            Ok(message) => message,
                            Err(e) => {
                                tracing::warn!("Ignoring malformed chat message on {}: {}", inbound.topic, e);
                                continue;
                            }
                        };
                        if message.room_id == 0 {
                            message.room_id = room_id;
                        }
                        append_inbound(&view, &events, room_id, message);
                    }
                })
            }
            None => tokio::spawn(async {}),
        };
        *active = Some(ActiveRoom {
            room_id,
            subscription,
            pump,
        });

        self.backend
            .mark_read(room_id)
            .await
            .map_err(|source| {
                tracing::warn!("Failed to mark room {} as read: {}", room_id, source);
                ChatError::MarkRead { room_id, source }
            })?;

        tracing::info!("Joined chat room {}", room_id);
        Ok(())
    }

    /// Publishes `text` to the selected room. Blank text, no selected room and
    /// a disconnected channel are rejected without publishing.
    pub fn send_message(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::BlankMessage);
        }
        let room_id = self.current_room().ok_or(ChatError::NoRoomSelected)?.id;
        if !self.channel.state().is_connected() {
            return Err(ChatError::NotConnected);
        }

        let body = serde_json::to_string(&OutgoingMessage {
            room_id,
            content: text,
        })
        .map_err(|e| ChatError::Publish {
            room_id,
            source: ChannelError::from(e),
        })?;
        self.channel
            .publish(&send_destination(room_id), body)
            .map_err(|source| ChatError::Publish { room_id, source })
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock_view(&self.view).messages.clone()
    }

    pub fn current_room(&self) -> Option<ChatRoom> {
        lock_view(&self.view).room.clone()
    }

    /// Inbound messages as they are appended to the selected room.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<ChatMessage> {
        self.events.subscribe()
    }

    pub async fn leave(&self) {
        if let Some(previous) = self.active.lock().await.take() {
            previous.close();
        }
        let mut view = lock_view(&self.view);
        view.room = None;
        view.messages.clear();
    }
}

fn append_inbound(
    view: &SharedView,
    events: &broadcast::Sender<ChatMessage>,
    room_id: i64,
    message: ChatMessage,
) {
    let mut view = lock_view(view);
    let current = view.room.as_ref().map(|r| r.id);
    if current != Some(room_id) || message.room_id != room_id {
        tracing::debug!(
            "Dropping message for room {} while viewing {:?}",
            message.room_id,
            current
        );
        return;
    }
    view.messages.push(message.clone());
    drop(view);
    let _ = events.send(message);
}
