use crate::frame::Frame;
use futures_util::Stream;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub body: String,
}

impl InboundMessage {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

pub type MessageReceiver = mpsc::UnboundedReceiver<InboundMessage>;

struct TopicEntry {
    wire_id: String,
    listeners: HashMap<u64, mpsc::UnboundedSender<InboundMessage>>,
}

/// Reference-counted topic subscriptions. One wire subscription exists per
/// topic no matter how many local listeners share it.
#[derive(Default)]
pub struct SubscriptionRegistry {
    topics: HashMap<String, TopicEntry>,
    next_wire_id: u64,
    next_listener_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. Returns its id and, for the first listener of a
    /// topic, the wire id that still has to be subscribed.
    pub fn add(
        &mut self,
        topic: &str,
        tx: mpsc::UnboundedSender<InboundMessage>,
    ) -> (u64, Option<String>) {
        let listener_id = self.next_listener_id;
        self.next_listener_id += 1;

        if let Some(entry) = self.topics.get_mut(topic) {
            entry.listeners.insert(listener_id, tx);
            return (listener_id, None);
        }

        let wire_id = format!("sub-{}", self.next_wire_id);
        self.next_wire_id += 1;
        let mut listeners = HashMap::new();
        listeners.insert(listener_id, tx);
        self.topics.insert(
            topic.to_string(),
            TopicEntry {
                wire_id: wire_id.clone(),
                listeners,
            },
        );
        (listener_id, Some(wire_id))
    }

    /// Drops a listener. Returns the wire id to unsubscribe when it was the last one.
    pub fn remove(&mut self, topic: &str, listener_id: u64) -> Option<String> {
        let entry = self.topics.get_mut(topic)?;
        entry.listeners.remove(&listener_id);
        if entry.listeners.is_empty() {
            return self.topics.remove(topic).map(|e| e.wire_id);
        }
        None
    }

    /// Routes a message by wire id, falling back to the destination topic.
    /// Returns how many listeners received it.
    pub fn dispatch(&mut self, wire_id: Option<&str>, destination: &str, body: &str) -> usize {
        let topic = match wire_id {
            Some(id) => self
                .topics
                .iter()
                .find(|(_, e)| e.wire_id == id)
                .map(|(topic, _)| topic.clone()),
            None => None,
        }
        .unwrap_or_else(|| destination.to_string());

        let Some(entry) = self.topics.get_mut(&topic) else {
            return 0;
        };

        let message = InboundMessage {
            topic: topic.clone(),
            body: body.to_string(),
        };
        entry
            .listeners
            .retain(|_, tx| tx.send(message.clone()).is_ok());
        entry.listeners.len()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |e| e.listeners.len())
    }

    /// `(topic, wire_id)` pairs to replay after a reconnect.
    pub fn wire_subscriptions(&self) -> Vec<(String, String)> {
        self.topics
            .iter()
            .map(|(topic, e)| (topic.clone(), e.wire_id.clone()))
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }
}

pub(crate) type SharedRegistry = Arc<Mutex<SubscriptionRegistry>>;

pub(crate) fn lock(registry: &SharedRegistry) -> std::sync::MutexGuard<'_, SubscriptionRegistry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Where UNSUBSCRIBE frames go once the last listener of a topic leaves.
pub(crate) type FrameSink = Arc<dyn Fn(Frame) + Send + Sync>;

struct Release {
    registry: SharedRegistry,
    sink: FrameSink,
    listener_id: u64,
}

/// Handle to a live topic subscription. Dropping it unsubscribes.
pub struct Subscription {
    topic: String,
    messages: Option<MessageReceiver>,
    release: Option<Release>,
}

impl Subscription {
    pub(crate) fn register(registry: &SharedRegistry, topic: &str, sink: FrameSink) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (listener_id, new_wire_id) = lock(registry).add(topic, tx);
        if let Some(wire_id) = new_wire_id {
            sink(Frame::subscribe(&wire_id, topic));
        }
        Self {
            topic: topic.to_string(),
            messages: Some(rx),
            release: Some(Release {
                registry: registry.clone(),
                sink,
                listener_id,
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the subscription is released or its stream was taken.
    pub async fn next_message(&mut self) -> Option<InboundMessage> {
        self.messages.as_mut()?.recv().await
    }

    /// Detaches the inbound stream so it can be consumed elsewhere while this
    /// handle keeps the subscription alive.
    pub fn take_messages(&mut self) -> Option<MessageReceiver> {
        self.messages.take()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        let wire_id = lock(&release.registry).remove(&self.topic, release.listener_id);
        if let Some(wire_id) = wire_id {
            tracing::debug!("Unsubscribing {} ({})", self.topic, wire_id);
            (release.sink)(Frame::unsubscribe(&wire_id));
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.release.is_some())
            .finish()
    }
}

impl Stream for Subscription {
    type Item = InboundMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.messages.as_mut() {
            Some(rx) => rx.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}
