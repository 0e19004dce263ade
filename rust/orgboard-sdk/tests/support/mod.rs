//! In-process STOMP broker for channel tests.
//!
//! Answers CONNECT with a heartbeat-free CONNECTED, tracks subscriptions per
//! connection and relays `SEND /app/chat/send/{id}` to every subscriber of
//! `/topic/chat/room/{id}`. Every client frame is recorded for assertions.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use orgboard_sdk::frame::{parse_frame, Command, Frame, Inbound};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Default)]
struct BrokerState {
    auth: Vec<Option<String>>,
    frames: Vec<Frame>,
    clients: HashMap<usize, mpsc::UnboundedSender<Message>>,
    /// (connection, subscription id) -> destination
    subscriptions: HashMap<(usize, String), String>,
}

#[derive(Clone)]
pub struct Broker {
    pub url: String,
    state: Arc<Mutex<BrokerState>>,
    accepted: Arc<AtomicUsize>,
    message_ids: Arc<AtomicU64>,
}

impl Broker {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind broker");
        let addr = listener.local_addr().expect("should have local addr");

        let broker = Broker {
            url: format!("ws://{}/ws", addr),
            state: Arc::new(Mutex::new(BrokerState::default())),
            accepted: Arc::new(AtomicUsize::new(0)),
            message_ids: Arc::new(AtomicU64::new(0)),
        };

        let accept = broker.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let conn_id = accept.accepted.fetch_add(1, Ordering::SeqCst);
                let broker = accept.clone();
                tokio::spawn(async move {
                    if let Ok(ws) = accept_async(stream).await {
                        broker.serve(conn_id, ws).await;
                    }
                });
            }
        });

        broker
    }

    async fn serve(
        &self,
        conn_id: usize,
        ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    ) {
        let (mut ws_tx, mut ws_rx) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        self.state.lock().unwrap().clients.insert(conn_id, tx.clone());

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if ws_tx.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        while let Some(Ok(msg)) = ws_rx.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let frame = match parse_frame(&text) {
                Ok(Inbound::Frame(frame)) => frame,
                _ => continue,
            };
            self.state.lock().unwrap().frames.push(frame.clone());

            match frame.command {
                Command::Connect | Command::Stomp => {
                    self.state
                        .lock()
                        .unwrap()
                        .auth
                        .push(frame.get_header("Authorization").map(str::to_string));
                    let connected = Frame::new(Command::Connected)
                        .header("version", "1.2")
                        .header("heart-beat", "0,0");
                    let _ = tx.send(Message::Text(connected.encode()));
                }
                Command::Subscribe => {
                    let id = frame.get_header("id").unwrap_or_default().to_string();
                    let destination = frame.get_header("destination").unwrap_or_default().to_string();
                    self.state
                        .lock()
                        .unwrap()
                        .subscriptions
                        .insert((conn_id, id), destination);
                }
                Command::Unsubscribe => {
                    let id = frame.get_header("id").unwrap_or_default().to_string();
                    self.state.lock().unwrap().subscriptions.remove(&(conn_id, id));
                }
                Command::Send => {
                    let destination = frame.get_header("destination").unwrap_or_default();
                    if let Some(room) = destination.strip_prefix("/app/chat/send/") {
                        self.publish(&format!("/topic/chat/room/{}", room), &frame.body);
                    }
                }
                Command::Disconnect => break,
                _ => {}
            }
        }

        let mut state = self.state.lock().unwrap();
        state.clients.remove(&conn_id);
        state.subscriptions.retain(|(conn, _), _| *conn != conn_id);
    }

    /// Delivers `body` to every live subscriber of `topic`; returns how many got it.
    pub fn publish(&self, topic: &str, body: &str) -> usize {
        let state = self.state.lock().unwrap();
        let mut delivered = 0;
        for ((conn_id, sub_id), destination) in &state.subscriptions {
            if destination != topic {
                continue;
            }
            let Some(client) = state.clients.get(conn_id) else {
                continue;
            };
            let message_id = self.message_ids.fetch_add(1, Ordering::SeqCst);
            let frame = Frame::new(Command::Message)
                .header("subscription", sub_id.as_str())
                .header("message-id", message_id.to_string())
                .header("destination", topic)
                .header("content-type", "application/json")
                .with_body(body);
            if client.send(Message::Text(frame.encode())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Closes every open connection from the server side.
    pub fn drop_connections(&self) {
        let state = self.state.lock().unwrap();
        for client in state.clients.values() {
            let _ = client.send(Message::Close(None));
        }
    }

    pub fn connection_count(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().auth.clone()
    }

    pub fn frames(&self, command: Command) -> Vec<Frame> {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    pub fn active_destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .cloned()
            .collect();
        destinations.sort();
        destinations
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
