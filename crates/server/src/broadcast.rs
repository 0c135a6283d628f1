//! Client broadcast bus
//!
//! Fan-out of call lifecycle and transcript events to connected
//! dashboards over WebSocket. Publishing never blocks the turn critical
//! path: each subscriber has a bounded queue and overflow drops the event
//! with a log line. A ping goes out every 20 seconds to keep NAT paths
//! open; subscribers that fail are removed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

const SUBSCRIBER_QUEUE_DEPTH: usize = 64;
const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Events published to connected clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    Connected,
    Disconnected,
    CallInitiated { call_id: Uuid },
    CallInProgress { call_id: Uuid },
    CallStatus { call_id: Uuid, status: String },
    CallTranscriptUpdate { call_id: Uuid, delta: String },
    Ping,
    Pong,
}

/// Non-blocking fan-out to WebSocket subscribers
pub struct BroadcastBus {
    subscribers: DashMap<Uuid, mpsc::Sender<BroadcastEvent>>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register a subscriber; returns its id and event receiver
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<BroadcastEvent>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        self.subscribers.insert(id, tx);
        tracing::debug!(target: "broadcast", subscriber = %id, "subscribed");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
        tracing::debug!(target: "broadcast", subscriber = %id, "unsubscribed");
    }

    /// Enqueue an event to every subscriber without waiting
    pub fn publish(&self, event: BroadcastEvent) {
        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        target: "broadcast",
                        subscriber = %entry.key(),
                        "queue full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(*entry.key());
                }
            }
        }
        for id in dead {
            self.unsubscribe(id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Spawn the keep-alive ping loop
    pub fn spawn_ping_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PING_INTERVAL);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                bus.publish(BroadcastEvent::Ping);
            }
        })
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler for `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut events) = state.broadcast.subscribe();
    let (mut sink, mut stream) = socket.split();

    if let Ok(text) = serde_json::to_string(&BroadcastEvent::Connected) {
        if sink.send(Message::Text(text)).await.is_err() {
            state.broadcast.unsubscribe(id);
            return;
        }
    }

    // Outbound: drain the subscriber queue into the socket.
    let bus = state.broadcast.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Inbound: tolerate client pings, stop on close.
    let bus_in = state.broadcast.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    if let Ok(BroadcastEvent::Ping) = serde_json::from_str(&text) {
                        bus_in.publish(BroadcastEvent::Pong);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    bus.unsubscribe(id);
}
