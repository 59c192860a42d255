//! Subscription hub: agent UI WebSocket server and room registry.
//!
//! Each process instance is one hub, identified by a session-unique id.
//! While a connection is in a room, the broker holds a routing entry
//! `room -> hub_id`, so events for that conversation reach this hub's
//! subscription (see `subscriber`) and fan out to the room.

use crate::auth::check_jwt;
use crate::protocol::{AuthHandshake, RoomAck, UiClientMessage, unauthenticated_event};
use assist_broker::{Broker, strip_location};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long a fresh connection has to present its auth handshake.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Session-unique hub identifier: a random scalar joined with a wall-clock
/// timestamp.  Never persisted; stale routing entries from dead hubs are
/// overwritten by the next join.
pub fn generate_hub_id() -> String {
    let scalar: f64 = rand::random::<f64>() * 322_321.0;
    format!("{scalar}-{}", chrono::Utc::now().timestamp_micros())
}

#[derive(Clone)]
struct ConnectionHandle {
    tx: mpsc::UnboundedSender<String>,
}

#[derive(Clone)]
pub struct HubState {
    pub hub_id: String,
    pub jwt_secret: String,
    pub broker: Arc<dyn Broker>,
    connections: Arc<RwLock<HashMap<Uuid, ConnectionHandle>>>,
    rooms: Arc<RwLock<HashMap<String, HashSet<Uuid>>>>,
}

impl HubState {
    pub fn new(hub_id: String, jwt_secret: String, broker: Arc<dyn Broker>) -> Self {
        HubState {
            hub_id,
            jwt_secret,
            broker,
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn register(&self, conn_id: Uuid, tx: mpsc::UnboundedSender<String>) {
        self.connections
            .write()
            .await
            .insert(conn_id, ConnectionHandle { tx });
    }

    async fn unregister(&self, conn_id: Uuid) {
        self.connections.write().await.remove(&conn_id);
    }

    async fn join_room(&self, room: &str, conn_id: Uuid) {
        self.rooms
            .write()
            .await
            .entry(room.to_owned())
            .or_default()
            .insert(conn_id);
    }

    async fn leave_room(&self, room: &str, conn_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Remove the connection from every room and return the rooms it was in.
    async fn drain_rooms(&self, conn_id: Uuid) -> Vec<String> {
        let mut rooms = self.rooms.write().await;
        let mut left = Vec::new();
        rooms.retain(|room, members| {
            if members.remove(&conn_id) {
                left.push(room.clone());
            }
            !members.is_empty()
        });
        left
    }

    /// Emit a payload to every member of one room.
    pub async fn emit_to_room(&self, room: &str, payload: &str) {
        let members = match self.rooms.read().await.get(room) {
            Some(members) => members.iter().copied().collect::<Vec<_>>(),
            None => return,
        };
        let connections = self.connections.read().await;
        for conn_id in members {
            if let Some(handle) = connections.get(&conn_id) {
                let _ = handle.tx.send(payload.to_owned());
            }
        }
    }

    /// Emit a payload to every authenticated connection on the hub.
    pub async fn broadcast(&self, payload: &str) {
        let connections = self.connections.read().await;
        for handle in connections.values() {
            let _ = handle.tx.send(payload.to_owned());
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

pub async fn ws_ui_handler(
    ws: WebSocketUpgrade,
    State(state): State<HubState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ui_socket(socket, state))
}

async fn handle_ui_socket(mut socket: WebSocket, state: HubState) {
    if !authenticate(&mut socket, &state).await {
        let _ = socket
            .send(Message::Text(unauthenticated_event().into()))
            .await;
        return;
    }

    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.register(conn_id, tx).await;
    info!(conn_id = %conn_id, "agent UI connected");

    loop {
        tokio::select! {
            Some(payload) = rx.recv() => {
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_action(&mut socket, &state, conn_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "websocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Disconnects are the normal reclaim path for routing entries.
    for room in state.drain_rooms(conn_id).await {
        if let Err(e) = state.broker.delete(&room).await {
            warn!(room = %room, error = %e, "routing entry cleanup failed");
        }
    }
    state.unregister(conn_id).await;
    info!(conn_id = %conn_id, "agent UI disconnected");
}

/// First frame must be the auth handshake; anything else refuses the session.
async fn authenticate(socket: &mut WebSocket, state: &HubState) -> bool {
    let frame = match tokio::time::timeout(AUTH_TIMEOUT, socket.recv()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        _ => {
            warn!("no auth handshake received");
            return false;
        }
    };
    let handshake: AuthHandshake = match serde_json::from_str(&frame) {
        Ok(handshake) => handshake,
        Err(e) => {
            warn!(error = %e, "malformed auth handshake");
            return false;
        }
    };
    match check_jwt(&handshake.auth.token, &state.jwt_secret) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "token rejected");
            false
        }
    }
}

async fn handle_action(socket: &mut WebSocket, state: &HubState, conn_id: Uuid, text: &str) {
    let action: UiClientMessage = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "unrecognized client message");
            return;
        }
    };

    match action {
        UiClientMessage::JoinConversation { conversation_name } => {
            let room = strip_location(&conversation_name);
            state.join_room(&room, conn_id).await;
            if let Err(e) = state.broker.set(&room, &state.hub_id).await {
                warn!(room = %room, error = %e, "routing entry write failed");
            }
            info!(conn_id = %conn_id, room = %room, "joined conversation");
            send_ack(socket, "join-conversation", &room).await;
        }
        UiClientMessage::LeaveConversation { conversation_name } => {
            let room = strip_location(&conversation_name);
            state.leave_room(&room, conn_id).await;
            if let Err(e) = state.broker.delete(&room).await {
                warn!(room = %room, error = %e, "routing entry delete failed");
            }
            info!(conn_id = %conn_id, room = %room, "left conversation");
            send_ack(socket, "leave-conversation", &room).await;
        }
    }
}

async fn send_ack(socket: &mut WebSocket, event: &str, room: &str) {
    let ack = RoomAck {
        event,
        ok: true,
        conversation_name: room,
    };
    match serde_json::to_string(&ack) {
        Ok(json) => {
            let _ = socket.send(Message::Text(json.into())).await;
        }
        Err(e) => debug!(error = %e, "ack serialization failed"),
    }
}
