//! WebSocket subscriptions: one channel per room, per-subscriber FIFO
//! delivery over an unbounded sender, best-effort fan-out. A dropped
//! subscriber only loses its own frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::database::rooms as db_rooms;
use crate::game::projector::{self, Outbound, ServerEvent};
use crate::model::AppState;

struct Subscriber {
    id: u64,
    user_id: i64,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Registry of live subscribers keyed by room id.
#[derive(Default)]
pub struct Hub {
    next_id: AtomicU64,
    rooms: DashMap<i64, Vec<Subscriber>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        room_id: i64,
        user_id: i64,
    ) -> (u64, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.rooms
            .entry(room_id)
            .or_default()
            .push(Subscriber { id, user_id, tx });
        (id, rx)
    }

    pub fn unsubscribe(&self, room_id: i64, subscriber_id: u64) {
        if let Some(mut subs) = self.rooms.get_mut(&room_id) {
            subs.retain(|s| s.id != subscriber_id);
        }
    }

    pub fn send_room(&self, room_id: i64, event: &ServerEvent) {
        if let Some(subs) = self.rooms.get(&room_id) {
            for sub in subs.iter() {
                let _ = sub.tx.send(event.clone());
            }
        }
    }

    pub fn send_player(&self, room_id: i64, player_id: i64, event: &ServerEvent) {
        if let Some(subs) = self.rooms.get(&room_id) {
            for sub in subs.iter().filter(|s| s.user_id == player_id) {
                let _ = sub.tx.send(event.clone());
            }
        }
    }

    /// Routes a batch produced by the engine. Delivery failures are the
    /// subscriber's problem, never the game's.
    pub fn deliver(&self, room_id: i64, events: Vec<Outbound>) {
        for event in events {
            match event {
                Outbound::Room(ev) => self.send_room(room_id, &ev),
                Outbound::Player(player_id, ev) => self.send_player(room_id, player_id, &ev),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: i64,
    pub room_id: i64,
}

pub async fn ws_handler(
    State(app): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(app, socket, params.user_id, params.room_id))
}

async fn handle_socket(app: Arc<AppState>, socket: WebSocket, user_id: i64, room_id: i64) {
    let (mut sink, mut stream) = socket.split();

    // Subscription attempts fail with a typed frame, not a dropped socket.
    if let Err(code) = check_membership(&app, user_id, room_id).await {
        let frame = ServerEvent::Error {
            code: code.to_string(),
            message: "subscription rejected".to_string(),
        };
        if let Ok(text) = serde_json::to_string(&frame) {
            let _ = sink.send(Message::Text(text)).await;
        }
        let _ = sink.close().await;
        return;
    }

    let (subscriber_id, mut rx) = app.hub.subscribe(room_id, user_id);
    tracing::info!(user_id, room_id, "subscriber joined game channel");
    app.hub
        .send_room(room_id, &ServerEvent::Connected { user_id, room_id });

    // Late joiners get a full snapshot immediately.
    if let Some(handle) = app.game_by_room(room_id) {
        let store = handle.store.lock().await;
        let public = ServerEvent::EstadoPartida {
            state: projector::public_state(&store, app.config.nsf_window),
        };
        let private = ServerEvent::EstadosPrivados {
            state: projector::private_state(&store, user_id),
        };
        drop(store);
        for frame in [public, private] {
            if let Ok(text) = serde_json::to_string(&frame) {
                let _ = sink.send(Message::Text(text)).await;
            }
        }
    }

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // The receive side only watches for the close; actions go over HTTP.
    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    app.hub.unsubscribe(room_id, subscriber_id);
    writer.abort();
    app.hub
        .send_room(room_id, &ServerEvent::Disconnected { user_id });
    tracing::info!(user_id, room_id, "subscriber left game channel");
}

async fn check_membership(
    app: &Arc<AppState>,
    user_id: i64,
    room_id: i64,
) -> Result<(), &'static str> {
    if db_rooms::fetch_room(&app.db, room_id).await.is_err() {
        return Err("room_not_found");
    }
    match db_rooms::players_of_room(&app.db, room_id).await {
        Ok(players) if players.iter().any(|p| p.player_id == user_id) => Ok(()),
        Ok(_) => Err("player_not_found"),
        Err(_) => Err("internal_error"),
    }
}
