//! Room lifecycle: create, join, start, leave, and the reconnect snapshot.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::actor;
use crate::database::models::{GamePhase, RoomStatus};
use crate::database::{games as db_games, rooms as db_rooms};
use crate::errors::GameError;
use crate::game::projector;
use crate::game::setup;
use crate::game::store::GameStore;
use crate::model::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
}

pub async fn create(
    State(app): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), GameError> {
    if req.name.trim().is_empty() || req.display_name.trim().is_empty() {
        return Err(GameError::Validation("name and display_name are required".into()));
    }
    let room = db_rooms::create_room(&app.db, req.name.trim()).await?;
    let host = db_rooms::insert_player(
        &app.db,
        room.room_id,
        req.display_name.trim(),
        req.avatar.as_deref(),
        req.birthdate,
        true,
    )
    .await?;
    db_rooms::set_room_host(&app.db, room.room_id, host.player_id).await?;
    tracing::info!(room_id = room.room_id, host_id = host.player_id, "room created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "room_id": room.room_id, "player_id": host.player_id })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
}

pub async fn join(
    State(app): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), GameError> {
    let room = db_rooms::fetch_room(&app.db, room_id).await?;
    if room.status() != RoomStatus::Waiting {
        return Err(GameError::RoomNotWaiting);
    }
    if req.display_name.trim().is_empty() {
        return Err(GameError::Validation("display_name is required".into()));
    }
    let player = db_rooms::insert_player(
        &app.db,
        room_id,
        req.display_name.trim(),
        req.avatar.as_deref(),
        req.birthdate,
        false,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "player_id": player.player_id })),
    ))
}

pub async fn start(
    State(app): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<serde_json::Value>), GameError> {
    let user_id = actor(&headers)?;
    let room = db_rooms::fetch_room(&app.db, room_id).await?;
    if room.status() != RoomStatus::Waiting {
        return Err(GameError::RoomNotWaiting);
    }
    if room.host_id != Some(user_id) {
        return Err(GameError::NotHost);
    }
    let mut players = db_rooms::players_of_room(&app.db, room_id).await?;
    if players.len() < 2 {
        return Err(GameError::Validation("at least two players are needed".into()));
    }

    // The youngest player opens the game; joins without a birthdate go last.
    players.sort_by(|a, b| {
        b.birthdate
            .cmp(&a.birthdate)
            .then(a.player_id.cmp(&b.player_id))
    });
    for (idx, player) in players.iter_mut().enumerate() {
        player.order_index = idx as i64;
        db_rooms::set_player_order(&app.db, player.player_id, idx as i64).await?;
    }

    let first = players[0].player_id;
    let game_id =
        db_games::insert_game(&app.db, room_id, GamePhase::Idle, 0, first).await?;
    let mut store = GameStore::new(game_id, room_id, players, app.catalog.clone());
    store.ashes_horizon_secs = app.config.ashes_horizon_secs;
    setup::deal(&mut store);
    store.persist_setup(&app.db).await?;
    db_rooms::set_room_status(&app.db, room_id, RoomStatus::Playing).await?;

    let handle = app.install_game(store);
    let guard = handle.store.lock().await;
    let events = projector::snapshot_events(&guard, app.config.nsf_window);
    drop(guard);
    app.hub.deliver(room_id, events);
    tracing::info!(room_id, game_id, "game started");

    Ok((StatusCode::CREATED, Json(json!({ "game_id": game_id }))))
}

pub async fn leave(
    State(app): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GameError> {
    let user_id = actor(&headers)?;
    let room = db_rooms::fetch_room(&app.db, room_id).await?;
    if room.status() != RoomStatus::Waiting {
        return Err(GameError::RoomNotWaiting);
    }
    let players = db_rooms::players_of_room(&app.db, room_id).await?;
    if !players.iter().any(|p| p.player_id == user_id) {
        return Err(GameError::PlayerNotFound);
    }
    db_rooms::delete_player(&app.db, user_id).await?;
    Ok(Json(json!({ "left": true })))
}

/// Reconnect/polling endpoint: the public snapshot, plus the caller's
/// private view when they sit at the table.
pub async fn state(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, GameError> {
    let user_id = actor(&headers)?;
    let handle = app.game(game_id)?;
    let store = handle.store.lock().await;
    let public = projector::public_state(&store, app.config.nsf_window);
    let private = store
        .player(user_id)
        .ok()
        .map(|_| projector::private_state(&store, user_id));
    Ok(Json(json!({ "public": public, "private": private })))
}
