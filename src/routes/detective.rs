//! Detective-set endpoints: lay a set, grow it, and drive the two-phase
//! target/secret resolution.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::actor;
use crate::errors::GameError;
use crate::game::detective::DetectiveType;
use crate::game::dispatcher;
use crate::model::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaySetRequest {
    pub set_type: String,
    pub card_instance_ids: Vec<i64>,
}

pub async fn play_set(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PlaySetRequest>,
) -> Result<Json<dispatcher::SetPlayed>, GameError> {
    let user_id = actor(&headers)?;
    let declared = DetectiveType::from_tag(&req.set_type.to_lowercase())
        .ok_or_else(|| GameError::Validation(format!("unknown set type {}", req.set_type)))?;
    let result =
        dispatcher::play_detective_set(&app, game_id, user_id, req.card_instance_ids, declared)
            .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AddToSetRequest {
    pub card_instance_id: i64,
    pub set_slot: i64,
}

pub async fn add_to_set(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<AddToSetRequest>,
) -> Result<Json<dispatcher::StepDone>, GameError> {
    let user_id = actor(&headers)?;
    let result =
        dispatcher::add_to_set(&app, game_id, user_id, req.card_instance_id, req.set_slot).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct DetectiveActionRequest {
    pub action_id: i64,
    #[serde(default)]
    pub target_player_id: Option<i64>,
    #[serde(default)]
    pub secret_card_instance_id: Option<i64>,
}

pub async fn action(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<DetectiveActionRequest>,
) -> Result<Json<dispatcher::StepDone>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::detective_action(
        &app,
        game_id,
        user_id,
        req.action_id,
        req.target_player_id,
        req.secret_card_instance_id,
    )
    .await?;
    Ok(Json(result))
}
