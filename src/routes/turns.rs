//! Turn-action endpoints: draw, draft, discard, finish-turn, and the
//! three steps of And Then Was One More.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::actor;
use crate::errors::GameError;
use crate::game::dispatcher;
use crate::game::events::PlayPayload;
use crate::game::rules::RuleName;
use crate::model::AppState;

#[derive(Debug, Deserialize)]
pub struct TakeDeckRequest {
    pub quantity: i64,
}

pub async fn take_deck(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<TakeDeckRequest>,
) -> Result<Json<dispatcher::DrawnCards>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::take_deck(&app, game_id, user_id, req.quantity).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct CardRequest {
    pub card_instance_id: i64,
}

pub async fn pick_draft(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<CardRequest>,
) -> Result<Json<dispatcher::DraftPick>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::pick_draft(&app, game_id, user_id, req.card_instance_id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct DiscardRequest {
    pub card_instance_ids: Vec<i64>,
}

pub async fn discard(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<DiscardRequest>,
) -> Result<Json<dispatcher::DiscardResult>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::discard(&app, game_id, user_id, req.card_instance_ids).await?;
    Ok(Json(result))
}

pub async fn finish_turn(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<dispatcher::TurnAdvanced>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::finish_turn(&app, game_id, user_id).await?;
    Ok(Json(result))
}

pub async fn one_more_play(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<CardRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::play_event_card(
        &app,
        game_id,
        user_id,
        RuleName::AndThenWasOneMore,
        req.card_instance_id,
        PlayPayload::default(),
    )
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct SelectPlayerRequest {
    pub action_id: i64,
    pub target_player_id: i64,
}

pub async fn one_more_select_player(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<SelectPlayerRequest>,
) -> Result<Json<dispatcher::StepDone>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::one_more_select_player(
        &app,
        game_id,
        user_id,
        req.action_id,
        req.target_player_id,
    )
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct OneMoreResolveRequest {
    pub action_id: i64,
    /// "take" draws the deck top, "discard" sheds a card instead.
    pub variant: String,
    #[serde(default)]
    pub card_instance_id: Option<i64>,
}

pub async fn one_more_resolve(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<OneMoreResolveRequest>,
) -> Result<Json<dispatcher::StepDone>, GameError> {
    let user_id = actor(&headers)?;
    let result = dispatcher::one_more_resolve(
        &app,
        game_id,
        user_id,
        req.action_id,
        req.variant,
        req.card_instance_id,
    )
    .await?;
    Ok(Json(result))
}
