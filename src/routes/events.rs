//! Event and devious card endpoints, one route per named rule.

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
pub struct PlayCardRequest {
    pub card_instance_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TargetedPlayRequest {
    pub card_instance_id: i64,
    pub target_player_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub action_id: i64,
    pub card_instance_id: i64,
}

async fn play(
    app: Arc<AppState>,
    game_id: i64,
    headers: HeaderMap,
    rule: RuleName,
    card_instance_id: i64,
    payload: PlayPayload,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    let user_id = actor(&headers)?;
    let result =
        dispatcher::play_event_card(&app, game_id, user_id, rule, card_instance_id, payload)
            .await?;
    Ok(Json(result))
}

pub async fn delay_murderer_escape(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PlayCardRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::DelayMurderersEscape,
        req.card_instance_id,
        PlayPayload::default(),
    )
    .await
}

pub async fn early_train_to_paddington(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PlayCardRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::EarlyTrainToPaddington,
        req.card_instance_id,
        PlayPayload::default(),
    )
    .await
}

pub async fn look_into_ashes_play(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PlayCardRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::LookIntoTheAshes,
        req.card_instance_id,
        PlayPayload::default(),
    )
    .await
}

pub async fn look_into_ashes_select(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<StepRequest>,
) -> Result<Json<dispatcher::StepDone>, GameError> {
    let user_id = actor(&headers)?;
    let result =
        dispatcher::ashes_select(&app, game_id, user_id, req.action_id, req.card_instance_id)
            .await?;
    Ok(Json(result))
}

pub async fn cards_off_the_table(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<TargetedPlayRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::CardsOffTheTable,
        req.card_instance_id,
        PlayPayload {
            target_player: Some(req.target_player_id),
            offered_card: None,
        },
    )
    .await
}

pub async fn another_victim(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<TargetedPlayRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::AnotherVictim,
        req.card_instance_id,
        PlayPayload {
            target_player: Some(req.target_player_id),
            offered_card: None,
        },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct CardTradeRequest {
    pub card_instance_id: i64,
    pub target_player_id: i64,
    pub offered_card_instance_id: i64,
}

pub async fn card_trade(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<CardTradeRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::CardTrade,
        req.card_instance_id,
        PlayPayload {
            target_player: Some(req.target_player_id),
            offered_card: Some(req.offered_card_instance_id),
        },
    )
    .await
}

pub async fn dead_card_folly_play(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PlayCardRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::DeadCardFolly,
        req.card_instance_id,
        PlayPayload::default(),
    )
    .await
}

pub async fn dead_card_folly_select(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<StepRequest>,
) -> Result<Json<dispatcher::StepDone>, GameError> {
    let user_id = actor(&headers)?;
    let result =
        dispatcher::folly_select(&app, game_id, user_id, req.action_id, req.card_instance_id)
            .await?;
    Ok(Json(result))
}

pub async fn blackmailed_play(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<TargetedPlayRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::Blackmailed,
        req.card_instance_id,
        PlayPayload {
            target_player: Some(req.target_player_id),
            offered_card: None,
        },
    )
    .await
}

pub async fn blackmailed_give(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<StepRequest>,
) -> Result<Json<dispatcher::StepDone>, GameError> {
    let user_id = actor(&headers)?;
    let result =
        dispatcher::blackmailed_give(&app, game_id, user_id, req.action_id, req.card_instance_id)
            .await?;
    Ok(Json(result))
}

pub async fn point_your_suspicions(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<TargetedPlayRequest>,
) -> Result<Json<dispatcher::PlayedCard>, GameError> {
    play(
        app,
        game_id,
        headers,
        RuleName::PointYourSuspicions,
        req.card_instance_id,
        PlayPayload {
            target_player: Some(req.target_player_id),
            offered_card: None,
        },
    )
    .await
}

pub async fn not_so_fast_start(
    State(app): State<Arc<AppState>>,
    Path(game_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PlayCardRequest>,
) -> Result<Json<dispatcher::CounterPlayed>, GameError> {
    let user_id = actor(&headers)?;
    let result =
        dispatcher::play_not_so_fast(&app, game_id, user_id, req.card_instance_id).await?;
    Ok(Json(result))
}
