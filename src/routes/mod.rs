//! Thin HTTP adapters: parse the request, read the actor from the
//! `user-id` header, call the dispatcher, map the error taxonomy. No game
//! logic lives here.

pub mod detective;
pub mod events;
pub mod rooms;
pub mod turns;

use std::sync::Arc;

use axum::http::{header, HeaderMap, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::GameError;
use crate::model::AppState;
use crate::ws;

/// Reads the acting player from the `user-id` header.
pub fn actor(headers: &HeaderMap) -> Result<i64, GameError> {
    headers
        .get("user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| GameError::Validation("user-id header is required".into()))
}

pub fn router(app: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/rooms", post(rooms::create))
        .route("/api/rooms/:room_id/join", post(rooms::join))
        .route("/api/rooms/:room_id/start", post(rooms::start))
        .route("/api/rooms/:room_id/leave", post(rooms::leave))
        .route("/api/games/:game_id/state", get(rooms::state))
        .route("/api/games/:game_id/take-deck", post(turns::take_deck))
        .route("/api/games/:game_id/draft/pick", post(turns::pick_draft))
        .route("/api/games/:game_id/discard", post(turns::discard))
        .route("/api/games/:game_id/finish-turn", post(turns::finish_turn))
        .route("/api/games/:game_id/one-more/play", post(turns::one_more_play))
        .route(
            "/api/games/:game_id/one-more/select-player",
            post(turns::one_more_select_player),
        )
        .route(
            "/api/games/:game_id/one-more/resolve",
            post(turns::one_more_resolve),
        )
        .route(
            "/api/games/:game_id/detective/play",
            post(detective::play_set),
        )
        .route(
            "/api/games/:game_id/detective/add-to-set",
            post(detective::add_to_set),
        )
        .route(
            "/api/games/:game_id/detective/action",
            post(detective::action),
        )
        .route(
            "/api/games/:game_id/event/delay-murderer-escape",
            post(events::delay_murderer_escape),
        )
        .route(
            "/api/games/:game_id/event/early-train-to-paddington",
            post(events::early_train_to_paddington),
        )
        .route(
            "/api/games/:game_id/event/look-into-ashes/play",
            post(events::look_into_ashes_play),
        )
        .route(
            "/api/games/:game_id/event/look-into-ashes/select",
            post(events::look_into_ashes_select),
        )
        .route(
            "/api/games/:game_id/event/cards-off-the-table",
            post(events::cards_off_the_table),
        )
        .route(
            "/api/games/:game_id/event/another-victim",
            post(events::another_victim),
        )
        .route(
            "/api/games/:game_id/event/card-trade",
            post(events::card_trade),
        )
        .route(
            "/api/games/:game_id/event/dead-card-folly/play",
            post(events::dead_card_folly_play),
        )
        .route(
            "/api/games/:game_id/event/dead-card-folly/select-card",
            post(events::dead_card_folly_select),
        )
        .route(
            "/api/games/:game_id/event/blackmailed/play",
            post(events::blackmailed_play),
        )
        .route(
            "/api/games/:game_id/event/blackmailed/give",
            post(events::blackmailed_give),
        )
        .route(
            "/api/games/:game_id/event/point-your-suspicions",
            post(events::point_your_suspicions),
        )
        .route(
            "/api/games/:game_id/event/not-so-fast/start",
            post(events::not_so_fast_start),
        )
        .route("/ws", get(ws::ws_handler));

    api.layer(
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("user-id")])
            .allow_origin(Any),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(app)
}
