//! The error taxonomy shared by the rules engine and the HTTP surface.
//! Every variant carries a stable string code; each family maps to exactly
//! one HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    // Validation family (400).
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("card is not in the expected pile or hand")]
    WrongCard,
    #[error("wrong step for this protocol")]
    WrongStep,
    #[error("referenced action is not pending")]
    ActionNotPending,
    #[error("referenced action has expired")]
    ActionExpired,
    #[error("the deck is empty")]
    DeckEmpty,

    // Turn-order / permission family (403).
    #[error("it is not this player's turn")]
    NotYourTurn,
    #[error("only the host may do this")]
    NotHost,
    #[error("hand is above the limit, discard first")]
    MustDiscardBeforeDraft,
    #[error("hand is above the limit")]
    HandLimitExceeded,
    #[error("the current phase does not allow this action")]
    PhaseMismatch,
    #[error("a counter window is open")]
    CounterWindowOpen,
    #[error("no counter window is open")]
    NoCounterWindow,
    #[error("a multi-step action is awaiting input")]
    ProtocolPending,
    #[error("target player is not eligible")]
    IneligibleTarget,

    // Not-found family (404).
    #[error("room not found")]
    RoomNotFound,
    #[error("game not found")]
    GameNotFound,
    #[error("card not found")]
    CardNotFound,
    #[error("player not found")]
    PlayerNotFound,
    #[error("action not found")]
    ActionNotFound,

    // Lifecycle family (409).
    #[error("room name is already taken")]
    RoomNameTaken,
    #[error("room is not waiting for players")]
    RoomNotWaiting,
    #[error("game has not started")]
    GameNotStarted,
    #[error("game is already finished")]
    GameFinished,

    // Internal family (500).
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl GameError {
    /// Stable code returned in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "validation_error",
            GameError::WrongCard => "wrong_card",
            GameError::WrongStep => "wrong_step",
            GameError::ActionNotPending => "action_not_pending",
            GameError::ActionExpired => "action_expired",
            GameError::DeckEmpty => "deck_empty",
            GameError::NotYourTurn => "not_your_turn",
            GameError::NotHost => "not_host",
            GameError::MustDiscardBeforeDraft => "must_discard_before_draft",
            GameError::HandLimitExceeded => "hand_limit_exceeded",
            GameError::PhaseMismatch => "phase_mismatch",
            GameError::CounterWindowOpen => "counter_window_open",
            GameError::NoCounterWindow => "no_counter_window",
            GameError::ProtocolPending => "protocol_pending",
            GameError::IneligibleTarget => "ineligible_target",
            GameError::RoomNotFound => "room_not_found",
            GameError::GameNotFound => "game_not_found",
            GameError::CardNotFound => "card_not_found",
            GameError::PlayerNotFound => "player_not_found",
            GameError::ActionNotFound => "action_not_found",
            GameError::RoomNameTaken => "room_name_taken",
            GameError::RoomNotWaiting => "room_not_waiting",
            GameError::GameNotStarted => "game_not_started",
            GameError::GameFinished => "game_finished",
            GameError::Db(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GameError::Validation(_)
            | GameError::WrongCard
            | GameError::WrongStep
            | GameError::ActionNotPending
            | GameError::ActionExpired
            | GameError::DeckEmpty => StatusCode::BAD_REQUEST,
            GameError::NotYourTurn
            | GameError::NotHost
            | GameError::MustDiscardBeforeDraft
            | GameError::HandLimitExceeded
            | GameError::PhaseMismatch
            | GameError::CounterWindowOpen
            | GameError::NoCounterWindow
            | GameError::ProtocolPending
            | GameError::IneligibleTarget => StatusCode::FORBIDDEN,
            GameError::RoomNotFound
            | GameError::GameNotFound
            | GameError::CardNotFound
            | GameError::PlayerNotFound
            | GameError::ActionNotFound => StatusCode::NOT_FOUND,
            GameError::RoomNameTaken
            | GameError::RoomNotWaiting
            | GameError::GameNotStarted
            | GameError::GameFinished => StatusCode::CONFLICT,
            GameError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        if let GameError::Db(ref e) = self {
            tracing::error!(error = %e, "database failure surfaced to a request");
        }
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
