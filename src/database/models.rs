//! Data structures that map to database tables, plus the small closed
//! enums stored as TEXT columns. Conversions are explicit (`as_str` /
//! `parse`) so the persisted spelling never drifts from the wire spelling.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardKind {
    Event,
    Instant,
    Detective,
    Devious,
    Secret,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Event => "EVENT",
            CardKind::Instant => "INSTANT",
            CardKind::Detective => "DETECTIVE",
            CardKind::Devious => "DEVIOUS",
            CardKind::Secret => "SECRET",
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pile {
    Deck,
    Discard,
    Draft,
    Hand,
    SecretSet,
    DetectiveSet,
    Removed,
}

impl Pile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pile::Deck => "DECK",
            Pile::Discard => "DISCARD",
            Pile::Draft => "DRAFT",
            Pile::Hand => "HAND",
            Pile::SecretSet => "SECRET_SET",
            Pile::DetectiveSet => "DETECTIVE_SET",
            Pile::Removed => "REMOVED",
        }
    }

    /// Owner-bound piles require a non-null owner on every instance.
    pub fn owner_bound(&self) -> bool {
        matches!(self, Pile::Hand | Pile::SecretSet | Pile::DetectiveSet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Idle,
    DrawOrDraft,
    Play,
    EndDiscard,
    Finished,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Idle => "IDLE",
            GamePhase::DrawOrDraft => "DRAW_OR_DRAFT",
            GamePhase::Play => "PLAY",
            GamePhase::EndDiscard => "END_DISCARD",
            GamePhase::Finished => "FINISHED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnStatus {
    InProgress,
    Completed,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::InProgress => "IN_PROGRESS",
            TurnStatus::Completed => "COMPLETED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Draw,
    Discard,
    EventCard,
    InstantPlay,
    InstantStart,
    DetectivePlay,
    DetectiveAction,
    CardExchange,
    MoveCard,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Draw => "DRAW",
            ActionKind::Discard => "DISCARD",
            ActionKind::EventCard => "EVENT_CARD",
            ActionKind::InstantPlay => "INSTANT_PLAY",
            ActionKind::InstantStart => "INSTANT_START",
            ActionKind::DetectivePlay => "DETECTIVE_PLAY",
            ActionKind::DetectiveAction => "DETECTIVE_ACTION",
            ActionKind::CardExchange => "CARD_EXCHANGE",
            ActionKind::MoveCard => "MOVE_CARD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionResult {
    Pending,
    Success,
    Cancelled,
    Continue,
}

impl ActionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionResult::Pending => "PENDING",
            ActionResult::Success => "SUCCESS",
            ActionResult::Cancelled => "CANCELLED",
            ActionResult::Continue => "CONTINUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "WAITING",
            RoomStatus::Playing => "PLAYING",
            RoomStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAITING" => Some(RoomStatus::Waiting),
            "PLAYING" => Some(RoomStatus::Playing),
            "FINISHED" => Some(RoomStatus::Finished),
            _ => None,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RoomRow {
    pub room_id: i64,
    pub name: String,
    pub status: String,
    pub host_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl RoomRow {
    pub fn status(&self) -> RoomStatus {
        RoomStatus::parse(&self.status).unwrap_or(RoomStatus::Finished)
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct PlayerRow {
    pub player_id: i64,
    pub room_id: i64,
    pub display_name: String,
    pub avatar: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub is_host: bool,
    pub order_index: i64,
    pub in_social_disgrace: bool,
}

