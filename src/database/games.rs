//! Write-through persistence for the per-game aggregates: the game row,
//! card instances, turn records, and the append-only action log. The
//! in-memory store stages changes and flushes them here inside a single
//! transaction.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use super::init::DbPool;
use crate::database::models::GamePhase;
use crate::errors::GameError;
use crate::game::store::{ActionRecord, CardInstance, TurnRecord};

pub async fn insert_game(
    pool: &DbPool,
    room_id: i64,
    phase: GamePhase,
    turn_number: i64,
    current_turn_player: i64,
) -> Result<i64, GameError> {
    let res = sqlx::query(
        "INSERT INTO games (room_id, phase, turn_number, current_turn_player, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(room_id)
    .bind(phase.as_str())
    .bind(turn_number)
    .bind(current_turn_player)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

pub async fn update_game(
    tx: &mut Transaction<'_, Sqlite>,
    game_id: i64,
    phase: GamePhase,
    turn_number: i64,
    current_turn_player: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE games SET phase = ?, turn_number = ?, current_turn_player = ? WHERE game_id = ?",
    )
    .bind(phase.as_str())
    .bind(turn_number)
    .bind(current_turn_player)
    .bind(game_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn insert_card_instance(
    tx: &mut Transaction<'_, Sqlite>,
    game_id: i64,
    card: &CardInstance,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO card_instances \
         (game_id, instance_id, card_id, pile, owner_id, set_slot, position, hidden) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(game_id)
    .bind(card.id)
    .bind(card.card_id)
    .bind(card.pile.as_str())
    .bind(card.owner)
    .bind(card.set_slot)
    .bind(card.position)
    .bind(card.hidden)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn update_card_instance(
    tx: &mut Transaction<'_, Sqlite>,
    game_id: i64,
    card: &CardInstance,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE card_instances SET card_id = ?, pile = ?, owner_id = ?, set_slot = ?, \
         position = ?, hidden = ? WHERE game_id = ? AND instance_id = ?",
    )
    .bind(card.card_id)
    .bind(card.pile.as_str())
    .bind(card.owner)
    .bind(card.set_slot)
    .bind(card.position)
    .bind(card.hidden)
    .bind(game_id)
    .bind(card.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn insert_turn(
    tx: &mut Transaction<'_, Sqlite>,
    game_id: i64,
    turn: &TurnRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO turns (game_id, turn_id, number, player_id, status, started_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(game_id)
    .bind(turn.id)
    .bind(turn.number)
    .bind(turn.player_id)
    .bind(turn.status.as_str())
    .bind(turn.started_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn update_turn(
    tx: &mut Transaction<'_, Sqlite>,
    game_id: i64,
    turn: &TurnRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE turns SET status = ? WHERE game_id = ? AND turn_id = ?")
        .bind(turn.status.as_str())
        .bind(game_id)
        .bind(turn.id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_action(
    tx: &mut Transaction<'_, Sqlite>,
    game_id: i64,
    action: &ActionRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO actions (game_id, action_id, turn_id, player_id, kind, name, result, \
         parent_action, triggered_by_action, selected_card, card_received, source_pile, \
         position, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(game_id)
    .bind(action.id)
    .bind(action.turn_id)
    .bind(action.player_id)
    .bind(action.kind.as_str())
    .bind(&action.name)
    .bind(action.result.as_str())
    .bind(action.parent_action)
    .bind(action.triggered_by_action)
    .bind(action.selected_card)
    .bind(action.card_received)
    .bind(action.source_pile.map(|p| p.as_str()))
    .bind(action.position)
    .bind(action.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn update_action(
    tx: &mut Transaction<'_, Sqlite>,
    game_id: i64,
    action: &ActionRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE actions SET result = ?, selected_card = ?, card_received = ? \
         WHERE game_id = ? AND action_id = ?",
    )
    .bind(action.result.as_str())
    .bind(action.selected_card)
    .bind(action.card_received)
    .bind(game_id)
    .bind(action.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn update_player_disgrace(
    tx: &mut Transaction<'_, Sqlite>,
    player_id: i64,
    in_social_disgrace: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE players SET in_social_disgrace = ? WHERE player_id = ?")
        .bind(in_social_disgrace)
        .bind(player_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
