//! Room and player persistence: the lobby side of the world.

use chrono::{NaiveDate, Utc};

use super::init::DbPool;
use super::models::{PlayerRow, RoomRow, RoomStatus};
use crate::errors::GameError;

pub async fn create_room(pool: &DbPool, name: &str) -> Result<RoomRow, GameError> {
    let taken: Option<i64> = sqlx::query_scalar("SELECT room_id FROM rooms WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if taken.is_some() {
        return Err(GameError::RoomNameTaken);
    }
    let now = Utc::now();
    let res = sqlx::query("INSERT INTO rooms (name, status, created_at) VALUES (?, 'WAITING', ?)")
        .bind(name)
        .bind(now)
        .execute(pool)
        .await?;
    let room_id = res.last_insert_rowid();
    fetch_room(pool, room_id).await
}

pub async fn fetch_room(pool: &DbPool, room_id: i64) -> Result<RoomRow, GameError> {
    sqlx::query_as::<_, RoomRow>(
        "SELECT room_id, name, status, host_id, created_at FROM rooms WHERE room_id = ?",
    )
    .bind(room_id)
    .fetch_optional(pool)
    .await?
    .ok_or(GameError::RoomNotFound)
}

pub async fn set_room_status(
    pool: &DbPool,
    room_id: i64,
    status: RoomStatus,
) -> Result<(), GameError> {
    sqlx::query("UPDATE rooms SET status = ? WHERE room_id = ?")
        .bind(status.as_str())
        .bind(room_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_room_host(pool: &DbPool, room_id: i64, host_id: i64) -> Result<(), GameError> {
    sqlx::query("UPDATE rooms SET host_id = ? WHERE room_id = ?")
        .bind(host_id)
        .bind(room_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_player(
    pool: &DbPool,
    room_id: i64,
    display_name: &str,
    avatar: Option<&str>,
    birthdate: Option<NaiveDate>,
    is_host: bool,
) -> Result<PlayerRow, GameError> {
    let res = sqlx::query(
        "INSERT INTO players (room_id, display_name, avatar, birthdate, is_host, order_index) \
         VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(room_id)
    .bind(display_name)
    .bind(avatar)
    .bind(birthdate)
    .bind(is_host)
    .execute(pool)
    .await?;
    fetch_player(pool, res.last_insert_rowid()).await
}

pub async fn fetch_player(pool: &DbPool, player_id: i64) -> Result<PlayerRow, GameError> {
    sqlx::query_as::<_, PlayerRow>(
        "SELECT player_id, room_id, display_name, avatar, birthdate, is_host, order_index, \
         in_social_disgrace FROM players WHERE player_id = ?",
    )
    .bind(player_id)
    .fetch_optional(pool)
    .await?
    .ok_or(GameError::PlayerNotFound)
}

pub async fn players_of_room(pool: &DbPool, room_id: i64) -> Result<Vec<PlayerRow>, GameError> {
    let rows = sqlx::query_as::<_, PlayerRow>(
        "SELECT player_id, room_id, display_name, avatar, birthdate, is_host, order_index, \
         in_social_disgrace FROM players WHERE room_id = ? ORDER BY player_id",
    )
    .bind(room_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn delete_player(pool: &DbPool, player_id: i64) -> Result<(), GameError> {
    let res = sqlx::query("DELETE FROM players WHERE player_id = ?")
        .bind(player_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(GameError::PlayerNotFound);
    }
    Ok(())
}

pub async fn set_player_order(
    pool: &DbPool,
    player_id: i64,
    order_index: i64,
) -> Result<(), GameError> {
    sqlx::query("UPDATE players SET order_index = ? WHERE player_id = ?")
        .bind(order_index)
        .bind(player_id)
        .execute(pool)
        .await?;
    Ok(())
}
