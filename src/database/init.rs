//! Connection pool setup and schema creation. The schema mirrors the
//! in-memory entities: rooms, players, the card catalog, games, and the
//! per-game card instances, turns, and action log.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

/// A type alias for the database connection pool, used throughout the
/// application to provide a consistent name for the shared handle.
pub type DbPool = Pool<Sqlite>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS rooms (
    room_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    status      TEXT NOT NULL DEFAULT 'WAITING',
    host_id     INTEGER,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS players (
    player_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id             INTEGER NOT NULL REFERENCES rooms(room_id),
    display_name        TEXT NOT NULL,
    avatar              TEXT,
    birthdate           TEXT,
    is_host             INTEGER NOT NULL DEFAULT 0,
    order_index         INTEGER NOT NULL DEFAULT 0,
    in_social_disgrace  INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS cards (
    card_id   INTEGER PRIMARY KEY,
    name      TEXT NOT NULL UNIQUE,
    kind      TEXT NOT NULL,
    rule      TEXT NOT NULL,
    quantity  INTEGER NOT NULL,
    artwork   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS games (
    game_id              INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id              INTEGER NOT NULL REFERENCES rooms(room_id),
    phase                TEXT NOT NULL,
    turn_number          INTEGER NOT NULL,
    current_turn_player  INTEGER NOT NULL,
    created_at           TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS card_instances (
    game_id      INTEGER NOT NULL,
    instance_id  INTEGER NOT NULL,
    card_id      INTEGER NOT NULL REFERENCES cards(card_id),
    pile         TEXT NOT NULL,
    owner_id     INTEGER,
    set_slot     INTEGER,
    position     INTEGER NOT NULL,
    hidden       INTEGER NOT NULL,
    PRIMARY KEY (game_id, instance_id)
);
CREATE TABLE IF NOT EXISTS turns (
    game_id     INTEGER NOT NULL,
    turn_id     INTEGER NOT NULL,
    number      INTEGER NOT NULL,
    player_id   INTEGER NOT NULL,
    status      TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    PRIMARY KEY (game_id, turn_id)
);
CREATE TABLE IF NOT EXISTS actions (
    game_id              INTEGER NOT NULL,
    action_id            INTEGER NOT NULL,
    turn_id              INTEGER NOT NULL,
    player_id            INTEGER NOT NULL,
    kind                 TEXT NOT NULL,
    name                 TEXT NOT NULL,
    result               TEXT NOT NULL,
    parent_action        INTEGER,
    triggered_by_action  INTEGER,
    selected_card        INTEGER,
    card_received        INTEGER,
    source_pile          TEXT,
    position             INTEGER,
    created_at           TEXT NOT NULL,
    PRIMARY KEY (game_id, action_id)
);
"#;

/// Connects to the database and creates the schema if it is missing.
/// In-memory databases are pinned to a single connection so every query
/// sees the same store.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    Ok(pool)
}
