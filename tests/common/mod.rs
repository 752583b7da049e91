#![allow(dead_code)]
//! Shared fixtures: a three-seat game store with hand-built piles, plus a
//! booted application over an in-memory database for dispatcher tests.

use std::sync::Arc;

use deathcards::config::Config;
use deathcards::database::models::{GamePhase, Pile, PlayerRow};
use deathcards::database::{catalog, games as db_games, init, rooms as db_rooms};
use deathcards::game::setup;
use deathcards::game::store::GameStore;
use deathcards::model::AppState;

pub const ADA: i64 = 1;
pub const BRENDAN: i64 = 2;
pub const CLARA: i64 = 3;

pub fn player(player_id: i64, name: &str, order_index: i64) -> PlayerRow {
    PlayerRow {
        player_id,
        room_id: 1,
        display_name: name.to_string(),
        avatar: None,
        birthdate: None,
        is_host: player_id == ADA,
        order_index,
        in_social_disgrace: false,
    }
}

/// A three-player store with Ada's first turn open, in the PLAY phase,
/// and no cards dealt. Tests stack exactly the piles they need.
pub fn store_three() -> GameStore {
    let catalog = catalog::Catalog::builtin();
    let mut store = GameStore::new(
        1,
        1,
        vec![
            player(ADA, "Ada", 0),
            player(BRENDAN, "Brendan", 1),
            player(CLARA, "Clara", 2),
        ],
        catalog,
    );
    store.open_turn(ADA, 1);
    store.set_phase(GamePhase::Play);
    store
}

pub fn catalog_id(store: &GameStore, rule: &str) -> i64 {
    store
        .catalog
        .id_by_rule(rule)
        .unwrap_or_else(|| panic!("no catalog card with rule {rule}"))
}

/// Puts a card with the given rule tag into a player's hand.
pub fn give(store: &mut GameStore, player_id: i64, rule: &str) -> i64 {
    let card_id = catalog_id(store, rule);
    let pos = store.max_position(Pile::Hand, Some(player_id)) + 1;
    store.insert_card(card_id, Pile::Hand, Some(player_id), None, pos, true)
}

pub fn add_secret(store: &mut GameStore, player_id: i64, hidden: bool) -> i64 {
    let card_id = catalog_id(store, "secret");
    let pos = store.max_position(Pile::SecretSet, Some(player_id)) + 1;
    store.insert_card(card_id, Pile::SecretSet, Some(player_id), None, pos, hidden)
}

/// Appends `n` copies of a rule's card to the deck bottom. Returns the
/// instance ids in deck order (first = closest to the top among these).
pub fn stack_deck(store: &mut GameStore, rule: &str, n: usize) -> Vec<i64> {
    let card_id = catalog_id(store, rule);
    (0..n)
        .map(|_| {
            let pos = store.max_position(Pile::Deck, None) + 1;
            store.insert_card(card_id, Pile::Deck, None, None, pos, false)
        })
        .collect()
}

pub fn add_discard(store: &mut GameStore, rule: &str) -> i64 {
    let card_id = catalog_id(store, rule);
    let pos = store.max_position(Pile::Discard, None) + 1;
    store.insert_card(card_id, Pile::Discard, None, None, pos, false)
}

pub fn add_draft(store: &mut GameStore, rule: &str) -> i64 {
    let card_id = catalog_id(store, rule);
    let pos = store.max_position(Pile::Draft, None) + 1;
    store.insert_card(card_id, Pile::Draft, None, None, pos, false)
}

/// Boots an application over a fresh in-memory database.
pub async fn boot_app() -> Arc<AppState> {
    let pool = init::connect("sqlite::memory:").await.expect("connect");
    let catalog = catalog::seed(&pool).await.expect("seed catalog");
    AppState::new(pool, catalog, Config::default())
}

/// Creates a room with three players and installs a game whose piles the
/// closure stacks by hand. Returns (game_id, player ids in cycle order).
pub async fn install_game<F>(app: &Arc<AppState>, build: F) -> (i64, Vec<i64>)
where
    F: FnOnce(&mut GameStore),
{
    let room = db_rooms::create_room(&app.db, "test-room").await.expect("room");
    let mut players = Vec::new();
    for (idx, name) in ["Ada", "Brendan", "Clara"].iter().enumerate() {
        let mut row = db_rooms::insert_player(&app.db, room.room_id, name, None, None, idx == 0)
            .await
            .expect("player");
        row.order_index = idx as i64;
        players.push(row);
    }
    let first = players[0].player_id;
    let game_id = db_games::insert_game(&app.db, room.room_id, GamePhase::Idle, 0, first)
        .await
        .expect("game row");
    let ids: Vec<i64> = players.iter().map(|p| p.player_id).collect();
    let mut store = GameStore::new(game_id, room.room_id, players, app.catalog.clone());
    store.open_turn(first, 1);
    store.set_phase(GamePhase::Play);
    build(&mut store);
    store.persist_setup(&app.db).await.expect("persist setup");
    app.install_game(store);
    (game_id, ids)
}

/// A fully dealt random game, as the start endpoint would produce.
pub async fn install_dealt_game(app: &Arc<AppState>) -> (i64, Vec<i64>) {
    let room = db_rooms::create_room(&app.db, "dealt-room").await.expect("room");
    let mut players = Vec::new();
    for (idx, name) in ["Ada", "Brendan", "Clara"].iter().enumerate() {
        let mut row = db_rooms::insert_player(&app.db, room.room_id, name, None, None, idx == 0)
            .await
            .expect("player");
        row.order_index = idx as i64;
        players.push(row);
    }
    let first = players[0].player_id;
    let game_id = db_games::insert_game(&app.db, room.room_id, GamePhase::Idle, 0, first)
        .await
        .expect("game row");
    let ids: Vec<i64> = players.iter().map(|p| p.player_id).collect();
    let mut store = GameStore::new(game_id, room.room_id, players, app.catalog.clone());
    setup::deal(&mut store);
    store.persist_setup(&app.db).await.expect("persist setup");
    app.install_game(store);
    (game_id, ids)
}
