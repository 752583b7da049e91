//! Initial deal for a fresh game: secrets face down, starting hands, the
//! face-up draft row, and the shuffled main deck.

use rand::seq::SliceRandom;

use crate::constants::{DRAFT_SLOTS, SECRETS_PER_PLAYER, STARTING_HAND};
use crate::database::models::{CardKind, GamePhase, Pile};
use crate::game::store::GameStore;

fn expanded(store: &GameStore, want_secret: bool) -> Vec<i64> {
    let mut out = Vec::new();
    for kind in [
        CardKind::Event,
        CardKind::Instant,
        CardKind::Detective,
        CardKind::Devious,
        CardKind::Secret,
    ] {
        if (kind == CardKind::Secret) != want_secret {
            continue;
        }
        for def in store.catalog.of_kind(kind) {
            for _ in 0..def.quantity {
                out.push(def.card_id);
            }
        }
    }
    out
}

/// Deals a brand new game in place. The store must already know its
/// players; the caller persists the result and opens play.
pub fn deal(store: &mut GameStore) {
    let players: Vec<i64> = store.players().iter().map(|p| p.player_id).collect();

    // Secrets are their own sub-deck; leftovers never enter play.
    let mut secrets = expanded(store, true);
    secrets.shuffle(&mut rand::rng());
    for player_id in &players {
        for pos in 0..SECRETS_PER_PLAYER {
            if let Some(card_id) = secrets.pop() {
                store.insert_card(
                    card_id,
                    Pile::SecretSet,
                    Some(*player_id),
                    None,
                    pos as i64 + 1,
                    true,
                );
            }
        }
    }
    let mut removed_pos = 0;
    for card_id in secrets {
        removed_pos += 1;
        store.insert_card(card_id, Pile::Removed, None, None, removed_pos, false);
    }

    let mut deck = expanded(store, false);
    deck.shuffle(&mut rand::rng());
    for player_id in &players {
        for pos in 0..STARTING_HAND {
            if let Some(card_id) = deck.pop() {
                store.insert_card(card_id, Pile::Hand, Some(*player_id), None, pos as i64 + 1, true);
            }
        }
    }
    for slot in 0..DRAFT_SLOTS {
        if let Some(card_id) = deck.pop() {
            store.insert_card(card_id, Pile::Draft, None, None, slot as i64 + 1, false);
        }
    }
    // Remaining cards become the deck; position 1 is the top.
    let mut deck_pos = 0;
    while let Some(card_id) = deck.pop() {
        deck_pos += 1;
        store.insert_card(card_id, Pile::Deck, None, None, deck_pos, false);
    }

    let first = players.first().copied().unwrap_or(0);
    store.open_turn(first, 1);
    store.set_phase(GamePhase::DrawOrDraft);
    // Dealing face-down secrets is not a visibility change.
    let _ = store.take_touched_secret_owners();
}
