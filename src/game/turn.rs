//! The turn/action state machine: what step the current player is in and
//! which actions are legal right now. The legality predicate looks at the
//! phase, the actor, the hand size, any open counter window, and any
//! multi-step action that is still awaiting input.

use serde::Serialize;

use crate::constants::HAND_LIMIT;
use crate::database::models::{ActionKind, GamePhase, Pile, TurnStatus};
use crate::errors::GameError;
use crate::game::store::GameStore;

/// The action families the state machine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    Draw,
    DraftPick,
    Discard,
    FinishTurn,
    /// Event or devious card played from hand by the current player.
    PlayCard,
    PlayDetective,
    AddToSet,
    /// Not So Fast, playable by anyone while a window is open.
    PlayInstant,
}

/// Guard used by protocol-step commands, which otherwise validate against
/// the targeted action record instead of the phase.
pub fn ensure_running(store: &GameStore) -> Result<(), GameError> {
    if store.phase == GamePhase::Finished {
        return Err(GameError::GameFinished);
    }
    Ok(())
}

pub fn ensure_legal(
    store: &GameStore,
    player_id: i64,
    class: ActionClass,
) -> Result<(), GameError> {
    if store.phase == GamePhase::Finished {
        return Err(GameError::GameFinished);
    }
    store.player(player_id)?;

    let nsf_open = store.open_nsf().is_some();
    if class == ActionClass::PlayInstant {
        if !nsf_open {
            return Err(GameError::NoCounterWindow);
        }
        return Ok(());
    }

    // Everything below is initiated by the current-turn player.
    if store.current_turn_player != player_id {
        return Err(GameError::NotYourTurn);
    }
    if nsf_open {
        return Err(GameError::CounterWindowOpen);
    }
    if let Some(pending) = store.pending_protocol() {
        // Growing your own just-laid set is the one action a pending
        // detective play does not block.
        let exempt = class == ActionClass::AddToSet
            && pending.kind == ActionKind::DetectivePlay
            && pending.player_id == player_id;
        if !exempt {
            return Err(GameError::ProtocolPending);
        }
    }

    match class {
        ActionClass::Draw => {
            if store.phase != GamePhase::DrawOrDraft {
                return Err(GameError::PhaseMismatch);
            }
        }
        ActionClass::DraftPick => {
            if store.phase != GamePhase::DrawOrDraft {
                return Err(GameError::PhaseMismatch);
            }
            if store.hand_size(player_id) >= HAND_LIMIT {
                return Err(GameError::MustDiscardBeforeDraft);
            }
        }
        ActionClass::Discard => {
            // Legal during the draw step too, so a full hand can shed
            // cards before drafting.
            if !matches!(
                store.phase,
                GamePhase::DrawOrDraft | GamePhase::Play | GamePhase::EndDiscard
            ) {
                return Err(GameError::PhaseMismatch);
            }
        }
        ActionClass::FinishTurn => {
            if store.phase != GamePhase::Play {
                return Err(GameError::PhaseMismatch);
            }
            if store.hand_size(player_id) > HAND_LIMIT {
                return Err(GameError::HandLimitExceeded);
            }
        }
        ActionClass::PlayCard | ActionClass::PlayDetective | ActionClass::AddToSet => {
            if store.phase != GamePhase::Play {
                return Err(GameError::PhaseMismatch);
            }
        }
        ActionClass::PlayInstant => unreachable!("handled above"),
    }
    Ok(())
}

/// Players still in the turn rotation (not eliminated by social disgrace),
/// in cycle order.
pub fn eligible_players(store: &GameStore) -> Vec<i64> {
    store
        .players()
        .iter()
        .filter(|p| !p.in_social_disgrace)
        .map(|p| p.player_id)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RankEntry {
    pub player_id: i64,
    pub display_name: String,
    pub hidden_secrets: usize,
    pub in_social_disgrace: bool,
}

/// Final ranking: players who kept their composure, ordered by how many
/// secrets they kept hidden; the disgraced trail in cycle order.
pub fn ranking(store: &GameStore) -> Vec<RankEntry> {
    let mut entries: Vec<RankEntry> = store
        .players()
        .iter()
        .map(|p| RankEntry {
            player_id: p.player_id,
            display_name: p.display_name.clone(),
            hidden_secrets: store
                .secrets_of(p.player_id)
                .iter()
                .filter(|c| c.hidden)
                .count(),
            in_social_disgrace: p.in_social_disgrace,
        })
        .collect();
    entries.sort_by(|a, b| {
        a.in_social_disgrace
            .cmp(&b.in_social_disgrace)
            .then(b.hidden_secrets.cmp(&a.hidden_secrets))
    });
    entries
}

/// Ends the game: the running turn completes and the phase flips to
/// FINISHED. Returns the final ranking.
pub fn finish_game(store: &mut GameStore) -> Vec<RankEntry> {
    store.complete_current_turn();
    store.set_phase(GamePhase::Finished);
    ranking(store)
}

pub struct TurnAdvance {
    pub turn_number: i64,
    pub player_turn_id: i64,
    pub game_over: bool,
}

/// Completes the running turn and hands the next eligible player a fresh
/// IN_PROGRESS turn record. With fewer than two eligible players left the
/// game ends instead.
pub fn advance_turn(store: &mut GameStore) -> TurnAdvance {
    let eligible = eligible_players(store);
    if eligible.len() < 2 {
        finish_game(store);
        return TurnAdvance {
            turn_number: store.turn_number,
            player_turn_id: store.current_turn_player,
            game_over: true,
        };
    }
    let order: Vec<i64> = store.players().iter().map(|p| p.player_id).collect();
    let current_idx = order
        .iter()
        .position(|id| *id == store.current_turn_player)
        .unwrap_or(0);
    let next = (1..=order.len())
        .map(|offset| order[(current_idx + offset) % order.len()])
        .find(|id| eligible.contains(id))
        .unwrap_or(store.current_turn_player);

    store.complete_current_turn();
    let number = store.turn_number + 1;
    store.open_turn(next, number);
    store.set_phase(GamePhase::DrawOrDraft);
    TurnAdvance {
        turn_number: number,
        player_turn_id: next,
        game_over: false,
    }
}

/// Sanity checks used by the test suite: every turn list holds exactly one
/// IN_PROGRESS record while a game is running.
pub fn one_turn_in_progress(store: &GameStore) -> bool {
    store
        .turns()
        .iter()
        .filter(|t| t.status == TurnStatus::InProgress)
        .count()
        == 1
}

/// Invariant check: every instance sits in exactly one compartment and
/// positions are unique within it.
pub fn positions_consistent(store: &GameStore) -> bool {
    use std::collections::HashMap;
    let mut seen: HashMap<(Pile, Option<i64>, Option<i64>), Vec<i64>> = HashMap::new();
    for pile in [
        Pile::Deck,
        Pile::Discard,
        Pile::Draft,
        Pile::Hand,
        Pile::SecretSet,
        Pile::DetectiveSet,
        Pile::Removed,
    ] {
        for card in store.pile(pile) {
            seen.entry((card.pile, card.owner, card.set_slot))
                .or_default()
                .push(card.position);
        }
    }
    seen.values().all(|positions| {
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        sorted.windows(2).all(|w| w[0] != w[1])
    })
}
