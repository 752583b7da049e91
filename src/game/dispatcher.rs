//! The command layer: every card action enters here, runs under the
//! per-game lock on a staged clone of the store, commits in one
//! transaction, and only then fans out the derivator and the projector.
//! A failed flush drops the clone, so memory never diverges from the
//! database.

use std::sync::Arc;

use serde::Serialize;

use crate::constants::{DRAW_MAX, PADDINGTON_BURN};
use crate::database::models::{ActionKind, ActionResult, GamePhase, Pile, RoomStatus};
use crate::database::rooms as db_rooms;
use crate::errors::GameError;
use crate::game::detective::{self, DetectiveType};
use crate::game::disgrace;
use crate::game::events::{self, PlayPayload};
use crate::game::nsf;
use crate::game::projector::{self, CardView, Outbound, ServerEvent};
use crate::game::rules::RuleName;
use crate::game::store::{ActionDraft, GameStore};
use crate::game::turn::{self, ActionClass};
use crate::model::{AppState, GameHandle, NsfTimer};

/// What a command closure hands back besides its HTTP payload.
pub struct CommandOutput<T> {
    pub value: T,
    pub events: Vec<Outbound>,
    /// `(x, y)` when a counter window was opened and a timer must be armed.
    pub arm_window: Option<(i64, i64)>,
    pub game_over: bool,
}

impl<T> CommandOutput<T> {
    pub fn new(value: T, events: Vec<Outbound>) -> Self {
        Self {
            value,
            events,
            arm_window: None,
            game_over: false,
        }
    }
}

/// Runs one command: lock, stage, validate+mutate, flush, derivator pass,
/// swap the stage in, then notify. The post-commit side never undoes the
/// committed mutation.
pub async fn run<T, F>(
    app: &Arc<AppState>,
    game_id: i64,
    trigger: &'static str,
    f: F,
) -> Result<T, GameError>
where
    F: FnOnce(&mut GameStore) -> Result<CommandOutput<T>, GameError>,
{
    let handle = app.game(game_id)?;
    let mut guard = handle.store.lock().await;
    let mut stage = guard.clone();
    let CommandOutput {
        value,
        mut events,
        arm_window,
        game_over,
    } = f(&mut stage)?;
    stage.flush(&app.db).await?;

    let owners = stage.take_touched_secret_owners();
    if !owners.is_empty() {
        events.extend(disgrace::recompute(&mut stage, &owners, trigger));
        stage.flush(&app.db).await?;
    }

    *guard = stage;
    events.extend(projector::snapshot_events(&guard, app.config.nsf_window));
    let room_id = guard.room_id;
    drop(guard);

    if let Some((x_id, y_id)) = arm_window {
        arm_timer(app, &handle, x_id, y_id);
    }
    if game_over {
        handle.disarm_timer();
        if let Err(e) =
            db_rooms::set_room_status(&app.db, room_id, RoomStatus::Finished).await
        {
            tracing::warn!(room_id, error = %e, "could not mark the room finished");
        }
    }
    app.hub.deliver(room_id, events);
    Ok(value)
}

/// Arms the game's window timer. Arming is idempotent on the deferred
/// action; a stale timer for a different action is replaced.
fn arm_timer(app: &Arc<AppState>, handle: &Arc<GameHandle>, x_id: i64, y_id: i64) {
    let mut slot = handle.timer.lock().expect("timer mutex poisoned");
    if let Some(timer) = slot.as_ref() {
        if timer.x_id == x_id {
            return;
        }
        timer.handle.abort();
    }
    let app = app.clone();
    let game_id = handle.game_id;
    let window = app.config.nsf_window;
    let task = tokio::spawn(async move {
        tokio::time::sleep(window).await;
        if let Err(e) = resolve_window(&app, game_id, y_id).await {
            tracing::warn!(game_id, y_id, error = %e, "counter window resolution failed");
        }
        if let Ok(handle) = app.game(game_id) {
            let mut slot = handle.timer.lock().expect("timer mutex poisoned");
            if slot.as_ref().map(|t| t.x_id) == Some(x_id) {
                *slot = None;
            }
        }
    });
    *slot = Some(NsfTimer { x_id, handle: task });
}

/// Timer expiry path. Re-reads the opening action under the lock; a
/// no-longer-pending record makes the firing a no-op.
pub async fn resolve_window(
    app: &Arc<AppState>,
    game_id: i64,
    y_id: i64,
) -> Result<(), GameError> {
    run(app, game_id, "nsf_resolution", |store| {
        match nsf::resolve(store, y_id)? {
            Some(resolution) => Ok(CommandOutput::new((), resolution.events)),
            None => Ok(CommandOutput::new((), Vec::new())),
        }
    })
    .await
}

// ---- turn commands ----------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DrawnCards {
    pub action_id: i64,
    pub drawn: Vec<CardView>,
}

pub async fn take_deck(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    quantity: i64,
) -> Result<DrawnCards, GameError> {
    run(app, game_id, "take_deck", move |store| {
        turn::ensure_legal(store, player_id, ActionClass::Draw)?;
        if !(1..=DRAW_MAX).contains(&quantity) {
            return Err(GameError::Validation(format!(
                "quantity must be between 1 and {DRAW_MAX}"
            )));
        }
        if store.deck_size() == 0 {
            return Err(GameError::DeckEmpty);
        }
        let ids = store.deck_top(quantity as usize);
        let action_id = store.append_action(
            ActionDraft::new(player_id, ActionKind::Draw, "draw").result(ActionResult::Success),
        );
        for id in &ids {
            let pos = store.max_position(Pile::Hand, Some(player_id)) + 1;
            store.move_card(*id, Pile::Hand, Some(player_id), None, pos, true)?;
            store.append_action(
                ActionDraft::new(player_id, ActionKind::MoveCard, "draw")
                    .parent(action_id)
                    .selected(*id)
                    .source(Pile::Deck)
                    .at_position(pos)
                    .result(ActionResult::Success),
            );
        }
        store.set_phase(GamePhase::Play);
        let drawn = ids.iter().map(|id| projector::card_view(store, *id)).collect();
        let events = vec![Outbound::Room(ServerEvent::CardDrawnSimple {
            player_id,
            count: ids.len(),
        })];
        Ok(CommandOutput::new(DrawnCards { action_id, drawn }, events))
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct DraftPick {
    pub action_id: i64,
    pub picked: CardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replenished: Option<CardView>,
    pub game_over: bool,
}

pub async fn pick_draft(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    instance_id: i64,
) -> Result<DraftPick, GameError> {
    run(app, game_id, "draft_pick", move |store| {
        turn::ensure_legal(store, player_id, ActionClass::DraftPick)?;
        let card = store.card(instance_id)?;
        if card.pile != Pile::Draft {
            return Err(GameError::WrongCard);
        }
        let slot_position = card.position;

        let pos = store.max_position(Pile::Hand, Some(player_id)) + 1;
        store.move_card(instance_id, Pile::Hand, Some(player_id), None, pos, true)?;
        let action_id = store.append_action(
            ActionDraft::new(player_id, ActionKind::Draw, "draft_pick")
                .selected(instance_id)
                .source(Pile::Draft)
                .result(ActionResult::Success),
        );

        // The emptied slot refills from the deck top; with the deck gone
        // the draft shrinks, and draining it ends the round.
        let replacement = store.deck_top(1).first().copied();
        let mut game_over = false;
        let mut events = vec![Outbound::Room(ServerEvent::CardDrawnSimple {
            player_id,
            count: 1,
        })];
        match replacement {
            Some(top) => {
                store.move_card(top, Pile::Draft, None, None, slot_position, false)?;
            }
            None => {
                store.renumber(Pile::Draft, None, None);
                if store.pile(Pile::Draft).is_empty() {
                    let ranking = turn::finish_game(store);
                    events.push(Outbound::Room(ServerEvent::GameFinished { ranking }));
                    game_over = true;
                }
            }
        }
        if !game_over {
            store.set_phase(GamePhase::Play);
        }

        let picked = projector::card_view(store, instance_id);
        let replenished = replacement.map(|id| projector::card_view(store, id));
        let mut out = CommandOutput::new(
            DraftPick {
                action_id,
                picked,
                replenished,
                game_over,
            },
            events,
        );
        out.game_over = game_over;
        Ok(out)
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct DiscardResult {
    pub action_id: i64,
    pub discarded: usize,
}

pub async fn discard(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    instance_ids: Vec<i64>,
) -> Result<DiscardResult, GameError> {
    run(app, game_id, "discard", move |store| {
        turn::ensure_legal(store, player_id, ActionClass::Discard)?;
        if instance_ids.is_empty() {
            return Err(GameError::Validation("nothing to discard".into()));
        }
        let mut unique = instance_ids.clone();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != instance_ids.len() {
            return Err(GameError::Validation("duplicate card in discard".into()));
        }
        let cards = store.cards_by_ids(&instance_ids)?;
        if cards
            .iter()
            .any(|c| c.pile != Pile::Hand || c.owner != Some(player_id))
        {
            return Err(GameError::WrongCard);
        }

        let action_id = store.append_action(
            ActionDraft::new(player_id, ActionKind::Discard, "discard")
                .result(ActionResult::Success),
        );
        let mut events = Vec::new();
        // Children mirror the input order exactly.
        for id in &instance_ids {
            if RuleName::of_instance(store, *id) == Some(RuleName::EarlyTrainToPaddington) {
                // The train leaves the game entirely and burns the deck.
                let removed_pos = store.max_position(Pile::Removed, None) + 1;
                store.move_card(*id, Pile::Removed, None, None, removed_pos, false)?;
                store.append_action(
                    ActionDraft::new(player_id, ActionKind::MoveCard, "discard")
                        .parent(action_id)
                        .selected(*id)
                        .source(Pile::Hand)
                        .result(ActionResult::Success),
                );
                let moved = events::burn_deck_to_discard(store, player_id, action_id, PADDINGTON_BURN)?;
                events.push(Outbound::Room(ServerEvent::EventActionComplete {
                    action_id,
                    card_name: "Early Train to Paddington".to_string(),
                    moved: Some(moved),
                }));
            } else {
                let top = store.max_position(Pile::Discard, None) + 1;
                store.move_card(*id, Pile::Discard, None, None, top, false)?;
                store.append_action(
                    ActionDraft::new(player_id, ActionKind::MoveCard, "discard")
                        .parent(action_id)
                        .selected(*id)
                        .source(Pile::Hand)
                        .result(ActionResult::Success),
                );
            }
        }
        Ok(CommandOutput::new(
            DiscardResult {
                action_id,
                discarded: instance_ids.len(),
            },
            events,
        ))
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct TurnAdvanced {
    pub turn_number: i64,
    pub player_turn_id: i64,
    pub game_over: bool,
}

pub async fn finish_turn(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
) -> Result<TurnAdvanced, GameError> {
    run(app, game_id, "finish_turn", move |store| {
        turn::ensure_legal(store, player_id, ActionClass::FinishTurn)?;
        store.set_phase(GamePhase::EndDiscard);
        let advance = turn::advance_turn(store);
        let mut events = Vec::new();
        if advance.game_over {
            events.push(Outbound::Room(ServerEvent::GameFinished {
                ranking: turn::ranking(store),
            }));
        }
        let mut out = CommandOutput::new(
            TurnAdvanced {
                turn_number: advance.turn_number,
                player_turn_id: advance.player_turn_id,
                game_over: advance.game_over,
            },
            events,
        );
        out.game_over = advance.game_over;
        Ok(out)
    })
    .await
}

// ---- named event and devious cards ------------------------------------

#[derive(Debug, Serialize)]
pub struct PlayedCard {
    pub action_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_action_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_cards: Vec<CardView>,
}

pub async fn play_event_card(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    rule: RuleName,
    instance_id: i64,
    payload: PlayPayload,
) -> Result<PlayedCard, GameError> {
    let nsf_window = app.config.nsf_window;
    run(app, game_id, rule.tag(), move |store| {
        turn::ensure_legal(store, player_id, ActionClass::PlayCard)?;
        let (output, events) =
            events::play_event(store, player_id, instance_id, rule, payload, nsf_window)?;
        let mut out = CommandOutput::new(
            PlayedCard {
                action_id: output.action_id,
                window_action_id: output.window_action_id,
                available_cards: output.available_cards,
            },
            events,
        );
        out.arm_window = output.window_action_id.map(|y| (output.action_id, y));
        Ok(out)
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct CounterPlayed {
    pub action_id: i64,
    pub chain_length: usize,
}

pub async fn play_not_so_fast(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    instance_id: i64,
) -> Result<CounterPlayed, GameError> {
    run(app, game_id, "not_so_fast", move |store| {
        turn::ensure_legal(store, player_id, ActionClass::PlayInstant)?;
        let (action_id, events) = events::play_not_so_fast(store, player_id, instance_id)?;
        let chain_length = store
            .open_nsf()
            .map(|w| w.chain_length)
            .unwrap_or_default();
        Ok(CommandOutput::new(
            CounterPlayed {
                action_id,
                chain_length,
            },
            events,
        ))
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct StepDone {
    pub action_id: i64,
}

pub async fn ashes_select(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    action_id: i64,
    instance_id: i64,
) -> Result<StepDone, GameError> {
    let horizon = app.config.ashes_horizon_secs;
    run(app, game_id, "look_into_the_ashes", move |store| {
        turn::ensure_running(store)?;
        let events = events::ashes_select(store, player_id, action_id, instance_id, horizon)?;
        Ok(CommandOutput::new(StepDone { action_id }, events))
    })
    .await
}

pub async fn folly_select(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    action_id: i64,
    instance_id: i64,
) -> Result<StepDone, GameError> {
    run(app, game_id, "dead_card_folly", move |store| {
        turn::ensure_running(store)?;
        let (events, game_over) = events::folly_select(store, player_id, action_id, instance_id)?;
        let mut out = CommandOutput::new(StepDone { action_id }, events);
        out.game_over = game_over;
        Ok(out)
    })
    .await
}

pub async fn one_more_select_player(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    action_id: i64,
    target_player_id: i64,
) -> Result<StepDone, GameError> {
    run(app, game_id, "and_then_was_one_more", move |store| {
        turn::ensure_running(store)?;
        let (next_step, events) =
            events::one_more_select_player(store, player_id, action_id, target_player_id)?;
        Ok(CommandOutput::new(StepDone { action_id: next_step }, events))
    })
    .await
}

pub async fn one_more_resolve(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    action_id: i64,
    variant: String,
    discard_card: Option<i64>,
) -> Result<StepDone, GameError> {
    run(app, game_id, "and_then_was_one_more", move |store| {
        turn::ensure_running(store)?;
        let events =
            events::one_more_resolve(store, player_id, action_id, &variant, discard_card)?;
        Ok(CommandOutput::new(StepDone { action_id }, events))
    })
    .await
}

pub async fn blackmailed_give(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    action_id: i64,
    instance_id: i64,
) -> Result<StepDone, GameError> {
    run(app, game_id, "blackmailed", move |store| {
        turn::ensure_running(store)?;
        let events = events::blackmailed_give(store, player_id, action_id, instance_id)?;
        Ok(CommandOutput::new(StepDone { action_id }, events))
    })
    .await
}

// ---- detective sets ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SetPlayed {
    pub action_id: i64,
    pub next_action: String,
}

pub async fn play_detective_set(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    card_ids: Vec<i64>,
    declared: DetectiveType,
) -> Result<SetPlayed, GameError> {
    run(app, game_id, "detective_play", move |store| {
        turn::ensure_legal(store, player_id, ActionClass::PlayDetective)?;
        let (action_id, events) = detective::play_set(store, player_id, &card_ids, declared)?;
        Ok(CommandOutput::new(
            SetPlayed {
                action_id,
                next_action: "select_player".to_string(),
            },
            events,
        ))
    })
    .await
}

pub async fn add_to_set(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    instance_id: i64,
    set_slot: i64,
) -> Result<StepDone, GameError> {
    run(app, game_id, "add_to_set", move |store| {
        turn::ensure_legal(store, player_id, ActionClass::AddToSet)?;
        let (action_id, events) = detective::add_to_set(store, player_id, instance_id, set_slot)?;
        Ok(CommandOutput::new(StepDone { action_id }, events))
    })
    .await
}

pub async fn detective_action(
    app: &Arc<AppState>,
    game_id: i64,
    player_id: i64,
    action_id: i64,
    target_player_id: Option<i64>,
    secret_instance_id: Option<i64>,
) -> Result<StepDone, GameError> {
    run(app, game_id, "detective_action", move |store| {
        turn::ensure_running(store)?;
        let events = match (target_player_id, secret_instance_id) {
            (Some(target), None) => detective::select_target(store, player_id, action_id, target)?,
            (None, Some(secret)) => detective::apply_effect(store, player_id, action_id, secret)?,
            _ => {
                return Err(GameError::Validation(
                    "provide either target_player_id or secret_card_instance_id".into(),
                ))
            }
        };
        Ok(CommandOutput::new(StepDone { action_id }, events))
    })
    .await
}
