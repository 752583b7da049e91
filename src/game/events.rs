//! Protocols for the named event and devious cards: play validation, the
//! deferred effects applied when a counter window continues, and the
//! follow-up steps of the multi-step rules.

use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::time::Duration;

use crate::constants::{
    ASHES_CHOICES, ESCAPE_DELAY_CARDS, PADDINGTON_BURN, SUSPICION_CARDS, TABLE_HAND_FLOOR,
};
use crate::database::models::{ActionKind, ActionResult, Pile};
use crate::errors::GameError;
use crate::game::nsf;
use crate::game::projector::{card_view, CardView, Outbound, ServerEvent};
use crate::game::rules::RuleName;
use crate::game::store::{ActionDraft, GameStore};
use crate::game::turn;

/// Extra references a play request may carry, depending on the rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayPayload {
    pub target_player: Option<i64>,
    pub offered_card: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct PlayOutput {
    pub action_id: i64,
    /// The INSTANT_START record when a window was opened.
    pub window_action_id: Option<i64>,
    /// Only filled by Look Into the Ashes.
    pub available_cards: Vec<CardView>,
}

fn ensure_in_hand(store: &GameStore, player_id: i64, instance_id: i64) -> Result<(), GameError> {
    let card = store.card(instance_id)?;
    if card.pile != Pile::Hand || card.owner != Some(player_id) {
        return Err(GameError::WrongCard);
    }
    Ok(())
}

/// Moves a played card from the hand onto the discard top.
fn play_to_discard(store: &mut GameStore, instance_id: i64) -> Result<(), GameError> {
    let top = store.max_position(Pile::Discard, None) + 1;
    store.move_card(instance_id, Pile::Discard, None, None, top, false)
}

/// Plays a named event or devious card. Cancellable rules open a counter
/// window and defer their effect; Look Into the Ashes resolves its first
/// step immediately.
pub fn play_event(
    store: &mut GameStore,
    player_id: i64,
    instance_id: i64,
    rule: RuleName,
    payload: PlayPayload,
    nsf_window: Duration,
) -> Result<(PlayOutput, Vec<Outbound>), GameError> {
    ensure_in_hand(store, player_id, instance_id)?;
    if RuleName::of_instance(store, instance_id) != Some(rule) {
        return Err(GameError::WrongCard);
    }

    let target = if rule.targeted() {
        let target = payload
            .target_player
            .ok_or_else(|| GameError::Validation("target_player_id is required".into()))?;
        store.player(target)?;
        if target == player_id {
            return Err(GameError::Validation("cannot target yourself".into()));
        }
        Some(target)
    } else {
        None
    };

    let offered = if rule == RuleName::CardTrade {
        let offered = payload
            .offered_card
            .ok_or_else(|| GameError::Validation("offered_card_instance_id is required".into()))?;
        if offered == instance_id {
            return Err(GameError::Validation("cannot offer the played card".into()));
        }
        ensure_in_hand(store, player_id, offered)?;
        Some(offered)
    } else {
        None
    };

    // Look Into the Ashes: snapshot the choices before the played copy
    // lands on the discard.
    let available: Vec<i64> = if rule == RuleName::LookIntoTheAshes {
        let discard = store.pile(Pile::Discard);
        discard
            .iter()
            .rev()
            .take(ASHES_CHOICES)
            .map(|c| c.id)
            .collect()
    } else {
        Vec::new()
    };

    play_to_discard(store, instance_id)?;

    let selected = offered.unwrap_or(instance_id);
    let x_kind = if rule == RuleName::CardTrade {
        ActionKind::CardExchange
    } else {
        ActionKind::EventCard
    };
    let x_id = store
        .append_action(ActionDraft::new(player_id, x_kind, rule.tag()).selected(selected));

    // Targeted rules remember the target as a pending child record; it
    // resolves together with the window.
    if let Some(target) = target {
        let kind = match rule {
            RuleName::CardTrade | RuleName::Blackmailed => ActionKind::CardExchange,
            _ => ActionKind::EventCard,
        };
        store.append_action(ActionDraft::new(target, kind, rule.tag()).parent(x_id));
    }

    let mut events = vec![Outbound::Room(ServerEvent::EventActionStarted {
        action_id: x_id,
        player_id,
        card_name: store.catalog.name(store.card(instance_id)?.card_id).to_string(),
        cancellable: rule.cancellable(),
    })];

    let mut output = PlayOutput {
        action_id: x_id,
        window_action_id: None,
        available_cards: Vec::new(),
    };

    if rule.cancellable() {
        let y_id = nsf::open_window(store, x_id, player_id);
        output.window_action_id = Some(y_id);
        let deadline = Utc::now()
            + ChronoDuration::from_std(nsf_window).unwrap_or(ChronoDuration::seconds(8));
        events.push(Outbound::Room(ServerEvent::NsfCounterStarted {
            action_id: x_id,
            deadline,
        }));
    } else {
        // Ashes: the parent stays PENDING until the select step.
        let cards: Vec<CardView> = available.iter().map(|id| card_view(store, *id)).collect();
        events.push(Outbound::Player(
            player_id,
            ServerEvent::EventStepUpdate {
                action_id: x_id,
                step: "available_cards".to_string(),
                cards: Some(cards.clone()),
                chain_length: None,
            },
        ));
        output.available_cards = cards;
    }

    Ok((output, events))
}

/// Plays a Not So Fast instant into the open window.
pub fn play_not_so_fast(
    store: &mut GameStore,
    player_id: i64,
    instance_id: i64,
) -> Result<(i64, Vec<Outbound>), GameError> {
    ensure_in_hand(store, player_id, instance_id)?;
    if RuleName::of_instance(store, instance_id) != Some(RuleName::NotSoFast) {
        return Err(GameError::WrongCard);
    }
    let window = store.open_nsf().ok_or(GameError::NoCounterWindow)?;
    play_to_discard(store, instance_id)?;
    let z_id = store.append_action(
        ActionDraft::new(player_id, ActionKind::InstantPlay, RuleName::NotSoFast.tag())
            .parent(window.y_id)
            .triggered_by(window.x_id)
            .selected(instance_id),
    );
    let chain_length = store.nsf_chain(window.y_id).len();
    let events = vec![Outbound::Room(ServerEvent::EventStepUpdate {
        action_id: window.x_id,
        step: "counter_played".to_string(),
        cards: None,
        chain_length: Some(chain_length),
    })];
    Ok((z_id, events))
}

fn pending_target_child(store: &GameStore, x_id: i64) -> Option<i64> {
    store.pending_children(x_id).into_iter().next()
}

/// Applies the deferred effect of action `x` after its window continued.
/// Multi-step rules spawn their next PENDING step record here instead of
/// finishing.
pub fn apply_rule_effect(store: &mut GameStore, x_id: i64) -> Result<Vec<Outbound>, GameError> {
    let (rule, actor) = {
        let x = store.action(x_id)?;
        let rule = RuleName::from_tag(&x.name).ok_or(GameError::WrongStep)?;
        (rule, x.player_id)
    };
    match rule {
        RuleName::DelayMurderersEscape => {
            let top_ids: Vec<i64> = store
                .pile(Pile::Discard)
                .iter()
                .rev()
                .take(ESCAPE_DELAY_CARDS)
                .map(|c| c.id)
                .collect();
            let moved = top_ids.len();
            for id in top_ids {
                let bottom = store.max_position(Pile::Deck, None) + 1;
                store.move_card(id, Pile::Deck, None, None, bottom, false)?;
                store.append_action(
                    ActionDraft::new(actor, ActionKind::MoveCard, rule.tag())
                        .parent(x_id)
                        .selected(id)
                        .source(Pile::Discard)
                        .result(ActionResult::Success),
                );
            }
            Ok(vec![complete(store, x_id, rule, Some(moved))])
        }
        RuleName::EarlyTrainToPaddington => {
            let played = store.action(x_id)?.selected_card.ok_or(GameError::WrongStep)?;
            let removed_pos = store.max_position(Pile::Removed, None) + 1;
            store.move_card(played, Pile::Removed, None, None, removed_pos, false)?;
            let moved = burn_deck_to_discard(store, actor, x_id, PADDINGTON_BURN)?;
            Ok(vec![complete(store, x_id, rule, Some(moved))])
        }
        RuleName::AnotherVictim => {
            let t_id = pending_target_child(store, x_id).ok_or(GameError::WrongStep)?;
            let target = store.action(t_id)?.player_id;
            let hand = store.hand_of(target);
            let mut events = Vec::new();
            if !hand.is_empty() {
                let victim = hand[rand::rng().random_range(0..hand.len())].id;
                let top = store.max_position(Pile::Discard, None) + 1;
                store.move_card(victim, Pile::Discard, None, None, top, false)?;
                store.set_action_cards(t_id, Some(victim), None)?;
            }
            store.set_action_result(t_id, ActionResult::Success)?;
            events.push(complete(store, x_id, rule, None));
            Ok(events)
        }
        RuleName::CardTrade => {
            let t_id = pending_target_child(store, x_id).ok_or(GameError::WrongStep)?;
            let target = store.action(t_id)?.player_id;
            let offered = store.action(x_id)?.selected_card.ok_or(GameError::WrongStep)?;
            let offered_still_held = store
                .card(offered)
                .map(|c| c.pile == Pile::Hand && c.owner == Some(actor))
                .unwrap_or(false);
            let target_hand = store.hand_of(target);
            if offered_still_held && !target_hand.is_empty() {
                let received = target_hand[rand::rng().random_range(0..target_hand.len())].id;
                store.swap_cards(offered, received)?;
                store.set_action_cards(x_id, None, Some(received))?;
                store.set_action_cards(t_id, Some(offered), Some(received))?;
            }
            store.set_action_result(t_id, ActionResult::Success)?;
            Ok(vec![complete(store, x_id, rule, None)])
        }
        RuleName::CardsOffTheTable => {
            let t_id = pending_target_child(store, x_id).ok_or(GameError::WrongStep)?;
            let target = store.action(t_id)?.player_id;
            let hand = store.hand_of(target);
            let excess = hand.len().saturating_sub(TABLE_HAND_FLOOR);
            let doomed: Vec<i64> = hand.iter().rev().take(excess).map(|c| c.id).collect();
            for id in &doomed {
                let top = store.max_position(Pile::Discard, None) + 1;
                store.move_card(*id, Pile::Discard, None, None, top, false)?;
                store.append_action(
                    ActionDraft::new(target, ActionKind::MoveCard, rule.tag())
                        .parent(x_id)
                        .selected(*id)
                        .source(Pile::Hand)
                        .result(ActionResult::Success),
                );
            }
            store.set_action_result(t_id, ActionResult::Success)?;
            Ok(vec![complete(store, x_id, rule, Some(doomed.len()))])
        }
        RuleName::PointYourSuspicions => {
            let t_id = pending_target_child(store, x_id).ok_or(GameError::WrongStep)?;
            let target = store.action(t_id)?.player_id;
            let top_ids = store.deck_top(SUSPICION_CARDS);
            let drawn = top_ids.len();
            for id in top_ids {
                let pos = store.max_position(Pile::Hand, Some(target)) + 1;
                store.move_card(id, Pile::Hand, Some(target), None, pos, true)?;
                store.append_action(
                    ActionDraft::new(target, ActionKind::MoveCard, rule.tag())
                        .parent(x_id)
                        .selected(id)
                        .source(Pile::Deck)
                        .result(ActionResult::Success),
                );
            }
            store.set_action_result(t_id, ActionResult::Success)?;
            Ok(vec![
                Outbound::Room(ServerEvent::CardDrawnSimple {
                    player_id: target,
                    count: drawn,
                }),
                complete(store, x_id, rule, Some(drawn)),
            ])
        }
        RuleName::Blackmailed => {
            // The target child doubles as the give step and stays PENDING.
            let t_id = pending_target_child(store, x_id).ok_or(GameError::WrongStep)?;
            let target = store.action(t_id)?.player_id;
            Ok(vec![Outbound::Player(
                target,
                ServerEvent::EventStepUpdate {
                    action_id: t_id,
                    step: "select_card_to_give".to_string(),
                    cards: None,
                    chain_length: None,
                },
            )])
        }
        RuleName::DeadCardFolly => {
            let s_id = store.append_action(
                ActionDraft::new(actor, ActionKind::EventCard, rule.tag())
                    .parent(x_id)
                    .at_position(1),
            );
            Ok(vec![Outbound::Player(
                actor,
                ServerEvent::EventStepUpdate {
                    action_id: s_id,
                    step: "select_draft_card".to_string(),
                    cards: None,
                    chain_length: None,
                },
            )])
        }
        RuleName::AndThenWasOneMore => {
            let s_id = store.append_action(
                ActionDraft::new(actor, ActionKind::EventCard, rule.tag())
                    .parent(x_id)
                    .at_position(1),
            );
            Ok(vec![Outbound::Player(
                actor,
                ServerEvent::EventStepUpdate {
                    action_id: s_id,
                    step: "select_player".to_string(),
                    cards: None,
                    chain_length: None,
                },
            )])
        }
        RuleName::LookIntoTheAshes | RuleName::NotSoFast => Err(GameError::WrongStep),
    }
}

fn complete(
    store: &GameStore,
    action_id: i64,
    rule: RuleName,
    moved: Option<usize>,
) -> Outbound {
    let card_name = store
        .catalog
        .id_by_rule(rule.tag())
        .map(|id| store.catalog.name(id).to_string())
        .unwrap_or_else(|| rule.tag().to_string());
    Outbound::Room(ServerEvent::EventActionComplete {
        action_id,
        card_name,
        moved,
    })
}

/// Moves up to `limit` cards from the deck top onto the discard, appending
/// MOVE_CARD children to `parent`. Returns how many actually moved.
pub fn burn_deck_to_discard(
    store: &mut GameStore,
    actor: i64,
    parent: i64,
    limit: usize,
) -> Result<usize, GameError> {
    let top_ids = store.deck_top(limit);
    let moved = top_ids.len();
    for id in top_ids {
        let top = store.max_position(Pile::Discard, None) + 1;
        store.move_card(id, Pile::Discard, None, None, top, false)?;
        store.append_action(
            ActionDraft::new(actor, ActionKind::MoveCard, RuleName::EarlyTrainToPaddington.tag())
                .parent(parent)
                .selected(id)
                .source(Pile::Deck)
                .result(ActionResult::Success),
        );
    }
    Ok(moved)
}

fn checked_step<'a>(
    store: &'a GameStore,
    player_id: i64,
    action_id: i64,
    rule: RuleName,
) -> Result<&'a crate::game::store::ActionRecord, GameError> {
    let action = store.action(action_id)?;
    if action.name != rule.tag() {
        return Err(GameError::WrongStep);
    }
    if action.result != ActionResult::Pending {
        return Err(GameError::ActionNotPending);
    }
    if action.player_id != player_id {
        return Err(GameError::NotYourTurn);
    }
    Ok(action)
}

/// Second step of Look Into the Ashes: take one of the offered discard
/// entries into the hand, within the configured horizon.
pub fn ashes_select(
    store: &mut GameStore,
    player_id: i64,
    action_id: i64,
    instance_id: i64,
    horizon_secs: i64,
) -> Result<Vec<Outbound>, GameError> {
    let (played, created_at) = {
        let action = checked_step(store, player_id, action_id, RuleName::LookIntoTheAshes)?;
        if action.parent_action.is_some() {
            return Err(GameError::WrongStep);
        }
        (action.selected_card, action.created_at)
    };
    if Utc::now() - created_at > ChronoDuration::seconds(horizon_secs) {
        return Err(GameError::ActionExpired);
    }

    let card = store.card(instance_id)?;
    if card.pile != Pile::Discard || Some(instance_id) == played {
        return Err(GameError::WrongCard);
    }
    let eligible: Vec<i64> = store
        .pile(Pile::Discard)
        .iter()
        .rev()
        .filter(|c| Some(c.id) != played)
        .take(ASHES_CHOICES)
        .map(|c| c.id)
        .collect();
    if !eligible.contains(&instance_id) {
        return Err(GameError::WrongCard);
    }

    let pos = store.max_position(Pile::Hand, Some(player_id)) + 1;
    store.move_card(instance_id, Pile::Hand, Some(player_id), None, pos, true)?;
    store.set_action_cards(action_id, None, Some(instance_id))?;
    store.set_action_result(action_id, ActionResult::Success)?;
    Ok(vec![complete(store, action_id, RuleName::LookIntoTheAshes, Some(1))])
}

/// Second step of Dead Card Folly: remove one draft card from the game and
/// refill the slot from the deck top.
pub fn folly_select(
    store: &mut GameStore,
    player_id: i64,
    action_id: i64,
    instance_id: i64,
) -> Result<(Vec<Outbound>, bool), GameError> {
    {
        let action = checked_step(store, player_id, action_id, RuleName::DeadCardFolly)?;
        if action.parent_action.is_none() {
            return Err(GameError::WrongStep);
        }
    }
    let card = store.card(instance_id)?;
    if card.pile != Pile::Draft {
        return Err(GameError::WrongCard);
    }
    let slot_position = card.position;

    let removed_pos = store.max_position(Pile::Removed, None) + 1;
    store.move_card(instance_id, Pile::Removed, None, None, removed_pos, false)?;
    if let Some(replacement) = store.deck_top(1).first().copied() {
        store.move_card(replacement, Pile::Draft, None, None, slot_position, false)?;
    } else {
        store.renumber(Pile::Draft, None, None);
    }
    store.set_action_cards(action_id, Some(instance_id), None)?;
    store.set_action_result(action_id, ActionResult::Success)?;

    let mut events = vec![complete(store, action_id, RuleName::DeadCardFolly, Some(1))];
    let game_over = store.deck_size() == 0 && store.pile(Pile::Draft).is_empty();
    if game_over {
        let ranking = turn::finish_game(store);
        events.push(Outbound::Room(ServerEvent::GameFinished { ranking }));
    }
    Ok((events, game_over))
}

/// Second step of And Then Was One More: the actor picks who must draw.
pub fn one_more_select_player(
    store: &mut GameStore,
    player_id: i64,
    action_id: i64,
    target_player_id: i64,
) -> Result<(i64, Vec<Outbound>), GameError> {
    let parent = {
        let action = checked_step(store, player_id, action_id, RuleName::AndThenWasOneMore)?;
        if action.position != Some(1) {
            return Err(GameError::WrongStep);
        }
        action.parent_action.ok_or(GameError::WrongStep)?
    };
    store.player(target_player_id)?;
    if target_player_id == player_id {
        return Err(GameError::Validation("cannot pick yourself".into()));
    }
    store.set_action_result(action_id, ActionResult::Success)?;
    let s2 = store.append_action(
        ActionDraft::new(
            target_player_id,
            ActionKind::EventCard,
            RuleName::AndThenWasOneMore.tag(),
        )
        .parent(parent)
        .at_position(2),
    );
    Ok((
        s2,
        vec![Outbound::Room(ServerEvent::PlayerMustDraw {
            player_id: target_player_id,
            action_id: s2,
        })],
    ))
}

/// Final step of And Then Was One More, performed by the picked player:
/// either take the deck top or discard one of their own cards.
pub fn one_more_resolve(
    store: &mut GameStore,
    player_id: i64,
    action_id: i64,
    variant: &str,
    discard_card: Option<i64>,
) -> Result<Vec<Outbound>, GameError> {
    {
        let action = checked_step(store, player_id, action_id, RuleName::AndThenWasOneMore)?;
        if action.position != Some(2) {
            return Err(GameError::WrongStep);
        }
    }
    let mut events = Vec::new();
    match variant {
        "take" => {
            let top = store
                .deck_top(1)
                .first()
                .copied()
                .ok_or(GameError::DeckEmpty)?;
            let pos = store.max_position(Pile::Hand, Some(player_id)) + 1;
            store.move_card(top, Pile::Hand, Some(player_id), None, pos, true)?;
            store.set_action_cards(action_id, None, Some(top))?;
            events.push(Outbound::Room(ServerEvent::CardDrawnSimple {
                player_id,
                count: 1,
            }));
        }
        "discard" => {
            let card = discard_card
                .ok_or_else(|| GameError::Validation("card_instance_id is required".into()))?;
            ensure_in_hand(store, player_id, card)?;
            let top = store.max_position(Pile::Discard, None) + 1;
            store.move_card(card, Pile::Discard, None, None, top, false)?;
            store.set_action_cards(action_id, Some(card), None)?;
        }
        _ => return Err(GameError::Validation("variant must be take or discard".into())),
    }
    store.set_action_result(action_id, ActionResult::Success)?;
    events.push(complete(store, action_id, RuleName::AndThenWasOneMore, None));
    Ok(events)
}

/// The blackmailed target hands over a card of their choice.
pub fn blackmailed_give(
    store: &mut GameStore,
    player_id: i64,
    action_id: i64,
    instance_id: i64,
) -> Result<Vec<Outbound>, GameError> {
    let actor = {
        let action = checked_step(store, player_id, action_id, RuleName::Blackmailed)?;
        if action.kind != ActionKind::CardExchange {
            return Err(GameError::WrongStep);
        }
        let parent = store.action(action.parent_action.ok_or(GameError::WrongStep)?)?;
        // The give step only opens once the window resolved in favour of
        // the blackmailer.
        if parent.result != ActionResult::Continue {
            return Err(GameError::WrongStep);
        }
        parent.player_id
    };
    ensure_in_hand(store, player_id, instance_id)?;
    let pos = store.max_position(Pile::Hand, Some(actor)) + 1;
    store.move_card(instance_id, Pile::Hand, Some(actor), None, pos, true)?;
    store.set_action_cards(action_id, Some(instance_id), None)?;
    store.set_action_result(action_id, ActionResult::Success)?;
    Ok(vec![complete(store, action_id, RuleName::Blackmailed, Some(1))])
}
