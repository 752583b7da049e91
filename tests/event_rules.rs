//! The named event and devious card protocols: multi-step flows, the
//! discard special-case, horizons, and the forced-move effects.

mod common;

use std::time::Duration;

use common::*;
use deathcards::database::models::{ActionResult, Pile};
use deathcards::errors::GameError;
use deathcards::game::events::{self, PlayPayload};
use deathcards::game::nsf;
use deathcards::game::rules::RuleName;
use deathcards::game::store::GameStore;
use deathcards::game::turn;

const WINDOW: Duration = Duration::from_secs(8);

fn play_and_continue(
    store: &mut GameStore,
    player: i64,
    instance: i64,
    rule: RuleName,
    payload: PlayPayload,
) -> i64 {
    let (output, _) = events::play_event(store, player, instance, rule, payload, WINDOW).unwrap();
    let y = output.window_action_id.expect("cancellable rule");
    nsf::resolve(store, y).unwrap().expect("resolved");
    output.action_id
}

#[test]
fn ashes_offers_the_top_five_and_hands_over_the_chosen_one() {
    let mut store = store_three();
    let mut discard = Vec::new();
    for _ in 0..6 {
        discard.push(add_discard(&mut store, "not_so_fast"));
    }
    let played = give(&mut store, ADA, "look_into_the_ashes");

    let (output, _) = events::play_event(
        &mut store,
        ADA,
        played,
        RuleName::LookIntoTheAshes,
        PlayPayload::default(),
        WINDOW,
    )
    .unwrap();
    assert!(output.window_action_id.is_none());
    // Top five by descending position, excluding the played copy.
    let offered: Vec<i64> = output
        .available_cards
        .iter()
        .map(|c| c.instance_id.unwrap())
        .collect();
    assert_eq!(offered, vec![discard[5], discard[4], discard[3], discard[2], discard[1]]);

    let chosen = discard[3];
    events::ashes_select(&mut store, ADA, output.action_id, chosen, 600).unwrap();
    let card = store.card(chosen).unwrap();
    assert_eq!(card.pile, Pile::Hand);
    assert_eq!(card.owner, Some(ADA));
    assert!(turn::positions_consistent(&store));
    assert_eq!(
        store.action(output.action_id).unwrap().result,
        ActionResult::Success
    );
}

#[test]
fn ashes_select_expires_after_the_horizon() {
    let mut store = store_three();
    for _ in 0..3 {
        add_discard(&mut store, "not_so_fast");
    }
    let played = give(&mut store, ADA, "look_into_the_ashes");
    let (output, _) = events::play_event(
        &mut store,
        ADA,
        played,
        RuleName::LookIntoTheAshes,
        PlayPayload::default(),
        WINDOW,
    )
    .unwrap();
    let chosen = store.pile(Pile::Discard)[0].id;
    // A horizon already in the past stands in for the clock moving on.
    let err =
        events::ashes_select(&mut store, ADA, output.action_id, chosen, -1).unwrap_err();
    assert!(matches!(err, GameError::ActionExpired));
    assert_eq!(store.card(chosen).unwrap().pile, Pile::Discard);
}

#[test]
fn ashes_second_select_is_rejected_with_no_state_change() {
    let mut store = store_three();
    for _ in 0..4 {
        add_discard(&mut store, "not_so_fast");
    }
    let played = give(&mut store, ADA, "look_into_the_ashes");
    let (output, _) = events::play_event(
        &mut store,
        ADA,
        played,
        RuleName::LookIntoTheAshes,
        PlayPayload::default(),
        WINDOW,
    )
    .unwrap();
    let first = output.available_cards[0].instance_id.unwrap();
    let second = output.available_cards[1].instance_id.unwrap();
    events::ashes_select(&mut store, ADA, output.action_id, first, 600).unwrap();

    let discard_before: Vec<i64> = store.pile(Pile::Discard).iter().map(|c| c.id).collect();
    let err = events::ashes_select(&mut store, ADA, output.action_id, second, 600).unwrap_err();
    assert!(matches!(err, GameError::ActionNotPending));
    let discard_after: Vec<i64> = store.pile(Pile::Discard).iter().map(|c| c.id).collect();
    assert_eq!(discard_before, discard_after);
}

#[test]
fn early_train_burns_the_whole_deck_when_it_is_short() {
    let mut store = store_three();
    stack_deck(&mut store, "not_so_fast", 4);
    let played = give(&mut store, ADA, "early_train_to_paddington");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::EarlyTrainToPaddington,
        PlayPayload::default(),
    );
    assert_eq!(store.deck_size(), 0);
    // Played copy is out of the game, the four deck cards hit the discard.
    assert_eq!(store.card(played).unwrap().pile, Pile::Removed);
    assert_eq!(store.pile(Pile::Discard).len(), 4);
}

#[test]
fn dead_card_folly_retires_a_draft_card_and_refills_the_slot() {
    let mut store = store_three();
    let draft = vec![
        add_draft(&mut store, "marple"),
        add_draft(&mut store, "poirot"),
    ];
    let replacement = stack_deck(&mut store, "not_so_fast", 1)[0];
    let played = give(&mut store, ADA, "dead_card_folly");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::DeadCardFolly,
        PlayPayload::default(),
    );
    let step = store.actions().last().unwrap().id;
    events::folly_select(&mut store, ADA, step, draft[1]).unwrap();

    assert_eq!(store.card(draft[1]).unwrap().pile, Pile::Removed);
    let slot = store.card(replacement).unwrap();
    assert_eq!(slot.pile, Pile::Draft);
    assert_eq!(slot.position, 2);
}

#[test]
fn one_more_walks_its_three_steps() {
    let mut store = store_three();
    stack_deck(&mut store, "marple", 2);
    let played = give(&mut store, ADA, "and_then_was_one_more");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::AndThenWasOneMore,
        PlayPayload::default(),
    );
    let step1 = store.actions().last().unwrap().id;
    let brendan_before = store.hand_size(BRENDAN);

    events::one_more_select_player(&mut store, ADA, step1, BRENDAN).unwrap();
    let step2 = store.actions().last().unwrap().id;
    // Only the picked player may resolve.
    let err = events::one_more_resolve(&mut store, CLARA, step2, "take", None).unwrap_err();
    assert!(matches!(err, GameError::NotYourTurn));

    events::one_more_resolve(&mut store, BRENDAN, step2, "take", None).unwrap();
    assert_eq!(store.hand_size(BRENDAN), brendan_before + 1);
    assert_eq!(store.action(step2).unwrap().result, ActionResult::Success);
}

#[test]
fn one_more_discard_variant_sheds_a_card_instead() {
    let mut store = store_three();
    stack_deck(&mut store, "marple", 1);
    let shed = give(&mut store, BRENDAN, "poirot");
    let played = give(&mut store, ADA, "and_then_was_one_more");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::AndThenWasOneMore,
        PlayPayload::default(),
    );
    let step1 = store.actions().last().unwrap().id;
    events::one_more_select_player(&mut store, ADA, step1, BRENDAN).unwrap();
    let step2 = store.actions().last().unwrap().id;
    events::one_more_resolve(&mut store, BRENDAN, step2, "discard", Some(shed)).unwrap();
    assert_eq!(store.card(shed).unwrap().pile, Pile::Discard);
}

#[test]
fn blackmailed_target_hands_over_a_chosen_card() {
    let mut store = store_three();
    let treasure = give(&mut store, BRENDAN, "poirot");
    let played = give(&mut store, ADA, "blackmailed");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::Blackmailed,
        PlayPayload {
            target_player: Some(BRENDAN),
            offered_card: None,
        },
    );
    let step = store.pending_protocol().expect("give step pending").id;
    // The blackmailer cannot serve the step themselves.
    let err = events::blackmailed_give(&mut store, ADA, step, treasure).unwrap_err();
    assert!(matches!(err, GameError::NotYourTurn));

    events::blackmailed_give(&mut store, BRENDAN, step, treasure).unwrap();
    let card = store.card(treasure).unwrap();
    assert_eq!(card.owner, Some(ADA));
    assert_eq!(card.pile, Pile::Hand);
}

#[test]
fn blackmailed_cancelled_window_cancels_the_give_step() {
    let mut store = store_three();
    give(&mut store, BRENDAN, "poirot");
    let played = give(&mut store, ADA, "blackmailed");
    let (output, _) = events::play_event(
        &mut store,
        ADA,
        played,
        RuleName::Blackmailed,
        PlayPayload {
            target_player: Some(BRENDAN),
            offered_card: None,
        },
        WINDOW,
    )
    .unwrap();
    let counter = give(&mut store, CLARA, "not_so_fast");
    events::play_not_so_fast(&mut store, CLARA, counter).unwrap();
    nsf::resolve(&mut store, output.window_action_id.unwrap())
        .unwrap()
        .expect("resolved");
    // Nothing is awaited any more.
    assert!(store.pending_protocol().is_none());
    assert_eq!(
        store.action(output.action_id).unwrap().result,
        ActionResult::Cancelled
    );
}

#[test]
fn cards_off_the_table_discards_down_to_four() {
    let mut store = store_three();
    let mut brendan_hand = Vec::new();
    for _ in 0..6 {
        brendan_hand.push(give(&mut store, BRENDAN, "marple"));
    }
    let played = give(&mut store, ADA, "cards_off_the_table");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::CardsOffTheTable,
        PlayPayload {
            target_player: Some(BRENDAN),
            offered_card: None,
        },
    );
    assert_eq!(store.hand_size(BRENDAN), 4);
    // The two highest positions went first.
    assert_eq!(store.card(brendan_hand[5]).unwrap().pile, Pile::Discard);
    assert_eq!(store.card(brendan_hand[4]).unwrap().pile, Pile::Discard);
}

#[test]
fn point_your_suspicions_forces_two_draws() {
    let mut store = store_three();
    stack_deck(&mut store, "marple", 3);
    let played = give(&mut store, ADA, "point_your_suspicions");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::PointYourSuspicions,
        PlayPayload {
            target_player: Some(BRENDAN),
            offered_card: None,
        },
    );
    assert_eq!(store.hand_size(BRENDAN), 2);
    assert_eq!(store.deck_size(), 1);
}

#[test]
fn another_victim_discards_a_random_target_card() {
    let mut store = store_three();
    give(&mut store, BRENDAN, "marple");
    give(&mut store, BRENDAN, "poirot");
    let played = give(&mut store, ADA, "another_victim");
    play_and_continue(
        &mut store,
        ADA,
        played,
        RuleName::AnotherVictim,
        PlayPayload {
            target_player: Some(BRENDAN),
            offered_card: None,
        },
    );
    assert_eq!(store.hand_size(BRENDAN), 1);
}

#[test]
fn targeted_rules_require_a_target() {
    let mut store = store_three();
    let played = give(&mut store, ADA, "another_victim");
    let err = events::play_event(
        &mut store,
        ADA,
        played,
        RuleName::AnotherVictim,
        PlayPayload::default(),
        WINDOW,
    )
    .unwrap_err();
    assert!(matches!(err, GameError::Validation(_)));
}

#[test]
fn the_endpoint_rule_must_match_the_card() {
    let mut store = store_three();
    let played = give(&mut store, ADA, "card_trade");
    let err = events::play_event(
        &mut store,
        ADA,
        played,
        RuleName::AnotherVictim,
        PlayPayload {
            target_player: Some(BRENDAN),
            offered_card: None,
        },
        WINDOW,
    )
    .unwrap_err();
    assert!(matches!(err, GameError::WrongCard));
}
