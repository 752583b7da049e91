//! Store-level behavior: typed pile moves, contiguous renumbering, the
//! identity swap, and the action log's one-shot result transitions.

mod common;

use common::*;
use deathcards::database::models::{ActionKind, ActionResult, Pile};
use deathcards::errors::GameError;
use deathcards::game::store::ActionDraft;
use deathcards::game::turn;

#[test]
fn moving_a_card_renumbers_the_source_pile() {
    let mut store = store_three();
    let a = give(&mut store, ADA, "card_trade");
    let b = give(&mut store, ADA, "another_victim");
    let c = give(&mut store, ADA, "blackmailed");
    assert_eq!(
        store.hand_of(ADA).iter().map(|x| x.position).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    store
        .move_card(b, Pile::Discard, None, None, 1, false)
        .unwrap();
    let hand = store.hand_of(ADA);
    assert_eq!(hand.iter().map(|x| x.id).collect::<Vec<_>>(), vec![a, c]);
    assert_eq!(
        hand.iter().map(|x| x.position).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(turn::positions_consistent(&store));
}

#[test]
fn every_instance_lives_in_exactly_one_pile() {
    let mut store = store_three();
    let card = give(&mut store, ADA, "not_so_fast");
    store
        .move_card(card, Pile::Discard, None, None, 1, false)
        .unwrap();
    assert_eq!(store.hand_size(ADA), 0);
    assert_eq!(store.pile(Pile::Discard).len(), 1);
    assert_eq!(store.card(card).unwrap().pile, Pile::Discard);
}

#[test]
fn swap_cards_exchanges_catalog_identities_in_place() {
    let mut store = store_three();
    let mine = give(&mut store, ADA, "card_trade");
    let theirs = give(&mut store, BRENDAN, "not_so_fast");
    let trade_id = catalog_id(&store, "card_trade");
    let nsf_id = catalog_id(&store, "not_so_fast");

    store.swap_cards(mine, theirs).unwrap();
    assert_eq!(store.card(mine).unwrap().card_id, nsf_id);
    assert_eq!(store.card(theirs).unwrap().card_id, trade_id);
    assert_eq!(store.card(mine).unwrap().owner, Some(ADA));
    assert_eq!(store.card(theirs).unwrap().owner, Some(BRENDAN));
}

#[test]
fn deck_top_is_lowest_position() {
    let mut store = store_three();
    let ids = stack_deck(&mut store, "not_so_fast", 3);
    assert_eq!(store.deck_top(2), vec![ids[0], ids[1]]);
}

#[test]
fn action_results_transition_exactly_once() {
    let mut store = store_three();
    let id = store.append_action(ActionDraft::new(ADA, ActionKind::EventCard, "card_trade"));
    store.set_action_result(id, ActionResult::Continue).unwrap();
    let again = store.set_action_result(id, ActionResult::Success);
    assert!(matches!(again, Err(GameError::ActionNotPending)));
    assert_eq!(store.action(id).unwrap().result, ActionResult::Continue);
}

#[test]
fn child_actions_share_the_parents_turn() {
    let mut store = store_three();
    let parent = store.append_action(ActionDraft::new(ADA, ActionKind::Discard, "discard"));
    let child = store.append_action(
        ActionDraft::new(ADA, ActionKind::MoveCard, "discard").parent(parent),
    );
    let parent = store.action(parent).unwrap().clone();
    let child = store.action(child).unwrap().clone();
    assert_eq!(parent.turn_id, child.turn_id);
}

#[test]
fn exactly_one_turn_in_progress() {
    let mut store = store_three();
    assert!(turn::one_turn_in_progress(&store));
    turn::advance_turn(&mut store);
    assert!(turn::one_turn_in_progress(&store));
    assert_eq!(store.current_turn_player, BRENDAN);
    assert_eq!(store.turn_number, 2);
}

#[test]
fn turn_advance_skips_disgraced_players_and_wraps() {
    let mut store = store_three();
    add_secret(&mut store, BRENDAN, false);
    store.set_disgrace(BRENDAN, true).unwrap();
    let advance = turn::advance_turn(&mut store);
    assert_eq!(advance.player_turn_id, CLARA);
    assert!(!advance.game_over);

    let advance = turn::advance_turn(&mut store);
    assert_eq!(advance.player_turn_id, ADA);
}

#[test]
fn game_ends_when_one_player_remains_eligible() {
    let mut store = store_three();
    store.set_disgrace(BRENDAN, true).unwrap();
    store.set_disgrace(CLARA, true).unwrap();
    let advance = turn::advance_turn(&mut store);
    assert!(advance.game_over);
    assert_eq!(
        store.phase,
        deathcards::database::models::GamePhase::Finished
    );
}
