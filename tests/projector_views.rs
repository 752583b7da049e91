//! Projection rules: what the room sees, what each seat sees, and the
//! per-transition snapshot fan-out.

mod common;

use std::time::Duration;

use common::*;
use deathcards::game::events::{self, PlayPayload};
use deathcards::game::projector::{self, Outbound, ServerEvent};
use deathcards::game::rules::RuleName;

const WINDOW: Duration = Duration::from_secs(8);

#[test]
fn hidden_secrets_reveal_no_identity_publicly() {
    let mut store = store_three();
    let hidden = add_secret(&mut store, BRENDAN, true);
    let shown = add_secret(&mut store, BRENDAN, false);

    let public = projector::public_state(&store, WINDOW);
    let brendan = public
        .players
        .iter()
        .find(|p| p.player_id == BRENDAN)
        .unwrap();
    let hidden_view = brendan
        .secrets
        .iter()
        .find(|s| s.instance_id == hidden)
        .unwrap();
    assert!(hidden_view.hidden);
    assert!(hidden_view.card.is_none());
    let shown_view = brendan
        .secrets
        .iter()
        .find(|s| s.instance_id == shown)
        .unwrap();
    assert!(shown_view.card.is_some());
}

#[test]
fn private_state_shows_own_hand_and_all_own_secrets() {
    let mut store = store_three();
    let in_hand = give(&mut store, ADA, "card_trade");
    let secret = add_secret(&mut store, ADA, true);

    let private = projector::private_state(&store, ADA);
    assert_eq!(private.hand.len(), 1);
    assert_eq!(private.hand[0].instance_id, Some(in_hand));
    assert_eq!(private.secrets.len(), 1);
    assert_eq!(private.secrets[0].instance_id, secret);
    // Even a hidden secret names its card for its owner.
    assert!(private.secrets[0].card.is_some());
}

#[test]
fn public_state_counts_hands_instead_of_listing_them() {
    let mut store = store_three();
    give(&mut store, ADA, "card_trade");
    give(&mut store, ADA, "marple");
    let public = projector::public_state(&store, WINDOW);
    let ada = public.players.iter().find(|p| p.player_id == ADA).unwrap();
    assert_eq!(ada.hand_count, 2);
    assert_eq!(public.player_turn_id, ADA);
}

#[test]
fn open_window_appears_in_the_snapshot_with_chain_length() {
    let mut store = store_three();
    let played = give(&mut store, ADA, "card_trade");
    let offered = give(&mut store, ADA, "marple");
    events::play_event(
        &mut store,
        ADA,
        played,
        RuleName::CardTrade,
        PlayPayload {
            target_player: Some(BRENDAN),
            offered_card: Some(offered),
        },
        WINDOW,
    )
    .unwrap();
    let counter = give(&mut store, CLARA, "not_so_fast");
    events::play_not_so_fast(&mut store, CLARA, counter).unwrap();

    let public = projector::public_state(&store, WINDOW);
    let nsf = public.nsf.expect("window in snapshot");
    assert!(nsf.open);
    assert_eq!(nsf.chain_length, 1);
}

#[test]
fn snapshot_fanout_is_one_public_plus_one_private_per_seat() {
    let store = store_three();
    let events = projector::snapshot_events(&store, WINDOW);
    assert_eq!(events.len(), 4);
    assert!(matches!(
        events[0],
        Outbound::Room(ServerEvent::EstadoPartida { .. })
    ));
    let private_targets: Vec<i64> = events[1..]
        .iter()
        .map(|e| match e {
            Outbound::Player(id, ServerEvent::EstadosPrivados { .. }) => *id,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(private_targets, vec![ADA, BRENDAN, CLARA]);
}

#[test]
fn awaited_player_follows_the_pending_protocol() {
    let mut store = store_three();
    give(&mut store, BRENDAN, "marple");
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
    deathcards::game::nsf::resolve(&mut store, output.window_action_id.unwrap())
        .unwrap()
        .expect("resolved");
    let public = projector::public_state(&store, WINDOW);
    // The give step belongs to the blackmailed target now.
    assert_eq!(public.awaited_player_id, Some(BRENDAN));
}
