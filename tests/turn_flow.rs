//! Dispatcher-level flows over an in-memory database: the full
//! lock-stage-flush-notify path, the draw/draft/discard turn cycle, and
//! the persistence mirror.

mod common;

use common::*;
use deathcards::database::models::Pile;
use deathcards::errors::GameError;
use deathcards::game::dispatcher;
use deathcards::game::events::PlayPayload;
use deathcards::game::rules::RuleName;
use deathcards::game::turn;

#[tokio::test]
async fn a_fresh_deal_satisfies_the_pile_invariants() {
    let app = boot_app().await;
    let (game_id, ids) = install_dealt_game(&app).await;
    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    assert!(turn::positions_consistent(&store));
    assert!(turn::one_turn_in_progress(&store));
    for id in &ids {
        assert_eq!(store.secrets_of(*id).len(), 3);
        assert!(store.secrets_of(*id).iter().all(|c| c.hidden));
        assert_eq!(store.hand_size(*id), 4);
    }
    assert_eq!(store.pile(Pile::Draft).len(), 4);
    assert!(store.deck_size() > 0);
}

#[tokio::test]
async fn take_deck_appends_to_the_hand_in_deck_order() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        for _ in 0..3 {
            give(store, ADA, "marple");
        }
        stack_deck(store, "not_so_fast", 4);
    })
    .await;
    let ada = ids[0];

    let result = dispatcher::take_deck(&app, game_id, ada, 2).await.unwrap();
    assert_eq!(result.drawn.len(), 2);

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    assert_eq!(store.hand_size(ada), 5);
    assert_eq!(
        store
            .hand_of(ada)
            .iter()
            .map(|c| c.position)
            .collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(store.deck_size(), 2);
}

#[tokio::test]
async fn draw_then_discard_restores_the_prior_hand() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        give(store, ADA, "marple");
        stack_deck(store, "not_so_fast", 3);
    })
    .await;
    let ada = ids[0];

    let before: Vec<i64> = {
        let handle = app.game(game_id).unwrap();
        let store = handle.store.lock().await;
        store.hand_of(ada).iter().map(|c| c.id).collect()
    };

    let drawn = dispatcher::take_deck(&app, game_id, ada, 2).await.unwrap();
    let drawn_ids: Vec<i64> = drawn.drawn.iter().map(|c| c.instance_id.unwrap()).collect();
    dispatcher::discard(&app, game_id, ada, drawn_ids.clone())
        .await
        .unwrap();

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    let after: Vec<i64> = store.hand_of(ada).iter().map(|c| c.id).collect();
    assert_eq!(before, after);
    // The discard top is the last card of the discarded pair.
    assert_eq!(store.discard_top().unwrap().id, *drawn_ids.last().unwrap());
}

#[tokio::test]
async fn draft_pick_refills_the_vacated_slot_from_the_deck_top() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        add_draft(store, "marple");
        add_draft(store, "poirot");
        stack_deck(store, "not_so_fast", 2);
    })
    .await;
    let ada = ids[0];

    let (slot2, deck_top) = {
        let handle = app.game(game_id).unwrap();
        let store = handle.store.lock().await;
        (store.pile(Pile::Draft)[1].id, store.deck_top(1)[0])
    };

    let result = dispatcher::pick_draft(&app, game_id, ada, slot2).await.unwrap();
    assert_eq!(result.replenished.as_ref().unwrap().instance_id, Some(deck_top));

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    assert_eq!(store.card(slot2).unwrap().pile, Pile::Hand);
    assert_eq!(store.card(deck_top).unwrap().pile, Pile::Draft);
    assert_eq!(store.card(deck_top).unwrap().position, 2);
}

#[tokio::test]
async fn draft_pick_with_a_full_hand_is_refused() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        for _ in 0..6 {
            give(store, ADA, "marple");
        }
        add_draft(store, "poirot");
    })
    .await;
    let ada = ids[0];

    let slot = {
        let handle = app.game(game_id).unwrap();
        let store = handle.store.lock().await;
        store.pile(Pile::Draft)[0].id
    };
    let err = dispatcher::pick_draft(&app, game_id, ada, slot).await.unwrap_err();
    assert!(matches!(err, GameError::MustDiscardBeforeDraft));
}

#[tokio::test]
async fn a_full_hand_may_discard_during_the_draw_step_and_then_draft() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        for _ in 0..6 {
            give(store, ADA, "marple");
        }
        add_draft(store, "poirot");
        stack_deck(store, "not_so_fast", 1);
    })
    .await;
    let ada = ids[0];

    let (shed, slot) = {
        let handle = app.game(game_id).unwrap();
        let store = handle.store.lock().await;
        (store.hand_of(ada)[0].id, store.pile(Pile::Draft)[0].id)
    };
    dispatcher::discard(&app, game_id, ada, vec![shed]).await.unwrap();
    dispatcher::pick_draft(&app, game_id, ada, slot).await.unwrap();

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    assert_eq!(store.hand_size(ada), 6);
    assert_eq!(store.card(slot).unwrap().pile, Pile::Hand);
}

#[tokio::test]
async fn only_the_current_player_may_draw() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        stack_deck(store, "not_so_fast", 2);
    })
    .await;
    let brendan = ids[1];
    let err = dispatcher::take_deck(&app, game_id, brendan, 1).await.unwrap_err();
    assert!(matches!(err, GameError::NotYourTurn));
}

#[tokio::test]
async fn last_draft_card_with_an_empty_deck_ends_the_round() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        add_draft(store, "marple");
        add_secret(store, ADA, true);
        add_secret(store, BRENDAN, true);
    })
    .await;
    let ada = ids[0];

    let slot = {
        let handle = app.game(game_id).unwrap();
        let store = handle.store.lock().await;
        store.pile(Pile::Draft)[0].id
    };
    let result = dispatcher::pick_draft(&app, game_id, ada, slot).await.unwrap();
    assert!(result.game_over);

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    assert_eq!(
        store.phase,
        deathcards::database::models::GamePhase::Finished
    );
    let err = dispatcher::take_deck(&app, game_id, ada, 1).await.unwrap_err();
    assert!(matches!(err, GameError::GameFinished));
}

#[tokio::test]
async fn discarding_the_early_train_removes_it_and_burns_six() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        give(store, ADA, "early_train_to_paddington");
        stack_deck(store, "not_so_fast", 8);
    })
    .await;
    let ada = ids[0];

    let train = {
        let handle = app.game(game_id).unwrap();
        let store = handle.store.lock().await;
        store.hand_of(ada)[0].id
    };
    dispatcher::discard(&app, game_id, ada, vec![train]).await.unwrap();

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    assert_eq!(store.card(train).unwrap().pile, Pile::Removed);
    assert_eq!(store.deck_size(), 2);
    assert_eq!(store.pile(Pile::Discard).len(), 6);
}

#[tokio::test]
async fn finish_turn_passes_play_and_opens_a_new_turn_record() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |_| {}).await;
    let (ada, brendan) = (ids[0], ids[1]);

    let result = dispatcher::finish_turn(&app, game_id, ada).await.unwrap();
    assert_eq!(result.turn_number, 2);
    assert_eq!(result.player_turn_id, brendan);

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    assert_eq!(store.turns().len(), 2);
    assert_eq!(
        store.phase,
        deathcards::database::models::GamePhase::DrawOrDraft
    );
}

#[tokio::test]
async fn committed_state_reaches_the_database_mirror() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        store.set_phase(deathcards::database::models::GamePhase::DrawOrDraft);
        stack_deck(store, "not_so_fast", 2);
    })
    .await;
    let ada = ids[0];
    dispatcher::take_deck(&app, game_id, ada, 1).await.unwrap();

    let hand_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM card_instances WHERE game_id = ? AND pile = 'HAND' AND owner_id = ?",
    )
    .bind(game_id)
    .bind(ada)
    .fetch_one(&app.db)
    .await
    .unwrap();
    assert_eq!(hand_rows, 1);

    let action_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM actions WHERE game_id = ?")
            .bind(game_id)
            .fetch_one(&app.db)
            .await
            .unwrap();
    assert!(action_rows >= 2);
}

#[tokio::test]
async fn window_resolution_applies_the_deferred_trade() {
    let app = boot_app().await;
    let (game_id, ids) = install_game(&app, |store| {
        give(store, ADA, "card_trade");
        give(store, ADA, "marple");
        give(store, BRENDAN, "poirot");
        give(store, BRENDAN, "not_so_fast");
        give(store, CLARA, "not_so_fast");
    })
    .await;
    let (ada, brendan, clara) = (ids[0], ids[1], ids[2]);

    let (played, offered, b_counter, c_counter) = {
        let handle = app.game(game_id).unwrap();
        let store = handle.store.lock().await;
        (
            store.hand_of(ada)[0].id,
            store.hand_of(ada)[1].id,
            store.hand_of(brendan)[1].id,
            store.hand_of(clara)[0].id,
        )
    };

    let play = dispatcher::play_event_card(
        &app,
        game_id,
        ada,
        RuleName::CardTrade,
        played,
        PlayPayload {
            target_player: Some(brendan),
            offered_card: Some(offered),
        },
    )
    .await
    .unwrap();
    let y = play.window_action_id.unwrap();

    // Two counters: even parity, the trade goes through at expiry.
    dispatcher::play_not_so_fast(&app, game_id, brendan, b_counter)
        .await
        .unwrap();
    dispatcher::play_not_so_fast(&app, game_id, clara, c_counter)
        .await
        .unwrap();
    dispatcher::resolve_window(&app, game_id, y).await.unwrap();

    let handle = app.game(game_id).unwrap();
    let store = handle.store.lock().await;
    let x = store.action(play.action_id).unwrap();
    assert_eq!(
        x.result,
        deathcards::database::models::ActionResult::Continue
    );
    assert!(x.card_received.is_some());
    // A later (stale) firing of the same window changes nothing.
    drop(store);
    dispatcher::resolve_window(&app, game_id, y).await.unwrap();
}
