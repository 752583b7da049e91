//! Builds the per-game snapshots pushed to clients: one complete public
//! state for the room and one private state per player. Hidden secrets
//! never leak a card identity into the public projection.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::database::models::{CardKind, GamePhase, Pile};
use crate::game::store::GameStore;
use crate::game::turn::RankEntry;

#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<i64>,
    pub card_id: i64,
    pub name: String,
    pub kind: CardKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretView {
    pub instance_id: i64,
    pub hidden: bool,
    /// Only present when the secret is face up (or in a private view).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectiveSetView {
    pub set_slot: i64,
    pub cards: Vec<CardView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftSlotView {
    pub position: i64,
    pub card: CardView,
}

#[derive(Debug, Clone, Serialize)]
pub struct NsfWindowView {
    pub open: bool,
    pub action_id: i64,
    pub deadline: DateTime<Utc>,
    pub chain_length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicPlayer {
    pub player_id: i64,
    pub display_name: String,
    pub order_index: i64,
    pub hand_count: usize,
    pub in_social_disgrace: bool,
    pub detective_sets: Vec<DetectiveSetView>,
    pub secrets: Vec<SecretView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicState {
    pub game_id: i64,
    pub room_id: i64,
    pub phase: GamePhase,
    pub turn_number: i64,
    pub player_turn_id: i64,
    pub awaited_player_id: Option<i64>,
    pub deck_count: usize,
    pub discard_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discard_top: Option<CardView>,
    pub draft: Vec<DraftSlotView>,
    pub players: Vec<PublicPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsf: Option<NsfWindowView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrivateState {
    pub player_id: i64,
    pub hand: Vec<CardView>,
    pub secrets: Vec<SecretView>,
}

pub fn card_view(store: &GameStore, instance_id: i64) -> CardView {
    let (card_id, name, kind) = store
        .card(instance_id)
        .ok()
        .map(|c| {
            (
                c.card_id,
                store.catalog.name(c.card_id).to_string(),
                store.catalog.kind(c.card_id).unwrap_or(CardKind::Event),
            )
        })
        .unwrap_or((0, "unknown card".to_string(), CardKind::Event));
    CardView {
        instance_id: Some(instance_id),
        card_id,
        name,
        kind,
    }
}

pub fn public_state(store: &GameStore, nsf_window: Duration) -> PublicState {
    let players = store
        .players()
        .iter()
        .map(|p| {
            let detective_sets = store
                .detective_sets(p.player_id)
                .into_iter()
                .map(|(set_slot, cards)| DetectiveSetView {
                    set_slot,
                    cards: cards.iter().map(|c| card_view(store, c.id)).collect(),
                })
                .collect();
            let secrets = store
                .secrets_of(p.player_id)
                .iter()
                .map(|c| SecretView {
                    instance_id: c.id,
                    hidden: c.hidden,
                    card: (!c.hidden).then(|| card_view(store, c.id)),
                })
                .collect();
            PublicPlayer {
                player_id: p.player_id,
                display_name: p.display_name.clone(),
                order_index: p.order_index,
                hand_count: store.hand_size(p.player_id),
                in_social_disgrace: p.in_social_disgrace,
                detective_sets,
                secrets,
            }
        })
        .collect();

    let nsf = store.open_nsf().map(|w| NsfWindowView {
        open: true,
        action_id: w.x_id,
        deadline: w.opened_at
            + ChronoDuration::from_std(nsf_window).unwrap_or(ChronoDuration::seconds(8)),
        chain_length: w.chain_length,
    });

    let awaited_player_id = store
        .pending_protocol()
        .map(|a| a.player_id)
        .or(Some(store.current_turn_player));

    PublicState {
        game_id: store.game_id,
        room_id: store.room_id,
        phase: store.phase,
        turn_number: store.turn_number,
        player_turn_id: store.current_turn_player,
        awaited_player_id,
        deck_count: store.deck_size(),
        discard_count: store.pile(Pile::Discard).len(),
        discard_top: store.discard_top().map(|c| card_view(store, c.id)),
        draft: store
            .pile(Pile::Draft)
            .iter()
            .map(|c| DraftSlotView {
                position: c.position,
                card: card_view(store, c.id),
            })
            .collect(),
        players,
        nsf,
    }
}

pub fn private_state(store: &GameStore, player_id: i64) -> PrivateState {
    PrivateState {
        player_id,
        hand: store
            .hand_of(player_id)
            .iter()
            .map(|c| card_view(store, c.id))
            .collect(),
        secrets: store
            .secrets_of(player_id)
            .iter()
            .map(|c| SecretView {
                instance_id: c.id,
                hidden: c.hidden,
                card: Some(card_view(store, c.id)),
            })
            .collect(),
    }
}

/// Everything the notifier can push over the room channel. Spanish names
/// for the two snapshot frames are part of the wire contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        user_id: i64,
        room_id: i64,
    },
    Disconnected {
        user_id: i64,
    },
    EstadoPartida {
        state: PublicState,
    },
    EstadosPrivados {
        state: PrivateState,
    },
    EventActionStarted {
        action_id: i64,
        player_id: i64,
        card_name: String,
        cancellable: bool,
    },
    EventStepUpdate {
        action_id: i64,
        step: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cards: Option<Vec<CardView>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        chain_length: Option<usize>,
    },
    EventActionComplete {
        action_id: i64,
        card_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        moved: Option<usize>,
    },
    DetectiveActionStarted {
        action_id: i64,
        player_id: i64,
        set_type: String,
        next_action: String,
    },
    DetectiveTargetSelected {
        action_id: i64,
        target_player_id: i64,
        next_action: String,
    },
    SelectOwnSecret {
        action_id: i64,
        player_id: i64,
    },
    DetectiveActionComplete {
        action_id: i64,
        set_type: String,
        target_player_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_instance_id: Option<i64>,
        transferred: bool,
    },
    NsfCounterStarted {
        action_id: i64,
        deadline: DateTime<Utc>,
    },
    NsfCounterComplete {
        action_id: i64,
        final_result: String,
        chain_length: usize,
    },
    SocialDisgraceChanged {
        player_id: i64,
        in_social_disgrace: bool,
        trigger: String,
    },
    CardDrawnSimple {
        player_id: i64,
        count: usize,
    },
    PlayerMustDraw {
        player_id: i64,
        action_id: i64,
    },
    GameFinished {
        ranking: Vec<RankEntry>,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Routing envelope used by the engine: broadcast to the room, or deliver
/// to one player's subscribers only.
#[derive(Debug, Clone)]
pub enum Outbound {
    Room(ServerEvent),
    Player(i64, ServerEvent),
}

/// The snapshot fan-out after every committed transition: one public frame
/// for the room and a private frame per player.
pub fn snapshot_events(store: &GameStore, nsf_window: Duration) -> Vec<Outbound> {
    let mut out = vec![Outbound::Room(ServerEvent::EstadoPartida {
        state: public_state(store, nsf_window),
    })];
    for player in store.players() {
        out.push(Outbound::Player(
            player.player_id,
            ServerEvent::EstadosPrivados {
                state: private_state(store, player.player_id),
            },
        ));
    }
    out
}
