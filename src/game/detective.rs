//! The detective-set protocol: lay a set, optionally grow it, pick a
//! target, then resolve the set's effect on the target's secrets.

use rand::Rng;

use crate::constants::MIN_SET_SIZE;
use crate::database::models::{ActionKind, ActionResult, CardKind, Pile};
use crate::errors::GameError;
use crate::game::projector::{Outbound, ServerEvent};
use crate::game::store::{ActionDraft, GameStore};

pub const WILDCARD_TAG: &str = "harley_quin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectiveType {
    Marple,
    Poirot,
    Beresford,
    Eileen,
    Satterthwaite,
    ParkerPyne,
    Oliver,
}

/// Who picks the secret once a target is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chooser {
    Actor,
    Target,
    /// Ariadne Oliver's distinct selection rule: the secret is drawn at
    /// random when the target is picked, with no further step.
    Random,
}

impl DetectiveType {
    pub fn tag(&self) -> &'static str {
        match self {
            DetectiveType::Marple => "marple",
            DetectiveType::Poirot => "poirot",
            DetectiveType::Beresford => "beresford",
            DetectiveType::Eileen => "eileen",
            DetectiveType::Satterthwaite => "satterthwaite",
            DetectiveType::ParkerPyne => "parker_pyne",
            DetectiveType::Oliver => "oliver",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "marple" => Some(DetectiveType::Marple),
            "poirot" => Some(DetectiveType::Poirot),
            "beresford" => Some(DetectiveType::Beresford),
            "eileen" => Some(DetectiveType::Eileen),
            "satterthwaite" => Some(DetectiveType::Satterthwaite),
            "parker_pyne" => Some(DetectiveType::ParkerPyne),
            "oliver" => Some(DetectiveType::Oliver),
            _ => None,
        }
    }

    pub fn chooser(&self) -> Chooser {
        match self {
            DetectiveType::Marple | DetectiveType::Poirot | DetectiveType::ParkerPyne => {
                Chooser::Actor
            }
            DetectiveType::Beresford | DetectiveType::Eileen | DetectiveType::Satterthwaite => {
                Chooser::Target
            }
            DetectiveType::Oliver => Chooser::Random,
        }
    }

    /// Parker Pyne hides a revealed secret; everyone else reveals.
    pub fn hides(&self) -> bool {
        *self == DetectiveType::ParkerPyne
    }
}

fn detective_tag(store: &GameStore, instance_id: i64) -> Result<String, GameError> {
    let card = store.card(instance_id)?;
    match store.catalog.kind(card.card_id) {
        Some(CardKind::Detective) => Ok(store
            .catalog
            .rule(card.card_id)
            .unwrap_or_default()
            .to_string()),
        _ => Err(GameError::WrongCard),
    }
}

/// Lays a detective set from the hand. The wildcard may join a set only
/// alongside at least one matching real detective.
pub fn play_set(
    store: &mut GameStore,
    player_id: i64,
    card_ids: &[i64],
    declared: DetectiveType,
) -> Result<(i64, Vec<Outbound>), GameError> {
    if card_ids.len() < MIN_SET_SIZE {
        return Err(GameError::Validation(format!(
            "a detective set needs at least {MIN_SET_SIZE} cards"
        )));
    }
    let mut unique = card_ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() != card_ids.len() {
        return Err(GameError::Validation("duplicate card in set".into()));
    }

    let mut real = 0usize;
    for id in card_ids {
        let card = store.card(*id)?;
        if card.pile != Pile::Hand || card.owner != Some(player_id) {
            return Err(GameError::WrongCard);
        }
        let tag = detective_tag(store, *id)?;
        if tag == WILDCARD_TAG {
            continue;
        }
        if tag != declared.tag() {
            return Err(GameError::WrongCard);
        }
        real += 1;
    }
    if real == 0 {
        return Err(GameError::Validation(
            "the wildcard cannot form a set on its own".into(),
        ));
    }

    let slot = store.next_set_slot(player_id);
    for (idx, id) in card_ids.iter().enumerate() {
        store.move_card(
            *id,
            Pile::DetectiveSet,
            Some(player_id),
            Some(slot),
            idx as i64 + 1,
            false,
        )?;
    }
    let action_id = store.append_action(
        ActionDraft::new(player_id, ActionKind::DetectivePlay, declared.tag()).at_position(slot),
    );
    let events = vec![Outbound::Room(ServerEvent::DetectiveActionStarted {
        action_id,
        player_id,
        set_type: declared.tag().to_string(),
        next_action: "select_player".to_string(),
    })];
    Ok((action_id, events))
}

/// Adds one more detective card to an already-laid set.
pub fn add_to_set(
    store: &mut GameStore,
    player_id: i64,
    instance_id: i64,
    set_slot: i64,
) -> Result<(i64, Vec<Outbound>), GameError> {
    let card = store.card(instance_id)?;
    if card.pile != Pile::Hand || card.owner != Some(player_id) {
        return Err(GameError::WrongCard);
    }
    let sets = store.detective_sets(player_id);
    let existing = sets.get(&set_slot).ok_or(GameError::WrongCard)?;
    let set_tag = existing
        .iter()
        .find_map(|c| {
            let tag = store.catalog.rule(c.card_id)?;
            (tag != WILDCARD_TAG).then(|| tag.to_string())
        })
        .ok_or(GameError::WrongCard)?;
    let tag = detective_tag(store, instance_id)?;
    if tag != WILDCARD_TAG && tag != set_tag {
        return Err(GameError::WrongCard);
    }

    let next = existing.len() as i64 + 1;
    store.move_card(
        instance_id,
        Pile::DetectiveSet,
        Some(player_id),
        Some(set_slot),
        next,
        false,
    )?;
    let action_id = store.append_action(
        ActionDraft::new(player_id, ActionKind::DetectivePlay, set_tag)
            .result(ActionResult::Success)
            .selected(instance_id)
            .at_position(set_slot),
    );
    let events = vec![Outbound::Room(ServerEvent::EventStepUpdate {
        action_id,
        step: "add_to_set".to_string(),
        cards: None,
        chain_length: None,
    })];
    Ok((action_id, events))
}

fn selected_target(store: &GameStore, x_id: i64) -> Option<i64> {
    store
        .actions()
        .iter()
        .find(|a| {
            a.parent_action == Some(x_id)
                && a.kind == ActionKind::DetectiveAction
                && a.result == ActionResult::Continue
        })
        .map(|a| a.player_id)
}

fn checked_parent(
    store: &GameStore,
    action_id: i64,
) -> Result<(i64, DetectiveType), GameError> {
    let action = store.action(action_id)?;
    if action.kind != ActionKind::DetectivePlay {
        return Err(GameError::WrongStep);
    }
    if action.result != ActionResult::Pending {
        return Err(GameError::ActionNotPending);
    }
    let set_type = DetectiveType::from_tag(&action.name).ok_or(GameError::WrongStep)?;
    Ok((action.player_id, set_type))
}

/// Step three: the actor picks a target. Eligibility (not in social
/// disgrace) is recomputed here, not at play time.
pub fn select_target(
    store: &mut GameStore,
    player_id: i64,
    action_id: i64,
    target_player_id: i64,
) -> Result<Vec<Outbound>, GameError> {
    let (actor, set_type) = checked_parent(store, action_id)?;
    if actor != player_id {
        return Err(GameError::NotYourTurn);
    }
    if selected_target(store, action_id).is_some() {
        return Err(GameError::WrongStep);
    }
    let target = store.player(target_player_id)?;
    if target_player_id == player_id {
        return Err(GameError::Validation("cannot target yourself".into()));
    }
    if target.in_social_disgrace {
        return Err(GameError::IneligibleTarget);
    }

    store.append_action(
        ActionDraft::new(target_player_id, ActionKind::DetectiveAction, set_type.tag())
            .result(ActionResult::Continue)
            .parent(action_id),
    );

    let next_action = match set_type.chooser() {
        Chooser::Actor => "select_secret",
        Chooser::Target => "select_own_secret",
        Chooser::Random => "none",
    };
    let mut events = vec![Outbound::Room(ServerEvent::DetectiveTargetSelected {
        action_id,
        target_player_id,
        next_action: next_action.to_string(),
    })];

    match set_type.chooser() {
        Chooser::Actor => {}
        Chooser::Target => events.push(Outbound::Player(
            target_player_id,
            ServerEvent::SelectOwnSecret {
                action_id,
                player_id: target_player_id,
            },
        )),
        Chooser::Random => {
            let hidden: Vec<i64> = store
                .secrets_of(target_player_id)
                .iter()
                .filter(|c| c.hidden)
                .map(|c| c.id)
                .collect();
            let picked = (!hidden.is_empty())
                .then(|| hidden[rand::rng().random_range(0..hidden.len())]);
            events.extend(resolve_effect(store, action_id, set_type, player_id, target_player_id, picked)?);
        }
    }
    Ok(events)
}

/// Step four: apply the set's effect to a chosen secret. Marple, Poirot
/// and Parker Pyne resolve with the actor's choice; the Beresford family
/// resolves with the target's own choice.
pub fn apply_effect(
    store: &mut GameStore,
    player_id: i64,
    action_id: i64,
    secret_instance_id: i64,
) -> Result<Vec<Outbound>, GameError> {
    let (actor, set_type) = checked_parent(store, action_id)?;
    let target = selected_target(store, action_id).ok_or(GameError::WrongStep)?;
    let expected_chooser = match set_type.chooser() {
        Chooser::Actor => actor,
        Chooser::Target => target,
        Chooser::Random => return Err(GameError::WrongStep),
    };
    if player_id != expected_chooser {
        return Err(GameError::NotYourTurn);
    }
    resolve_effect(store, action_id, set_type, actor, target, Some(secret_instance_id))
}

fn resolve_effect(
    store: &mut GameStore,
    action_id: i64,
    set_type: DetectiveType,
    actor: i64,
    target: i64,
    secret: Option<i64>,
) -> Result<Vec<Outbound>, GameError> {
    let mut transferred = false;
    if let Some(secret_id) = secret {
        let card = store.card(secret_id)?;
        if card.pile != Pile::SecretSet || card.owner != Some(target) {
            return Err(GameError::WrongCard);
        }
        if store.catalog.kind(card.card_id) != Some(CardKind::Secret) {
            return Err(GameError::WrongCard);
        }
        if set_type.hides() {
            if card.hidden {
                return Err(GameError::WrongCard);
            }
            store.set_hidden(secret_id, true)?;
        } else {
            if !card.hidden {
                return Err(GameError::WrongCard);
            }
            store.set_hidden(secret_id, false)?;
        }

        // Satterthwaite backed by the wildcard also walks away with the
        // revealed secret, visibility intact.
        if set_type == DetectiveType::Satterthwaite {
            let slot = store.action(action_id)?.position.unwrap_or(0);
            let has_wildcard = store
                .detective_sets(actor)
                .get(&slot)
                .map(|cards| {
                    cards
                        .iter()
                        .any(|c| store.catalog.rule(c.card_id) == Some(WILDCARD_TAG))
                })
                .unwrap_or(false);
            if has_wildcard {
                let pos = store.max_position(Pile::Hand, Some(actor)) + 1;
                store.move_card(secret_id, Pile::Hand, Some(actor), None, pos, false)?;
                transferred = true;
            }
        }

        store.append_action(
            ActionDraft::new(actor, ActionKind::DetectiveAction, set_type.tag())
                .result(ActionResult::Success)
                .parent(action_id)
                .selected(secret_id),
        );
    }
    store.set_action_result(action_id, ActionResult::Success)?;
    Ok(vec![Outbound::Room(ServerEvent::DetectiveActionComplete {
        action_id,
        set_type: set_type.tag().to_string(),
        target_player_id: target,
        secret_instance_id: secret,
        transferred,
    })])
}
