//! The in-memory authoritative model of a single game: typed piles with
//! per-entry identity, the turn list, and the append-only action log.
//! Mutations run on a staged clone under the per-game lock and are flushed
//! to the database in one transaction; the clone replaces the live store
//! only after the commit succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::database::catalog::Catalog;
use crate::database::games as db_games;
use crate::database::init::DbPool;
use crate::database::models::{
    ActionKind, ActionResult, GamePhase, Pile, PlayerRow, TurnStatus,
};
use crate::errors::GameError;

#[derive(Debug, Clone, PartialEq)]
pub struct CardInstance {
    pub id: i64,
    pub card_id: i64,
    pub pile: Pile,
    pub owner: Option<i64>,
    pub set_slot: Option<i64>,
    pub position: i64,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub id: i64,
    pub number: i64,
    pub player_id: i64,
    pub status: TurnStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub id: i64,
    pub turn_id: i64,
    pub player_id: i64,
    pub kind: ActionKind,
    pub name: String,
    pub result: ActionResult,
    pub parent_action: Option<i64>,
    pub triggered_by_action: Option<i64>,
    pub selected_card: Option<i64>,
    pub card_received: Option<i64>,
    pub source_pile: Option<Pile>,
    pub position: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Everything an action append needs besides the identity fields the store
/// fills in itself (id, turn, timestamp).
#[derive(Debug, Clone)]
pub struct ActionDraft {
    pub player_id: i64,
    pub kind: ActionKind,
    pub name: String,
    pub result: ActionResult,
    pub parent_action: Option<i64>,
    pub triggered_by_action: Option<i64>,
    pub selected_card: Option<i64>,
    pub card_received: Option<i64>,
    pub source_pile: Option<Pile>,
    pub position: Option<i64>,
}

impl ActionDraft {
    pub fn new(player_id: i64, kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            player_id,
            kind,
            name: name.into(),
            result: ActionResult::Pending,
            parent_action: None,
            triggered_by_action: None,
            selected_card: None,
            card_received: None,
            source_pile: None,
            position: None,
        }
    }

    pub fn result(mut self, result: ActionResult) -> Self {
        self.result = result;
        self
    }

    pub fn parent(mut self, id: i64) -> Self {
        self.parent_action = Some(id);
        self
    }

    pub fn triggered_by(mut self, id: i64) -> Self {
        self.triggered_by_action = Some(id);
        self
    }

    pub fn selected(mut self, card: i64) -> Self {
        self.selected_card = Some(card);
        self
    }

    pub fn source(mut self, pile: Pile) -> Self {
        self.source_pile = Some(pile);
        self
    }

    pub fn at_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }
}

/// An open Not So Fast window derived from the action log.
#[derive(Debug, Clone, Copy)]
pub struct NsfWindow {
    pub x_id: i64,
    pub y_id: i64,
    pub opened_at: DateTime<Utc>,
    pub chain_length: usize,
}

#[derive(Debug, Clone, Default)]
struct Dirty {
    cards: BTreeSet<i64>,
    new_actions: BTreeSet<i64>,
    touched_actions: BTreeSet<i64>,
    new_turns: BTreeSet<i64>,
    touched_turns: BTreeSet<i64>,
    players: BTreeSet<i64>,
    game: bool,
}

impl Dirty {
    fn clear(&mut self) {
        *self = Dirty::default();
    }
}

#[derive(Debug, Clone)]
pub struct GameStore {
    pub game_id: i64,
    pub room_id: i64,
    pub phase: GamePhase,
    pub turn_number: i64,
    pub current_turn_player: i64,
    pub catalog: Arc<Catalog>,
    players: Vec<PlayerRow>,
    cards: BTreeMap<i64, CardInstance>,
    turns: Vec<TurnRecord>,
    actions: Vec<ActionRecord>,
    dirty: Dirty,
    /// Owners whose SECRET_SET was touched since the last derivator pass.
    touched_secret_owners: BTreeSet<i64>,
    /// Horizon after which an unanswered multi-step action stops blocking
    /// the game (and its late step call gets `action_expired`).
    pub ashes_horizon_secs: i64,
}

impl GameStore {
    pub fn new(
        game_id: i64,
        room_id: i64,
        mut players: Vec<PlayerRow>,
        catalog: Arc<Catalog>,
    ) -> Self {
        players.sort_by_key(|p| p.order_index);
        let current = players.first().map(|p| p.player_id).unwrap_or(0);
        Self {
            game_id,
            room_id,
            phase: GamePhase::Idle,
            turn_number: 0,
            current_turn_player: current,
            catalog,
            players,
            cards: BTreeMap::new(),
            turns: Vec::new(),
            actions: Vec::new(),
            dirty: Dirty::default(),
            touched_secret_owners: BTreeSet::new(),
            ashes_horizon_secs: crate::constants::DEFAULT_ASHES_HORIZON_SECS,
        }
    }

    // ---- players ------------------------------------------------------

    pub fn players(&self) -> &[PlayerRow] {
        &self.players
    }

    pub fn player(&self, player_id: i64) -> Result<&PlayerRow, GameError> {
        self.players
            .iter()
            .find(|p| p.player_id == player_id)
            .ok_or(GameError::PlayerNotFound)
    }

    pub fn set_disgrace(&mut self, player_id: i64, value: bool) -> Result<bool, GameError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.player_id == player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if player.in_social_disgrace == value {
            return Ok(false);
        }
        player.in_social_disgrace = value;
        self.dirty.players.insert(player_id);
        Ok(true)
    }

    // ---- card queries -------------------------------------------------

    pub fn card(&self, instance_id: i64) -> Result<&CardInstance, GameError> {
        self.cards.get(&instance_id).ok_or(GameError::CardNotFound)
    }

    pub fn cards_by_ids(&self, ids: &[i64]) -> Result<Vec<&CardInstance>, GameError> {
        ids.iter().map(|id| self.card(*id)).collect()
    }

    /// All instances of a shared (owner-free) pile, in position order.
    pub fn pile(&self, pile: Pile) -> Vec<&CardInstance> {
        let mut out: Vec<&CardInstance> =
            self.cards.values().filter(|c| c.pile == pile).collect();
        out.sort_by_key(|c| c.position);
        out
    }

    /// An owner-bound compartment, in position order.
    pub fn pile_of(&self, pile: Pile, owner: i64) -> Vec<&CardInstance> {
        let mut out: Vec<&CardInstance> = self
            .cards
            .values()
            .filter(|c| c.pile == pile && c.owner == Some(owner))
            .collect();
        out.sort_by_key(|c| c.position);
        out
    }

    pub fn hand_of(&self, player_id: i64) -> Vec<&CardInstance> {
        self.pile_of(Pile::Hand, player_id)
    }

    pub fn hand_size(&self, player_id: i64) -> usize {
        self.hand_of(player_id).len()
    }

    pub fn secrets_of(&self, player_id: i64) -> Vec<&CardInstance> {
        self.pile_of(Pile::SecretSet, player_id)
    }

    /// Ids of the top `n` deck cards. The deck's top is position 1.
    pub fn deck_top(&self, n: usize) -> Vec<i64> {
        self.pile(Pile::Deck).iter().take(n).map(|c| c.id).collect()
    }

    pub fn deck_size(&self) -> usize {
        self.pile(Pile::Deck).len()
    }

    /// The discard's top is its highest position.
    pub fn discard_top(&self) -> Option<&CardInstance> {
        self.pile(Pile::Discard).into_iter().last()
    }

    pub fn max_position(&self, pile: Pile, owner: Option<i64>) -> i64 {
        self.cards
            .values()
            .filter(|c| c.pile == pile && c.owner == owner)
            .map(|c| c.position)
            .max()
            .unwrap_or(0)
    }

    /// Detective sets of a player, grouped by set slot, cards in position order.
    pub fn detective_sets(&self, player_id: i64) -> BTreeMap<i64, Vec<&CardInstance>> {
        let mut sets: BTreeMap<i64, Vec<&CardInstance>> = BTreeMap::new();
        for card in self
            .cards
            .values()
            .filter(|c| c.pile == Pile::DetectiveSet && c.owner == Some(player_id))
        {
            sets.entry(card.set_slot.unwrap_or(0)).or_default().push(card);
        }
        for cards in sets.values_mut() {
            cards.sort_by_key(|c| c.position);
        }
        sets
    }

    pub fn next_set_slot(&self, player_id: i64) -> i64 {
        self.cards
            .values()
            .filter(|c| c.pile == Pile::DetectiveSet && c.owner == Some(player_id))
            .filter_map(|c| c.set_slot)
            .max()
            .map(|slot| slot + 1)
            .unwrap_or(0)
    }

    // ---- card mutations -----------------------------------------------

    /// Creates an instance directly; used by game setup and tests.
    pub fn insert_card(
        &mut self,
        card_id: i64,
        pile: Pile,
        owner: Option<i64>,
        set_slot: Option<i64>,
        position: i64,
        hidden: bool,
    ) -> i64 {
        debug_assert_eq!(pile.owner_bound(), owner.is_some());
        let id = self.cards.keys().max().map(|m| m + 1).unwrap_or(1);
        self.cards.insert(
            id,
            CardInstance {
                id,
                card_id,
                pile,
                owner,
                set_slot,
                position,
                hidden,
            },
        );
        if pile == Pile::SecretSet {
            if let Some(owner) = owner {
                self.touched_secret_owners.insert(owner);
            }
        }
        id
    }

    /// Moves an instance to a new compartment. The vacated compartment is
    /// renumbered so positions stay contiguous; the draft is exempt because
    /// its slots are refilled in place.
    pub fn move_card(
        &mut self,
        instance_id: i64,
        pile: Pile,
        owner: Option<i64>,
        set_slot: Option<i64>,
        position: i64,
        hidden: bool,
    ) -> Result<(), GameError> {
        debug_assert_eq!(pile.owner_bound(), owner.is_some());
        let (old_pile, old_owner, old_slot) = {
            let card = self.cards.get(&instance_id).ok_or(GameError::CardNotFound)?;
            (card.pile, card.owner, card.set_slot)
        };
        {
            let card = self.cards.get_mut(&instance_id).expect("checked above");
            card.pile = pile;
            card.owner = owner;
            card.set_slot = set_slot;
            card.position = position;
            card.hidden = hidden;
        }
        self.dirty.cards.insert(instance_id);
        if old_pile == Pile::SecretSet {
            if let Some(o) = old_owner {
                self.touched_secret_owners.insert(o);
            }
        }
        if pile == Pile::SecretSet {
            if let Some(o) = owner {
                self.touched_secret_owners.insert(o);
            }
        }
        if old_pile != Pile::Draft {
            self.renumber(old_pile, old_owner, old_slot);
        }
        Ok(())
    }

    /// Flips the visibility of an instance in place.
    pub fn set_hidden(&mut self, instance_id: i64, hidden: bool) -> Result<(), GameError> {
        let card = self
            .cards
            .get_mut(&instance_id)
            .ok_or(GameError::CardNotFound)?;
        if card.hidden == hidden {
            return Ok(());
        }
        card.hidden = hidden;
        let touched = (card.pile == Pile::SecretSet).then_some(card.owner).flatten();
        self.dirty.cards.insert(instance_id);
        if let Some(owner) = touched {
            self.touched_secret_owners.insert(owner);
        }
        Ok(())
    }

    /// Swaps the catalog identities of two instances; both stay where they
    /// are. This is the card-exchange primitive.
    pub fn swap_cards(&mut self, a: i64, b: i64) -> Result<(), GameError> {
        if a == b {
            return Ok(());
        }
        let card_a = self.cards.get(&a).ok_or(GameError::CardNotFound)?.card_id;
        let card_b = self.cards.get(&b).ok_or(GameError::CardNotFound)?.card_id;
        for (id, new_card) in [(a, card_b), (b, card_a)] {
            let card = self.cards.get_mut(&id).expect("checked above");
            card.card_id = new_card;
            if card.pile == Pile::SecretSet {
                if let Some(owner) = card.owner {
                    self.touched_secret_owners.insert(owner);
                }
            }
            self.dirty.cards.insert(id);
        }
        Ok(())
    }

    /// Re-indexes a compartment to contiguous positions starting at 1,
    /// ordered by prior position (stable).
    pub fn renumber(&mut self, pile: Pile, owner: Option<i64>, set_slot: Option<i64>) {
        let mut ids: Vec<(i64, i64)> = self
            .cards
            .values()
            .filter(|c| c.pile == pile && c.owner == owner && c.set_slot == set_slot)
            .map(|c| (c.position, c.id))
            .collect();
        ids.sort_unstable();
        for (idx, (_, id)) in ids.into_iter().enumerate() {
            let wanted = idx as i64 + 1;
            let card = self.cards.get_mut(&id).expect("id from iteration");
            if card.position != wanted {
                card.position = wanted;
                self.dirty.cards.insert(id);
            }
        }
    }

    pub fn take_touched_secret_owners(&mut self) -> BTreeSet<i64> {
        std::mem::take(&mut self.touched_secret_owners)
    }

    // ---- turns --------------------------------------------------------

    pub fn current_turn(&self) -> Option<&TurnRecord> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.status == TurnStatus::InProgress)
    }

    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    pub fn open_turn(&mut self, player_id: i64, number: i64) -> i64 {
        let id = self.turns.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        self.turns.push(TurnRecord {
            id,
            number,
            player_id,
            status: TurnStatus::InProgress,
            started_at: Utc::now(),
        });
        self.dirty.new_turns.insert(id);
        self.turn_number = number;
        self.current_turn_player = player_id;
        self.dirty.game = true;
        id
    }

    pub fn complete_current_turn(&mut self) {
        if let Some(turn) = self
            .turns
            .iter_mut()
            .rev()
            .find(|t| t.status == TurnStatus::InProgress)
        {
            turn.status = TurnStatus::Completed;
            let id = turn.id;
            if !self.dirty.new_turns.contains(&id) {
                self.dirty.touched_turns.insert(id);
            }
        }
    }

    pub fn set_phase(&mut self, phase: GamePhase) {
        if self.phase != phase {
            self.phase = phase;
            self.dirty.game = true;
        }
    }

    // ---- action log ---------------------------------------------------

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn action(&self, action_id: i64) -> Result<&ActionRecord, GameError> {
        self.actions
            .iter()
            .find(|a| a.id == action_id)
            .ok_or(GameError::ActionNotFound)
    }

    pub fn append_action(&mut self, draft: ActionDraft) -> i64 {
        let id = self.actions.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let turn_id = self.current_turn().map(|t| t.id).unwrap_or(0);
        self.actions.push(ActionRecord {
            id,
            turn_id,
            player_id: draft.player_id,
            kind: draft.kind,
            name: draft.name,
            result: draft.result,
            parent_action: draft.parent_action,
            triggered_by_action: draft.triggered_by_action,
            selected_card: draft.selected_card,
            card_received: draft.card_received,
            source_pile: draft.source_pile,
            position: draft.position,
            created_at: Utc::now(),
        });
        self.dirty.new_actions.insert(id);
        id
    }

    /// Resolves a PENDING record; results transition exactly once.
    pub fn set_action_result(
        &mut self,
        action_id: i64,
        result: ActionResult,
    ) -> Result<(), GameError> {
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or(GameError::ActionNotFound)?;
        if action.result != ActionResult::Pending {
            return Err(GameError::ActionNotPending);
        }
        action.result = result;
        let id = action.id;
        if !self.dirty.new_actions.contains(&id) {
            self.dirty.touched_actions.insert(id);
        }
        Ok(())
    }

    pub fn set_action_cards(
        &mut self,
        action_id: i64,
        selected: Option<i64>,
        received: Option<i64>,
    ) -> Result<(), GameError> {
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or(GameError::ActionNotFound)?;
        if selected.is_some() {
            action.selected_card = selected;
        }
        if received.is_some() {
            action.card_received = received;
        }
        let id = action.id;
        if !self.dirty.new_actions.contains(&id) {
            self.dirty.touched_actions.insert(id);
        }
        Ok(())
    }

    /// The open counter window, if any: the PENDING INSTANT_START record
    /// and its parent (the deferred action).
    pub fn open_nsf(&self) -> Option<NsfWindow> {
        let y = self
            .actions
            .iter()
            .rev()
            .find(|a| a.kind == ActionKind::InstantStart && a.result == ActionResult::Pending)?;
        let x_id = y.parent_action?;
        Some(NsfWindow {
            x_id,
            y_id: y.id,
            opened_at: y.created_at,
            chain_length: self.nsf_chain(y.id).len(),
        })
    }

    /// The counter chain of a window: INSTANT_PLAY records parented to the
    /// window-start record.
    pub fn nsf_chain(&self, y_id: i64) -> Vec<i64> {
        self.actions
            .iter()
            .filter(|a| a.kind == ActionKind::InstantPlay && a.parent_action == Some(y_id))
            .map(|a| a.id)
            .collect()
    }

    /// PENDING children of an action (window starts excluded).
    pub fn pending_children(&self, parent_id: i64) -> Vec<i64> {
        self.actions
            .iter()
            .filter(|a| {
                a.parent_action == Some(parent_id)
                    && a.result == ActionResult::Pending
                    && a.kind != ActionKind::InstantStart
            })
            .map(|a| a.id)
            .collect()
    }

    /// A multi-step action still awaiting somebody's input. Actions whose
    /// window is still open are reported by `open_nsf` instead; a record
    /// past the horizon no longer blocks the game.
    pub fn pending_protocol(&self) -> Option<&ActionRecord> {
        let now = Utc::now();
        self.actions.iter().rev().find(|a| {
            a.result == ActionResult::Pending
                && matches!(
                    a.kind,
                    ActionKind::EventCard | ActionKind::DetectivePlay | ActionKind::CardExchange
                )
                && (now - a.created_at).num_seconds() <= self.ashes_horizon_secs
                && !self.actions.iter().any(|y| {
                    y.kind == ActionKind::InstantStart
                        && y.parent_action == Some(a.id)
                        && y.result == ActionResult::Pending
                })
        })
    }

    // ---- persistence --------------------------------------------------

    /// Writes the whole aggregate (used once, right after setup).
    pub async fn persist_setup(&mut self, pool: &DbPool) -> Result<(), GameError> {
        let mut tx = pool.begin().await?;
        for card in self.cards.values() {
            db_games::insert_card_instance(&mut tx, self.game_id, card).await?;
        }
        for turn in &self.turns {
            db_games::insert_turn(&mut tx, self.game_id, turn).await?;
        }
        db_games::update_game(
            &mut tx,
            self.game_id,
            self.phase,
            self.turn_number,
            self.current_turn_player,
        )
        .await?;
        tx.commit().await?;
        self.dirty.clear();
        Ok(())
    }

    /// Flushes the staged changes in one transaction and clears the dirty
    /// set. On error the transaction rolls back and the dirty set is kept;
    /// callers drop the staged clone, so memory stays at the committed state.
    pub async fn flush(&mut self, pool: &DbPool) -> Result<(), GameError> {
        let d = &self.dirty;
        if !d.game
            && d.cards.is_empty()
            && d.new_actions.is_empty()
            && d.touched_actions.is_empty()
            && d.new_turns.is_empty()
            && d.touched_turns.is_empty()
            && d.players.is_empty()
        {
            return Ok(());
        }
        let mut tx = pool.begin().await?;
        if self.dirty.game {
            db_games::update_game(
                &mut tx,
                self.game_id,
                self.phase,
                self.turn_number,
                self.current_turn_player,
            )
            .await?;
        }
        for id in &self.dirty.cards {
            let card = self.cards.get(id).expect("dirty id always present");
            db_games::update_card_instance(&mut tx, self.game_id, card).await?;
        }
        for id in &self.dirty.new_turns {
            let turn = self.turns.iter().find(|t| t.id == *id).expect("dirty turn");
            db_games::insert_turn(&mut tx, self.game_id, turn).await?;
        }
        for id in &self.dirty.touched_turns {
            let turn = self.turns.iter().find(|t| t.id == *id).expect("dirty turn");
            db_games::update_turn(&mut tx, self.game_id, turn).await?;
        }
        for id in &self.dirty.new_actions {
            let action = self.actions.iter().find(|a| a.id == *id).expect("dirty action");
            db_games::insert_action(&mut tx, self.game_id, action).await?;
        }
        for id in &self.dirty.touched_actions {
            let action = self.actions.iter().find(|a| a.id == *id).expect("dirty action");
            db_games::update_action(&mut tx, self.game_id, action).await?;
        }
        for player_id in &self.dirty.players {
            let player = self.player(*player_id)?;
            db_games::update_player_disgrace(&mut tx, *player_id, player.in_social_disgrace)
                .await?;
        }
        tx.commit().await?;
        self.dirty.clear();
        Ok(())
    }
}
