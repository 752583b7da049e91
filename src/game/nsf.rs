//! The Not So Fast counter protocol: a cancellable action defers its
//! effect behind a time-bounded window, and the parity of counters played
//! inside the window decides whether the action continues or dies.

use crate::database::models::{ActionKind, ActionResult};
use crate::errors::GameError;
use crate::game::events;
use crate::game::projector::{Outbound, ServerEvent};
use crate::game::store::{ActionDraft, GameStore};

/// Opens a window on the deferred action `x`: the INSTANT_START record is
/// the timer's epoch. Returns its id.
pub fn open_window(store: &mut GameStore, x_id: i64, actor: i64) -> i64 {
    store.append_action(
        ActionDraft::new(actor, ActionKind::InstantStart, "not_so_fast").parent(x_id),
    )
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub x_id: i64,
    pub chain_length: usize,
    pub continued: bool,
    pub events: Vec<Outbound>,
}

/// Resolves the window whose INSTANT_START record is `y_id`. Runs under
/// the per-game lock; if the record is no longer PENDING the firing is a
/// no-op (a stale timer or a finished game).
pub fn resolve(store: &mut GameStore, y_id: i64) -> Result<Option<Resolution>, GameError> {
    let (x_id, pending) = match store.action(y_id) {
        Ok(y) => (y.parent_action, y.result == ActionResult::Pending),
        Err(_) => return Ok(None),
    };
    if !pending {
        return Ok(None);
    }
    let x_id = x_id.ok_or(GameError::WrongStep)?;

    let chain = store.nsf_chain(y_id);
    let chain_length = chain.len();
    // The counters themselves succeeded either way.
    for z_id in &chain {
        store.set_action_result(*z_id, ActionResult::Success)?;
    }

    let continued = chain_length % 2 == 0;
    let mut events = Vec::new();
    if continued {
        store.set_action_result(y_id, ActionResult::Success)?;
        store.set_action_result(x_id, ActionResult::Continue)?;
        events.extend(events::apply_rule_effect(store, x_id)?);
        events.push(Outbound::Room(ServerEvent::NsfCounterComplete {
            action_id: x_id,
            final_result: "continue".to_string(),
            chain_length,
        }));
    } else {
        store.set_action_result(y_id, ActionResult::Cancelled)?;
        store.set_action_result(x_id, ActionResult::Cancelled)?;
        for child in store.pending_children(x_id) {
            store.set_action_result(child, ActionResult::Cancelled)?;
        }
        events.push(Outbound::Room(ServerEvent::NsfCounterComplete {
            action_id: x_id,
            final_result: "cancelled".to_string(),
            chain_length,
        }));
    }
    Ok(Some(Resolution {
        x_id,
        chain_length,
        continued,
        events,
    }))
}
