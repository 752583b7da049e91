//! Derives the per-player social-disgrace flag from secret visibility.
//! Runs as a dispatcher post-commit hook over the owners whose SECRET_SET
//! was touched, never from inside the primary transaction.

use std::collections::BTreeSet;

use crate::game::projector::{Outbound, ServerEvent};
use crate::game::store::GameStore;

/// A player is in social disgrace iff they hold at least one secret and
/// every one of their secrets is face up.
pub fn is_disgraced(store: &GameStore, player_id: i64) -> bool {
    let secrets = store.secrets_of(player_id);
    !secrets.is_empty() && secrets.iter().all(|c| !c.hidden)
}

/// Recomputes the flag for each touched owner and emits a change event per
/// flip. The store marks the flag dirty; the caller flushes it in its own
/// short transaction.
pub fn recompute(
    store: &mut GameStore,
    owners: &BTreeSet<i64>,
    trigger: &str,
) -> Vec<Outbound> {
    let mut events = Vec::new();
    for owner in owners {
        let value = is_disgraced(store, *owner);
        match store.set_disgrace(*owner, value) {
            Ok(true) => {
                tracing::info!(player_id = owner, in_social_disgrace = value, trigger, "social disgrace changed");
                events.push(Outbound::Room(ServerEvent::SocialDisgraceChanged {
                    player_id: *owner,
                    in_social_disgrace: value,
                    trigger: trigger.to_string(),
                }));
            }
            Ok(false) => {}
            Err(_) => {}
        }
    }
    events
}
