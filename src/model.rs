//! Shared application state: the database pool, the read-only catalog,
//! the registry of live games, and the WebSocket hub. Each live game is
//! guarded by its own async mutex; the lock order is always game-then-db.

use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::database::catalog::Catalog;
use crate::database::init::DbPool;
use crate::errors::GameError;
use crate::game::store::GameStore;
use crate::ws::Hub;

/// A running Not So Fast timer. At most one exists per game; arming is
/// idempotent keyed on the deferred action.
pub struct NsfTimer {
    pub x_id: i64,
    pub handle: JoinHandle<()>,
}

pub struct GameHandle {
    pub game_id: i64,
    pub room_id: i64,
    pub store: Mutex<GameStore>,
    pub timer: StdMutex<Option<NsfTimer>>,
}

impl GameHandle {
    pub fn disarm_timer(&self) {
        let mut slot = self.timer.lock().expect("timer mutex poisoned");
        if let Some(timer) = slot.take() {
            timer.handle.abort();
        }
    }
}

pub struct AppState {
    pub db: DbPool,
    pub catalog: Arc<Catalog>,
    pub config: Config,
    pub games: DashMap<i64, Arc<GameHandle>>,
    pub hub: Hub,
}

impl AppState {
    pub fn new(db: DbPool, catalog: Arc<Catalog>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            db,
            catalog,
            config,
            games: DashMap::new(),
            hub: Hub::new(),
        })
    }

    pub fn game(&self, game_id: i64) -> Result<Arc<GameHandle>, GameError> {
        self.games
            .get(&game_id)
            .map(|h| h.clone())
            .ok_or(GameError::GameNotFound)
    }

    pub fn game_by_room(&self, room_id: i64) -> Option<Arc<GameHandle>> {
        self.games
            .iter()
            .find(|entry| entry.room_id == room_id)
            .map(|entry| entry.clone())
    }

    pub fn install_game(&self, store: GameStore) -> Arc<GameHandle> {
        let handle = Arc::new(GameHandle {
            game_id: store.game_id,
            room_id: store.room_id,
            store: Mutex::new(store),
            timer: StdMutex::new(None),
        });
        self.games.insert(handle.game_id, handle.clone());
        handle
    }
}
