//! Runtime configuration read from the environment at boot.

use std::env;
use std::time::Duration;

use crate::constants::{DEFAULT_ASHES_HORIZON_SECS, DEFAULT_NSF_WINDOW_SECS};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// How long a Not So Fast counter window stays open.
    pub nsf_window: Duration,
    /// How long the second step of Look Into the Ashes stays valid.
    pub ashes_horizon_secs: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://deathcards.db?mode=rwc".to_string());
        let nsf_window = env::var("NSF_WINDOW_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_NSF_WINDOW_SECS));
        let ashes_horizon_secs = env::var("ASHES_HORIZON_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ASHES_HORIZON_SECS);
        Self {
            port,
            database_url,
            nsf_window,
            ashes_horizon_secs,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            nsf_window: Duration::from_secs(DEFAULT_NSF_WINDOW_SECS),
            ashes_horizon_secs: DEFAULT_ASHES_HORIZON_SECS,
        }
    }
}
