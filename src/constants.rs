// Central constants for game setup and rule limits.
pub const HAND_LIMIT: usize = 6; // a turn may not end with more cards than this
pub const STARTING_HAND: usize = 4;
pub const SECRETS_PER_PLAYER: usize = 3;
pub const DRAFT_SLOTS: usize = 4;
pub const DRAW_MAX: i64 = 10; // upper bound for a single take-deck burst
pub const MIN_SET_SIZE: usize = 2; // detective sets need at least two cards

// Per-rule tunables.
pub const PADDINGTON_BURN: usize = 6; // deck cards burnt per discarded copy
pub const ASHES_CHOICES: usize = 5; // discard entries offered by Look Into the Ashes
pub const ESCAPE_DELAY_CARDS: usize = 5; // discard cards returned to the deck bottom
pub const TABLE_HAND_FLOOR: usize = 4; // Cards Off the Table discards down to this
pub const SUSPICION_CARDS: usize = 2; // forced draws from Point Your Suspicions

// Defaults for the env-configurable timers.
pub const DEFAULT_NSF_WINDOW_SECS: u64 = 8;
pub const DEFAULT_ASHES_HORIZON_SECS: i64 = 600;
