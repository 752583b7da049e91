//! The fixed card catalog. Definitions live in code, are seeded into the
//! `cards` table at boot, and are read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::database::init::DbPool;
use crate::database::models::CardKind;

#[derive(Debug, Clone)]
pub struct CardDef {
    pub card_id: i64,
    pub name: String,
    pub kind: CardKind,
    /// Named-rule tag for events and instants, set type for detectives.
    pub rule: String,
    pub quantity: i64,
    pub artwork: String,
}

/// Card ids are assigned by seed order, starting at 1, so the in-code
/// catalog and the seeded table always agree.
const SEED: &[(&str, CardKind, &str, i64)] = &[
    ("Not So Fast", CardKind::Instant, "not_so_fast", 10),
    ("Cards Off the Table", CardKind::Event, "cards_off_the_table", 2),
    ("Delay the Murderer's Escape", CardKind::Event, "delay_murderers_escape", 2),
    ("Look Into the Ashes", CardKind::Event, "look_into_the_ashes", 3),
    ("Early Train to Paddington", CardKind::Event, "early_train_to_paddington", 2),
    ("Dead Card Folly", CardKind::Event, "dead_card_folly", 2),
    ("And Then Was One More", CardKind::Event, "and_then_was_one_more", 2),
    ("Another Victim", CardKind::Event, "another_victim", 3),
    ("Card Trade", CardKind::Event, "card_trade", 3),
    ("Blackmailed", CardKind::Devious, "blackmailed", 2),
    ("Point Your Suspicions", CardKind::Devious, "point_your_suspicions", 2),
    ("Miss Marple", CardKind::Detective, "marple", 4),
    ("Hercule Poirot", CardKind::Detective, "poirot", 4),
    ("Tommy Beresford", CardKind::Detective, "beresford", 4),
    ("Lady Eileen Brent", CardKind::Detective, "eileen", 4),
    ("Mr Satterthwaite", CardKind::Detective, "satterthwaite", 4),
    ("Parker Pyne", CardKind::Detective, "parker_pyne", 4),
    ("Harley Quin", CardKind::Detective, "harley_quin", 3),
    ("Ariadne Oliver", CardKind::Detective, "oliver", 3),
    ("Dark Secret", CardKind::Secret, "secret", 24),
];

#[derive(Debug)]
pub struct Catalog {
    by_id: HashMap<i64, CardDef>,
}

impl Catalog {
    /// Builds the catalog from the in-code seed list.
    pub fn builtin() -> Arc<Self> {
        let by_id = SEED
            .iter()
            .enumerate()
            .map(|(idx, (name, kind, rule, quantity))| {
                let card_id = idx as i64 + 1;
                let def = CardDef {
                    card_id,
                    name: (*name).to_string(),
                    kind: *kind,
                    rule: (*rule).to_string(),
                    quantity: *quantity,
                    artwork: format!("cards/{rule}.png"),
                };
                (card_id, def)
            })
            .collect();
        Arc::new(Self { by_id })
    }

    pub fn kind(&self, card_id: i64) -> Option<CardKind> {
        self.by_id.get(&card_id).map(|d| d.kind)
    }

    pub fn rule(&self, card_id: i64) -> Option<&str> {
        self.by_id.get(&card_id).map(|d| d.rule.as_str())
    }

    pub fn name(&self, card_id: i64) -> &str {
        self.by_id
            .get(&card_id)
            .map(|d| d.name.as_str())
            .unwrap_or("unknown card")
    }

    /// Definitions of a given kind, in catalog order.
    pub fn of_kind(&self, kind: CardKind) -> Vec<&CardDef> {
        let mut defs: Vec<&CardDef> = self.by_id.values().filter(|d| d.kind == kind).collect();
        defs.sort_by_key(|d| d.card_id);
        defs
    }

    /// First card id carrying the given rule tag, if any.
    pub fn id_by_rule(&self, rule: &str) -> Option<i64> {
        let mut ids: Vec<i64> = self
            .by_id
            .values()
            .filter(|d| d.rule == rule)
            .map(|d| d.card_id)
            .collect();
        ids.sort_unstable();
        ids.first().copied()
    }
}

/// Inserts any missing catalog rows. Existing rows are left untouched so
/// a restart never renumbers card ids.
pub async fn seed(pool: &DbPool) -> Result<Arc<Catalog>, sqlx::Error> {
    let catalog = Catalog::builtin();
    let mut tx = pool.begin().await?;
    let mut defs: Vec<&CardDef> = catalog.by_id.values().collect();
    defs.sort_by_key(|d| d.card_id);
    for def in defs {
        sqlx::query(
            "INSERT OR IGNORE INTO cards (card_id, name, kind, rule, quantity, artwork) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(def.card_id)
        .bind(&def.name)
        .bind(def.kind.as_str())
        .bind(&def.rule)
        .bind(def.quantity)
        .bind(&def.artwork)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(catalog)
}
