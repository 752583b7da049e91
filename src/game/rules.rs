//! The registry of named card rules. Every playable event, devious card,
//! and instant carries a rule tag in the catalog; the dispatcher resolves
//! the tag here and routes to the matching protocol.

use crate::game::store::GameStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleName {
    NotSoFast,
    CardsOffTheTable,
    DelayMurderersEscape,
    LookIntoTheAshes,
    EarlyTrainToPaddington,
    DeadCardFolly,
    AndThenWasOneMore,
    AnotherVictim,
    CardTrade,
    Blackmailed,
    PointYourSuspicions,
}

impl RuleName {
    pub fn tag(&self) -> &'static str {
        match self {
            RuleName::NotSoFast => "not_so_fast",
            RuleName::CardsOffTheTable => "cards_off_the_table",
            RuleName::DelayMurderersEscape => "delay_murderers_escape",
            RuleName::LookIntoTheAshes => "look_into_the_ashes",
            RuleName::EarlyTrainToPaddington => "early_train_to_paddington",
            RuleName::DeadCardFolly => "dead_card_folly",
            RuleName::AndThenWasOneMore => "and_then_was_one_more",
            RuleName::AnotherVictim => "another_victim",
            RuleName::CardTrade => "card_trade",
            RuleName::Blackmailed => "blackmailed",
            RuleName::PointYourSuspicions => "point_your_suspicions",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "not_so_fast" => Some(RuleName::NotSoFast),
            "cards_off_the_table" => Some(RuleName::CardsOffTheTable),
            "delay_murderers_escape" => Some(RuleName::DelayMurderersEscape),
            "look_into_the_ashes" => Some(RuleName::LookIntoTheAshes),
            "early_train_to_paddington" => Some(RuleName::EarlyTrainToPaddington),
            "dead_card_folly" => Some(RuleName::DeadCardFolly),
            "and_then_was_one_more" => Some(RuleName::AndThenWasOneMore),
            "another_victim" => Some(RuleName::AnotherVictim),
            "card_trade" => Some(RuleName::CardTrade),
            "blackmailed" => Some(RuleName::Blackmailed),
            "point_your_suspicions" => Some(RuleName::PointYourSuspicions),
            _ => None,
        }
    }

    /// Cancellable rules defer their effect behind a Not So Fast window.
    /// Look Into the Ashes resolves immediately; its guard is the action
    /// horizon instead.
    pub fn cancellable(&self) -> bool {
        !matches!(self, RuleName::NotSoFast | RuleName::LookIntoTheAshes)
    }

    /// Rules that name a target player in the play request.
    pub fn targeted(&self) -> bool {
        matches!(
            self,
            RuleName::CardsOffTheTable
                | RuleName::AnotherVictim
                | RuleName::CardTrade
                | RuleName::Blackmailed
                | RuleName::PointYourSuspicions
        )
    }

    /// Resolves the rule of a concrete card instance via the catalog.
    pub fn of_instance(store: &GameStore, instance_id: i64) -> Option<Self> {
        let card = store.card(instance_id).ok()?;
        store
            .catalog
            .rule(card.card_id)
            .and_then(RuleName::from_tag)
    }
}
