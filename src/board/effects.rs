//! Turns a space, or a space plus a die face, into resource deltas and
//! card ops.

use serde::Serialize;

use super::movement::MovementResolver;
use super::store::RuleStore;
use super::types::*;
use crate::engine::error::EngineError;
use crate::engine::models::Player;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceResolution {
    pub money_delta: i64,
    pub time_delta: u32,
    pub card_ops: Vec<CardOp>,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpaceEntryResolution {
    /// Never positive: fees are costs.
    pub money_delta: i64,
    pub time_delta: u32,
    pub card_ops: Vec<CardOp>,
    /// Percent fee the caller must resolve against its own scope total.
    pub pending_percentage_fee: Option<f64>,
}

fn skip_malformed(space: &Space, cell: &str) {
    let err = EngineError::MalformedEffect {
        space: space.name.clone(),
        cell: cell.to_string(),
    };
    tracing::warn!(error = %err, visit_type = %space.visit_type, "skipping effect");
}

#[derive(Debug, Clone, Copy)]
pub struct EffectResolver<'a> {
    rules: &'a RuleStore,
}

impl<'a> EffectResolver<'a> {
    pub fn new(rules: &'a RuleStore) -> Self {
        Self { rules }
    }

    /// Every dice effect row of the player's current space contributes;
    /// channels add up rather than the first match winning.
    pub fn resolve_dice_roll(&self, player: &Player, die: u8) -> Result<DiceResolution, EngineError> {
        if !(1..=6).contains(&die) {
            return Err(EngineError::InvalidTurnAction(format!(
                "die value {die} is outside 1-6"
            )));
        }
        let space = self.rules.find_space(&player.position, player.visit_type)?;
        let mut resolution = DiceResolution::default();

        for row in self.rules.query_dice_effects(&space.name, space.visit_type)? {
            let Some(cell) = row.outcome(die) else { continue };
            match cell {
                DiceCell::NoChange => {}
                DiceCell::Money(delta) => resolution.money_delta += delta,
                DiceCell::Time(days) => resolution.time_delta += days,
                DiceCell::Card(op) => resolution.card_ops.push(*op),
                DiceCell::Malformed(text) => skip_malformed(space, text),
            }
        }

        resolution.destination = MovementResolver::new(self.rules).dice_destination(player, die)?;
        Ok(resolution)
    }

    /// Effects applied unconditionally on entering `space`.
    pub fn resolve_space_entry(&self, space: &Space) -> SpaceEntryResolution {
        let mut resolution = SpaceEntryResolution::default();

        if let EffectValue::Fixed(days) = space.time {
            resolution.time_delta = days;
        }
        match space.fee {
            EffectValue::Fixed(Fee::Flat(amount)) => resolution.money_delta = -amount,
            EffectValue::Fixed(Fee::Percentage(pct)) => resolution.pending_percentage_fee = Some(pct),
            EffectValue::DiceDependent | EffectValue::NoEffect => {}
        }
        for (_, instruction) in space.fixed_card_actions() {
            match instruction.op {
                Some(op) => resolution.card_ops.push(op),
                None => skip_malformed(space, &instruction.text),
            }
        }
        resolution
    }

    /// Days charged by a negotiation on `space`. Dice-based time counts only
    /// once rolled; otherwise the configured default applies.
    pub fn negotiation_penalty(&self, space: &Space, rolled_time: Option<u32>, default_days: u32) -> u32 {
        let days = match space.time {
            EffectValue::Fixed(days) => Some(days),
            EffectValue::DiceDependent => rolled_time,
            EffectValue::NoEffect => None,
        };
        days.filter(|d| *d > 0).unwrap_or(default_days)
    }
}
