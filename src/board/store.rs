//! Read-only query surface over the compiled rule tables.

use super::loader::{load_tables, RuleTables, RulesSource};
use super::types::*;
use crate::engine::error::EngineError;
use crate::engine::models::{Card, CardType, VisitType};

/// Card channel a space touches, with the text shown to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTypeEffect {
    pub card_type: CardType,
    pub action_text: String,
}

/// Holds the rule tables once they are loaded. Every query fails with
/// `NotLoaded` until then.
#[derive(Debug, Default)]
pub struct RuleStore {
    tables: Option<RuleTables>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: RuleTables) -> Self {
        Self {
            tables: Some(tables),
        }
    }

    pub fn load(&mut self, source: RulesSource<'_>) -> Result<(), EngineError> {
        self.tables = Some(load_tables(source)?);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.tables.is_some()
    }

    fn tables(&self) -> Result<&RuleTables, EngineError> {
        self.tables.as_ref().ok_or(EngineError::NotLoaded)
    }

    pub fn find_space(&self, name: &str, visit_type: VisitType) -> Result<&Space, EngineError> {
        self.tables()?
            .spaces
            .get(&(name.to_string(), visit_type))
            .ok_or_else(|| EngineError::SpaceNotFound {
                space: name.to_string(),
                visit_type,
            })
    }

    pub fn has_space(&self, name: &str, visit_type: VisitType) -> Result<bool, EngineError> {
        Ok(self
            .tables()?
            .spaces
            .contains_key(&(name.to_string(), visit_type)))
    }

    pub fn query_dice_effects(
        &self,
        space_name: &str,
        visit_type: VisitType,
    ) -> Result<&[DiceEffectRow], EngineError> {
        Ok(self
            .tables()?
            .dice_effects
            .get(&(space_name.to_string(), visit_type))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    pub fn query_movement_outcome(
        &self,
        space_name: &str,
        visit_type: VisitType,
    ) -> Result<&DiceOutcomeRow, EngineError> {
        self.find_movement_outcome(space_name, visit_type)?
            .ok_or_else(|| EngineError::SpaceNotFound {
                space: space_name.to_string(),
                visit_type,
            })
    }

    /// Like `query_movement_outcome`, but absence is a normal answer.
    pub fn find_movement_outcome(
        &self,
        space_name: &str,
        visit_type: VisitType,
    ) -> Result<Option<&DiceOutcomeRow>, EngineError> {
        Ok(self
            .tables()?
            .dice_outcomes
            .get(&(space_name.to_string(), visit_type)))
    }

    /// Card channels touched by a space, with dice-dependent draws shown as
    /// the range the die can produce.
    pub fn query_card_types_affected(
        &self,
        space_name: &str,
        visit_type: VisitType,
    ) -> Result<Vec<CardTypeEffect>, EngineError> {
        let space = self.find_space(space_name, visit_type)?;
        let rows = self.query_dice_effects(space_name, visit_type)?;

        let mut result = Vec::new();
        for ct in CardType::ALL {
            let dice_row = rows.iter().find(|r| r.channel == DiceChannel::Cards(ct));
            let text = match space.card_effect(ct) {
                EffectValue::Fixed(ins) => Some(ins.text.clone()),
                EffectValue::DiceDependent => Some(dice_draw_range(dice_row)),
                EffectValue::NoEffect => dice_row.map(|r| dice_draw_range(Some(r))),
            };
            if let Some(action_text) = text {
                result.push(CardTypeEffect {
                    card_type: ct,
                    action_text,
                });
            }
        }
        Ok(result)
    }

    pub fn space_names(&self) -> Result<&[String], EngineError> {
        Ok(&self.tables()?.space_order)
    }

    pub fn first_space(&self) -> Result<&str, EngineError> {
        self.space_names()?
            .first()
            .map(String::as_str)
            .ok_or(EngineError::NotLoaded)
    }

    pub fn cards(&self) -> Result<&[Card], EngineError> {
        Ok(&self.tables()?.cards)
    }
}

fn dice_draw_range(row: Option<&DiceEffectRow>) -> String {
    let draws: Vec<u32> = row
        .map(|r| {
            r.outcomes
                .iter()
                .filter_map(|cell| match cell {
                    DiceCell::Card(op) if op.kind == CardOpKind::Draw => Some(op.count),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    match (draws.iter().min(), draws.iter().max()) {
        (Some(min), Some(max)) if min == max => format!("Draw {min}"),
        (Some(min), Some(max)) => format!("Draw {min}-{max}"),
        _ => "Draw dice".to_string(),
    }
}
