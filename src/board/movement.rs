//! Legal destinations and dice-gated movement.

use serde::Serialize;

use super::store::RuleStore;
use super::types::Space;
use super::visits::VisitTracker;
use crate::engine::error::EngineError;
use crate::engine::models::{Player, VisitType};

/// Display grouping for a space. Has no effect on play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceCategory {
    Decision,
    Ending,
    DiceGated,
    Choice,
    Linear,
}

/// A destination together with what visiting it would mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePreview {
    pub space_name: String,
    pub visit_type: VisitType,
}

#[derive(Debug, Clone, Copy)]
pub struct MovementResolver<'a> {
    rules: &'a RuleStore,
    visits: VisitTracker,
}

impl<'a> MovementResolver<'a> {
    pub fn new(rules: &'a RuleStore) -> Self {
        Self {
            rules,
            visits: VisitTracker,
        }
    }

    pub fn current_space(&self, player: &Player) -> Result<&'a Space, EngineError> {
        self.rules.find_space(&player.position, player.visit_type)
    }

    /// Destinations reachable from the player's current space.
    ///
    /// `roll` is this turn's die, if one has been rolled. A dice-gated space
    /// yields nothing before the roll; after it, a die-keyed destination wins
    /// over the static slots.
    pub fn available_moves(&self, player: &Player, roll: Option<u8>) -> Result<Vec<String>, EngineError> {
        let space = self.current_space(player)?;
        if space.requires_dice_roll {
            let Some(die) = roll else {
                return Ok(Vec::new());
            };
            if let Some(dest) = self.dice_destination(player, die)? {
                return Ok(vec![dest]);
            }
        }
        Ok(space.next_spaces.clone())
    }

    /// Destination keyed by `die` in the dice outcome table, if any.
    pub fn dice_destination(&self, player: &Player, die: u8) -> Result<Option<String>, EngineError> {
        Ok(self
            .rules
            .find_movement_outcome(&player.position, player.visit_type)?
            .and_then(|row| row.destination(die))
            .map(str::to_string))
    }

    pub fn preview_moves(&self, player: &Player, roll: Option<u8>) -> Result<Vec<MovePreview>, EngineError> {
        Ok(self
            .available_moves(player, roll)?
            .into_iter()
            .map(|space_name| MovePreview {
                visit_type: self.visits.visit_type(player, &space_name),
                space_name,
            })
            .collect())
    }

    /// More than one static destination means the player has to pick.
    pub fn is_choice(&self, space: &Space) -> bool {
        space.next_spaces.len() > 1
    }

    pub fn space_category(&self, space: &Space) -> SpaceCategory {
        if space.is_logic() {
            SpaceCategory::Decision
        } else if space.is_ending() {
            SpaceCategory::Ending
        } else if space.requires_dice_roll {
            SpaceCategory::DiceGated
        } else if self.is_choice(space) {
            SpaceCategory::Choice
        } else {
            SpaceCategory::Linear
        }
    }
}
