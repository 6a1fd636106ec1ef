//! Per-turn action accounting.

use std::collections::BTreeSet;

use serde::Serialize;

use super::types::{CardOp, Space};
use crate::engine::models::{CardType, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    Moving,
    Acting,
    ReadyToEnd,
    Ended,
}

/// A card instruction from the current space that the player can carry out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    pub card_type: CardType,
    pub text: String,
    #[serde(skip)]
    pub op: Option<CardOp>,
}

/// Action accounting for the active player's turn.
///
/// `required_actions` counts at most three units: the dice roll, card
/// actions as a group, and a movement choice. `completed_actions` never
/// exceeds it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    pub player_id: PlayerId,
    pub turn_number: u32,
    pub space_name: String,
    pub required_actions: u32,
    pub completed_actions: u32,
    pub selected_move: Option<String>,
    pub has_rolled: bool,
    pub die_value: Option<u8>,
    /// Days the roll added, for negotiation penalties.
    pub rolled_time: Option<u32>,
    pub available_card_actions: Vec<CardAction>,
    pub phase: TurnPhase,
    dice_required: bool,
    card_actions_required: bool,
    move_choice_required: bool,
    card_action_counted: bool,
    move_counted: bool,
    decisions: BTreeSet<String>,
}

impl TurnState {
    /// `move_choice` is true when the space offers more than one static
    /// destination that the dice do not decide.
    pub fn start(player_id: &str, turn_number: u32, space: &Space, move_choice: bool) -> Self {
        let available_card_actions: Vec<CardAction> = space
            .fixed_card_actions()
            .into_iter()
            .map(|(card_type, ins)| CardAction {
                card_type,
                text: ins.text.clone(),
                op: ins.op,
            })
            .collect();

        let dice_required = space.requires_dice_roll;
        let card_actions_required = !available_card_actions.is_empty();
        let required_actions =
            u32::from(dice_required) + u32::from(card_actions_required) + u32::from(move_choice);

        let mut state = Self {
            player_id: player_id.to_string(),
            turn_number,
            space_name: space.name.clone(),
            required_actions,
            completed_actions: 0,
            selected_move: None,
            has_rolled: false,
            die_value: None,
            rolled_time: None,
            available_card_actions,
            phase: TurnPhase::Moving,
            dice_required,
            card_actions_required,
            move_choice_required: move_choice,
            card_action_counted: false,
            move_counted: false,
            decisions: BTreeSet::new(),
        };
        state.refresh_phase();
        state
    }

    pub fn can_end_turn(&self) -> bool {
        self.completed_actions >= self.required_actions
    }

    pub fn move_choice_required(&self) -> bool {
        self.move_choice_required
    }

    /// Returns false if the roll was already recorded this turn.
    pub fn record_dice_rolled(&mut self, die: u8, time_delta: u32) -> bool {
        if self.has_rolled {
            return false;
        }
        self.has_rolled = true;
        self.die_value = Some(die);
        self.rolled_time = Some(time_delta);
        if self.dice_required {
            self.complete_one();
        }
        self.refresh_phase();
        true
    }

    /// Consume the first pending action for `card_type`. The first card
    /// action of the turn completes the whole card-action unit.
    pub fn record_card_action_taken(&mut self, card_type: CardType) -> Option<CardAction> {
        let idx = self
            .available_card_actions
            .iter()
            .position(|a| a.card_type == card_type)?;
        let action = self.available_card_actions.remove(idx);
        if self.card_actions_required && !self.card_action_counted {
            self.card_action_counted = true;
            self.complete_one();
        }
        self.refresh_phase();
        Some(action)
    }

    /// `available` is how many destinations the player could pick from.
    pub fn record_move_selected(&mut self, space_name: &str, available: usize) {
        self.selected_move = Some(space_name.to_string());
        if available > 1 && self.move_choice_required && !self.move_counted {
            self.move_counted = true;
            self.complete_one();
        }
        self.refresh_phase();
    }

    pub fn record_decision(&mut self, space_name: &str) {
        self.decisions.insert(space_name.to_string());
    }

    pub fn has_decision_for(&self, space_name: &str) -> bool {
        self.decisions.contains(space_name)
    }

    pub fn mark_ended(&mut self) {
        self.phase = TurnPhase::Ended;
    }

    fn complete_one(&mut self) {
        if self.completed_actions < self.required_actions {
            self.completed_actions += 1;
        }
    }

    fn refresh_phase(&mut self) {
        if self.phase == TurnPhase::Ended {
            return;
        }
        self.phase = if self.can_end_turn() {
            TurnPhase::ReadyToEnd
        } else if self.completed_actions == 0 && !self.has_rolled && self.selected_move.is_none() {
            TurnPhase::Moving
        } else {
            TurnPhase::Acting
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{CardInstruction, CardOpKind, EffectValue};
    use crate::engine::models::VisitType;

    fn space(dice: bool, cards: &[(CardType, &str)], next: &[&str]) -> Space {
        let mut card_effects: [EffectValue<CardInstruction>; 5] = std::array::from_fn(|_| EffectValue::NoEffect);
        for (ct, text) in cards {
            card_effects[*ct as usize] = EffectValue::Fixed(CardInstruction {
                text: text.to_string(),
                op: crate::board::types::parse_card_op(*ct, text),
            });
        }
        Space {
            name: "S".into(),
            visit_type: VisitType::First,
            phase: "SETUP".into(),
            space_type: String::new(),
            event: String::new(),
            action: String::new(),
            outcome: String::new(),
            card_effects,
            time: EffectValue::NoEffect,
            fee: EffectValue::NoEffect,
            can_negotiate: false,
            requires_dice_roll: dice,
            next_spaces: next.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_required_actions_sum() {
        let s = space(true, &[(CardType::W, "Draw 1")], &["A", "B"]);
        let t = TurnState::start("p1", 1, &s, true);
        assert_eq!(t.required_actions, 3);
        assert_eq!(t.phase, TurnPhase::Moving);

        let s = space(false, &[], &["A"]);
        let t = TurnState::start("p1", 1, &s, false);
        assert_eq!(t.required_actions, 0);
        assert!(t.can_end_turn());
        assert_eq!(t.phase, TurnPhase::ReadyToEnd);
    }

    #[test]
    fn test_dice_roll_is_idempotent() {
        let s = space(true, &[], &["A"]);
        let mut t = TurnState::start("p1", 1, &s, false);
        assert!(t.record_dice_rolled(3, 0));
        assert!(!t.record_dice_rolled(5, 0));
        assert_eq!(t.completed_actions, 1);
        assert_eq!(t.die_value, Some(3));
        assert!(t.can_end_turn());
    }

    #[test]
    fn test_optional_roll_does_not_count() {
        let s = space(false, &[(CardType::B, "Draw 1")], &["A"]);
        let mut t = TurnState::start("p1", 1, &s, false);
        t.record_dice_rolled(2, 0);
        assert_eq!(t.completed_actions, 0);
        assert_eq!(t.phase, TurnPhase::Acting);
    }

    #[test]
    fn test_card_actions_count_once() {
        let s = space(false, &[(CardType::W, "Draw 2"), (CardType::B, "Draw 1")], &["A"]);
        let mut t = TurnState::start("p1", 1, &s, false);
        assert_eq!(t.required_actions, 1);

        let first = t.record_card_action_taken(CardType::B).unwrap();
        assert_eq!(first.op.unwrap().kind, CardOpKind::Draw);
        assert_eq!(t.completed_actions, 1);
        assert!(t.record_card_action_taken(CardType::W).is_some());
        assert_eq!(t.completed_actions, 1);
        assert!(t.available_card_actions.is_empty());
        assert!(t.record_card_action_taken(CardType::W).is_none());
    }

    #[test]
    fn test_single_destination_selection_is_free() {
        let s = space(false, &[], &["A"]);
        let mut t = TurnState::start("p1", 1, &s, false);
        t.record_move_selected("A", 1);
        assert_eq!(t.completed_actions, 0);
        assert_eq!(t.selected_move.as_deref(), Some("A"));
    }

    #[test]
    fn test_choice_counts_once_even_if_changed() {
        let s = space(false, &[], &["A", "B"]);
        let mut t = TurnState::start("p1", 1, &s, true);
        t.record_move_selected("A", 2);
        t.record_move_selected("B", 2);
        assert_eq!(t.completed_actions, 1);
        assert_eq!(t.selected_move.as_deref(), Some("B"));
        assert!(t.completed_actions <= t.required_actions);
    }

    #[test]
    fn test_decisions_are_per_space_name() {
        let s = space(false, &[], &["A"]);
        let mut t = TurnState::start("p1", 1, &s, false);
        assert!(!t.has_decision_for("S"));
        t.record_decision("S");
        assert!(t.has_decision_for("S"));
        assert!(!t.has_decision_for("T"));
    }
}
