//! Auto-play strategies. A strategy looks at the active turn and names the
//! next request to send.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::board::TurnCoordinator;
use crate::engine::session::UiRequest;

/// Picks the next request for `player_id`, who must be the active player.
pub trait TurnStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn next_request(&self, game: &TurnCoordinator, player_id: &str, rng: &mut StdRng) -> UiRequest;
}

/// Always takes the first destination and never negotiates.
pub struct FirstChoiceStrategy;

impl TurnStrategy for FirstChoiceStrategy {
    fn name(&self) -> &str {
        "first"
    }

    fn next_request(&self, game: &TurnCoordinator, player_id: &str, _rng: &mut StdRng) -> UiRequest {
        next_step(game, player_id, |moves| moves.first().cloned())
    }
}

/// Uniformly random destinations; negotiates with probability
/// `negotiate_chance` whenever the space allows it.
pub struct RandomStrategy {
    pub negotiate_chance: f64,
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self { negotiate_chance: 0.1 }
    }
}

impl TurnStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn next_request(&self, game: &TurnCoordinator, player_id: &str, rng: &mut StdRng) -> UiRequest {
        // Only consider negotiating once per turn, before anything else.
        let fresh = game
            .turn_state()
            .is_some_and(|t| t.completed_actions == 0 && t.selected_move.is_none());
        if fresh
            && game.can_negotiate(player_id).unwrap_or(false)
            && rng.gen_bool(self.negotiate_chance.clamp(0.0, 1.0))
        {
            return UiRequest::Negotiate {
                player_id: player_id.to_string(),
            };
        }
        next_step(game, player_id, |moves| moves.choose(rng).cloned())
    }
}

/// The obligations of a turn, worked through in a fixed order: card actions,
/// dice, decision, destination, then end.
fn next_step(
    game: &TurnCoordinator,
    player_id: &str,
    pick: impl FnOnce(&[String]) -> Option<String>,
) -> UiRequest {
    let player_id = player_id.to_string();
    let Some(turn) = game.turn_state() else {
        return UiRequest::EndTurn { player_id };
    };

    if let Some(action) = turn.available_card_actions.first() {
        return UiRequest::CardAction {
            player_id,
            card_type: action.card_type,
        };
    }

    let Ok(space) = game.current_space(&player_id) else {
        return UiRequest::EndTurn { player_id };
    };
    if space.requires_dice_roll && !turn.has_rolled {
        return UiRequest::RollDice { player_id, value: None };
    }

    let moves = game.available_moves(&player_id).unwrap_or_default();
    if space.is_logic() && !turn.has_decision_for(&space.name) {
        return UiRequest::Decision {
            player_id,
            choice: pick(&moves),
        };
    }
    if moves.len() > 1 && turn.selected_move.is_none() {
        if let Some(space) = pick(&moves) {
            return UiRequest::MovePlayer { player_id, space };
        }
    }
    UiRequest::EndTurn { player_id }
}
