//! First vs Subsequent visit bookkeeping.

use crate::engine::models::{Player, VisitType};

#[derive(Debug, Clone, Copy, Default)]
pub struct VisitTracker;

impl VisitTracker {
    /// Works for the current space and for speculative destinations alike.
    pub fn visit_type(&self, player: &Player, space_name: &str) -> VisitType {
        if player.visited_spaces.contains(space_name) {
            VisitType::Subsequent
        } else {
            VisitType::First
        }
    }

    /// Idempotent. Call only after a move has been committed and its entry
    /// effects resolved.
    pub fn record_visit(&self, mut player: Player, space_name: &str) -> Player {
        if !player.visited_spaces.contains(space_name) {
            player.visited_spaces.insert(space_name.to_string());
        }
        player
    }
}
