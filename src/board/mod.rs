//! Rules and turn resolution for the construction-project board.

pub mod coordinator;
pub mod decks;
pub mod effects;
pub mod loader;
pub mod movement;
pub mod player;
pub mod store;
pub mod turn;
pub mod types;
pub mod visits;

pub use coordinator::TurnCoordinator;
pub use loader::RulesSource;
pub use store::RuleStore;
