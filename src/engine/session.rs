//! The UI boundary: typed requests in, events out. User mistakes come back
//! as `showMessage` events instead of errors.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::board::store::RuleStore;
use crate::board::TurnCoordinator;
use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::events::{EventSubscriber, GameEvent};
use crate::engine::models::{CardType, PlayerId};

/// Requests a UI can send on behalf of a player.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiRequest {
    MovePlayer { player_id: PlayerId, space: String },
    /// `value` supplies the die face; `None` rolls from the engine RNG.
    RollDice {
        player_id: PlayerId,
        #[serde(default)]
        value: Option<u8>,
    },
    CardAction { player_id: PlayerId, card_type: CardType },
    Decision {
        player_id: PlayerId,
        #[serde(default)]
        choice: Option<String>,
    },
    PlayCard { player_id: PlayerId, card_id: String },
    Negotiate { player_id: PlayerId },
    EndTurn { player_id: PlayerId },
}

impl UiRequest {
    pub fn player_id(&self) -> &str {
        match self {
            UiRequest::MovePlayer { player_id, .. }
            | UiRequest::RollDice { player_id, .. }
            | UiRequest::CardAction { player_id, .. }
            | UiRequest::Decision { player_id, .. }
            | UiRequest::PlayCard { player_id, .. }
            | UiRequest::Negotiate { player_id }
            | UiRequest::EndTurn { player_id } => player_id,
        }
    }
}

#[derive(Debug)]
pub struct GameSession {
    coordinator: TurnCoordinator,
}

impl GameSession {
    pub fn new(
        rules: Arc<RuleStore>,
        roster: &[(&str, &str)],
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            coordinator: TurnCoordinator::new(rules, roster, config)?,
        })
    }

    pub fn coordinator(&self) -> &TurnCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut TurnCoordinator {
        &mut self.coordinator
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.coordinator.subscribe(subscriber);
    }

    pub fn start(&mut self) -> Result<Vec<GameEvent>, EngineError> {
        self.coordinator.start_game()
    }

    /// Dispatch one request. A rejected request yields the `showMessage`
    /// event the coordinator published; anything structural is an error.
    pub fn handle(&mut self, request: &UiRequest) -> Result<Vec<GameEvent>, EngineError> {
        let game = &mut self.coordinator;
        let outcome = match request {
            UiRequest::MovePlayer { player_id, space } => game.select_move(player_id, space),
            UiRequest::RollDice { player_id, value: Some(die) } => game.roll_dice_with(player_id, *die),
            UiRequest::RollDice { player_id, value: None } => game.roll_dice(player_id),
            UiRequest::CardAction { player_id, card_type } => game.take_card_action(player_id, *card_type),
            UiRequest::Decision { player_id, choice } => game.record_decision(player_id, choice.as_deref()),
            UiRequest::PlayCard { player_id, card_id } => game.play_card(player_id, card_id),
            UiRequest::Negotiate { player_id } => game.negotiate(player_id),
            UiRequest::EndTurn { player_id } => game.end_turn(player_id),
        };
        match outcome {
            Err(err) if err.is_user_facing() => Ok(vec![GameEvent::error_message(
                err.to_string(),
                "No changes were made.",
            )]),
            other => other,
        }
    }

    /// Roll from the engine RNG after the configured dice animation delay.
    pub async fn roll_dice_paced(&mut self, player_id: &str) -> Result<Vec<GameEvent>, EngineError> {
        let delay = self.coordinator.config().dice_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.handle(&UiRequest::RollDice {
            player_id: player_id.to_string(),
            value: None,
        })
    }
}
