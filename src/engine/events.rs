//! Typed domain events and the in-process event bus the UI subscribes to.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::board::effects::DiceResolution;
use crate::engine::models::{Card, GameResult, Player, PlayerId, VisitType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Warning,
    Error,
}

/// What caused a card draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSource {
    Space,
    Dice,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    TurnStarted {
        player: Player,
        turn_number: u32,
    },
    DiceRollCompleted {
        player_id: PlayerId,
        dice_value: u8,
        outcome: DiceResolution,
    },
    PlayerMoved {
        player: Player,
        from_space: String,
        to_space: String,
    },
    CardsDrawn {
        player_id: PlayerId,
        cards: Vec<Card>,
        source: CardSource,
    },
    CardPlayed {
        player_id: PlayerId,
        card: Card,
    },
    DecisionRecorded {
        player_id: PlayerId,
        space_name: String,
        choice: Option<String>,
    },
    SpaceActionCompleted {
        player_id: PlayerId,
        space_name: String,
        visit_type: VisitType,
    },
    Negotiated {
        player_id: PlayerId,
        space_name: String,
        penalty_days: u32,
        restored_snapshot: bool,
    },
    TurnEnded {
        player_id: PlayerId,
    },
    GameEnded {
        result: GameResult,
    },
    ShowMessage {
        #[serde(rename = "type")]
        kind: MessageKind,
        message: String,
        description: String,
    },
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::TurnStarted { .. } => "turnStarted",
            GameEvent::DiceRollCompleted { .. } => "diceRollCompleted",
            GameEvent::PlayerMoved { .. } => "playerMoved",
            GameEvent::CardsDrawn { .. } => "cardsDrawn",
            GameEvent::CardPlayed { .. } => "cardPlayed",
            GameEvent::DecisionRecorded { .. } => "decisionRecorded",
            GameEvent::SpaceActionCompleted { .. } => "spaceActionCompleted",
            GameEvent::Negotiated { .. } => "negotiated",
            GameEvent::TurnEnded { .. } => "turnEnded",
            GameEvent::GameEnded { .. } => "gameEnded",
            GameEvent::ShowMessage { .. } => "showMessage",
        }
    }

    pub fn error_message(message: impl Into<String>, description: impl Into<String>) -> Self {
        GameEvent::ShowMessage {
            kind: MessageKind::Error,
            message: message.into(),
            description: description.into(),
        }
    }
}

/// Anything that wants to observe engine events.
pub trait EventSubscriber: Send {
    fn on_event(&mut self, event: &GameEvent);
}

impl<F> EventSubscriber for F
where
    F: FnMut(&GameEvent) + Send,
{
    fn on_event(&mut self, event: &GameEvent) {
        self(event)
    }
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Box<dyn EventSubscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn publish(&mut self, event: &GameEvent) {
        tracing::trace!(event = event.name(), "publishing event");
        for sub in self.subscribers.iter_mut() {
            sub.on_event(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Shared recorder; clone one handle into the bus and keep the other.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GameEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(GameEvent::name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSubscriber for EventLog {
    fn on_event(&mut self, event: &GameEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_fans_out_to_every_subscriber() {
        let mut bus = EventBus::new();
        let log_a = EventLog::new();
        let log_b = EventLog::new();
        bus.subscribe(Box::new(log_a.clone()));
        bus.subscribe(Box::new(log_b.clone()));

        bus.publish(&GameEvent::TurnEnded { player_id: "p1".into() });

        assert_eq!(log_a.names(), vec!["turnEnded"]);
        assert_eq!(log_b.names(), vec!["turnEnded"]);
    }

    #[test]
    fn test_closure_subscriber() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        bus.subscribe(Box::new(move |_: &GameEvent| {
            *counter.lock().unwrap() += 1;
        }));
        bus.publish(&GameEvent::error_message("nope", ""));
        bus.publish(&GameEvent::TurnEnded { player_id: "p1".into() });
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn test_event_json_shape() {
        let ev = GameEvent::SpaceActionCompleted {
            player_id: "p1".into(),
            space_name: "START".into(),
            visit_type: VisitType::First,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event_type"], "spaceActionCompleted");
        assert_eq!(json["playerId"], "p1");
        assert_eq!(json["spaceName"], "START");
        assert_eq!(json["visitType"], "First");

        let msg = serde_json::to_value(GameEvent::error_message("a", "b")).unwrap();
        assert_eq!(msg["type"], "error");
    }
}
