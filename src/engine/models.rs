//! Core engine data types: players, cards, visit types and game results.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type PlayerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VisitType {
    First,
    Subsequent,
}

impl VisitType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Some(VisitType::First),
            "subsequent" => Some(VisitType::Subsequent),
            _ => None,
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitType::First => f.write_str("First"),
            VisitType::Subsequent => f.write_str("Subsequent"),
        }
    }
}

/// The five card typologies: Work, Bank, Investor, Life, Expeditor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CardType {
    W,
    B,
    I,
    L,
    E,
}

impl CardType {
    /// Slot order used by the space table columns.
    pub const ALL: [CardType; 5] = [CardType::W, CardType::B, CardType::I, CardType::L, CardType::E];

    pub fn letter(self) -> char {
        match self {
            CardType::W => 'W',
            CardType::B => 'B',
            CardType::I => 'I',
            CardType::L => 'L',
            CardType::E => 'E',
        }
    }

    pub fn from_letter(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "W" => Some(CardType::W),
            "B" => Some(CardType::B),
            "I" => Some(CardType::I),
            "L" => Some(CardType::L),
            "E" => Some(CardType::E),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CardType::W => "Work",
            CardType::B => "Bank",
            CardType::I => "Investor",
            CardType::L => "Life",
            CardType::E => "Expeditor",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: String,
    pub card_type: CardType,
    pub card_name: String,
    #[serde(default)]
    pub description: String,
    /// Signed: cards may pay out or cost money.
    #[serde(default)]
    pub money_effect: i64,
    #[serde(default)]
    pub time_effect: u32,
}

/// Copy of a player's resources taken when they entered their current space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub money: i64,
    pub time_spent: u32,
    pub cards: BTreeMap<CardType, Vec<Card>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub display_name: String,
    pub position: String,
    /// Visit type of `position`, fixed when the player entered it.
    pub visit_type: VisitType,
    pub money: i64,
    pub time_spent: u32,
    /// Hand per card type, in draw order.
    #[serde(default)]
    pub cards: BTreeMap<CardType, Vec<Card>>,
    #[serde(default)]
    pub visited_spaces: BTreeSet<String>,
    #[serde(default)]
    pub space_entry_snapshot: Option<ResourceSnapshot>,
}

impl Player {
    pub fn new(player_id: &str, display_name: &str, start: &str, money: i64, time_spent: u32) -> Self {
        Self {
            player_id: player_id.into(),
            display_name: display_name.into(),
            position: start.into(),
            visit_type: VisitType::First,
            money,
            time_spent,
            cards: BTreeMap::new(),
            visited_spaces: BTreeSet::new(),
            space_entry_snapshot: None,
        }
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            money: self.money,
            time_spent: self.time_spent,
            cards: self.cards.clone(),
        }
    }

    pub fn hand(&self, card_type: CardType) -> &[Card] {
        self.cards.get(&card_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn card_count(&self) -> usize {
        self.cards.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub time_spent: u32,
    pub money: i64,
    pub position: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    pub winners: Vec<PlayerId>,
    /// Finisher first, then by time spent ascending and money descending.
    pub standings: Vec<Standing>,
    pub turns_played: u32,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "normal".to_string()
}
