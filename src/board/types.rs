//! Typed rule rows. CSV sentinels (`dice`, `No change`, blanks) are parsed
//! into these types once, when the tables are loaded.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::engine::models::{CardType, VisitType};

/// A rule cell that is fixed, decided by the dice, or absent.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectValue<T> {
    Fixed(T),
    DiceDependent,
    NoEffect,
}

impl<T> EffectValue<T> {
    pub fn fixed(&self) -> Option<&T> {
        match self {
            EffectValue::Fixed(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_dice(&self) -> bool {
        matches!(self, EffectValue::DiceDependent)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, EffectValue::NoEffect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fee {
    /// Whole currency units, always a cost.
    Flat(i64),
    /// Percent of a scope total the rule layer does not know.
    Percentage(f64),
}

impl Fee {
    /// Amount charged without outside context. Percentages resolve to zero here.
    pub fn flat_amount(&self) -> i64 {
        match self {
            Fee::Flat(amount) => *amount,
            Fee::Percentage(_) => 0,
        }
    }

    pub fn amount_for_scope(&self, scope_total: i64) -> i64 {
        match self {
            Fee::Flat(amount) => *amount,
            Fee::Percentage(pct) => (scope_total as f64 * pct / 100.0).round() as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardOpKind {
    Draw,
    Discard,
    Replace,
    Return,
}

static CARD_VERBS: Lazy<HashMap<&'static str, CardOpKind>> = Lazy::new(|| {
    [
        ("draw", CardOpKind::Draw),
        ("discard", CardOpKind::Discard),
        ("remove", CardOpKind::Discard),
        ("replace", CardOpKind::Replace),
        ("return", CardOpKind::Return),
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardOp {
    #[serde(rename = "type")]
    pub card_type: CardType,
    #[serde(rename = "op")]
    pub kind: CardOpKind,
    pub count: u32,
}

/// Human-readable card instruction plus its parsed form, if it parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CardInstruction {
    pub text: String,
    pub op: Option<CardOp>,
}

#[derive(Debug, Clone)]
pub struct Space {
    pub name: String,
    pub visit_type: VisitType,
    pub phase: String,
    pub space_type: String,
    pub event: String,
    pub action: String,
    pub outcome: String,
    /// Indexed in `CardType::ALL` order.
    pub card_effects: [EffectValue<CardInstruction>; 5],
    pub time: EffectValue<u32>,
    pub fee: EffectValue<Fee>,
    pub can_negotiate: bool,
    pub requires_dice_roll: bool,
    /// Non-empty destination slots, in declared order.
    pub next_spaces: Vec<String>,
}

impl Space {
    pub fn card_effect(&self, card_type: CardType) -> &EffectValue<CardInstruction> {
        &self.card_effects[card_type as usize]
    }

    pub fn is_logic(&self) -> bool {
        self.space_type.eq_ignore_ascii_case("logic")
    }

    pub fn is_ending(&self) -> bool {
        self.space_type.eq_ignore_ascii_case("end") || self.phase.eq_ignore_ascii_case("end")
    }

    /// Fixed card instructions a player can act on, in slot order.
    pub fn fixed_card_actions(&self) -> Vec<(CardType, &CardInstruction)> {
        CardType::ALL
            .iter()
            .filter_map(|ct| self.card_effect(*ct).fixed().map(|ins| (*ct, ins)))
            .collect()
    }
}

/// Which resource a dice effect row touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceChannel {
    Money,
    Time,
    Cards(CardType),
}

/// One die face of a dice effect row.
#[derive(Debug, Clone, PartialEq)]
pub enum DiceCell {
    NoChange,
    Money(i64),
    Time(u32),
    Card(CardOp),
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct DiceEffectRow {
    pub space_name: String,
    pub visit_type: VisitType,
    pub channel: DiceChannel,
    /// Faces 1..=6.
    pub outcomes: [DiceCell; 6],
}

impl DiceEffectRow {
    pub fn outcome(&self, die: u8) -> Option<&DiceCell> {
        face_index(die).map(|i| &self.outcomes[i])
    }
}

#[derive(Debug, Clone)]
pub struct DiceOutcomeRow {
    pub space_name: String,
    pub visit_type: VisitType,
    pub destinations: [Option<String>; 6],
}

impl DiceOutcomeRow {
    pub fn destination(&self, die: u8) -> Option<&str> {
        face_index(die).and_then(|i| self.destinations[i].as_deref())
    }
}

fn face_index(die: u8) -> Option<usize> {
    (1..=6).contains(&die).then(|| die as usize - 1)
}

// ------------------------------------------------------------------ //
//  Cell grammar
// ------------------------------------------------------------------ //

pub(crate) fn is_dice_sentinel(cell: &str) -> bool {
    cell.trim().eq_ignore_ascii_case("dice")
}

pub(crate) fn is_no_change(cell: &str) -> bool {
    let c = cell.trim();
    c.is_empty() || c.eq_ignore_ascii_case("no change") || c.eq_ignore_ascii_case("n/a")
}

/// `Yes`/`No`/`true`/`false`/blank.
pub(crate) fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" | "" => Some(false),
        _ => None,
    }
}

/// Signed whole-unit amount: `+500`, `-1,000`, `$1,500`, `-$250`.
pub fn parse_money(cell: &str) -> Option<i64> {
    let mut s = cell.trim();
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let s = s.trim_start_matches('$');
    let digits: String = s.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Leading non-negative day count: `5`, `+3`, `10 days`.
pub fn parse_days(cell: &str) -> Option<u32> {
    let s = cell.trim().trim_start_matches('+');
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = s[digits.len()..].trim();
    if !(rest.is_empty() || rest.eq_ignore_ascii_case("day") || rest.eq_ignore_ascii_case("days")) {
        return None;
    }
    digits.parse().ok()
}

pub fn parse_fee(cell: &str) -> Option<Fee> {
    let s = cell.trim();
    if let Some(pct) = s.strip_suffix('%') {
        let value: f64 = pct.trim().parse().ok()?;
        return (value >= 0.0).then_some(Fee::Percentage(value));
    }
    let amount = parse_money(s)?;
    (amount >= 0).then_some(Fee::Flat(amount))
}

/// `Draw 2`, `Replace 1`, `Remove 1 card`.
pub fn parse_card_op(card_type: CardType, text: &str) -> Option<CardOp> {
    let mut words = text.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    let kind = *CARD_VERBS.get(verb.as_str())?;
    let count: u32 = words.next()?.parse().ok()?;
    match words.next() {
        None => {}
        Some(w) if w.eq_ignore_ascii_case("card") || w.eq_ignore_ascii_case("cards") => {}
        Some(_) => return None,
    }
    (count > 0).then_some(CardOp { card_type, kind, count })
}
