//! Reads the four CSV rule tables and compiles them into typed rows.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::types::*;
use crate::engine::error::LoadError;
use crate::engine::models::{Card, CardType, VisitType};

pub type SpaceKey = (String, VisitType);

/// Compiled, validated rule tables.
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    pub spaces: HashMap<SpaceKey, Space>,
    /// Space names in first-appearance order.
    pub space_order: Vec<String>,
    pub dice_effects: HashMap<SpaceKey, Vec<DiceEffectRow>>,
    pub dice_outcomes: HashMap<SpaceKey, DiceOutcomeRow>,
    pub cards: Vec<Card>,
}

pub enum RulesSource<'a> {
    Embedded,
    Dir(PathBuf),
    Text {
        spaces: &'a str,
        dice_effects: &'a str,
        dice_outcomes: &'a str,
        cards: &'a str,
    },
}

pub const SPACES_FILE: &str = "spaces.csv";
pub const DICE_EFFECTS_FILE: &str = "dice_effects.csv";
pub const DICE_OUTCOMES_FILE: &str = "dice_outcomes.csv";
pub const CARDS_FILE: &str = "cards.csv";

pub fn load_tables(source: RulesSource<'_>) -> Result<RuleTables, LoadError> {
    match source {
        RulesSource::Embedded => compile_tables(
            include_str!("../../data/spaces.csv"),
            include_str!("../../data/dice_effects.csv"),
            include_str!("../../data/dice_outcomes.csv"),
            include_str!("../../data/cards.csv"),
        ),
        RulesSource::Dir(dir) => {
            let spaces = std::fs::read_to_string(dir.join(SPACES_FILE))?;
            let dice_effects = std::fs::read_to_string(dir.join(DICE_EFFECTS_FILE))?;
            let dice_outcomes = std::fs::read_to_string(dir.join(DICE_OUTCOMES_FILE))?;
            // Decks are optional; a board can be played without cards.
            let cards = match std::fs::read_to_string(dir.join(CARDS_FILE)) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e.into()),
            };
            compile_tables(&spaces, &dice_effects, &dice_outcomes, &cards)
        }
        RulesSource::Text {
            spaces,
            dice_effects,
            dice_outcomes,
            cards,
        } => compile_tables(spaces, dice_effects, dice_outcomes, cards),
    }
}

// ------------------------------------------------------------------ //
//  Raw rows
// ------------------------------------------------------------------ //

#[derive(Debug, Deserialize)]
struct RawSpaceRow {
    space_name: String,
    visit_type: String,
    #[serde(default)]
    phase: String,
    #[serde(default)]
    space_type: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    w_card: String,
    #[serde(default)]
    b_card: String,
    #[serde(default)]
    i_card: String,
    #[serde(default)]
    l_card: String,
    #[serde(default)]
    e_card: String,
    #[serde(default)]
    time: String,
    #[serde(default)]
    fee: String,
    #[serde(default)]
    negotiate: String,
    #[serde(default)]
    requires_dice_roll: String,
    #[serde(default)]
    space_1: String,
    #[serde(default)]
    space_2: String,
    #[serde(default)]
    space_3: String,
    #[serde(default)]
    space_4: String,
    #[serde(default)]
    space_5: String,
}

#[derive(Debug, Deserialize)]
struct RawDiceEffectRow {
    space_name: String,
    visit_type: String,
    effect_type: String,
    #[serde(default)]
    card_type: String,
    #[serde(default)]
    roll_1: String,
    #[serde(default)]
    roll_2: String,
    #[serde(default)]
    roll_3: String,
    #[serde(default)]
    roll_4: String,
    #[serde(default)]
    roll_5: String,
    #[serde(default)]
    roll_6: String,
}

#[derive(Debug, Deserialize)]
struct RawDiceOutcomeRow {
    space_name: String,
    visit_type: String,
    #[serde(default)]
    roll_1: String,
    #[serde(default)]
    roll_2: String,
    #[serde(default)]
    roll_3: String,
    #[serde(default)]
    roll_4: String,
    #[serde(default)]
    roll_5: String,
    #[serde(default)]
    roll_6: String,
}

#[derive(Debug, Deserialize)]
struct RawCardRow {
    card_id: String,
    card_type: String,
    card_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    money_effect: String,
    #[serde(default)]
    time_effect: String,
}

fn read_rows<T: DeserializeOwned>(table: &'static str, text: &str) -> Result<Vec<T>, LoadError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes())
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| LoadError::Csv { table, source })
}

// ------------------------------------------------------------------ //
//  Compilation
// ------------------------------------------------------------------ //

fn compile_tables(
    spaces_csv: &str,
    dice_effects_csv: &str,
    dice_outcomes_csv: &str,
    cards_csv: &str,
) -> Result<RuleTables, LoadError> {
    let mut tables = RuleTables::default();

    for raw in read_rows::<RawSpaceRow>(SPACES_FILE, spaces_csv)? {
        let space = compile_space(raw)?;
        if !tables.space_order.contains(&space.name) {
            tables.space_order.push(space.name.clone());
        }
        tables
            .spaces
            .insert((space.name.clone(), space.visit_type), space);
    }
    if tables.spaces.is_empty() {
        return Err(LoadError::EmptySpaceTable);
    }

    for raw in read_rows::<RawDiceEffectRow>(DICE_EFFECTS_FILE, dice_effects_csv)? {
        let row = compile_dice_effect(raw)?;
        tables
            .dice_effects
            .entry((row.space_name.clone(), row.visit_type))
            .or_default()
            .push(row);
    }

    for raw in read_rows::<RawDiceOutcomeRow>(DICE_OUTCOMES_FILE, dice_outcomes_csv)? {
        let row = compile_dice_outcome(raw)?;
        tables
            .dice_outcomes
            .insert((row.space_name.clone(), row.visit_type), row);
    }

    for raw in read_rows::<RawCardRow>(CARDS_FILE, cards_csv)? {
        tables.cards.push(compile_card(raw)?);
    }

    validate_edges(&tables)?;

    tracing::info!(
        spaces = tables.spaces.len(),
        dice_effects = tables.dice_effects.values().map(Vec::len).sum::<usize>(),
        dice_outcomes = tables.dice_outcomes.len(),
        cards = tables.cards.len(),
        "loaded rule tables"
    );
    Ok(tables)
}

fn visit_type(table: &'static str, value: &str) -> Result<VisitType, LoadError> {
    VisitType::parse(value).ok_or_else(|| LoadError::InvalidCell {
        table,
        column: "visit_type",
        value: value.to_string(),
    })
}

fn flag(column: &'static str, value: &str) -> Result<bool, LoadError> {
    parse_flag(value).ok_or_else(|| LoadError::InvalidCell {
        table: SPACES_FILE,
        column,
        value: value.to_string(),
    })
}

fn malformed(space: &str, visit: VisitType, column: &str, cell: &str) {
    tracing::warn!(
        space,
        visit_type = %visit,
        column,
        cell,
        "malformed effect cell, skipping"
    );
}

fn card_cell(
    space: &str,
    visit: VisitType,
    card_type: CardType,
    cell: &str,
) -> EffectValue<CardInstruction> {
    let cell = cell.trim();
    if cell.is_empty() {
        return EffectValue::NoEffect;
    }
    if is_dice_sentinel(cell) {
        return EffectValue::DiceDependent;
    }
    let op = parse_card_op(card_type, cell);
    if op.is_none() {
        malformed(space, visit, "card", cell);
    }
    EffectValue::Fixed(CardInstruction {
        text: cell.to_string(),
        op,
    })
}

fn time_cell(space: &str, visit: VisitType, cell: &str) -> EffectValue<u32> {
    let cell = cell.trim();
    if cell.is_empty() {
        return EffectValue::NoEffect;
    }
    if is_dice_sentinel(cell) {
        return EffectValue::DiceDependent;
    }
    match parse_days(cell) {
        Some(days) => EffectValue::Fixed(days),
        None => {
            malformed(space, visit, "time", cell);
            EffectValue::NoEffect
        }
    }
}

fn fee_cell(space: &str, visit: VisitType, cell: &str) -> EffectValue<Fee> {
    let cell = cell.trim();
    if cell.is_empty() {
        return EffectValue::NoEffect;
    }
    if is_dice_sentinel(cell) {
        return EffectValue::DiceDependent;
    }
    match parse_fee(cell) {
        Some(fee) => EffectValue::Fixed(fee),
        None => {
            malformed(space, visit, "fee", cell);
            EffectValue::NoEffect
        }
    }
}

fn compile_space(raw: RawSpaceRow) -> Result<Space, LoadError> {
    let visit = visit_type(SPACES_FILE, &raw.visit_type)?;
    let name = raw.space_name;
    let card_cells = [&raw.w_card, &raw.b_card, &raw.i_card, &raw.l_card, &raw.e_card];
    let card_effects = std::array::from_fn(|i| card_cell(&name, visit, CardType::ALL[i], card_cells[i]));
    let next_spaces = [raw.space_1, raw.space_2, raw.space_3, raw.space_4, raw.space_5]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

    Ok(Space {
        time: time_cell(&name, visit, &raw.time),
        fee: fee_cell(&name, visit, &raw.fee),
        can_negotiate: flag("negotiate", &raw.negotiate)?,
        requires_dice_roll: flag("requires_dice_roll", &raw.requires_dice_roll)?,
        name,
        visit_type: visit,
        phase: raw.phase,
        space_type: raw.space_type,
        event: raw.event,
        action: raw.action,
        outcome: raw.outcome,
        card_effects,
        next_spaces,
    })
}

fn dice_channel(raw: &RawDiceEffectRow) -> Result<DiceChannel, LoadError> {
    let effect_type = raw.effect_type.trim().to_ascii_lowercase();
    let invalid = || LoadError::InvalidCell {
        table: DICE_EFFECTS_FILE,
        column: "effect_type",
        value: raw.effect_type.clone(),
    };
    match effect_type.as_str() {
        "money" => Ok(DiceChannel::Money),
        "time" => Ok(DiceChannel::Time),
        "cards" => CardType::from_letter(&raw.card_type)
            .map(DiceChannel::Cards)
            .ok_or_else(|| LoadError::InvalidCell {
                table: DICE_EFFECTS_FILE,
                column: "card_type",
                value: raw.card_type.clone(),
            }),
        other => other
            .strip_suffix("_cards")
            .and_then(CardType::from_letter)
            .map(DiceChannel::Cards)
            .ok_or_else(invalid),
    }
}

fn dice_cell(space: &str, visit: VisitType, channel: DiceChannel, cell: &str) -> DiceCell {
    if is_no_change(cell) {
        return DiceCell::NoChange;
    }
    let parsed = match channel {
        DiceChannel::Money => parse_money(cell).map(DiceCell::Money),
        DiceChannel::Time => parse_days(cell).map(DiceCell::Time),
        DiceChannel::Cards(ct) => parse_card_op(ct, cell).map(DiceCell::Card),
    };
    parsed.unwrap_or_else(|| {
        malformed(space, visit, "roll", cell);
        DiceCell::Malformed(cell.trim().to_string())
    })
}

fn compile_dice_effect(raw: RawDiceEffectRow) -> Result<DiceEffectRow, LoadError> {
    let visit = visit_type(DICE_EFFECTS_FILE, &raw.visit_type)?;
    let channel = dice_channel(&raw)?;
    let cells = [&raw.roll_1, &raw.roll_2, &raw.roll_3, &raw.roll_4, &raw.roll_5, &raw.roll_6];
    let outcomes = std::array::from_fn(|i| dice_cell(&raw.space_name, visit, channel, cells[i]));
    Ok(DiceEffectRow {
        space_name: raw.space_name,
        visit_type: visit,
        channel,
        outcomes,
    })
}

fn compile_dice_outcome(raw: RawDiceOutcomeRow) -> Result<DiceOutcomeRow, LoadError> {
    let visit = visit_type(DICE_OUTCOMES_FILE, &raw.visit_type)?;
    let destinations = [raw.roll_1, raw.roll_2, raw.roll_3, raw.roll_4, raw.roll_5, raw.roll_6]
        .map(|cell| (!is_no_change(&cell)).then_some(cell));
    Ok(DiceOutcomeRow {
        space_name: raw.space_name,
        visit_type: visit,
        destinations,
    })
}

fn compile_card(raw: RawCardRow) -> Result<Card, LoadError> {
    let card_type = CardType::from_letter(&raw.card_type).ok_or_else(|| LoadError::InvalidCell {
        table: CARDS_FILE,
        column: "card_type",
        value: raw.card_type.clone(),
    })?;
    let money_effect = if raw.money_effect.is_empty() {
        0
    } else {
        parse_money(&raw.money_effect).ok_or_else(|| LoadError::InvalidCell {
            table: CARDS_FILE,
            column: "money_effect",
            value: raw.money_effect.clone(),
        })?
    };
    let time_effect = if raw.time_effect.is_empty() {
        0
    } else {
        parse_days(&raw.time_effect).ok_or_else(|| LoadError::InvalidCell {
            table: CARDS_FILE,
            column: "time_effect",
            value: raw.time_effect.clone(),
        })?
    };
    Ok(Card {
        card_id: raw.card_id,
        card_type,
        card_name: raw.card_name,
        description: raw.description,
        money_effect,
        time_effect,
    })
}

/// Every destination must exist with at least a First row.
fn validate_edges(tables: &RuleTables) -> Result<(), LoadError> {
    let has_first = |name: &str| tables.spaces.contains_key(&(name.to_string(), VisitType::First));

    let mut keys: Vec<&SpaceKey> = tables.spaces.keys().collect();
    keys.sort();
    for key in keys {
        for to in &tables.spaces[key].next_spaces {
            if !has_first(to) {
                return Err(LoadError::DanglingEdge {
                    from: key.0.clone(),
                    to: to.clone(),
                });
            }
        }
    }
    for row in tables.dice_outcomes.values() {
        for to in row.destinations.iter().flatten() {
            if !has_first(to) {
                return Err(LoadError::DanglingEdge {
                    from: row.space_name.clone(),
                    to: to.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "space_name,visit_type,phase,space_type,event,action,outcome,w_card,b_card,i_card,l_card,e_card,time,fee,negotiate,requires_dice_roll,space_1,space_2,space_3,space_4,space_5";

    fn text_source<'a>(spaces: &'a str, effects: &'a str, outcomes: &'a str) -> RulesSource<'a> {
        RulesSource::Text {
            spaces,
            dice_effects: effects,
            dice_outcomes: outcomes,
            cards: "",
        }
    }

    #[test]
    fn test_embedded_tables_load() {
        let tables = load_tables(RulesSource::Embedded).unwrap();
        assert_eq!(tables.space_order[0], "OWNER-SCOPE-INITIATION");
        assert!(tables.spaces.contains_key(&("FINISH".to_string(), VisitType::First)));
        assert!(!tables.cards.is_empty());

        let arch = &tables.spaces[&("ARCH-INITIATION".to_string(), VisitType::First)];
        assert_eq!(arch.fee, EffectValue::Fixed(Fee::Flat(1500)));
        assert_eq!(arch.time, EffectValue::Fixed(10));
        assert_eq!(arch.next_spaces, vec!["ARCH-FEE-REVIEW".to_string()]);
    }

    #[test]
    fn test_sentinels_parsed_at_load() {
        let spaces = format!(
            "{HEADER}\nA,First,SETUP,,,,,Draw 2,dice,,Shuffle all,,dice,3%,Yes,Yes,B,,,,\nB,First,END,End,,,,,,,,,,,No,No,,,,,"
        );
        let tables = load_tables(text_source(&spaces, "", "")).unwrap();
        let a = &tables.spaces[&("A".to_string(), VisitType::First)];

        let w = a.card_effect(CardType::W).fixed().unwrap();
        assert_eq!(w.op.unwrap().count, 2);
        assert!(a.card_effect(CardType::B).is_dice());
        assert!(a.card_effect(CardType::I).is_none());
        // Unparsable instruction survives as display text only.
        let l = a.card_effect(CardType::L).fixed().unwrap();
        assert_eq!(l.text, "Shuffle all");
        assert!(l.op.is_none());

        assert!(a.time.is_dice());
        assert_eq!(a.fee, EffectValue::Fixed(Fee::Percentage(3.0)));
        assert!(a.can_negotiate);
        assert!(a.requires_dice_roll);
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let spaces = format!("{HEADER}\nA,First,SETUP,,,,,,,,,,,,No,No,NOWHERE,,,,");
        let err = load_tables(text_source(&spaces, "", "")).unwrap_err();
        match err {
            LoadError::DanglingEdge { from, to } => {
                assert_eq!(from, "A");
                assert_eq!(to, "NOWHERE");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dangling_dice_destination_is_rejected() {
        let spaces = format!("{HEADER}\nA,First,SETUP,,,,,,,,,,,,No,Yes,,,,,");
        let outcomes = "space_name,visit_type,roll_1,roll_2,roll_3,roll_4,roll_5,roll_6\nA,First,A,A,A,A,A,GONE";
        let err = load_tables(text_source(&spaces, "", outcomes)).unwrap_err();
        assert!(matches!(err, LoadError::DanglingEdge { ref to, .. } if to == "GONE"));
    }

    #[test]
    fn test_subsequent_only_target_is_dangling() {
        let spaces = format!(
            "{HEADER}\nA,First,SETUP,,,,,,,,,,,,No,No,B,,,,\nB,Subsequent,SETUP,,,,,,,,,,,,No,No,,,,,"
        );
        assert!(matches!(
            load_tables(text_source(&spaces, "", "")),
            Err(LoadError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn test_dice_effect_channels() {
        let spaces = format!("{HEADER}\nA,First,SETUP,,,,,,,,,,,,No,Yes,,,,,");
        let effects = "space_name,visit_type,effect_type,card_type,roll_1,roll_2,roll_3,roll_4,roll_5,roll_6\n\
A,First,cards,W,No change,No change,Draw 2,No change,No change,No change\n\
A,First,b_cards,,Draw 1,,,,,\n\
A,First,money,,\"-1,000\",+500,No change,No change,No change,oops\n\
A,First,time,,1,2,3,4,5,6";
        let tables = load_tables(text_source(&spaces, effects, "")).unwrap();
        let rows = &tables.dice_effects[&("A".to_string(), VisitType::First)];
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].channel, DiceChannel::Cards(CardType::W));
        assert_eq!(rows[1].channel, DiceChannel::Cards(CardType::B));
        assert_eq!(rows[1].outcome(2), Some(&DiceCell::NoChange));
        assert_eq!(rows[2].outcome(1), Some(&DiceCell::Money(-1000)));
        assert_eq!(rows[2].outcome(6), Some(&DiceCell::Malformed("oops".into())));
        assert_eq!(rows[3].outcome(4), Some(&DiceCell::Time(4)));
        assert_eq!(rows[3].outcome(7), None);
    }

    #[test]
    fn test_bad_visit_type_is_an_error() {
        let spaces = format!("{HEADER}\nA,Third,SETUP,,,,,,,,,,,,No,No,,,,,");
        assert!(matches!(
            load_tables(text_source(&spaces, "", "")),
            Err(LoadError::InvalidCell { column: "visit_type", .. })
        ));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SPACES_FILE),
            format!("{HEADER}\nA,First,SETUP,,,,,,,,,,,,No,No,,,,,"),
        )
        .unwrap();
        std::fs::write(dir.path().join(DICE_EFFECTS_FILE), "").unwrap();
        std::fs::write(dir.path().join(DICE_OUTCOMES_FILE), "").unwrap();

        let tables = load_tables(RulesSource::Dir(dir.path().to_path_buf())).unwrap();
        assert_eq!(tables.space_order, vec!["A".to_string()]);
        assert!(tables.cards.is_empty());
    }

    #[test]
    fn test_unreadable_cards_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SPACES_FILE),
            format!("{HEADER}\nA,First,SETUP,,,,,,,,,,,,No,No,,,,,"),
        )
        .unwrap();
        std::fs::write(dir.path().join(DICE_EFFECTS_FILE), "").unwrap();
        std::fs::write(dir.path().join(DICE_OUTCOMES_FILE), "").unwrap();
        std::fs::write(dir.path().join(CARDS_FILE), [0xff, 0xfe, b'W', 0x80]).unwrap();

        let err = load_tables(RulesSource::Dir(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
