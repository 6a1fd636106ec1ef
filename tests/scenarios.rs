//! Turn resolution properties and end-to-end scenarios, played against a
//! small hand-written board.
//!
//! Run with:
//!     cargo test --test scenarios

use std::sync::Arc;

use construction_game_engine::board::effects::EffectResolver;
use construction_game_engine::board::movement::MovementResolver;
use construction_game_engine::board::types::{CardOp, CardOpKind};
use construction_game_engine::board::visits::VisitTracker;
use construction_game_engine::board::{RuleStore, RulesSource, TurnCoordinator};
use construction_game_engine::engine::config::EngineConfig;
use construction_game_engine::engine::error::EngineError;
use construction_game_engine::engine::events::{EventLog, GameEvent, MessageKind};
use construction_game_engine::engine::models::{CardType, Player, VisitType};

const SPACES: &str = "\
space_name,visit_type,phase,space_type,event,action,outcome,w_card,b_card,i_card,l_card,e_card,time,fee,negotiate,requires_dice_roll,space_1,space_2,space_3,space_4,space_5
X,First,SETUP,,Start,,,,,,,,,,No,No,Y,,,,
X,Subsequent,SETUP,,Start again,,,,,,,,,,No,No,Y,,,,
Y,First,SETUP,,Plan,,,,,,,,2,,No,No,FEE,,,,
FEE,First,DESIGN,,Pay up,,,,,,,,3,\"$1,500\",No,No,DICE,,,,
DICE,First,DESIGN,,Roll,,,,,,,,,,No,Yes,LOGIC,,,,
LOGIC,First,DESIGN,Logic,Decide,,,,,,,,,,No,No,NEG,X,,,
NEG,First,REVIEW,,Haggle,,,,,,,,4,$100,Yes,No,END,,,,
END,First,END,End,Done,,,,,,,,,,No,No,,,,,
LOOP,First,SETUP,,Again,,,,,,,,,,No,No,LOOP,,,,
";

const DICE_EFFECTS: &str = "\
space_name,visit_type,effect_type,card_type,roll_1,roll_2,roll_3,roll_4,roll_5,roll_6
DICE,First,cards,W,No change,No change,Draw 2,No change,No change,No change
DICE,First,time,,1,1,2,2,3,3
";

const DICE_OUTCOMES: &str = "space_name,visit_type,roll_1,roll_2,roll_3,roll_4,roll_5,roll_6\n";

const CARDS: &str = "\
card_id,card_type,card_name,description,money_effect,time_effect
W001,W,Footing,,0,0
W002,W,Framing,,0,0
W003,W,Roofing,,0,0
W004,W,Glazing,,0,0
";

fn rules() -> Arc<RuleStore> {
    let mut store = RuleStore::new();
    store
        .load(RulesSource::Text {
            spaces: SPACES,
            dice_effects: DICE_EFFECTS,
            dice_outcomes: DICE_OUTCOMES,
            cards: CARDS,
        })
        .expect("fixture board should load");
    Arc::new(store)
}

fn make_game(start: &str) -> TurnCoordinator {
    let config = EngineConfig {
        starting_space: Some(start.into()),
        starting_money: 5_000,
        random_seed: Some(9),
        ..EngineConfig::default()
    };
    let mut game =
        TurnCoordinator::new(rules(), &[("p1", "Alice"), ("p2", "Bob")], config).unwrap();
    game.start_game().unwrap();
    game
}

fn at(space: &str) -> Player {
    Player::new("p1", "Alice", space, 0, 0)
}

#[test]
fn test_single_destination_selection_is_free() {
    let mut game = make_game("X");
    assert_eq!(game.available_moves("p1").unwrap(), vec!["Y"]);

    game.select_move("p1", "Y").unwrap();
    let turn = game.turn_state().unwrap();
    assert_eq!(turn.completed_actions, 0);
    assert_eq!(turn.selected_move.as_deref(), Some("Y"));
}

#[test]
fn test_dice_space_has_no_moves_until_rolled() {
    let mut game = make_game("DICE");
    assert!(game.available_moves("p1").unwrap().is_empty());

    game.roll_dice_with("p1", 5).unwrap();
    assert_eq!(game.available_moves("p1").unwrap(), vec!["LOGIC"]);
}

#[test]
fn test_second_roll_counts_nothing() {
    let mut game = make_game("DICE");
    game.roll_dice_with("p1", 1).unwrap();
    assert_eq!(game.turn_state().unwrap().completed_actions, 1);

    let err = game.roll_dice_with("p1", 2).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTurnAction(_)));
    assert_eq!(game.turn_state().unwrap().completed_actions, 1);
    assert_eq!(game.player("p1").unwrap().time_spent, 1);
}

#[test]
fn test_recorded_visit_reads_back_subsequent() {
    for space in ["X", "Y", "NEVER-SEEN"] {
        let player = VisitTracker.record_visit(at("X"), space);
        assert_eq!(VisitTracker.visit_type(&player, space), VisitType::Subsequent);
    }
}

#[test]
fn test_negotiation_restores_pre_entry_state_plus_penalty() {
    let mut game = make_game("LOGIC");
    let before = game.player("p1").unwrap().clone();

    game.record_decision("p1", Some("NEG")).unwrap();
    game.end_turn("p1").unwrap();
    let entered = game.player("p1").unwrap();
    assert_eq!(entered.money, before.money - 100);
    assert_eq!(entered.time_spent, before.time_spent + 4);

    // Bob's turn passes on LOGIC too.
    game.record_decision("p2", Some("NEG")).unwrap();
    game.end_turn("p2").unwrap();

    let events = game.negotiate("p1").unwrap();
    assert!(matches!(
        events[0],
        GameEvent::Negotiated { penalty_days: 4, restored_snapshot: true, .. }
    ));
    let after = game.player("p1").unwrap();
    assert_eq!(after.money, before.money);
    assert_eq!(after.time_spent, before.time_spent + 4);
    assert_eq!(after.position, "NEG");
}

#[test]
fn test_scenario_a_linear_move() {
    let mut game = make_game("X");
    assert_eq!(game.available_moves("p1").unwrap(), vec!["Y"]);

    let events = game.end_turn("p1").unwrap();
    let moved = events
        .iter()
        .find_map(|e| match e {
            GameEvent::PlayerMoved { to_space, .. } => Some(to_space.as_str()),
            _ => None,
        })
        .expect("playerMoved event");
    assert_eq!(moved, "Y");
    assert_eq!(game.player("p1").unwrap().position, "Y");
}

#[test]
fn test_scenario_b_dice_card_ops() {
    let rules = rules();
    let resolver = EffectResolver::new(&rules);

    let three = resolver.resolve_dice_roll(&at("DICE"), 3).unwrap();
    assert_eq!(
        three.card_ops,
        vec![CardOp {
            card_type: CardType::W,
            kind: CardOpKind::Draw,
            count: 2
        }]
    );
    assert_eq!(
        serde_json::to_value(&three.card_ops[0]).unwrap(),
        serde_json::json!({"type": "W", "op": "draw", "count": 2})
    );

    let four = resolver.resolve_dice_roll(&at("DICE"), 4).unwrap();
    assert!(four.card_ops.is_empty());
}

#[test]
fn test_scenario_c_flat_fee() {
    let rules = rules();
    let space = rules.find_space("FEE", VisitType::First).unwrap();
    let entry = EffectResolver::new(&rules).resolve_space_entry(space);
    assert_eq!(entry.money_delta, -1_500);
    assert_eq!(entry.time_delta, 3);
    assert_eq!(entry.pending_percentage_fee, None);
}

#[test]
fn test_scenario_d_logic_needs_decision() {
    let mut game = make_game("LOGIC");
    let log = EventLog::new();
    game.subscribe(Box::new(log.clone()));
    let before = game.player("p1").unwrap().clone();

    assert!(game.end_turn("p1").is_err());
    let events = log.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        GameEvent::ShowMessage { kind: MessageKind::Error, .. }
    ));
    let unchanged = game.player("p1").unwrap();
    assert_eq!(unchanged.position, before.position);
    assert_eq!(unchanged.money, before.money);
    assert_eq!(game.active_player().player_id, "p1");

    log.clear();
    game.record_decision("p1", Some("X")).unwrap();
    game.end_turn("p1").unwrap();
    assert_eq!(
        log.names(),
        vec![
            "decisionRecorded",
            "spaceActionCompleted",
            "playerMoved",
            "turnEnded",
            "turnStarted"
        ]
    );
    let p1 = game.player("p1").unwrap();
    assert_eq!(p1.position, "X");
    assert_eq!(p1.visit_type, VisitType::First);
}

#[test]
fn test_game_ends_on_end_space() {
    let mut game = make_game("NEG");
    let events = game.end_turn("p1").unwrap();
    assert!(events.iter().any(|e| e.name() == "gameEnded"));
    assert_eq!(game.game_over().unwrap().winners, vec!["p1".to_string()]);
    assert!(game.end_turn("p2").is_err());
}

#[test]
fn test_movement_resolver_sees_visit_history() {
    let rules = rules();
    let movement = MovementResolver::new(&rules);
    let player = VisitTracker.record_visit(at("LOGIC"), "X");
    let previews = movement.preview_moves(&player, None).unwrap();
    let x = previews.iter().find(|p| p.space_name == "X").unwrap();
    assert_eq!(x.visit_type, VisitType::Subsequent);
}

#[test]
fn test_failed_commit_publishes_nothing() {
    // LOOP has no Subsequent row, so re-entering it cannot resolve.
    let mut game = make_game("LOOP");
    let log = EventLog::new();
    game.subscribe(Box::new(log.clone()));

    let err = game.end_turn("p1").unwrap_err();
    assert!(matches!(err, EngineError::SpaceNotFound { .. }));
    assert!(log.events().is_empty());

    let p1 = game.player("p1").unwrap();
    assert_eq!(p1.position, "LOOP");
    assert_eq!(p1.visit_type, VisitType::First);
    assert_eq!(game.active_player().player_id, "p1");
    assert_eq!(game.turn_number(), 1);
}
