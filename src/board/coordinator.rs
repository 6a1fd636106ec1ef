//! The turn coordinator: validates player requests against the active turn,
//! delegates to the resolvers and applies their output to the player arena.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::decks::Decks;
use super::effects::EffectResolver;
use super::movement::MovementResolver;
use super::player::{apply_effects, Effect};
use super::store::RuleStore;
use super::turn::{TurnPhase, TurnState};
use super::types::{CardOp, Fee, Space};
use super::visits::VisitTracker;
use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::events::{CardSource, EventBus, EventSubscriber, GameEvent};
use crate::engine::models::{Card, CardType, GameResult, Player, PlayerId, Standing, VisitType};

pub struct TurnCoordinator {
    rules: Arc<RuleStore>,
    config: EngineConfig,
    players: Vec<Player>,
    active: usize,
    turn: Option<TurnState>,
    turn_number: u32,
    decks: Decks,
    rng: StdRng,
    bus: EventBus,
    pending_fees: HashMap<PlayerId, f64>,
    game_over: Option<GameResult>,
}

impl TurnCoordinator {
    /// Seat players on the starting space. Nothing is emitted until
    /// `start_game`.
    pub fn new(
        rules: Arc<RuleStore>,
        roster: &[(&str, &str)],
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        if roster.is_empty() {
            return Err(EngineError::InvalidTurnAction(
                "a game needs at least one player".into(),
            ));
        }
        let start = match &config.starting_space {
            Some(name) => name.clone(),
            None => rules.first_space()?.to_string(),
        };
        rules.find_space(&start, VisitType::First)?;

        let players = roster
            .iter()
            .map(|(id, name)| {
                let p = Player::new(id, name, &start, config.starting_money, config.starting_time);
                VisitTracker.record_visit(p, &start)
            })
            .collect();

        let seed = config.random_seed.unwrap_or(0);
        let decks = Decks::new(rules.cards()?, seed);
        let rng = StdRng::seed_from_u64(seed.wrapping_add(1));

        Ok(Self {
            rules,
            config,
            players,
            active: 0,
            turn: None,
            turn_number: 0,
            decks,
            rng,
            bus: EventBus::new(),
            pending_fees: HashMap::new(),
            game_over: None,
        })
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.bus.subscribe(subscriber);
    }

    // ------------------------------------------------------------------ //
    //  Read access
    // ------------------------------------------------------------------ //

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn active_player(&self) -> &Player {
        &self.players[self.active]
    }

    pub fn turn_state(&self) -> Option<&TurnState> {
        self.turn.as_ref()
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn phase(&self) -> Option<TurnPhase> {
        self.turn.as_ref().map(|t| t.phase)
    }

    pub fn can_end_turn(&self) -> bool {
        self.turn.as_ref().is_some_and(TurnState::can_end_turn)
    }

    pub fn game_over(&self) -> Option<&GameResult> {
        self.game_over.as_ref()
    }

    pub fn decks(&self) -> &Decks {
        &self.decks
    }

    pub fn pending_percentage_fee(&self, player_id: &str) -> Option<f64> {
        self.pending_fees.get(player_id).copied()
    }

    pub fn current_space(&self, player_id: &str) -> Result<&Space, EngineError> {
        let player = self.player(player_id).ok_or_else(|| {
            EngineError::InvalidTurnAction(format!("unknown player {player_id}"))
        })?;
        self.rules.find_space(&player.position, player.visit_type)
    }

    /// Legal destinations for the active player right now.
    pub fn available_moves(&self, player_id: &str) -> Result<Vec<String>, EngineError> {
        let player = self.player(player_id).ok_or_else(|| {
            EngineError::InvalidTurnAction(format!("unknown player {player_id}"))
        })?;
        let roll = self
            .turn
            .as_ref()
            .filter(|t| t.player_id == player_id)
            .and_then(|t| t.die_value);
        MovementResolver::new(&self.rules).available_moves(player, roll)
    }

    /// Negotiation needs the space to allow it and any dice-based time cost
    /// to be known already.
    pub fn can_negotiate(&self, player_id: &str) -> Result<bool, EngineError> {
        let Some(turn) = self.turn.as_ref().filter(|t| t.player_id == player_id) else {
            return Ok(false);
        };
        let space = self.current_space(player_id)?;
        Ok(space.can_negotiate && (!space.time.is_dice() || turn.has_rolled))
    }

    // ------------------------------------------------------------------ //
    //  Lifecycle
    // ------------------------------------------------------------------ //

    pub fn start_game(&mut self) -> Result<Vec<GameEvent>, EngineError> {
        if self.turn.is_some() || self.game_over.is_some() {
            return Err(self.reject("The game has already started"));
        }
        let mut events = Vec::new();
        self.begin_turn(0, &mut events)?;
        Ok(events)
    }

    /// Roll a die from the engine RNG and resolve it.
    pub fn roll_dice(&mut self, player_id: &str) -> Result<Vec<GameEvent>, EngineError> {
        self.check_can_roll(player_id)?;
        let die = self.rng.gen_range(1..=6);
        self.roll_dice_with(player_id, die)
    }

    /// Resolve a caller-supplied die face.
    pub fn roll_dice_with(&mut self, player_id: &str, die: u8) -> Result<Vec<GameEvent>, EngineError> {
        let idx = self.check_can_roll(player_id)?;
        if !(1..=6).contains(&die) {
            return Err(self.reject(format!("Die value {die} is outside 1-6")));
        }

        let rules = Arc::clone(&self.rules);
        let outcome = EffectResolver::new(&rules).resolve_dice_roll(&self.players[idx], die)?;

        let mut events = Vec::new();
        self.update_player(idx, &[Effect::Money(outcome.money_delta), Effect::Time(outcome.time_delta)]);
        for op in &outcome.card_ops {
            self.run_card_op(idx, op, CardSource::Dice, &mut events);
        }
        if let Some(turn) = self.turn.as_mut() {
            turn.record_dice_rolled(die, outcome.time_delta);
        }
        tracing::debug!(player = player_id, die, money = outcome.money_delta, time = outcome.time_delta, "dice resolved");

        self.emit(
            &mut events,
            GameEvent::DiceRollCompleted {
                player_id: player_id.to_string(),
                dice_value: die,
                outcome,
            },
        );
        Ok(events)
    }

    /// Carry out the pending card instruction of `card_type` on the current space.
    pub fn take_card_action(&mut self, player_id: &str, card_type: CardType) -> Result<Vec<GameEvent>, EngineError> {
        let idx = self.active_index(player_id)?;
        let action = self
            .turn
            .as_mut()
            .and_then(|t| t.record_card_action_taken(card_type));
        let Some(action) = action else {
            return Err(self.reject(format!("No {} card action is available", card_type.name())));
        };

        let mut events = Vec::new();
        match action.op {
            Some(op) => self.run_card_op(idx, &op, CardSource::Space, &mut events),
            None => {
                let err = EngineError::MalformedEffect {
                    space: self.players[idx].position.clone(),
                    cell: action.text,
                };
                tracing::warn!(error = %err, "card action has no executable form, skipping");
            }
        }
        Ok(events)
    }

    pub fn select_move(&mut self, player_id: &str, space_name: &str) -> Result<Vec<GameEvent>, EngineError> {
        self.active_index(player_id)?;
        let moves = self.available_moves(player_id)?;
        if !moves.iter().any(|m| m == space_name) {
            return Err(self.reject(format!("{space_name} is not a legal destination")));
        }
        if let Some(turn) = self.turn.as_mut() {
            turn.record_move_selected(space_name, moves.len());
        }
        Ok(Vec::new())
    }

    /// Record the decision a Logic space asks for. A choice must name a legal
    /// destination and also selects it.
    pub fn record_decision(&mut self, player_id: &str, choice: Option<&str>) -> Result<Vec<GameEvent>, EngineError> {
        let idx = self.active_index(player_id)?;
        let space_name = self.players[idx].position.clone();
        if let Some(dest) = choice {
            if !self.available_moves(player_id)?.iter().any(|m| m == dest) {
                return Err(self.reject(format!("{dest} is not a legal destination")));
            }
            self.select_move(player_id, dest)?;
        }
        if let Some(turn) = self.turn.as_mut() {
            turn.record_decision(&space_name);
        }
        let mut events = Vec::new();
        self.emit(
            &mut events,
            GameEvent::DecisionRecorded {
                player_id: player_id.to_string(),
                space_name,
                choice: choice.map(str::to_string),
            },
        );
        Ok(events)
    }

    /// Play a card from hand: apply its money and time effects and discard it.
    pub fn play_card(&mut self, player_id: &str, card_id: &str) -> Result<Vec<GameEvent>, EngineError> {
        let idx = self.active_index(player_id)?;
        let card = self.players[idx]
            .cards
            .values()
            .flatten()
            .find(|c| c.card_id == card_id)
            .cloned();
        let Some(card) = card else {
            return Err(self.reject(format!("Card {card_id} is not in hand")));
        };

        self.update_player(
            idx,
            &[
                Effect::Money(card.money_effect),
                Effect::Time(card.time_effect),
                Effect::RemoveCards {
                    card_type: card.card_type,
                    card_ids: vec![card.card_id.clone()],
                },
            ],
        );
        self.decks.discard([card.clone()]);

        let mut events = Vec::new();
        self.emit(
            &mut events,
            GameEvent::CardPlayed {
                player_id: player_id.to_string(),
                card,
            },
        );
        Ok(events)
    }

    /// Apply a percentage fee left pending by a space entry, against the
    /// scope total the host supplies.
    pub fn apply_scoped_fee(&mut self, player_id: &str, scope_total: i64) -> Result<i64, EngineError> {
        let Some(idx) = self.players.iter().position(|p| p.player_id == player_id) else {
            return Err(self.reject(format!("Unknown player {player_id}")));
        };
        let Some(pct) = self.pending_fees.remove(player_id) else {
            return Ok(0);
        };
        let amount = Fee::Percentage(pct).amount_for_scope(scope_total);
        self.update_player(idx, &[Effect::Money(-amount)]);
        Ok(amount)
    }

    /// Alternate ending: roll back to the space-entry snapshot (if any), pay
    /// the time penalty, stay put and end the turn.
    pub fn negotiate(&mut self, player_id: &str) -> Result<Vec<GameEvent>, EngineError> {
        let idx = self.active_index(player_id)?;
        if !self.can_negotiate(player_id)? {
            return Err(self.reject("Negotiation is not available on this space right now"));
        }

        let rules = Arc::clone(&self.rules);
        let space = self.current_space(player_id)?.clone();
        let rolled_time = self.turn.as_ref().and_then(|t| t.rolled_time);
        let penalty = EffectResolver::new(&rules).negotiation_penalty(
            &space,
            rolled_time,
            self.config.default_negotiation_penalty,
        );

        let restored = self.players[idx].space_entry_snapshot.is_some();
        if restored {
            self.settle_decks_for_restore(idx);
            self.update_player(idx, &[Effect::RestoreSnapshot, Effect::Time(penalty)]);
            self.pending_fees.remove(player_id);
        } else {
            self.update_player(idx, &[Effect::Time(penalty)]);
        }
        tracing::debug!(player = player_id, space = %space.name, penalty, restored, "negotiated");

        let mut events = Vec::new();
        self.emit(
            &mut events,
            GameEvent::Negotiated {
                player_id: player_id.to_string(),
                space_name: space.name.clone(),
                penalty_days: penalty,
                restored_snapshot: restored,
            },
        );
        self.finish_turn(idx, &mut events)?;
        Ok(events)
    }

    /// Commit the selected or only destination and hand the turn on.
    pub fn end_turn(&mut self, player_id: &str) -> Result<Vec<GameEvent>, EngineError> {
        let idx = self.active_index(player_id)?;
        let space = self.current_space(player_id)?.clone();

        let has_decision = self
            .turn
            .as_ref()
            .is_some_and(|t| t.has_decision_for(&space.name));
        if space.is_logic() && !has_decision {
            return Err(self.reject(format!("A decision is required on {} before ending the turn", space.name)));
        }
        if !self.can_end_turn() {
            return Err(self.reject("Complete the required actions before ending the turn"));
        }

        let moves = self.available_moves(player_id)?;
        let selected = self.turn.as_ref().and_then(|t| t.selected_move.clone());
        let destination = match (selected, moves.len()) {
            (Some(dest), _) => Some(dest),
            (None, 0) => None,
            (None, 1) => moves.into_iter().next(),
            (None, _) => return Err(self.reject("Select a destination before ending the turn")),
        };

        // Resolve the target row before anything is published. The visit
        // type must be read before the visit is recorded.
        let target = match destination {
            Some(dest) => {
                let visit_type = VisitTracker.visit_type(&self.players[idx], &dest);
                Some(self.rules.find_space(&dest, visit_type)?.clone())
            }
            None => None,
        };

        let mut events = Vec::new();
        self.emit(
            &mut events,
            GameEvent::SpaceActionCompleted {
                player_id: player_id.to_string(),
                space_name: space.name.clone(),
                visit_type: space.visit_type,
            },
        );
        match target {
            Some(target) => self.commit_move(idx, &target, &mut events),
            None => self.update_player(idx, &[Effect::ClearSnapshot]),
        }
        self.finish_turn(idx, &mut events)?;
        Ok(events)
    }

    // ------------------------------------------------------------------ //
    //  Internals
    // ------------------------------------------------------------------ //

    fn emit(&mut self, events: &mut Vec<GameEvent>, event: GameEvent) {
        self.bus.publish(&event);
        events.push(event);
    }

    /// Publish the rejection to the UI and build the error for the caller.
    fn reject(&mut self, message: impl Into<String>) -> EngineError {
        let message = message.into();
        tracing::debug!(reason = %message, "rejected turn action");
        self.bus
            .publish(&GameEvent::error_message(message.clone(), "No changes were made."));
        EngineError::InvalidTurnAction(message)
    }

    fn active_index(&mut self, player_id: &str) -> Result<usize, EngineError> {
        if self.game_over.is_some() {
            return Err(self.reject("The game is over"));
        }
        let active_id = match &self.turn {
            Some(turn) => turn.player_id.clone(),
            None => return Err(self.reject("The game has not started")),
        };
        if active_id != player_id {
            return Err(self.reject(format!("It is not {player_id}'s turn")));
        }
        Ok(self.active)
    }

    fn check_can_roll(&mut self, player_id: &str) -> Result<usize, EngineError> {
        let idx = self.active_index(player_id)?;
        if self.turn.as_ref().is_some_and(|t| t.has_rolled) {
            return Err(self.reject("The dice were already rolled this turn"));
        }
        let player = &self.players[idx];
        let space = self.rules.find_space(&player.position, player.visit_type)?;
        let has_dice_rows = !self
            .rules
            .query_dice_effects(&space.name, space.visit_type)?
            .is_empty();
        if !space.requires_dice_roll && !has_dice_rows {
            return Err(self.reject("This space has no dice roll"));
        }
        Ok(idx)
    }

    fn update_player(&mut self, idx: usize, effects: &[Effect]) {
        let player = self.players[idx].clone();
        self.players[idx] = apply_effects(player, effects);
    }

    fn run_card_op(&mut self, idx: usize, op: &CardOp, source: CardSource, events: &mut Vec<GameEvent>) {
        let outcome = self.decks.resolve_op(&self.players[idx], op);
        self.update_player(idx, &outcome.effects);
        if !outcome.drawn.is_empty() {
            let player_id = self.players[idx].player_id.clone();
            self.emit(
                events,
                GameEvent::CardsDrawn {
                    player_id,
                    cards: outcome.drawn,
                    source,
                },
            );
        }
    }

    fn begin_turn(&mut self, idx: usize, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        let rules = Arc::clone(&self.rules);
        let player = &self.players[idx];
        let space = rules.find_space(&player.position, player.visit_type)?;
        let dice_moves = rules
            .find_movement_outcome(&space.name, space.visit_type)?
            .is_some();
        let move_choice = MovementResolver::new(&rules).is_choice(space) && !dice_moves;

        self.active = idx;
        self.turn_number += 1;
        self.turn = Some(TurnState::start(&player.player_id, self.turn_number, space, move_choice));

        let player = self.players[idx].clone();
        self.emit(
            events,
            GameEvent::TurnStarted {
                player,
                turn_number: self.turn_number,
            },
        );
        Ok(())
    }

    fn commit_move(&mut self, idx: usize, space: &Space, events: &mut Vec<GameEvent>) {
        let rules = Arc::clone(&self.rules);
        let player = self.players[idx].clone();
        let from = player.position.clone();
        let dest = space.name.as_str();
        let visit_type = space.visit_type;
        let entry = EffectResolver::new(&rules).resolve_space_entry(space);

        let player = apply_effects(
            player,
            &[
                Effect::TakeSnapshot,
                Effect::MoveTo {
                    space: dest.to_string(),
                    visit_type,
                },
                Effect::Money(entry.money_delta),
                Effect::Time(entry.time_delta),
            ],
        );
        let player = VisitTracker.record_visit(player, dest);
        match entry.pending_percentage_fee {
            Some(pct) => self.pending_fees.insert(player.player_id.clone(), pct),
            None => self.pending_fees.remove(&player.player_id),
        };
        tracing::debug!(player = %player.player_id, from = %from, to = dest, visit_type = %visit_type, "move committed");
        self.players[idx] = player.clone();

        self.emit(
            events,
            GameEvent::PlayerMoved {
                player,
                from_space: from,
                to_space: dest.to_string(),
            },
        );

        if space.is_ending() {
            self.finish_game(idx, events);
        }
    }

    /// Before a snapshot restore: cards gained since entry go back under
    /// their draw pile, and cards the snapshot brings back leave the piles.
    fn settle_decks_for_restore(&mut self, idx: usize) {
        let player = &self.players[idx];
        let Some(snapshot) = player.space_entry_snapshot.as_ref() else {
            return;
        };
        let held: BTreeSet<&str> = player.cards.values().flatten().map(|c| c.card_id.as_str()).collect();
        let kept: BTreeSet<&str> = snapshot.cards.values().flatten().map(|c| c.card_id.as_str()).collect();

        let gained: Vec<Card> = player
            .cards
            .values()
            .flatten()
            .filter(|c| !kept.contains(c.card_id.as_str()))
            .cloned()
            .collect();
        let regained: Vec<(CardType, Vec<String>)> = snapshot
            .cards
            .iter()
            .map(|(card_type, hand)| {
                let ids = hand
                    .iter()
                    .filter(|c| !held.contains(c.card_id.as_str()))
                    .map(|c| c.card_id.clone())
                    .collect();
                (*card_type, ids)
            })
            .collect();

        self.decks.return_to_bottom(gained);
        for (card_type, ids) in regained {
            if !ids.is_empty() {
                self.decks.reclaim(card_type, &ids);
            }
        }
    }

    fn finish_turn(&mut self, idx: usize, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        if let Some(turn) = self.turn.as_mut() {
            turn.mark_ended();
        }
        let player_id = self.players[idx].player_id.clone();
        self.emit(events, GameEvent::TurnEnded { player_id });

        if self.game_over.is_some() {
            return Ok(());
        }
        let next = (idx + 1) % self.players.len();
        self.begin_turn(next, events)
    }

    fn finish_game(&mut self, finisher: usize, events: &mut Vec<GameEvent>) {
        let mut others: Vec<&Player> = self
            .players
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != finisher)
            .map(|(_, p)| p)
            .collect();
        others.sort_by(|a, b| a.time_spent.cmp(&b.time_spent).then(b.money.cmp(&a.money)));

        let standings = std::iter::once(&self.players[finisher])
            .chain(others)
            .map(|p| Standing {
                player_id: p.player_id.clone(),
                time_spent: p.time_spent,
                money: p.money,
                position: p.position.clone(),
            })
            .collect();

        let result = GameResult {
            winners: vec![self.players[finisher].player_id.clone()],
            standings,
            turns_played: self.turn_number,
            reason: "finished".into(),
        };
        tracing::info!(winner = %result.winners[0], turns = result.turns_played, "game over");
        self.game_over = Some(result.clone());
        self.emit(events, GameEvent::GameEnded { result });
    }
}

impl std::fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("active", &self.active)
            .field("turn_number", &self.turn_number)
            .field("players", &self.players.len())
            .field("game_over", &self.game_over.is_some())
            .finish()
    }
}
