//! Headless play: one seeded session driven by strategies, or a batch of
//! them run in parallel.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::board::RuleStore;
use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::models::{GameResult, PlayerId};
use crate::engine::session::GameSession;
use crate::engine::strategy::TurnStrategy;

/// More requests than this in one turn means the strategy is stuck.
const MAX_STEPS_PER_TURN: usize = 64;

#[derive(Clone)]
pub struct Seat {
    pub player_id: PlayerId,
    pub display_name: String,
    pub strategy: Arc<dyn TurnStrategy>,
}

impl Seat {
    pub fn new(player_id: &str, display_name: &str, strategy: Arc<dyn TurnStrategy>) -> Self {
        Self {
            player_id: player_id.to_string(),
            display_name: display_name.to_string(),
            strategy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub seed: u64,
    /// `None` when the turn cap was hit before anyone finished.
    pub result: Option<GameResult>,
    pub turns: u32,
    pub requests: usize,
    pub final_times: BTreeMap<PlayerId, u32>,
    pub final_money: BTreeMap<PlayerId, i64>,
    pub duration_ms: f64,
}

/// Play one game to the end or to `config.max_turns`.
pub fn play_session(
    rules: Arc<RuleStore>,
    seats: &[Seat],
    config: &EngineConfig,
) -> Result<SessionOutcome, EngineError> {
    let seed = config.random_seed.unwrap_or(0);
    let roster: Vec<(&str, &str)> = seats
        .iter()
        .map(|s| (s.player_id.as_str(), s.display_name.as_str()))
        .collect();
    let mut session = GameSession::new(rules, &roster, config.clone())?;
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);

    let t0 = Instant::now();
    session.start()?;
    let mut requests = 0;
    let mut steps = 0;
    let mut turn = session.coordinator().turn_number();

    while session.coordinator().game_over().is_none() && turn <= config.max_turns {
        let player_id = session.coordinator().active_player().player_id.clone();
        let Some(seat) = seats.iter().find(|s| s.player_id == player_id) else {
            break;
        };
        let request = seat.strategy.next_request(session.coordinator(), &player_id, &mut rng);
        session.handle(&request)?;
        requests += 1;

        let now = session.coordinator().turn_number();
        if now != turn {
            turn = now;
            steps = 0;
        } else {
            steps += 1;
            if steps > MAX_STEPS_PER_TURN {
                tracing::warn!(seed, player = %player_id, turn, "strategy stalled, abandoning session");
                break;
            }
        }
    }

    let game = session.coordinator();
    let outcome = SessionOutcome {
        seed,
        result: game.game_over().cloned(),
        turns: game.turn_number(),
        requests,
        final_times: game.players().iter().map(|p| (p.player_id.clone(), p.time_spent)).collect(),
        final_money: game.players().iter().map(|p| (p.player_id.clone(), p.money)).collect(),
        duration_ms: t0.elapsed().as_secs_f64() * 1000.0,
    };
    tracing::debug!(seed, turns = outcome.turns, finished = outcome.result.is_some(), "session complete");
    Ok(outcome)
}

/// Aggregated results from a batch run, keyed by display name.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub num_games: usize,
    pub wins: BTreeMap<String, usize>,
    pub unfinished: usize,
    pub failed: usize,
    pub times: BTreeMap<String, Vec<u32>>,
    pub money: BTreeMap<String, Vec<i64>>,
    pub turns: Vec<u32>,
    pub durations_ms: Vec<f64>,
}

impl BatchResult {
    pub fn finish_rate(&self) -> f64 {
        let finished = self.num_games - self.unfinished - self.failed;
        finished as f64 / self.num_games.max(1) as f64
    }

    pub fn win_rate(&self, name: &str) -> f64 {
        *self.wins.get(name).unwrap_or(&0) as f64 / self.num_games.max(1) as f64
    }

    pub fn avg_time(&self, name: &str) -> f64 {
        match self.times.get(name) {
            Some(t) if !t.is_empty() => t.iter().map(|d| f64::from(*d)).sum::<f64>() / t.len() as f64,
            _ => 0.0,
        }
    }

    pub fn avg_money(&self, name: &str) -> f64 {
        match self.money.get(name) {
            Some(m) if !m.is_empty() => m.iter().sum::<i64>() as f64 / m.len() as f64,
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Batch Results ({} games)", self.num_games)];
        lines.push("=".repeat(60));
        for name in self.times.keys() {
            lines.push(format!(
                "  {:>12}: {:3} wins ({:5.1}%)  avg time={:6.1}d  avg money={:9.0}",
                name,
                self.wins.get(name).copied().unwrap_or(0),
                self.win_rate(name) * 100.0,
                self.avg_time(name),
                self.avg_money(name),
            ));
        }
        lines.push(format!(
            "  {:>12}: {:5.1}%  (unfinished {}, failed {})",
            "Finished",
            self.finish_rate() * 100.0,
            self.unfinished,
            self.failed
        ));
        if !self.turns.is_empty() {
            let avg_turns = self.turns.iter().map(|t| f64::from(*t)).sum::<f64>() / self.turns.len() as f64;
            let total_s = self.durations_ms.iter().sum::<f64>() / 1000.0;
            lines.push(format!("  Avg turns: {:.1}  |  Total: {:.1}s", avg_turns, total_s));
        }
        lines.join("\n")
    }
}

/// Play `num_games` sessions with seeds `base_seed..base_seed + num_games`.
pub fn run_batch(
    rules: Arc<RuleStore>,
    seats: &[Seat],
    config: &EngineConfig,
    num_games: usize,
    base_seed: u64,
) -> BatchResult {
    let outcomes: Vec<Result<SessionOutcome, EngineError>> = (0..num_games)
        .into_par_iter()
        .map(|i| {
            let config = EngineConfig {
                random_seed: Some(base_seed + i as u64),
                ..config.clone()
            };
            play_session(Arc::clone(&rules), seats, &config)
        })
        .collect();

    let name_of: BTreeMap<&str, &str> = seats
        .iter()
        .map(|s| (s.player_id.as_str(), s.display_name.as_str()))
        .collect();

    let mut batch = BatchResult {
        num_games,
        ..BatchResult::default()
    };
    for outcome in outcomes {
        let outcome = match outcome {
            Ok(o) => o,
            Err(err) => {
                tracing::warn!(error = %err, "session failed");
                batch.failed += 1;
                continue;
            }
        };
        batch.turns.push(outcome.turns);
        batch.durations_ms.push(outcome.duration_ms);
        for (pid, days) in &outcome.final_times {
            if let Some(name) = name_of.get(pid.as_str()) {
                batch.times.entry(name.to_string()).or_default().push(*days);
            }
        }
        for (pid, money) in &outcome.final_money {
            if let Some(name) = name_of.get(pid.as_str()) {
                batch.money.entry(name.to_string()).or_default().push(*money);
            }
        }
        match outcome.result.as_ref().and_then(|r| r.winners.first()) {
            Some(winner) => {
                if let Some(name) = name_of.get(winner.as_str()) {
                    *batch.wins.entry(name.to_string()).or_default() += 1;
                }
            }
            None => batch.unfinished += 1,
        }
    }
    tracing::info!(games = num_games, finished = %format!("{:.1}%", batch.finish_rate() * 100.0), "batch complete");
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::RulesSource;
    use crate::engine::strategy::{FirstChoiceStrategy, RandomStrategy};

    fn rules() -> Arc<RuleStore> {
        let mut store = RuleStore::new();
        store.load(RulesSource::Embedded).unwrap();
        Arc::new(store)
    }

    fn seats() -> Vec<Seat> {
        vec![
            Seat::new("p0", "first", Arc::new(FirstChoiceStrategy)),
            Seat::new("p1", "random", Arc::new(RandomStrategy::default())),
        ]
    }

    #[test]
    fn test_session_is_reproducible() {
        let config = EngineConfig {
            random_seed: Some(42),
            ..EngineConfig::default()
        };
        let a = play_session(rules(), &seats(), &config).unwrap();
        let b = play_session(rules(), &seats(), &config).unwrap();
        assert_eq!(a.turns, b.turns);
        assert_eq!(a.final_times, b.final_times);
        assert_eq!(a.final_money, b.final_money);
        assert_eq!(a.requests, b.requests);
    }

    #[test]
    fn test_turn_cap_stops_session() {
        let config = EngineConfig {
            random_seed: Some(1),
            max_turns: 3,
            ..EngineConfig::default()
        };
        let outcome = play_session(rules(), &seats(), &config).unwrap();
        assert!(outcome.turns <= 4);
    }

    #[test]
    fn test_batch_accounts_for_every_game() {
        let config = EngineConfig::default();
        let batch = run_batch(rules(), &seats(), &config, 8, 100);
        assert_eq!(batch.num_games, 8);
        assert_eq!(batch.failed, 0);
        let wins: usize = batch.wins.values().sum();
        assert_eq!(wins + batch.unfinished, 8);
        assert_eq!(batch.times["first"].len(), 8);
        assert!(batch.summary().contains("Batch Results (8 games)"));
    }
}
