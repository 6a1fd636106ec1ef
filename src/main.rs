use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use construction_game_engine::board::{RuleStore, RulesSource};
use construction_game_engine::engine::config::{load_config, load_default_config};
use construction_game_engine::engine::events::GameEvent;
use construction_game_engine::engine::session::{GameSession, UiRequest};
use construction_game_engine::engine::simulator::{run_batch, Seat};
use construction_game_engine::engine::strategy::{FirstChoiceStrategy, RandomStrategy, TurnStrategy};

#[derive(Parser)]
#[command(name = "construction-game", about = "Construction project board game engine")]
struct Cli {
    /// Directory holding spaces.csv, dice_effects.csv, dice_outcomes.csv and cards.csv
    #[arg(long, env = "CONSTRUCTION_GAME_RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// Path to engine.toml (default: auto-discover)
    #[arg(long, env = "CONSTRUCTION_GAME_CONFIG")]
    config: Option<PathBuf>,

    /// Number of auto-played seats
    #[arg(short, long, default_value = "2")]
    players: usize,

    #[arg(long, env = "CONSTRUCTION_GAME_SEED")]
    seed: Option<u64>,

    #[arg(long)]
    max_turns: Option<u32>,

    /// Resolve dice immediately instead of waiting for the roll animation
    #[arg(long)]
    no_delay: bool,

    /// Play this many games in parallel and print a summary
    #[arg(long, default_value = "1")]
    games: usize,

    /// Print every event as a JSON line
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_default_config(),
    };
    if let Some(dir) = cli.rules_dir {
        config.rules_dir = Some(dir);
    }
    if let Some(seed) = cli.seed {
        config.random_seed = Some(seed);
    }
    if let Some(max_turns) = cli.max_turns {
        config.max_turns = max_turns;
    }
    if cli.no_delay {
        config.dice_delay_ms = 0;
    }

    let mut store = RuleStore::new();
    match &config.rules_dir {
        Some(dir) => store.load(RulesSource::Dir(dir.clone()))?,
        None => store.load(RulesSource::Embedded)?,
    }
    let rules = Arc::new(store);

    let seats: Vec<Seat> = (0..cli.players.max(1))
        .map(|i| {
            let strategy: Arc<dyn TurnStrategy> = if i == 0 {
                Arc::new(FirstChoiceStrategy)
            } else {
                Arc::new(RandomStrategy::default())
            };
            let name = format!("{}-{}", strategy.name(), i);
            Seat::new(&format!("p{i}"), &name, strategy)
        })
        .collect();

    if cli.games > 1 {
        let base_seed = config.random_seed.unwrap_or(0);
        let batch = run_batch(rules, &seats, &config, cli.games, base_seed);
        println!("{}", batch.summary());
        return Ok(());
    }

    let roster: Vec<(&str, &str)> = seats
        .iter()
        .map(|s| (s.player_id.as_str(), s.display_name.as_str()))
        .collect();
    let max_turns = config.max_turns;
    let mut rng = StdRng::seed_from_u64(config.random_seed.unwrap_or(0) ^ 0x5eed);
    let mut session = GameSession::new(rules, &roster, config)?;
    if cli.json {
        session.subscribe(Box::new(|event: &GameEvent| {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        }));
    }

    session.start()?;
    let mut requests = 0usize;
    while session.coordinator().game_over().is_none() && session.coordinator().turn_number() <= max_turns {
        let player_id = session.coordinator().active_player().player_id.clone();
        let Some(seat) = seats.iter().find(|s| s.player_id == player_id) else {
            break;
        };
        let request = seat.strategy.next_request(session.coordinator(), &player_id, &mut rng);
        match request {
            UiRequest::RollDice { value: None, .. } => session.roll_dice_paced(&player_id).await?,
            other => session.handle(&other)?,
        };
        requests += 1;
        if requests > max_turns as usize * 64 {
            tracing::warn!(requests, "too many requests, stopping");
            break;
        }
    }

    match session.coordinator().game_over() {
        Some(result) => {
            tracing::info!(winner = ?result.winners, turns = result.turns_played, "game finished");
            for (rank, s) in result.standings.iter().enumerate() {
                println!(
                    "{:>2}. {:<12} {:>5} days  ${:>9}  at {}",
                    rank + 1,
                    s.player_id,
                    s.time_spent,
                    s.money,
                    s.position
                );
            }
        }
        None => tracing::info!(turns = session.coordinator().turn_number(), "turn cap reached without a finisher"),
    }
    Ok(())
}
