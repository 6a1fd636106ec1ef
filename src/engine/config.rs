//! Engine configuration, loaded from TOML at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting space name. Defaults to the first row of the space table.
    pub starting_space: Option<String>,
    pub starting_money: i64,
    pub starting_time: u32,
    /// Pause before a paced dice roll resolves.
    pub dice_delay_ms: u64,
    /// Days charged by a negotiation when the space declares no time cost.
    pub default_negotiation_penalty: u32,
    pub random_seed: Option<u64>,
    /// Directory holding the four rule CSV files. `None` uses the embedded set.
    pub rules_dir: Option<PathBuf>,
    pub max_turns: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_space: None,
            starting_money: 0,
            starting_time: 0,
            dice_delay_ms: 1200,
            default_negotiation_penalty: 1,
            random_seed: None,
            rules_dir: None,
            max_turns: 500,
        }
    }
}

/// Load a config from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Try well-known paths, returning the built-in defaults if none is found.
pub fn load_default_config() -> EngineConfig {
    let candidates = [
        "engine.toml",
        "../engine.toml",
        "/etc/construction-game/engine.toml",
    ];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_config(p) {
                Ok(config) => {
                    tracing::info!(path = %p.display(), "loaded engine config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load engine config");
                }
            }
        }
    }
    tracing::info!("no engine.toml found, using built-in defaults");
    EngineConfig::default()
}
