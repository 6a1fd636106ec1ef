//! Error taxonomy shared by the rule store, resolvers and turn coordinator.

use thiserror::Error;

use crate::engine::models::VisitType;

/// Failures while reading and compiling the CSV rule tables.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("csv error in {table}: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid {column} cell {value:?} in {table}")]
    InvalidCell {
        table: &'static str,
        column: &'static str,
        value: String,
    },
    #[error("space {from} points at {to}, which has no First row")]
    DanglingEdge { from: String, to: String },
    #[error("space table is empty")]
    EmptySpaceTable,
}

/// Failures while reading `engine.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The rule store was queried before its tables were loaded.
    #[error("rule store queried before the rule tables were loaded")]
    NotLoaded,
    #[error("space {space} ({visit_type}) not found in the rule tables")]
    SpaceNotFound { space: String, visit_type: VisitType },
    /// One cell failed to parse. Resolvers log and skip these.
    #[error("malformed effect {cell:?} on {space}")]
    MalformedEffect { space: String, cell: String },
    /// Rejected user action; no state was changed.
    #[error("{0}")]
    InvalidTurnAction(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// User-correctable errors that travel to the UI as a message.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, EngineError::InvalidTurnAction(_))
    }
}
