//! Error types for combat simulation and block search

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CombatError {
    /// A block declaration violates a blocking rule. The evaluator turns this
    /// into a sentinel score; everywhere else it aborts the simulation.
    #[error("Illegal block: {0}")]
    IllegalBlock(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Maximum combat simulation iterations exceeded (limit {limit})")]
    IterationLimitExceeded { limit: u64 },

    /// A provoke or mentor mapping refers to a creature that is not in the
    /// rosters, or a mentor target that is not weaker than its mentor.
    #[error("Unknown mapping: {0}")]
    UnknownMapping(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CombatError {
    pub fn is_illegal_block(&self) -> bool {
        matches!(self, CombatError::IllegalBlock(_))
    }
}

pub type Result<T> = std::result::Result<T, CombatError>;
