//! Error types for the aggregation engine.
//!
//! Every variant is fatal: a run either produces a complete report or none at all.

use thiserror::Error;

/// Errors that abort an aggregation run.
#[derive(Debug, Error)]
pub enum BrcError {
    /// A line ran into a newline or the end of input before its `;`.
    #[error("malformed line near byte {offset}: missing `;` after name")]
    MissingSemicolon { offset: usize },

    /// A line started with `;`.
    #[error("malformed line near byte {offset}: empty name")]
    EmptyName { offset: usize },

    /// A name longer than the configured cap.
    #[error("malformed line near byte {offset}: name is {len} bytes, cap is {cap}")]
    NameTooLong { offset: usize, len: usize, cap: usize },

    /// The value after `;` does not match `-?d{1,2}.d`.
    #[error("malformed line near byte {offset}: invalid value")]
    BadValue { offset: usize },

    /// The value was not followed by `\n`.
    #[error("malformed line near byte {offset}: missing terminating newline")]
    MissingNewline { offset: usize },

    /// No newline inside the lookahead window when aligning a chunk boundary.
    #[error("no newline within {window} bytes of offset {offset}")]
    NoBoundary { offset: usize, window: usize },

    /// More distinct names than the table was configured for.
    #[error("aggregate table full: more than {max_names} distinct names (capacity {capacity}); raise the table exponent")]
    TableFull { max_names: usize, capacity: usize },

    /// The per-worker name arena ran out of room.
    #[error("name arena exhausted: {requested} more bytes needed, {used}/{capacity} used; raise the arena size")]
    ArenaExhausted { requested: usize, used: usize, capacity: usize },

    /// Rejected engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker thread could not be started.
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked before finishing.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// Writing the report failed.
    #[error("failed to write report: {0}")]
    Output(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, BrcError>;
