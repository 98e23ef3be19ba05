//! Grouped aggregation over `name;value` lines.
//!
//! The input is one read-only buffer. Workers claim newline-aligned chunks of it, parse each line
//! into a name and a fixed-point value in tenths, and fold the value into a private
//! open-addressing table whose names live in a private bump arena. After every worker has joined,
//! the tables are reduced into one with the same upsert used while parsing, and the result is
//! sorted by name and rendered as `{name=min/mean/max, ...}`.

pub mod arena;
pub mod config;
pub mod dispense;
pub mod engine;
pub mod error;
pub mod gen;
pub mod parse;
pub mod report;
pub mod table;

pub use config::{EngineConfig, Split};
pub use engine::{aggregate, process};
pub use error::{BrcError, Result};
pub use table::{Aggregate, AggregateTable};
