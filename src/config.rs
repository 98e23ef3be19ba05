//! Run configuration: worker count, table and arena sizing, chunking mode.

use crate::error::{BrcError, Result};

/// Longest name the engine can ever store; slot lengths fit in a `u8` with room to spare.
pub const MAX_NAME_LEN: usize = 127;

/// Default work unit claimed by a worker in dynamic mode.
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Longest possible value text: `-dd.d`.
pub const MAX_VALUE_LEN: usize = 5;

/// Largest arena a [NameRef](crate::arena::NameRef) can address with its 32-bit offset.
pub const MAX_ARENA_BYTES: u64 = 1 << 32;

/// How the input is partitioned across workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    /// Workers claim `chunk_size` units from a shared atomic cursor.
    Dynamic,
    /// One precomputed, newline-aligned span per worker.
    Static,
}

/// Sizing and scheduling knobs for one run. All capacities are fixed for the run's lifetime.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Number of worker threads, each owning one table and one arena.
    pub workers: usize,
    /// Each table has `1 << table_exp` slots.
    pub table_exp: u32,
    /// Distinct names a single table accepts before failing.
    pub max_names: usize,
    /// Bytes claimed per fetch-and-add in dynamic mode.
    pub chunk_size: usize,
    /// Longest name accepted by the parser.
    pub name_cap: usize,
    /// Bytes of name storage per worker.
    pub arena_bytes: usize,
    pub split: Split,
}

impl EngineConfig {
    /// The table exponent has no default: it bounds the distinct-name cardinality of the input
    /// and must be chosen by the caller.
    pub fn new(workers: usize, table_exp: u32) -> Self {
        let max_names = if (1..=30).contains(&table_exp) {
            1usize << (table_exp - 1)
        } else {
            0
        };
        Self {
            workers,
            table_exp,
            max_names,
            chunk_size: DEFAULT_CHUNK_SIZE,
            name_cap: MAX_NAME_LEN,
            arena_bytes: default_arena_bytes(max_names, MAX_NAME_LEN),
            split: Split::Dynamic,
        }
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Also resizes the arena so every admitted name fits.
    pub fn with_max_names(mut self, max_names: usize) -> Self {
        self.max_names = max_names;
        self.arena_bytes = default_arena_bytes(max_names, self.name_cap);
        self
    }

    /// Also resizes the arena so every admitted name fits.
    pub fn with_name_cap(mut self, name_cap: usize) -> Self {
        self.name_cap = name_cap;
        self.arena_bytes = default_arena_bytes(self.max_names, name_cap);
        self
    }

    pub fn with_arena_bytes(mut self, arena_bytes: usize) -> Self {
        self.arena_bytes = arena_bytes;
        self
    }

    pub fn capacity(&self) -> usize {
        1 << self.table_exp
    }

    /// Longest line the parser can accept, terminating newline included.
    pub fn max_line_len(&self) -> usize {
        self.name_cap + 1 + MAX_VALUE_LEN + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(BrcError::Config("worker count must be at least 1".into()));
        }
        if !(1..=30).contains(&self.table_exp) {
            return Err(BrcError::Config(format!(
                "table exponent {} outside 1..=30",
                self.table_exp
            )));
        }
        if self.max_names == 0 || self.max_names > self.capacity() / 2 {
            return Err(BrcError::Config(format!(
                "max names {} must be in 1..={} (half of {} slots)",
                self.max_names,
                self.capacity() / 2,
                self.capacity()
            )));
        }
        if self.chunk_size == 0 {
            return Err(BrcError::Config("chunk size must be non-zero".into()));
        }
        // the shared cursor ends at most one chunk per worker past the input, which itself is
        // at most isize::MAX bytes; keep that sum from wrapping back into the input
        let max_chunk = isize::MAX as usize / self.workers.saturating_add(1);
        if self.chunk_size > max_chunk {
            return Err(BrcError::Config(format!(
                "chunk size {} above {max_chunk} for {} workers",
                self.chunk_size, self.workers
            )));
        }
        if !(1..=MAX_NAME_LEN).contains(&self.name_cap) {
            return Err(BrcError::Config(format!(
                "name cap {} outside 1..={MAX_NAME_LEN}",
                self.name_cap
            )));
        }
        if self.arena_bytes < align8(self.name_cap) {
            return Err(BrcError::Config(format!(
                "arena of {} bytes cannot hold one {}-byte name",
                self.arena_bytes, self.name_cap
            )));
        }
        if self.arena_bytes as u64 > MAX_ARENA_BYTES {
            return Err(BrcError::Config(format!(
                "arena of {} bytes above the addressable {MAX_ARENA_BYTES}",
                self.arena_bytes
            )));
        }
        Ok(())
    }
}

/// Room for `max_names` names of `name_cap` bytes, capped at what the arena can address.
fn default_arena_bytes(max_names: usize, name_cap: usize) -> usize {
    let bytes = (max_names as u64)
        .saturating_mul(align8(name_cap) as u64)
        .min(MAX_ARENA_BYTES);
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

/// Rounds `n` up to the next multiple of 8.
pub(crate) fn align8(n: usize) -> usize {
    (n + 7) & !7
}
