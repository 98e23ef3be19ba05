//! Splitting the input into newline-aligned work units.
//!
//! Every nominal boundary `b` (other than 0) is moved to one past the first newline at or after
//! `b`. Both neighbours of a boundary align it the same way, so the chunks tile the input exactly
//! and each line lands in exactly one chunk.

use std::sync::atomic::{AtomicUsize, Ordering};

use memchr::memchr;

use crate::error::{BrcError, Result};

/// A half-open byte range `[start, end)` of the input, starting and ending on line boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Returns one past the next newline at or after `offset`, or `offset` itself if it is 0 or the
/// end of input. `window` is the longest legal line; failing to find a newline within it means
/// the input is malformed, unless the search ran off the end of input, in which case `offset`
/// sits in the final line and the input length is returned.
pub fn align_forward(input: &[u8], offset: usize, window: usize) -> Result<usize> {
    if offset == 0 || offset >= input.len() {
        return Ok(offset.min(input.len()));
    }
    let search_end = offset.saturating_add(window).min(input.len());
    match memchr(b'\n', &input[offset..search_end]) {
        Some(newline) => Ok(offset + newline + 1),
        None if search_end == input.len() => Ok(input.len()),
        None => Err(BrcError::NoBoundary { offset, window }),
    }
}

/// Shared cursor handing out fixed-size chunks; workers claim by fetch-and-add.
pub struct ChunkCursor {
    next: AtomicUsize,
    chunk_size: usize,
    window: usize,
}

impl ChunkCursor {
    pub fn new(chunk_size: usize, window: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            chunk_size,
            window,
        }
    }

    /// Claims the next unit. `None` once the cursor has passed the end of input.
    pub fn claim(&self, input: &[u8]) -> Result<Option<Chunk>> {
        let claimed = self.next.fetch_add(self.chunk_size, Ordering::Relaxed);
        if claimed >= input.len() {
            return Ok(None);
        }
        let nominal_end = claimed.saturating_add(self.chunk_size).min(input.len());
        Ok(Some(Chunk {
            start: align_forward(input, claimed, self.window)?,
            end: align_forward(input, nominal_end, self.window)?,
        }))
    }
}

/// Precomputes `parts` nearly equal, newline-aligned spans covering `input`.
pub fn static_spans(input: &[u8], parts: usize, window: usize) -> Result<Vec<Chunk>> {
    let len = input.len();
    let mut boundaries = Vec::with_capacity(parts + 1);
    boundaries.push(0);
    for i in 1..parts {
        let nominal = (len as u128 * i as u128 / parts as u128) as usize;
        boundaries.push(align_forward(input, nominal, window)?);
    }
    boundaries.push(len);
    Ok(boundaries
        .windows(2)
        .map(|w| Chunk {
            start: w[0],
            end: w[1],
        })
        .collect())
}

/// Where a worker gets its chunks from.
pub enum Assignment<'a> {
    /// Claim from the shared cursor until it runs dry.
    Shared(&'a ChunkCursor),
    /// A single precomputed span, taken once.
    Fixed(Option<Chunk>),
}

impl Assignment<'_> {
    pub fn next_chunk(&mut self, input: &[u8]) -> Result<Option<Chunk>> {
        match self {
            Assignment::Shared(cursor) => cursor.claim(input),
            Assignment::Fixed(span) => Ok(span.take()),
        }
    }
}
