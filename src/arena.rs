//! Bump allocation for name bytes.
//!
//! Each worker owns one [NameArena]. Names are copied out of the input once, on first sight, and
//! addressed afterwards by [NameRef] (offset + length) rather than by pointer, so a table and its
//! arena can move between threads together without any borrowed state.

use crate::config::align8;
use crate::error::{BrcError, Result};

/// Location of a stored name inside its arena. A zero length means "no name".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NameRef {
    offset: u32,
    len: u8,
}

impl NameRef {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A fixed-size byte region handed out front to back, never freed piecewise.
pub struct NameArena {
    data: Box<[u8]>,
    used: usize,
}

impl NameArena {
    /// Allocates and zeroes the whole backing region up front.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    /// Copies `name` into the arena at the next 8-byte boundary.
    /// Names are 1..=127 bytes; callers enforce that before getting here.
    pub fn alloc(&mut self, name: &[u8]) -> Result<NameRef> {
        debug_assert!(!name.is_empty() && name.len() <= u8::MAX as usize);
        let size = align8(name.len());
        let exhausted = || BrcError::ArenaExhausted {
            requested: size,
            used: self.used,
            capacity: self.data.len(),
        };
        if self.data.len() - self.used < size {
            return Err(exhausted());
        }
        // offsets past u32::MAX would wrap and alias earlier names
        let offset = u32::try_from(self.used).map_err(|_| exhausted())?;
        let start = self.used;
        self.data[start..start + name.len()].copy_from_slice(name);
        self.used += size;
        Ok(NameRef {
            offset,
            len: name.len() as u8,
        })
    }

    pub fn get(&self, name: NameRef) -> &[u8] {
        let start = name.offset as usize;
        &self.data[start..start + name.len()]
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
