//! Line grammar: `name;value\n` where `name` is `[^;\n]+` and `value` is `-?d{1,2}.d`.
//!
//! Values are returned in tenths. Two value parsers exist: a packed one that reads eight bytes as a
//! little-endian word and resolves sign, decimal point and digits with masks and one multiply, and
//! a byte-at-a-time one used near the end of the buffer. Whenever the packed parser declines a
//! word, the scalar parser runs on the same bytes, so both accept exactly the same language and
//! every error comes from one place.

use crate::error::{BrcError, Result};

/// Nonzero starting point for [hash_name], so no name hashes to zero.
pub const HASH_SEED: u64 = 3141592653;

/// One rolling step of the name hash.
#[inline(always)]
pub fn hash_step(hash: u64, byte: u8) -> u64 {
    hash.wrapping_mul(111).wrapping_add(byte as u64)
}

/// Hash of a whole name, identical to the one accumulated while scanning a line.
pub fn hash_name(name: &[u8]) -> u64 {
    name.iter().fold(HASH_SEED, |h, b| hash_step(h, *b))
}

/// Result of parsing a well-formed line
#[derive(Debug)]
pub struct ParsedRow<'a> {
    pub name: &'a [u8],
    pub hash: u64,
    /// Tenths, e.g. `-1.2` is `-12`.
    pub measurement: i16,
    /// Offset of the first byte after the line's newline.
    pub next: usize,
}

/// Parses the line starting at `pos`. `pos` must be the start of a line.
/// Errors carry `pos` as the offset of the malformed line.
#[inline]
pub fn parse_line(input: &[u8], pos: usize, name_cap: usize) -> Result<ParsedRow<'_>> {
    let mut hash = HASH_SEED;
    let mut i = pos;
    loop {
        match input.get(i) {
            Some(b';') => break,
            Some(b'\n') | None => return Err(BrcError::MissingSemicolon { offset: pos }),
            Some(&b) => {
                hash = hash_step(hash, b);
                i += 1;
            }
        }
    }
    let len = i - pos;
    if len == 0 {
        return Err(BrcError::EmptyName { offset: pos });
    }
    if len > name_cap {
        return Err(BrcError::NameTooLong {
            offset: pos,
            len,
            cap: name_cap,
        });
    }

    let (measurement, consumed) = parse_value(&input[i + 1..], pos)?;
    Ok(ParsedRow {
        name: &input[pos..i],
        hash,
        measurement,
        next: i + 1 + consumed,
    })
}

/// Parses a value plus its newline from the front of `rest`.
/// Returns the value in tenths and the number of bytes consumed, newline included.
#[inline]
pub fn parse_value(rest: &[u8], line_offset: usize) -> Result<(i16, usize)> {
    if let Some(word) = rest.first_chunk::<8>() {
        if let Some(parsed) = parse_value_word(u64::from_le_bytes(*word)) {
            return Ok(parsed);
        }
    }
    parse_value_scalar(rest, line_offset)
}

/// Digit-by-digit parser; the reference for what the grammar accepts.
pub fn parse_value_scalar(rest: &[u8], line_offset: usize) -> Result<(i16, usize)> {
    let bad = || BrcError::BadValue {
        offset: line_offset,
    };
    let negative = rest.first() == Some(&b'-');
    let mut i = negative as usize;

    let mut value: i16 = 0;
    while let Some(d) = rest.get(i).filter(|b| b.is_ascii_digit()) {
        if i - negative as usize == 2 {
            // a third integer digit
            return Err(bad());
        }
        value = value * 10 + (d - b'0') as i16;
        i += 1;
    }
    if i == negative as usize || rest.get(i) != Some(&b'.') {
        return Err(bad());
    }
    i += 1;
    match rest.get(i) {
        Some(d) if d.is_ascii_digit() => value = value * 10 + (d - b'0') as i16,
        _ => return Err(bad()),
    }
    i += 1;
    if rest.get(i) != Some(&b'\n') {
        return Err(BrcError::MissingNewline {
            offset: line_offset,
        });
    }
    Ok((if negative { -value } else { value }, i + 1))
}

/// Packed parse of the eight bytes starting at the value. `None` means "not a well-formed value
/// followed by a newline"; the caller then defers to [parse_value_scalar].
#[inline]
pub fn parse_value_word(word: u64) -> Option<(i16, usize)> {
    // digits have bit 4 set, '-' and '.' do not
    let negative = word & 0x10 == 0;
    if negative && word & 0xff != b'-' as u64 {
        return None;
    }
    // bit index (12, 20 or 28) of the first byte among 1..=3 without bit 4: the decimal point
    let dot = (!word & 0x1010_1000).trailing_zeros();
    if dot == 64 {
        return None;
    }
    let dot_byte = dot / 8;
    let int_digits = dot_byte - negative as u32;
    if !(1..=2).contains(&int_digits) {
        return None;
    }
    if (word >> (8 * (dot_byte + 2))) & 0xff != b'\n' as u64 {
        return None;
    }

    // drop the sign, then shift so the point sits in byte 3: [_, tens, ones, '.', tenths]
    let unsigned = if negative { word & !0xff } else { word };
    let aligned = unsigned << (28 - dot);
    let byte = |i: u32| (aligned >> (8 * i)) & 0xff;
    let is_digit = |b: u64| b.wrapping_sub(b'0' as u64) < 10;
    if byte(3) != b'.' as u64
        || !is_digit(byte(2))
        || !is_digit(byte(4))
        || (int_digits == 2 && !is_digit(byte(1)))
    {
        return None;
    }

    // 100 * tens + 10 * ones + tenths all land in bits 32..42
    let digits = aligned & 0x0F_000F_0F00;
    let abs = ((digits.wrapping_mul(0x640a_0001) >> 32) & 0x3ff) as i16;
    Some((if negative { -abs } else { abs }, dot_byte as usize + 3))
}
