/*
    fluxrecover

    src/pattern.rs

    Sync-mark construction and substring search over cell strings (C3). Marks
    are built by interleaving clock and data bits MSB-first; patterns stay
    short (a handful of bytes) so naive byte-slice search is adequate even
    though the haystack (a whole track's cell string) can run past a million
    symbols.
*/

use crate::cellstring::CellString;

/// Interleave a clock byte and a data byte into an MFM-style 16-symbol mark.
/// `pad` is inserted after every emitted symbol; FM marks use `pad = "-"`,
/// which doubles the mark to 32 symbols.
pub fn make_mark(clock: u8, data: u8, pad: &str) -> CellString {
    let mut out = Vec::with_capacity(16 + 16 * pad.len());
    for bit in 0..8 {
        let clock_bit = (clock >> (7 - bit)) & 1;
        let data_bit = (data >> (7 - bit)) & 1;
        push_bit(&mut out, clock_bit, pad);
        push_bit(&mut out, data_bit, pad);
    }
    CellString::from(out)
}

/// FM variant of [`make_mark`]: every emitted symbol is followed by a `-`,
/// matching the original firmware's doubled-rate FM cell encoding.
pub fn make_mark_fm(clock: u8, data: u8) -> CellString {
    make_mark(clock, data, "-")
}

fn push_bit(out: &mut Vec<u8>, bit: u8, pad: &str) {
    out.push(if bit == 1 { b'|' } else { b'-' });
    out.extend_from_slice(pad.as_bytes());
}

/// Concatenate the marks for a multi-byte (clock, data) sync sequence, e.g.
/// the IBM MFM address mark `A1 A1 A1 FE` with clock `0A 0A 0A 00`.
pub fn make_mark_seq(pairs: &[(u8, u8)], pad: &str) -> CellString {
    let mut joined = Vec::new();
    for &(clock, data) in pairs {
        joined.extend_from_slice(make_mark(clock, data, pad).as_bytes());
    }
    CellString::from(joined)
}

/// A run of `length` FM-encoded zero bytes, used as the pre-sync gap in
/// several formats (Wang WCS, DG Nova, Zilog MCZ): each zero byte is eight
/// `|---` cells, MSB-first, with a settling `|-|-` tail.
pub fn fm_gap(length: usize) -> CellString {
    let mut out = Vec::with_capacity(length * 4 + 4);
    for _ in 0..length {
        out.extend_from_slice(b"|---");
    }
    out.extend_from_slice(b"|-|-");
    CellString::from(out)
}

/// Find the first occurrence of `pattern` in `cs` at or after `start`,
/// optionally bounded by `end` (exclusive).
pub fn find_pattern(cs: &CellString, pattern: &[u8], start: usize, end: Option<usize>) -> Option<usize> {
    let hay = cs.as_bytes();
    let limit = end.unwrap_or(hay.len()).min(hay.len());
    if start >= limit || pattern.is_empty() || pattern.len() > limit - start {
        return None;
    }
    hay[start..limit]
        .windows(pattern.len())
        .position(|w| w == pattern)
        .map(|p| p + start)
}

/// Non-overlapping, left-to-right occurrences of `pattern` in `cs`.
pub fn iter_patterns<'a>(cs: &'a CellString, pattern: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        let found = find_pattern(cs, pattern, pos, None)?;
        pos = found + pattern.len();
        Some(found)
    })
}
