/*
    fluxrecover

    src/cellstring.rs

    The symbolic alphabet produced by clock recovery (C2) and consumed by
    pattern search (C3). A `CellString` is a thin, immutable wrapper over a
    byte buffer restricted to {`|`, `-`, ` `} so that pattern matching can run
    as ordinary byte-slice search rather than `char`-aware string search.
*/

pub const TRANSITION: u8 = b'|';
pub const NO_TRANSITION: u8 = b'-';
pub const UNRECOVERABLE: u8 = b' ';

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellString(Vec<u8>);

impl CellString {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self(Vec::with_capacity(cap))
    }

    pub fn push_token(&mut self, token: &[u8]) {
        self.0.extend_from_slice(token);
    }

    pub fn push_symbol(&mut self, symbol: u8) {
        debug_assert!(matches!(symbol, TRANSITION | NO_TRANSITION | UNRECOVERABLE));
        self.0.push(symbol);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.0[start..end]
    }

    /// True if any symbol in `[start, end)` is the unrecoverable marker.
    pub fn has_gap(&self, start: usize, end: usize) -> bool {
        self.0[start..end].contains(&UNRECOVERABLE)
    }
}

impl From<Vec<u8>> for CellString {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&str> for CellString {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl std::fmt::Display for CellString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}
