/*
    fluxrecover

    src/sector.rs

    One successful decoding of a sector (`ReadSector`), plus the small fixed
    vocabulary of boolean flags a recognizer can attach to it. Value-carrying
    flags (`clock=50`) are not packed into the bitflags set - they are
    stored as plain fields rather than stringly-typed tokens.
*/

use crate::chs::PhysicalChs;
use bitflags::bitflags;

bitflags! {
    /// Boolean flags attached to a [`ReadSector`]. Named after the bare
    /// words the original recognizers pushed onto `extra`/`flags`
    /// (`"deleted"`, `"fm"`, `"mfm"`, `"unused"`).
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SectorFlags: u32 {
        /// Data field was found via the delete-data-mark pattern rather than the normal data mark.
        const DELETED   = 0b0000_0001;
        /// Decoded with FM modulation.
        const FM        = 0b0000_0010;
        /// Decoded with MFM modulation.
        const MFM       = 0b0000_0100;
        /// Decoded with M2FM modulation.
        const M2FM      = 0b0000_1000;
        /// MediaSector is pre-declared as known-empty (Q1 catalog "unused" allocation).
        const UNUSED    = 0b0001_0000;
        /// Address-mark CHS did not match the stream's physical (cylinder, head) hint.
        const WEIRD_AM  = 0b0010_0000;
    }
}

#[derive(Clone, Debug)]
pub struct ReadSector {
    /// Serialization identifier of the originating stream (relative filename).
    pub source: String,
    /// Byte offset of the address mark within the stream's cell string.
    pub rel_pos: usize,
    /// CHS extracted from the address mark (or header) field.
    pub am_chs: PhysicalChs,
    /// Physical CHS: the stream's (cylinder, head) hint combined with the AM sector number.
    pub phys_chs: PhysicalChs,
    pub octets: Vec<u8>,
    pub flags: SectorFlags,
    /// Clock rate used to decode this reading, if the format is rate-parameterized.
    pub clock: Option<u32>,
}

impl ReadSector {
    pub fn new(source: impl Into<String>, rel_pos: usize, am_chs: PhysicalChs, phys_chs: PhysicalChs, octets: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            rel_pos,
            am_chs,
            phys_chs,
            octets,
            flags: SectorFlags::empty(),
            clock: None,
        }
    }

    pub fn with_flags(mut self, flags: SectorFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_clock(mut self, clock: u32) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn len(&self) -> usize {
        self.octets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }
}

/// Two readings are equal iff their payload octets are equal, ignoring CHS.
impl PartialEq for ReadSector {
    fn eq(&self, other: &Self) -> bool {
        self.octets == other.octets
    }
}
impl Eq for ReadSector {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_chs() {
        let a = ReadSector::new("a.raw", 10, PhysicalChs::new(0, 0, 1), PhysicalChs::new(0, 0, 1), vec![1, 2, 3]);
        let b = ReadSector::new("b.raw", 99, PhysicalChs::new(5, 1, 9), PhysicalChs::new(5, 1, 9), vec![1, 2, 3]);
        assert_eq!(a.octets, b.octets);
    }

    #[test]
    fn test_flag_builder() {
        let rs = ReadSector::new("a.raw", 0, PhysicalChs::default(), PhysicalChs::default(), vec![0])
            .with_flags(SectorFlags::FM | SectorFlags::DELETED)
            .with_clock(50);
        assert!(rs.flags.contains(SectorFlags::DELETED));
        assert!(rs.flags.contains(SectorFlags::FM));
        assert_eq!(rs.clock, Some(50));
    }
}
