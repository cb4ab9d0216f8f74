/*
    fluxrecover

    src/format/q1_microlite.rs

    Q1 Corporation MicroLite 8" floppies. The oddest format in the
    catalog: sector length is not fixed per format, it is learned per
    cylinder from a 40-byte catalog record decoded from track 0, and tracks
    whose length is not yet known are decoded speculatively - at a guessed
    length, taken from the most common position of the literal trailer byte
    `0x10` across that track's candidate sectors - until the real length
    arrives from a catalog record.

    `Q1MicroLiteFm` runs at FM clock 50; `Q1MicroLiteMfm` runs at MFM with
    an atypical per-unit clock (28 or 39, rather than the usual 50/80/100) -
    the original's `ClockRecoveryMFM(dt)` subclass, folded here into
    `ClockSpec::mfm` by simply passing the non-standard rate through.
*/

use crate::cellstring::CellString;
use crate::chs::PhysicalChs;
use crate::clock::{flux_data_fm, flux_data_mfm, Modulation};
use crate::media::Media;
use crate::pattern::{find_pattern, iter_patterns, make_mark, make_mark_fm};
use crate::sector::ReadSector;
use crate::stream::Stream;
use std::cell::RefCell;
use std::collections::HashMap;

use super::FormatRecognizer;

const GAPLEN_FM: usize = 100 * 32;
const GAPLEN_MFM: usize = 10 * 16;
const CATALOG_SECTOR_LENGTH: usize = 40;
const GUESS_MAX_BYTES: usize = 600;

/// Per-recognizer catalog state, shared across streams of the same medium:
/// once a track-0 catalog record declares a cylinder range's record length,
/// later reads of those cylinders use it instead of guessing. Grounded on
/// `Q1MicroLiteCommon.catalog_entries`/`cyl_contains`, which likewise
/// persist for the life of the enclosing `Media` object.
#[derive(Default)]
struct Catalog {
    lengths: HashMap<u16, usize>,
}

impl Catalog {
    /// Unpack a 40-byte catalog record: `<H8sHHHHH` (status, name[8], count,
    /// length, nsect, first, last), little-endian, and register `length`
    /// for every cylinder in `first..=last`.
    fn register(&mut self, data: &[u8]) {
        if data.len() < CATALOG_SECTOR_LENGTH {
            return;
        }
        let status = u16::from_le_bytes([data[0], data[1]]);
        if status != 0 {
            return;
        }
        let length = u16::from_le_bytes([data[12], data[13]]) as usize;
        let first = u16::from_le_bytes([data[16], data[17]]);
        let last = u16::from_le_bytes([data[18], data[19]]);
        if last >= 80 || last < first {
            return;
        }
        for cyl in first..=last {
            self.lengths.insert(cyl, length);
        }
    }

    fn length_for(&self, cylinder: u16) -> Option<usize> {
        if cylinder == 0 {
            Some(CATALOG_SECTOR_LENGTH)
        }
        else {
            self.lengths.get(&cylinder).copied()
        }
    }
}

/// One matched (address field, data field start) pair, plus the symbol
/// offset of the *next* address-mark match (or the end of the cell string)
/// so the data field's available window can be bounded the way the
/// original bounds `parts[1]` by the next `AM_PATTERN` split.
struct Candidate {
    am_chs_pos: usize,
    data_pos: usize,
    data_limit: usize,
}

/// Mirrors `split_stream` + the implicit `str.split` windowing: walk every
/// address-mark match, require a data-mark match within `gaplen` symbols,
/// and bound the data field by the next address-mark match.
fn candidates(cs: &CellString, am_pattern: &[u8], data_pattern: &[u8], gaplen: usize) -> Vec<Candidate> {
    let am_starts: Vec<usize> = iter_patterns(cs, am_pattern).collect();
    let mut out = Vec::new();
    for (i, &am_start) in am_starts.iter().enumerate() {
        let am_end = am_start + am_pattern.len();
        let next_am = am_starts.get(i + 1).copied().unwrap_or(cs.len());
        let Some(data_match) = find_pattern(cs, data_pattern, am_end, Some(next_am)) else { continue };
        if data_match - am_end > gaplen {
            continue;
        }
        out.push(Candidate { am_chs_pos: am_end, data_pos: data_match + data_pattern.len(), data_limit: next_am });
    }
    out
}

fn good_checksum_sum_to_zero(data: &[u8], sector_length: usize) -> bool {
    data.len() > sector_length && data[..sector_length + 1].iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == 0
}

fn good_checksum_with_mark(data: &[u8], sector_length: usize, mark: u8) -> bool {
    data.len() > sector_length
        && data[..sector_length].iter().fold(mark, |acc, &b| acc.wrapping_add(b)) == data[sector_length]
}

/// The most common position of the literal trailer byte `0x10` across a
/// track's candidate decodes, minus one: the fallback guess used for a
/// cylinder with no registered sector length yet.
fn guess_sector_length(decoded: &[Vec<u8>]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for data in decoded {
        if let Some(pos) = data.iter().rposition(|&b| b == 0x10) {
            if pos > 0 {
                *counts.entry(pos).or_default() += 1;
            }
        }
    }
    counts.into_iter().max_by_key(|&(_, n)| n).map(|(pos, _)| pos - 1)
}

enum Decoder {
    Fm,
    Mfm,
}

impl Decoder {
    fn stride(&self) -> usize {
        match self {
            Decoder::Fm => 32,
            Decoder::Mfm => 16,
        }
    }
    fn decode(&self, flux: &[u8]) -> Option<Vec<u8>> {
        match self {
            Decoder::Fm => flux_data_fm(flux),
            Decoder::Mfm => flux_data_mfm(flux),
        }
    }
}

/// Shared processing loop for both modulations: decode the address field at
/// each candidate, look up or guess the cylinder's sector length, decode and
/// checksum the data field, and feed the catalog back from track 0.
fn process_candidates(
    stream: &Stream,
    media: &mut Media,
    catalog: &RefCell<Catalog>,
    cs: &CellString,
    candidates: Vec<Candidate>,
    decoder: &Decoder,
    am_chs: impl Fn(&[u8]) -> Option<(u16, u8)>,
    checksum: impl Fn(&[u8], usize) -> bool,
) -> bool {
    let cell = cs.as_bytes();
    let stride = decoder.stride();
    let mut any = false;
    let mut later: Vec<(Candidate, u16, u8)> = Vec::new();

    for candidate in candidates {
        let am_window_end = (candidate.am_chs_pos + 6 * stride).min(cell.len());
        let Some(am_data) = decoder.decode(&cell[candidate.am_chs_pos..am_window_end]) else { continue };
        let Some((cylinder, sector)) = am_chs(&am_data) else { continue };

        let known_length = catalog.borrow().length_for(cylinder);
        match known_length {
            Some(length) => {
                let window_end = (candidate.data_pos + (length + 2) * stride).min(cell.len());
                let Some(data) = decoder.decode(&cell[candidate.data_pos..window_end]) else { continue };
                if !checksum(&data, length) {
                    continue;
                }
                let phys_chs = stream.hint.with_sector(sector);
                let am_chs_val = PhysicalChs::new(cylinder, 0, sector);
                let reading = ReadSector::new(stream.filename.clone(), candidate.am_chs_pos, am_chs_val, phys_chs, data[..length].to_vec());
                media.add_reading(reading);
                any = true;
                if cylinder == 0 {
                    catalog.borrow_mut().register(&data[..length]);
                }
            }
            None => later.push((candidate, cylinder, sector)),
        }
    }

    if !later.is_empty() {
        let decoded: Vec<Vec<u8>> = later
            .iter()
            .filter_map(|(c, ..)| {
                let window_end = c.data_pos.saturating_add(GUESS_MAX_BYTES * stride).min(c.data_limit).min(cell.len());
                decoder.decode(&cell[c.data_pos..window_end])
            })
            .collect();
        if let Some(guessed_length) = guess_sector_length(&decoded) {
            for (candidate, cylinder, sector) in later {
                let window_end = (candidate.data_pos + (guessed_length + 2) * stride).min(cell.len());
                let Some(data) = decoder.decode(&cell[candidate.data_pos..window_end]) else { continue };
                if data.len() <= guessed_length || !checksum(&data, guessed_length) {
                    continue;
                }
                let phys_chs = stream.hint.with_sector(sector);
                let am_chs_val = PhysicalChs::new(cylinder, 0, sector);
                let reading = ReadSector::new(stream.filename.clone(), candidate.am_chs_pos, am_chs_val, phys_chs, data[..guessed_length].to_vec());
                media.add_reading(reading);
                any = true;
            }
        }
    }

    any
}

fn fm_am_chs(am_data: &[u8]) -> Option<(u16, u8)> {
    if am_data.len() < 6 || am_data[0] != 0x00 || am_data[1] != 0x00 || am_data[5] != 0x10 {
        return None;
    }
    if am_data[..5].iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) != 0 {
        return None;
    }
    Some((am_data[2] as u16, am_data[3]))
}

fn mfm_am_chs(am_data: &[u8]) -> Option<(u16, u8)> {
    if am_data.len() < 4 || am_data[3] != 0x10 {
        return None;
    }
    if am_data[0].wrapping_add(am_data[1]) != am_data[2] {
        return None;
    }
    Some((am_data[0] as u16, am_data[1]))
}

/// Q1 MicroLite FM-modulated floppies (clock 50).
#[derive(Clone, Default)]
pub struct Q1MicroLiteFm {
    catalog: std::rc::Rc<RefCell<Catalog>>,
}

impl Q1MicroLiteFm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FormatRecognizer for Q1MicroLiteFm {
    fn name(&self) -> &'static str {
        "Q1 MicroLite FM"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["Q1"]
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        if stream.hint.head != 0 {
            return false;
        }
        let cs = stream.cell_string(Modulation::Fm, 50.0);
        let mut am_pattern = b"|---".repeat(16);
        am_pattern.extend_from_slice(make_mark_fm(0xc7, 0xfe).as_bytes());
        let mut data_pattern = b"|---".repeat(16);
        data_pattern.extend_from_slice(make_mark_fm(0xc7, 0xfb).as_bytes());

        let candidates = candidates(&cs, &am_pattern, &data_pattern, GAPLEN_FM);
        process_candidates(stream, media, &self.catalog, &cs, candidates, &Decoder::Fm, fm_am_chs, good_checksum_sum_to_zero)
    }
}

/// Q1 MicroLite MFM-modulated floppies at a non-standard half-cell clock
/// (28 or 39 ticks, rather than the usual 50/80/100).
#[derive(Clone)]
pub struct Q1MicroLiteMfm {
    clock: f64,
    catalog: std::rc::Rc<RefCell<Catalog>>,
}

impl Q1MicroLiteMfm {
    pub fn new(clock: u32) -> Self {
        Self { clock: clock as f64, catalog: Default::default() }
    }
}

impl FormatRecognizer for Q1MicroLiteMfm {
    fn name(&self) -> &'static str {
        "Q1 MicroLite MFM"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["Q1"]
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        if stream.hint.head != 0 {
            return false;
        }
        let cs = stream.cell_string(Modulation::Mfm, self.clock);
        let mut sync = b"|-".repeat(8);
        sync.extend_from_slice(b"---|-");
        let mut am_pattern = sync.clone();
        am_pattern.extend_from_slice(make_mark(0x20, 0x9e, "").as_bytes());
        let mut data_pattern = sync;
        data_pattern.extend_from_slice(make_mark(0x20, 0x9b, "").as_bytes());

        let candidates = candidates(&cs, &am_pattern, &data_pattern, GAPLEN_MFM);
        process_candidates(stream, media, &self.catalog, &cs, candidates, &Decoder::Mfm, mfm_am_chs, |data, len| {
            good_checksum_with_mark(data, len, 0x9b)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::symbols_to_intervals;

    #[test]
    fn test_catalog_register_and_lookup() {
        let mut catalog = Catalog::default();
        let mut record = vec![0u8; CATALOG_SECTOR_LENGTH];
        record[12..14].copy_from_slice(&64u16.to_le_bytes()); // length
        record[16..18].copy_from_slice(&3u16.to_le_bytes()); // first
        record[18..20].copy_from_slice(&4u16.to_le_bytes()); // last
        catalog.register(&record);
        assert_eq!(catalog.length_for(3), Some(64));
        assert_eq!(catalog.length_for(4), Some(64));
        assert_eq!(catalog.length_for(5), None);
        assert_eq!(catalog.length_for(0), Some(CATALOG_SECTOR_LENGTH));
    }

    #[test]
    fn test_fm_am_chs_requires_trailer_and_checksum() {
        let good = [0x00, 0x00, 5u8, 9u8, (256 - 14) as u8, 0x10];
        assert_eq!(fm_am_chs(&good), Some((5, 9)));
        let mut bad = good;
        bad[5] = 0x11;
        assert_eq!(fm_am_chs(&bad), None);
    }

    #[test]
    fn test_guess_sector_length_picks_mode_minus_one() {
        let decoded = vec![
            vec![0u8, 1, 2, 0x10, 9, 9],
            vec![0u8, 1, 2, 0x10, 8, 8],
            vec![0u8, 1, 0x10, 7, 7, 7],
        ];
        assert_eq!(guess_sector_length(&decoded), Some(2));
    }

    #[test]
    fn test_q1_fm_catalog_driven_roundtrip() {
        // Track 0 sector 0: a catalog record declaring cylinders 3..=3 at
        // length 8, followed by a read of cylinder 3 sector 1 at that length.
        let mut cell: Vec<u8> = Vec::new();

        let push_am = |cell: &mut Vec<u8>, cyl: u8, sec: u8| {
            cell.extend_from_slice(&b"|---".repeat(16));
            cell.extend_from_slice(make_mark_fm(0xc7, 0xfe).as_bytes());
            let csum = (0x00u8).wrapping_add(0x00).wrapping_add(cyl).wrapping_add(sec);
            let body = [0x00u8, 0x00, cyl, sec, 0u8.wrapping_sub(csum), 0x10];
            for &b in &body {
                cell.extend_from_slice(make_mark_fm(0xc7, b).as_bytes());
            }
        };
        let push_data = |cell: &mut Vec<u8>, payload: &[u8]| {
            cell.extend_from_slice(&b"|---".repeat(16));
            cell.extend_from_slice(make_mark_fm(0xc7, 0xfb).as_bytes());
            let csum = payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
            for &b in payload {
                cell.extend_from_slice(make_mark_fm(0xc7, b).as_bytes());
            }
            cell.extend_from_slice(make_mark_fm(0xc7, 0u8.wrapping_sub(csum)).as_bytes());
        };

        // Catalog record: status=0, name="FILE    ", count=1, length=8, nsect=1, first=3, last=3.
        let mut record = vec![0u8; CATALOG_SECTOR_LENGTH];
        record[2..10].copy_from_slice(b"FILE    ");
        record[10..12].copy_from_slice(&1u16.to_le_bytes());
        record[12..14].copy_from_slice(&8u16.to_le_bytes());
        record[14..16].copy_from_slice(&1u16.to_le_bytes());
        record[16..18].copy_from_slice(&3u16.to_le_bytes());
        record[18..20].copy_from_slice(&3u16.to_le_bytes());

        push_am(&mut cell, 0, 0);
        push_data(&mut cell, &record);

        push_am(&mut cell, 3, 1);
        push_data(&mut cell, &[0xAAu8; 8]);

        let intervals = symbols_to_intervals(&cell, 50.0);
        let stream = Stream::synthetic(0, 0, intervals);
        let mut media = Media::new();
        let recognizer = Q1MicroLiteFm::new();
        assert!(recognizer.process(&stream, &mut media));

        let chs = PhysicalChs::new(3, 0, 1);
        assert_eq!(media.majority(chs), Some(&[0xAAu8; 8][..]));
    }
}
