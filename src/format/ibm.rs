/*
    fluxrecover

    src/format/ibm.rs

    IBM 3740-style FM and System/34 MFM sector formats. Each track type
    scans its own sync/address-mark pattern, validates the address-mark
    CRC, then searches a bounded gap-2 window for the data or deleted-data
    mark. `Ibm` itself holds no state of its own beyond a rotating
    `(track type, clock)` worklist.
*/

use crate::clock::Modulation;
use crate::crc::crc_ccitt_false;
use crate::media::Media;
use crate::pattern::{iter_patterns, make_mark_fm, make_mark_seq};
use crate::sector::{ReadSector, SectorFlags};
use crate::stream::Stream;

use super::FormatRecognizer;

const CLOCKS: [u32; 3] = [50, 80, 100];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrackKind {
    Fm,
    Mfm,
}

fn fm_sync(length: usize) -> Vec<u8> {
    b"|---".repeat(length)
}

fn mfm_sync(length: usize) -> Vec<u8> {
    b"|-".repeat(length)
}

fn process_fm(stream: &Stream, media: &mut Media, clock: u32) -> bool {
    let cs = stream.cell_string(Modulation::Fm, clock as f64);
    let cell = cs.as_bytes();

    let mut sync = fm_sync(4);
    sync.extend_from_slice(make_mark_fm(0xc7, 0xfe).as_bytes());
    let mut data_pattern = fm_sync(4);
    data_pattern.extend_from_slice(make_mark_fm(0xc7, 0xfb).as_bytes());
    let mut delete_pattern = fm_sync(4);
    delete_pattern.extend_from_slice(make_mark_fm(0xc7, 0xf8).as_bytes());

    const MAX_GAP2: usize = 100;
    let mut any = false;

    for match_start in iter_patterns(&cs, &sync) {
        // `am_pos` below matches the original's post-match position: the
        // offset right after the sync+mark pattern, i.e. the start of the
        // CHS field, not the start of the sync run.
        let am_pos = match_start + sync.len();
        if am_pos < 32 {
            continue;
        }
        let Some(window_end) = am_pos.checked_add(6 * 32).filter(|&e| e <= cell.len()) else { continue };
        let address_mark = match crate::clock::flux_data_fm(&cell[am_pos - 32..window_end]) {
            Some(d) if d.len() >= 7 => d,
            _ => continue,
        };
        if crc_ccitt_false(&address_mark) != 0 {
            continue;
        }
        let chs = (address_mark[1] as u16, address_mark[2], address_mark[3]);
        let sector_size = 128usize << address_mark[4];

        let search_end = (am_pos + MAX_GAP2 * 32).min(cell.len());
        if am_pos >= search_end {
            continue;
        }
        let mut flags = SectorFlags::FM;
        let mut data_pos = crate::pattern::find_pattern(&cs, &data_pattern, am_pos, Some(search_end));
        if data_pos.is_none() {
            data_pos = crate::pattern::find_pattern(&cs, &delete_pattern, am_pos, Some(search_end));
            if data_pos.is_some() {
                flags |= SectorFlags::DELETED;
            }
        }
        let Some(mut data_pos) = data_pos else { continue };
        data_pos += data_pattern.len();

        // Window covers the mark byte (one byte back), the payload, and the
        // trailing CRC: `3 + sector_size` bytes, i.e. `(3+sector_size)*32`
        // symbols starting 32 symbols before `data_pos`.
        let width = (3 + sector_size) * 32;
        let data_start = data_pos - 32;
        let Some(data_end) = data_start.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
        let data = match crate::clock::flux_data_fm(&cell[data_start..data_end]) {
            Some(d) if d.len() >= 3 + sector_size => d,
            _ => continue,
        };
        if crc_ccitt_false(&data) != 0 {
            continue;
        }

        let phys_chs = stream.hint.with_sector(chs.2);
        let am_chs = crate::chs::PhysicalChs::new(chs.0, chs.1, chs.2);
        let reading = ReadSector::new(stream.filename.clone(), am_pos, am_chs, phys_chs, data[1..1 + sector_size].to_vec())
            .with_flags(flags)
            .with_clock(clock);
        media.add_reading(reading);
        any = true;
    }
    any
}

fn process_mfm(stream: &Stream, media: &mut Media, clock: u32) -> bool {
    let cs = stream.cell_string(Modulation::Mfm, clock as f64);
    let cell = cs.as_bytes();

    let mut sync = mfm_sync(32);
    sync.extend_from_slice(make_mark_seq(&[(0x0a, 0xa1), (0x0a, 0xa1), (0x0a, 0xa1), (0x00, 0xfe)], "").as_bytes());
    let mut data_pattern = mfm_sync(32);
    data_pattern.extend_from_slice(make_mark_seq(&[(0x0a, 0xa1), (0x0a, 0xa1), (0x0a, 0xa1), (0x00, 0xfb)], "").as_bytes());
    let mut delete_pattern = mfm_sync(32);
    delete_pattern.extend_from_slice(make_mark_seq(&[(0x0a, 0xa1), (0x0a, 0xa1), (0x0a, 0xa1), (0x03, 0xf8)], "").as_bytes());

    const MAX_GAP2: usize = 60;
    let mut any = false;

    for match_start in iter_patterns(&cs, &sync) {
        let am_pos = match_start + sync.len();
        if am_pos < 64 {
            continue;
        }
        let Some(window_end) = am_pos.checked_add(6 * 16).filter(|&e| e <= cell.len()) else { continue };
        let address_mark = match crate::clock::flux_data_mfm(&cell[am_pos - 64..window_end]) {
            Some(d) if d.len() >= 8 => d,
            _ => continue,
        };
        if crc_ccitt_false(&address_mark) != 0 {
            continue;
        }
        let chs = (address_mark[4] as u16, address_mark[5], address_mark[6]);
        let sector_size = 128usize << address_mark[7];

        let search_start = am_pos + 20 * 16;
        let search_end = (am_pos + MAX_GAP2 * 16).min(cell.len());
        if search_start >= search_end {
            continue;
        }
        let mut flags = SectorFlags::MFM;
        let mut data_pos = crate::pattern::find_pattern(&cs, &data_pattern, search_start, Some(search_end));
        if data_pos.is_none() {
            data_pos = crate::pattern::find_pattern(&cs, &delete_pattern, am_pos, Some(search_end));
            if data_pos.is_some() {
                flags |= SectorFlags::DELETED;
            }
        }
        let Some(mut data_pos) = data_pos else { continue };
        data_pos += data_pattern.len();

        let off = 4 * 16;
        let width = (6 + sector_size) * 16;
        let Some(data_start) = data_pos.checked_sub(off) else { continue };
        let Some(data_end) = data_start.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
        let data = match crate::clock::flux_data_mfm(&cell[data_start..data_end]) {
            Some(d) if d.len() >= 6 + sector_size => d,
            _ => continue,
        };
        if crc_ccitt_false(&data) != 0 {
            continue;
        }

        let phys_chs = stream.hint.with_sector(chs.2);
        let am_chs = crate::chs::PhysicalChs::new(chs.0, chs.1, chs.2);
        let reading = ReadSector::new(stream.filename.clone(), am_pos, am_chs, phys_chs, data[4..4 + sector_size].to_vec())
            .with_flags(flags)
            .with_clock(clock);
        media.add_reading(reading);
        any = true;
    }
    any
}

/// IBM FM and MFM 8" sector formats. Holds its own rotating
/// `(track kind, clock)` worklist, same as `Ibm.__init__`'s `self.todo`.
#[derive(Clone)]
pub struct Ibm {
    todo: std::cell::RefCell<Vec<(TrackKind, u32)>>,
}

impl Default for Ibm {
    fn default() -> Self {
        let mut todo = Vec::new();
        for &clock in &CLOCKS {
            todo.push((TrackKind::Fm, clock));
            todo.push((TrackKind::Mfm, clock));
        }
        Self { todo: std::cell::RefCell::new(todo) }
    }
}

impl FormatRecognizer for Ibm {
    fn name(&self) -> &'static str {
        "IBM"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["IBM"]
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        let mut todo = self.todo.borrow_mut();
        for _ in 0..todo.len() {
            let (kind, clock) = todo[0];
            let hit = match kind {
                TrackKind::Fm => process_fm(stream, media, clock),
                TrackKind::Mfm => process_mfm(stream, media, clock),
            };
            if hit {
                return true;
            }
            let front = todo.remove(0);
            todo.push(front);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::symbols_to_intervals;
    use crate::media::Media;

    #[test]
    fn test_ibm_fm_single_sector_roundtrip() {
        let clock = 50u32;
        let mut cell: Vec<u8> = Vec::new();
        cell.extend_from_slice(&fm_sync(8));
        cell.extend_from_slice(make_mark_fm(0xc7, 0xfe).as_bytes());

        let mut address_mark = vec![0xfeu8, 0, 0, 1, 0];
        let partial_crc = crc_ccitt_false(&address_mark);
        address_mark.push((partial_crc >> 8) as u8);
        address_mark.push((partial_crc & 0xff) as u8);
        for &b in &address_mark[1..] {
            cell.extend_from_slice(make_mark_fm(0xc7, b).as_bytes());
        }
        assert_eq!(crc_ccitt_false(&address_mark), 0);

        cell.extend_from_slice(&fm_sync(4));
        cell.extend_from_slice(make_mark_fm(0xc7, 0xfb).as_bytes());

        let mut data_block = vec![0xfbu8];
        data_block.extend_from_slice(&[0x55u8; 128]);
        let partial_data_crc = crc_ccitt_false(&data_block);
        data_block.push((partial_data_crc >> 8) as u8);
        data_block.push((partial_data_crc & 0xff) as u8);
        for &b in &data_block[1..] {
            cell.extend_from_slice(make_mark_fm(0xc7, b).as_bytes());
        }
        assert_eq!(crc_ccitt_false(&data_block), 0);

        let intervals = symbols_to_intervals(&cell, clock as f64);
        let stream = Stream::synthetic(0, 0, intervals);
        let mut media = Media::new();
        assert!(process_fm(&stream, &mut media, clock));

        let chs = crate::chs::PhysicalChs::new(0, 0, 1);
        assert_eq!(media.majority(chs), Some(&[0x55u8; 128][..]));
    }

    #[test]
    fn test_ibm_fm_rejects_bad_crc() {
        let clock = 50u32;
        let mut cell: Vec<u8> = Vec::new();
        cell.extend_from_slice(&fm_sync(8));
        cell.extend_from_slice(make_mark_fm(0xc7, 0xfe).as_bytes());
        // Deliberately wrong CRC bytes.
        for &b in &[0u8, 0, 1, 0, 0xab, 0xcd] {
            cell.extend_from_slice(make_mark_fm(0xc7, b).as_bytes());
        }
        let intervals = symbols_to_intervals(&cell, clock as f64);
        let stream = Stream::synthetic(0, 0, intervals);
        let mut media = Media::new();
        assert!(!process_fm(&stream, &mut media, clock));
    }
}
