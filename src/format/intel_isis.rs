/*
    fluxrecover

    src/format/intel_isis.rs

    Intel ISIS double-density 8" floppies. M2FM
    modulation; the address mark `87 70` / data mark `85 70` are built with
    a leading 16-symbol MFM-style sync run rather than the FM zero-gaps the
    other M2FM format (HP 9885) uses.
*/

use crate::chs::PhysicalChs;
use crate::clock::{flux_data_mfm, Modulation};
use crate::crc::crc_xmodem;
use crate::media::Media;
use crate::pattern::{find_pattern, iter_patterns, make_mark};
use crate::sector::ReadSector;
use crate::stream::Stream;

use super::FormatRecognizer;

const SECTOR_SIZE: usize = 128;
const CLOCK: f64 = 50.0;

fn sync(length: usize) -> Vec<u8> {
    b"|-".repeat(length)
}

fn am_pattern() -> Vec<u8> {
    let mut v = sync(16);
    v.extend_from_slice(make_mark(0x87, 0x70, "").as_bytes());
    v
}

fn data_pattern() -> Vec<u8> {
    let mut v = sync(16);
    v.extend_from_slice(make_mark(0x85, 0x70, "").as_bytes());
    v
}

/// Intel ISIS M2FM 8" floppies, used by Intel's ISIS-II development systems.
#[derive(Clone, Default)]
pub struct IntelIsis;

impl FormatRecognizer for IntelIsis {
    fn name(&self) -> &'static str {
        "Intel ISIS"
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        if stream.hint.head != 0 {
            return false;
        }
        let cs = stream.cell_string(Modulation::M2fm, CLOCK);
        let cell = cs.as_bytes();
        let am_pattern = am_pattern();
        let data_pattern = data_pattern();

        let mut any = false;
        for match_start in iter_patterns(&cs, &am_pattern) {
            let am_pos = match_start + am_pattern.len();
            if am_pos < 16 {
                continue;
            }
            let Some(window_end) = am_pos.checked_add(7 * 16).filter(|&e| e <= cell.len()) else { continue };
            let address_mark = match flux_data_mfm(&cell[am_pos - 16..window_end]) {
                Some(d) if d.len() >= 4 => d,
                _ => continue,
            };
            if crc_xmodem(&address_mark) != 0 {
                continue;
            }
            let chs = (address_mark[1] as u16, address_mark[2], address_mark[3]);

            let search_start = am_pos + 200;
            let search_end = (am_pos + 1000).min(cell.len());
            if search_start >= search_end {
                continue;
            }
            let Some(mut data_pos) = find_pattern(&cs, &data_pattern, search_start, Some(search_end)) else { continue };
            data_pos += data_pattern.len();
            let Some(data_start) = data_pos.checked_sub(16) else { continue };
            let width = (2 + SECTOR_SIZE) * 16;
            let Some(data_end) = data_start.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
            let data = match flux_data_mfm(&cell[data_start..data_end]) {
                Some(d) if d.len() >= 1 + SECTOR_SIZE => d,
                _ => continue,
            };
            if crc_xmodem(&data[..1 + SECTOR_SIZE]) != 0 {
                continue;
            }

            let phys_chs = stream.hint.with_sector(chs.2);
            let am_chs = PhysicalChs::new(chs.0, chs.1, chs.2);
            let reading = ReadSector::new(stream.filename.clone(), am_pos, am_chs, phys_chs, data[1..1 + SECTOR_SIZE].to_vec());
            media.add_reading(reading);
            any = true;
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::symbols_to_intervals;

    #[test]
    fn test_intel_isis_single_sector_roundtrip() {
        let mut cell: Vec<u8> = Vec::new();
        cell.extend_from_slice(&sync(16));
        cell.extend_from_slice(make_mark(0x87, 0x70, "").as_bytes());

        let mut address_mark = vec![0x70u8, 0, 2, 9];
        let crc = crc_xmodem(&address_mark);
        address_mark.push((crc >> 8) as u8);
        address_mark.push((crc & 0xff) as u8);
        for &b in &address_mark[1..] {
            cell.extend_from_slice(make_mark(0x87, b, "").as_bytes());
        }
        assert_eq!(crc_xmodem(&address_mark), 0);

        cell.extend_from_slice(&b"-|".repeat(200));
        cell.extend_from_slice(&sync(16));
        cell.extend_from_slice(make_mark(0x85, 0x70, "").as_bytes());

        let mut data_block = vec![0x70u8];
        data_block.extend_from_slice(&[0x77u8; SECTOR_SIZE]);
        let data_crc = crc_xmodem(&data_block);
        data_block.push((data_crc >> 8) as u8);
        data_block.push((data_crc & 0xff) as u8);
        for &b in &data_block[1..] {
            cell.extend_from_slice(make_mark(0x85, b, "").as_bytes());
        }
        assert_eq!(crc_xmodem(&data_block), 0);

        let intervals = symbols_to_intervals(&cell, CLOCK);
        let stream = Stream::synthetic(0, 0, intervals);
        let mut media = Media::new();
        assert!(IntelIsis.process(&stream, &mut media));

        let chs = PhysicalChs::new(0, 2, 9);
        assert_eq!(media.majority(chs), Some(&[0x77u8; SECTOR_SIZE][..]));
    }

    #[test]
    fn test_intel_isis_skips_non_zero_head_stream() {
        let stream = Stream::synthetic(0, 1, vec![50u32; 8]);
        let mut media = Media::new();
        assert!(!IntelIsis.process(&stream, &mut media));
    }
}
