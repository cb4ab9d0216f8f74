/*
    fluxrecover

    src/format/hp98xx.rs

    HP 9885 M2FM 8" floppies (used by the HP MX21 development system).
    The address-mark and data-mark patterns are hand-tuned literals rather
    than built from `make_mark`, since they are clock/data bit columns for
    a 2-byte field best read off directly. Both the address-mark and data
    fields are
    bit-reversed per byte after CRC validation: the CRC is computed over
    the wire-order bytes, but cylinder/sector/payload are read out of the
    bit-reversed form.
*/

use crate::chs::PhysicalChs;
use crate::clock::{flux_data_mfm, Modulation};
use crate::crc::crc_ccitt_false;
use crate::media::Media;
use crate::pattern::{find_pattern, iter_patterns};
use crate::sector::ReadSector;
use crate::stream::Stream;

use super::FormatRecognizer;

const SECTOR_SIZE: usize = 256;
const CLOCK: f64 = 50.0;

fn am_pattern() -> Vec<u8> {
    let mut v = b"--|-".repeat(10);
    v.extend_from_slice(&b"-|".repeat(32));
    v.extend_from_slice(b"--|-|-|--|-|-|--");
    v
}

fn dm_pattern() -> Vec<u8> {
    let mut v = b"--|-".repeat(10);
    v.extend_from_slice(&b"-|".repeat(32));
    v.extend_from_slice(b"--|-|-|--|---|--");
    v
}

fn reverse_bits(b: u8) -> u8 {
    let mut v = b;
    v = (v >> 4) | (v << 4);
    v = ((v & 0xcc) >> 2) | ((v & 0x33) << 2);
    v = ((v & 0xaa) >> 1) | ((v & 0x55) << 1);
    v
}

/// HP 9885 8" floppies (HP MX21). M2FM with clock 50, bit-reversed fields.
#[derive(Clone, Default)]
pub struct Hp9885;

impl FormatRecognizer for Hp9885 {
    fn name(&self) -> &'static str {
        "HP 9885"
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        let cs = stream.cell_string(Modulation::M2fm, CLOCK);
        let cell = cs.as_bytes();

        let mut any = false;
        let am_pattern = am_pattern();
        let dm_pattern = dm_pattern();

        for match_start in iter_patterns(&cs, &am_pattern) {
            let am_pos = match_start + am_pattern.len();
            let Some(window_end) = am_pos.checked_add(80).filter(|&e| e <= cell.len()) else { continue };
            let raw_am = match flux_data_mfm(&cell[am_pos..window_end]) {
                Some(d) if d.len() >= 5 => d,
                _ => continue,
            };
            if crc_ccitt_false(&raw_am) != 0 {
                continue;
            }
            let am: Vec<u8> = raw_am.iter().copied().map(reverse_bits).collect();
            let chs = (am[0] as u16, 0u8, am[1]);

            let search_start = am_pos + 200;
            let search_end = (am_pos + 500).min(cell.len());
            if search_start >= search_end {
                continue;
            }
            let Some(data_pos) = find_pattern(&cs, &dm_pattern, search_start, Some(search_end)) else { continue };
            let data_start = data_pos + dm_pattern.len();
            let width = (SECTOR_SIZE + 2) * 16;
            let Some(data_end) = data_start.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
            let raw_data = match flux_data_mfm(&cell[data_start..data_end]) {
                Some(d) if d.len() >= SECTOR_SIZE + 2 => d,
                _ => continue,
            };
            if crc_ccitt_false(&raw_data[..SECTOR_SIZE + 2]) != 0 {
                continue;
            }
            let data: Vec<u8> = raw_data.iter().copied().map(reverse_bits).collect();

            let phys_chs = stream.hint.with_sector(chs.2);
            let am_chs = PhysicalChs::new(chs.0, chs.1, chs.2);
            let reading = ReadSector::new(stream.filename.clone(), am_pos, am_chs, phys_chs, data[..SECTOR_SIZE].to_vec());
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
    use crate::pattern::make_mark;

    fn push_reversed_bytes(cell: &mut Vec<u8>, clock: u8, bytes_wire: &[u8]) {
        for &b in bytes_wire {
            cell.extend_from_slice(make_mark(clock, b, "").as_bytes());
        }
    }

    #[test]
    fn test_reverse_bits_involution() {
        for b in 0u8..=255 {
            assert_eq!(reverse_bits(reverse_bits(b)), b);
        }
        assert_eq!(reverse_bits(0b1000_0000), 0b0000_0001);
    }

    #[test]
    fn test_hp9885_single_sector_roundtrip() {
        let mut cell: Vec<u8> = am_pattern();

        // Wire-order address-mark bytes: cylinder=reverse(7), sector=reverse(12).
        let mut am_body = vec![reverse_bits(7), reverse_bits(12), 0u8];
        let crc = crc_ccitt_false(&am_body);
        am_body.push((crc >> 8) as u8);
        am_body.push((crc & 0xff) as u8);
        assert_eq!(crc_ccitt_false(&am_body), 0);
        push_reversed_bytes(&mut cell, 0x20, &am_body);

        cell.extend_from_slice(&b"-|".repeat(250));
        cell.extend_from_slice(&dm_pattern());

        let payload_wire: Vec<u8> = vec![reverse_bits(0x99); SECTOR_SIZE];
        let mut data_body = payload_wire.clone();
        let data_crc = crc_ccitt_false(&data_body);
        data_body.push((data_crc >> 8) as u8);
        data_body.push((data_crc & 0xff) as u8);
        assert_eq!(crc_ccitt_false(&data_body), 0);
        push_reversed_bytes(&mut cell, 0x20, &data_body);

        let intervals = symbols_to_intervals(&cell, CLOCK);
        let stream = Stream::synthetic(7, 0, intervals);
        let mut media = Media::new();
        assert!(Hp9885.process(&stream, &mut media));

        let chs = PhysicalChs::new(7, 0, 12);
        assert_eq!(media.majority(chs), Some(&[0x99u8; SECTOR_SIZE][..]));
    }
}
