/*
    fluxrecover

    src/format/wang.rs

    Wang WCS 8" floppies.
    FM modulation; the data CRC is computed over a leading literal `0x03`
    prefix byte followed by the payload, per the WCS theory-of-operations
    manual (742-0652 rev 3, p.73) rather than over the payload alone.
*/

use crate::chs::PhysicalChs;
use crate::clock::{flux_data_fm, Modulation};
use crate::crc::crc_buypass;
use crate::media::Media;
use crate::pattern::{find_pattern, iter_patterns};
use crate::sector::ReadSector;
use crate::stream::Stream;

use super::FormatRecognizer;

const SECTOR_SIZE: usize = 256;

fn am_mark() -> Vec<u8> {
    let mut v = b"--|-".repeat(32);
    v.extend_from_slice(&b"|-".repeat(3));
    v
}

fn data_mark() -> Vec<u8> {
    let mut v = b"--|-".repeat(24);
    v.extend_from_slice(&b"|-".repeat(3));
    v
}

#[derive(Clone, Default)]
pub struct WangWcs;

impl FormatRecognizer for WangWcs {
    fn name(&self) -> &'static str {
        "Wang WCS"
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        let cs = stream.cell_string(Modulation::Fm, 50.0);
        let cell = cs.as_bytes();
        let am_mark = am_mark();
        let data_mark = data_mark();

        let mut any = false;
        for am_pos in iter_patterns(&cs, &am_mark) {
            let Some(window_end) = am_pos.checked_add(6 * 32).filter(|&e| e <= cell.len()) else { continue };
            let Some(address_mark) = flux_data_fm(&cell[am_pos..window_end]).filter(|d| d.len() >= 6) else { continue };
            if address_mark[2..].iter().any(|&b| b != 0) {
                continue;
            }
            let chs = (address_mark[0] as u16, 0u8, address_mark[1]);

            let search_start = am_pos + 500;
            let Some(mut data_pos) = find_pattern(&cs, &data_mark, search_start, None) else { continue };
            if data_pos > am_pos + 800 {
                continue;
            }
            data_pos += data_mark.len();

            let width = (2 + SECTOR_SIZE) * 32;
            let Some(data_end) = data_pos.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
            let Some(data) = flux_data_fm(&cell[data_pos..data_end]).filter(|d| d.len() >= SECTOR_SIZE + 2) else { continue };

            let mut crc_input = vec![0x03u8];
            crc_input.extend_from_slice(&data);
            if crc_buypass(&crc_input) != 0 {
                continue;
            }

            let phys_chs = stream.hint.with_sector(chs.2);
            let am_chs = PhysicalChs::new(chs.0, chs.1, chs.2);
            let reading = ReadSector::new(stream.filename.clone(), am_pos, am_chs, phys_chs, data[..SECTOR_SIZE].to_vec());
            media.add_reading(reading);
            any = true;
        }
        any
    }
}
