/*
    fluxrecover

    src/format/zilog_mcz.rs

    Zilog MCZ/1 8" floppies.
    FM modulation, data-only (no distinct address mark): every sector is
    found by its 32-byte FM-zero gap, and the CHS is read out of the first
    two payload bytes rather than a separate header field.
*/

use crate::chs::PhysicalChs;
use crate::clock::{flux_data_fm, Modulation};
use crate::crc::crc_buypass;
use crate::media::Media;
use crate::pattern::{fm_gap, iter_patterns};
use crate::sector::ReadSector;
use crate::stream::Stream;

use super::FormatRecognizer;

const SECTOR_SIZE: usize = 136;

#[derive(Clone, Default)]
pub struct ZilogMcz;

impl FormatRecognizer for ZilogMcz {
    fn name(&self) -> &'static str {
        "Zilog MCZ"
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        let cs = stream.cell_string(Modulation::Fm, 50.0);
        let cell = cs.as_bytes();
        let gap = fm_gap(32);

        let mut any = false;
        for match_start in iter_patterns(&cs, gap.as_bytes()) {
            // The original's custom pattern scanner reports the position
            // right after a match, not its start; subtracting 4 backs up
            // into the gap's settling tail the same way `data_pos -= 4` does.
            let data_pos = (match_start + gap.len()).saturating_sub(4);
            let width = (2 + SECTOR_SIZE) * 32;
            let Some(data_end) = data_pos.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
            let Some(data) = flux_data_fm(&cell[data_pos..data_end]).filter(|d| d.len() >= SECTOR_SIZE + 2) else { continue };

            if crc_buypass(&data) != 0 {
                continue;
            }
            let chs = (data[1] as u16, 0u8, data[0] & 0x7f);

            let phys_chs = stream.hint.with_sector(chs.2);
            let am_chs = PhysicalChs::new(chs.0, chs.1, chs.2);
            let reading = ReadSector::new(stream.filename.clone(), data_pos, am_chs, phys_chs, data[..data.len() - 2].to_vec());
            media.add_reading(reading);
            any = true;
        }
        any
    }
}
