/*
    fluxrecover

    src/format/dg_nova.rs

    Data General Nova 8" floppies, ported from the top-level
    `dg_nova.py`'s `DataGeneralNova.process`. FM modulation, two FM-zero
    gaps (16-byte pre-header, 2-byte pre-data) and the "bogo" CRC already
    implemented in `crc::dg_nova_bogo_crc`.
*/

use crate::chs::PhysicalChs;
use crate::clock::{flux_data_fm, Modulation};
use crate::crc::dg_nova_bogo_crc;
use crate::media::Media;
use crate::pattern::{find_pattern, iter_patterns};
use crate::sector::ReadSector;
use crate::stream::Stream;

use super::FormatRecognizer;

const SECTOR_SIZE: usize = 512;

fn gap1() -> Vec<u8> {
    let mut v = b"|---".repeat(16);
    v.extend_from_slice(b"|-|-");
    v
}

fn gap2() -> Vec<u8> {
    let mut v = b"|---".repeat(2);
    v.extend_from_slice(b"|-|-");
    v
}

#[derive(Clone, Default)]
pub struct DgNova;

impl FormatRecognizer for DgNova {
    fn name(&self) -> &'static str {
        "DG Nova"
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        let cs = stream.cell_string(Modulation::Fm, 50.0);
        let cell = cs.as_bytes();
        let gap1 = gap1();
        let gap2 = gap2();

        let mut any = false;
        for am_pos in iter_patterns(&cs, &gap1) {
            let Some(window_end) = am_pos.checked_add(2 * 32).filter(|&e| e <= cell.len()) else { continue };
            let Some(address_mark) = flux_data_fm(&cell[am_pos..window_end]).filter(|d| d.len() >= 2) else { continue };
            let chs = (address_mark[0] as u16, 0u8, address_mark[1] >> 2);

            let search_start = am_pos + 5 * 32;
            let Some(mut data_pos) = find_pattern(&cs, &gap2, search_start, None) else { continue };
            if data_pos - am_pos > 10 * 32 {
                continue;
            }
            data_pos += gap2.len();

            let width = (2 + SECTOR_SIZE) * 32;
            let Some(data_end) = data_pos.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
            let Some(data) = flux_data_fm(&cell[data_pos..data_end]).filter(|d| d.len() >= SECTOR_SIZE + 2) else { continue };

            let data_crc = dg_nova_bogo_crc(&data[..SECTOR_SIZE]);
            let disc_crc = (data[SECTOR_SIZE] as u16) << 8 | data[SECTOR_SIZE + 1] as u16;
            if data_crc != disc_crc {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::symbols_to_intervals;
    use crate::pattern::make_mark_fm;

    #[test]
    fn test_dg_nova_single_sector_roundtrip() {
        let mut cell: Vec<u8> = Vec::new();
        cell.extend_from_slice(&gap1());
        cell.extend_from_slice(make_mark_fm(0xff, 10).as_bytes());
        cell.extend_from_slice(make_mark_fm(0xff, 3 << 2).as_bytes());
        cell.extend_from_slice(&b"-|".repeat((5 * 32 - 2 * 32) / 2));
        cell.extend_from_slice(&gap2());

        let payload = vec![0x22u8; SECTOR_SIZE];
        let crc = dg_nova_bogo_crc(&payload);
        let mut data = payload.clone();
        data.push((crc >> 8) as u8);
        data.push((crc & 0xff) as u8);
        for &b in &data {
            cell.extend_from_slice(make_mark_fm(0xff, b).as_bytes());
        }

        let intervals = symbols_to_intervals(&cell, 50.0);
        let stream = Stream::synthetic(0, 0, intervals);
        let mut media = Media::new();
        assert!(DgNova.process(&stream, &mut media));
        let chs = PhysicalChs::new(10, 0, 3);
        assert_eq!(media.majority(chs), Some(&payload[..]));
    }
}
