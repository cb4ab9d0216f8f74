/*
    fluxrecover

    src/format/dec_rx.rs

    DEC RX02 8" double-density floppies. The header (address mark, CHS,
    size) is conventional FM, decoded with `flux_data_fm` over the track's
    MFM-clocked cell string; only the data field uses RX02's "modified
    MFM" encoding, where a bit cell normally worth one MFM symbol pair is
    occasionally stretched to the five-symbol run `-|---|---|` standing in
    for the two data bits `01111` - used to shoehorn FM-density data onto
    an MFM-clocked track.
*/

use crate::chs::PhysicalChs;
use crate::clock::{flux_data_fm, Modulation};
use crate::crc::crc_ccitt_false;
use crate::media::Media;
use crate::pattern::{find_pattern, iter_patterns, make_mark_fm};
use crate::sector::ReadSector;
use crate::stream::Stream;

use super::FormatRecognizer;

const SECTOR_SIZE: usize = 256;
const GAP1: usize = 32;
const DATA_WIN_LO: usize = 550;
const DATA_WIN_HI: usize = 800;

fn am_pattern() -> Vec<u8> {
    let mut v = b"|---".repeat(GAP1);
    v.extend_from_slice(make_mark_fm(0xc7, 0xfe).as_bytes());
    v
}

fn hddata_pattern() -> Vec<u8> {
    let mut v = b"|---".repeat(GAP1);
    v.extend_from_slice(make_mark_fm(0xc7, 0xfd).as_bytes());
    v
}

/// RX02's modified-MFM bit decoder: a literal clock-violating run
/// `-|---|---|` stands for the five bits `01111` instead of the two
/// normal MFM-encoded bits that run of symbols would otherwise be.
fn flux_to_bytes(flux: &[u8]) -> Option<Vec<u8>> {
    let mut padded = flux.to_vec();
    padded.extend_from_slice(b"||||||||||||||||");

    let mut bits = String::new();
    let mut i = 0usize;
    let total = 2 * (2 + SECTOR_SIZE) * 8;
    while i < total && i < padded.len() {
        if padded[i] == b'|' {
            bits.push('1');
            i += 2;
        }
        else if padded.get(i..i + 10) == Some(b"-|---|---|") {
            bits.push_str("01111");
            i += 10;
        }
        else {
            bits.push('0');
            i += 2;
        }
    }

    let mut out = Vec::with_capacity(bits.len() / 8);
    let bytes = bits.as_bytes();
    for chunk in bytes.chunks(8) {
        if chunk.len() < 8 {
            break;
        }
        let mut byte = 0u8;
        for &b in chunk {
            byte = (byte << 1) | (b - b'0');
        }
        out.push(byte);
    }
    Some(out)
}

/// DEC RX01/RX02 8" floppies. RX01 (single-density) tracks are a subset
/// decodeable by the same FM header scan; only RX02's modified-MFM data
/// field needs the special decoder above.
#[derive(Clone, Default)]
pub struct DecRx02;

impl FormatRecognizer for DecRx02 {
    fn name(&self) -> &'static str {
        "DEC RX02"
    }
    fn aliases(&self) -> &'static [&'static str] {
        &["RX01", "RX02"]
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        let cs = stream.cell_string(Modulation::Mfm, 50.0);
        let cell = cs.as_bytes();
        let am_pattern = am_pattern();
        let hddata_pattern = hddata_pattern();

        let mut any = false;
        for match_start in iter_patterns(&cs, &am_pattern) {
            let am_pos = match_start + am_pattern.len();
            if am_pos < 32 {
                continue;
            }
            let Some(window_end) = am_pos.checked_add(6 * 32).filter(|&e| e <= cell.len()) else { continue };
            let address_mark = match flux_data_fm(&cell[am_pos - 32..window_end]) {
                Some(d) if d.len() >= 7 => d,
                _ => continue,
            };
            if crc_ccitt_false(&address_mark) != 0 {
                continue;
            }
            let chs = (address_mark[1] as u16, address_mark[2], address_mark[3]);

            let search_start = am_pos + DATA_WIN_LO;
            let search_end = (am_pos + DATA_WIN_HI).min(cell.len());
            if search_start >= search_end {
                continue;
            }
            let Some(mut data_pos) = find_pattern(&cs, &hddata_pattern, search_start, Some(search_end)) else { continue };
            data_pos += hddata_pattern.len();

            let width = (2 + SECTOR_SIZE) * 16 + 32;
            let Some(data_end) = data_pos.checked_add(width).filter(|&e| e <= cell.len()) else { continue };
            let data_flux = &cell[data_pos..data_end];
            if data_flux.contains(&crate::cellstring::UNRECOVERABLE) {
                continue;
            }
            let Some(decoded) = flux_to_bytes(&data_flux[1..]) else { continue };
            if decoded.len() < SECTOR_SIZE + 1 {
                continue;
            }

            let mut data = vec![0xfdu8];
            data.extend_from_slice(&decoded);

            let phys_chs = stream.hint.with_sector(chs.2);
            let am_chs = PhysicalChs::new(chs.0, chs.1, chs.2);
            let reading = ReadSector::new(stream.filename.clone(), am_pos, am_chs, phys_chs, data[1..1 + SECTOR_SIZE].to_vec());
            media.add_reading(reading);
            any = true;
        }
        any
    }
}
