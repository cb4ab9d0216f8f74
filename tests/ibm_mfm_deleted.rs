// Concrete scenario: a double-density MFM track carrying one sector marked
// with the deleted-data address mark.

mod common;

use fluxrecover::chs::PhysicalChs;
use fluxrecover::crc::crc_ccitt_false;
use fluxrecover::format::ibm::Ibm;
use fluxrecover::format::FormatRecognizer;
use fluxrecover::media::Media;
use fluxrecover::pattern::{make_mark, make_mark_seq};
use fluxrecover::sector::SectorFlags;
use fluxrecover::stream::Stream;

const CLOCK: f64 = 50.0;

/// One MFM-encoded IBM sector, built symbol-for-symbol the way
/// `format::ibm`'s `process_mfm` expects to find and decode it: a 64-symbol
/// `|-` sync run, the `A1 A1 A1 FE` address mark (clock `0A 0A 0A 00`), the
/// CHS + size-code fields and their CRC, a gap wide enough to clear the
/// recognizer's 20-byte gap-2 floor, then the data field's own sync + mark
/// (`A1 A1 A1 FB`, or `A1 A1 A1 F8` with clock `03` for a deleted sector),
/// the payload, and its CRC.
fn build_sector(cyl: u8, head: u8, sector: u8, size_code: u8, payload: &[u8], deleted: bool) -> Vec<u8> {
    let mut cell: Vec<u8> = Vec::new();

    cell.extend_from_slice(&b"|-".repeat(32));
    cell.extend_from_slice(make_mark_seq(&[(0x0a, 0xa1), (0x0a, 0xa1), (0x0a, 0xa1), (0x00, 0xfe)], "").as_bytes());

    let mut am = vec![0xa1u8, 0xa1, 0xa1, 0xfe, cyl, head, sector, size_code];
    let partial = crc_ccitt_false(&am);
    am.push((partial >> 8) as u8);
    am.push((partial & 0xff) as u8);
    for &b in &am[4..] {
        cell.extend_from_slice(make_mark(0x00, b, "").as_bytes());
    }
    assert_eq!(crc_ccitt_false(&am), 0);

    // Gap 2: clears the recognizer's 20-byte (320-symbol) floor with margin.
    cell.extend_from_slice(&b"|-".repeat(147));

    let (mark_byte, clock_byte) = if deleted { (0xf8u8, 0x03u8) } else { (0xfbu8, 0x00u8) };
    cell.extend_from_slice(make_mark_seq(&[(0x0a, 0xa1), (0x0a, 0xa1), (0x0a, 0xa1), (clock_byte, mark_byte)], "").as_bytes());

    let mut data = vec![0xa1u8, 0xa1, 0xa1, mark_byte];
    data.extend_from_slice(payload);
    let data_crc = crc_ccitt_false(&data);
    for &b in payload {
        cell.extend_from_slice(make_mark(0x00, b, "").as_bytes());
    }
    cell.extend_from_slice(make_mark(0x00, (data_crc >> 8) as u8, "").as_bytes());
    cell.extend_from_slice(make_mark(0x00, (data_crc & 0xff) as u8, "").as_bytes());
    data.push((data_crc >> 8) as u8);
    data.push((data_crc & 0xff) as u8);
    assert_eq!(crc_ccitt_false(&data), 0);

    cell
}

#[test]
fn mfm_deleted_sector_is_recovered_and_flagged() {
    common::init();

    let payload = [0x99u8; 256];
    let cell = build_sector(3, 0, 5, 1, &payload, true);

    let intervals = common::symbols_to_intervals(&cell, CLOCK);
    let bytes = common::encode_stream(&intervals);
    let stream = Stream::parse("bin03.0.raw", &bytes).unwrap();

    let mut media = Media::new();
    assert!(Ibm::default().process(&stream, &mut media));

    let chs = PhysicalChs::new(3, 0, 5);
    let reading = media.get(chs).expect("sector should have been read");
    assert_eq!(media.majority(chs), Some(&payload[..]));
    assert_eq!(reading.sector_length, Some(256));

    let r = &reading.readings[0];
    assert!(r.flags.contains(SectorFlags::MFM));
    assert!(r.flags.contains(SectorFlags::DELETED));
}

#[test]
fn mfm_normal_sector_is_not_flagged_deleted() {
    common::init();

    let payload = [0x42u8; 128];
    let cell = build_sector(1, 1, 9, 0, &payload, false);

    let intervals = common::symbols_to_intervals(&cell, CLOCK);
    let bytes = common::encode_stream(&intervals);
    let stream = Stream::parse("bin01.1.raw", &bytes).unwrap();

    let mut media = Media::new();
    assert!(Ibm::default().process(&stream, &mut media));

    let chs = PhysicalChs::new(1, 1, 9);
    assert_eq!(media.majority(chs), Some(&payload[..]));
    let reading = media.get(chs).unwrap();
    assert!(!reading.readings[0].flags.contains(SectorFlags::DELETED));
}
