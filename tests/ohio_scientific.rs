// Concrete scenario: an Ohio Scientific OS65U track with no sector marks at
// all - a single asynchronous UART transmission, framed end to end through
// `Stream::parse` rather than the crate-internal synthetic-stream helper.

mod common;

use fluxrecover::chs::PhysicalChs;
use fluxrecover::format::ohio_scientific::OhioScientificU;
use fluxrecover::format::FormatRecognizer;
use fluxrecover::media::Media;
use fluxrecover::stream::Stream;

const CLOCK: f64 = 50.0;
const PADDED_LENGTH: usize = 0xf00;
const MIN_DATA_RECORD_LENGTH: usize = 3590;
const CHECKSUM_SPAN: usize = 3588;

fn push_bit(cell: &mut Vec<u8>, bit: u8) {
    cell.extend_from_slice(if bit == 1 { b"|---" } else { b"|-|-" });
}

fn push_gap(cell: &mut Vec<u8>, gap: u32) {
    for _ in 0..gap {
        push_bit(cell, 1);
    }
    push_bit(cell, 0);
}

/// 10-bit 8E1 frame: idle gap, 8 data bits, even-parity bit, stop bit.
fn push_rx8e_byte(cell: &mut Vec<u8>, gap: u32, data: u8) {
    push_gap(cell, gap);
    for i in 0..8 {
        push_bit(cell, (data >> i) & 1);
    }
    push_bit(cell, (data.count_ones() % 2) as u8);
    push_bit(cell, 1);
}

/// 9-bit 8N1 frame: idle gap, 8 data bits, stop bit (no parity).
fn push_rx8n_byte(cell: &mut Vec<u8>, gap: u32, data: u8) {
    push_gap(cell, gap);
    for i in 0..8 {
        push_bit(cell, (data >> i) & 1);
    }
    push_bit(cell, 1);
}

#[test]
fn async_data_track_decodes_as_a_single_checksummed_record() {
    common::init();

    let mut payload = vec![0x11u8; MIN_DATA_RECORD_LENGTH];
    payload[2] = 5; // cylinder, embedded in the record itself
    let checksum = payload[..CHECKSUM_SPAN].iter().fold(0u32, |acc, &b| acc + b as u32) & 0xffff;
    payload[CHECKSUM_SPAN] = (checksum >> 8) as u8;
    payload[CHECKSUM_SPAN + 1] = (checksum & 0xff) as u8;

    let mut cell: Vec<u8> = Vec::new();
    for (i, &byte) in payload.iter().enumerate() {
        if i < 3 {
            push_rx8e_byte(&mut cell, 2, byte);
        }
        else {
            push_rx8n_byte(&mut cell, 2, byte);
        }
    }
    // All-zero frame (including the stop bit) forces a Break and flush.
    for _ in 0..9 {
        push_bit(&mut cell, 0);
    }

    let intervals = common::symbols_to_intervals(&cell, CLOCK);
    let bytes = common::encode_stream(&intervals);
    let stream = Stream::parse("bin05.0.raw", &bytes).unwrap();

    let mut media = Media::new();
    assert!(OhioScientificU.process(&stream, &mut media));

    let chs = PhysicalChs::new(5, 0, 0);
    let read = media.majority(chs).unwrap();
    assert_eq!(read.len(), PADDED_LENGTH);
    assert_eq!(&read[..MIN_DATA_RECORD_LENGTH], &payload[..]);
    assert!(read[MIN_DATA_RECORD_LENGTH..].iter().all(|&b| b == 0));
}

#[test]
fn async_data_track_rejects_a_bad_checksum() {
    common::init();

    let mut payload = vec![0x22u8; MIN_DATA_RECORD_LENGTH];
    payload[2] = 7;
    let checksum = payload[..CHECKSUM_SPAN].iter().fold(0u32, |acc, &b| acc + b as u32) & 0xffff;
    payload[CHECKSUM_SPAN] = (checksum >> 8) as u8;
    payload[CHECKSUM_SPAN + 1] = ((checksum & 0xff) ^ 0xff) as u8; // corrupted

    let mut cell: Vec<u8> = Vec::new();
    for (i, &byte) in payload.iter().enumerate() {
        if i < 3 {
            push_rx8e_byte(&mut cell, 2, byte);
        }
        else {
            push_rx8n_byte(&mut cell, 2, byte);
        }
    }
    for _ in 0..9 {
        push_bit(&mut cell, 0);
    }

    let intervals = common::symbols_to_intervals(&cell, CLOCK);
    let bytes = common::encode_stream(&intervals);
    let stream = Stream::parse("bin07.0.raw", &bytes).unwrap();

    let mut media = Media::new();
    assert!(!OhioScientificU.process(&stream, &mut media));
}
