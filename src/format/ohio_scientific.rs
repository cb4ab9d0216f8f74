/*
    fluxrecover

    src/format/ohio_scientific.rs

    Ohio Scientific OS65U 8" floppies.
    Unlike every other recognizer in this catalog, OS65U has no sector marks
    at all: each track is a single asynchronous UART transmission (10-bit
    8E1 frames for the first three bytes of a record, 9-bit 8N1 frames after
    that), and a whole track's worth of bytes is treated as one record,
    delimited by framing errors and by gaps wider than 400 bit-times.
*/

use crate::chs::PhysicalChs;
use crate::clock::Modulation;
use crate::media::Media;
use crate::sector::ReadSector;
use crate::stream::Stream;

use super::FormatRecognizer;

const PADDED_LENGTH: usize = 0xf00;
const MIN_RECORD_LENGTH: usize = 3000;
const MIN_DATA_RECORD_LENGTH: usize = 3590;
const CHECKSUM_SPAN: usize = 3588;
const GAP_FLUSH_THRESHOLD: u32 = 400;

/// One FM-decoded bit at a time, resyncing by a single symbol whenever
/// neither 4-symbol cell shape matches - mirrors the original's `fm()`
/// generator, which never raises on garbage, just slides forward.
struct FmBits<'a> {
    cell: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for FmBits<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while self.pos + 4 <= self.cell.len() {
            let window = &self.cell[self.pos..self.pos + 4];
            if window == b"|---" {
                self.pos += 4;
                return Some(1);
            }
            if window == b"|-|-" {
                self.pos += 4;
                return Some(0);
            }
            self.pos += 1;
        }
        None
    }
}

enum FrameError {
    Break,
    StopBit,
    Parity,
    Done,
}

/// Count leading 1-bits (the idle gap) up to the terminating 0, then read
/// `nbit` more bits LSB-first into an integer.
fn element(bits: &mut FmBits, nbit: u32) -> Result<(u32, u32), FrameError> {
    let mut gap = 0u32;
    loop {
        match bits.next() {
            Some(1) => gap += 1,
            Some(0) => break,
            Some(_) => unreachable!(),
            None => return Err(FrameError::Done),
        }
    }
    let mut value = 0u32;
    for i in 0..nbit {
        match bits.next() {
            Some(b) => value |= (b as u32) << i,
            None => return Err(FrameError::Done),
        }
    }
    Ok((gap, value))
}

/// 8 data bits with even parity and a stop bit (10-bit frame).
fn rx8e(bits: &mut FmBits) -> Result<(u32, u8), FrameError> {
    let (gap, value) = element(bits, 10)?;
    if value == 0 {
        return Err(FrameError::Break);
    }
    if value & 0x200 == 0 {
        return Err(FrameError::StopBit);
    }
    if value.count_ones() % 2 == 0 {
        return Err(FrameError::Parity);
    }
    Ok((gap, (value & 0xff) as u8))
}

/// 8 data bits, no parity, and a stop bit (9-bit frame).
fn rx8n(bits: &mut FmBits) -> Result<(u32, u8), FrameError> {
    let (gap, value) = element(bits, 9)?;
    if value == 0 {
        return Err(FrameError::Break);
    }
    if value & 0x100 == 0 {
        return Err(FrameError::StopBit);
    }
    Ok((gap, (value & 0xff) as u8))
}

fn pad_to(mut v: Vec<u8>, target: usize) -> Vec<u8> {
    if v.len() < target {
        v.resize(target, 0);
    }
    v
}

/// Decide whether the accumulated record is a valid sector and, if so, feed
/// it to `media`. Returns whether anything was read.
fn emit(stream: &Stream, media: &mut Media, record: &[u8]) -> bool {
    if record.len() <= MIN_RECORD_LENGTH {
        return false;
    }
    if stream.hint.cylinder == 0 {
        if record.len() < 3 {
            return false;
        }
        let declared_length = (record[2] as usize) << 8;
        if record.len() < declared_length {
            return false;
        }
        let payload = pad_to(record[..declared_length].to_vec(), PADDED_LENGTH);
        let chs = PhysicalChs::new(0, 0, 0);
        media.add_reading(ReadSector::new(stream.filename.clone(), 0, chs, chs, payload));
        true
    }
    else {
        if record.len() < MIN_DATA_RECORD_LENGTH {
            return false;
        }
        let checksum = record[..CHECKSUM_SPAN].iter().fold(0u32, |acc, &b| acc + b as u32) & 0xffff;
        let stored = (record[CHECKSUM_SPAN] as u32) << 8 | record[CHECKSUM_SPAN + 1] as u32;
        if checksum != stored {
            return false;
        }
        let payload = pad_to(record[..MIN_DATA_RECORD_LENGTH].to_vec(), PADDED_LENGTH);
        let cylinder = record[2] as u16;
        let am_chs = PhysicalChs::new(cylinder, 0, 0);
        let phys_chs = stream.hint.with_sector(0);
        media.add_reading(ReadSector::new(stream.filename.clone(), 0, am_chs, phys_chs, payload));
        true
    }
}

/// Ohio Scientific OS65U 8" floppies: no sector marks, just one continuous
/// asynchronous byte stream per track.
#[derive(Clone, Default)]
pub struct OhioScientificU;

impl FormatRecognizer for OhioScientificU {
    fn name(&self) -> &'static str {
        "Ohio Scientific OS65U"
    }

    fn process(&self, stream: &Stream, media: &mut Media) -> bool {
        let cs = stream.cell_string(Modulation::Fm, 50.0);
        let mut bits = FmBits { cell: cs.as_bytes(), pos: 0 };
        let cylinder0 = stream.hint.cylinder == 0;

        let mut any = false;
        let mut record: Vec<u8> = Vec::new();

        loop {
            let use_parity = cylinder0 || record.len() < 3;
            let outcome = if use_parity { rx8e(&mut bits) } else { rx8n(&mut bits) };
            match outcome {
                Ok((gap, val)) => {
                    if !cylinder0 && record.len() == 3 && gap > 0 && gap < 30 && val >= 0xf0 {
                        // Transient from the UART being switched from 8E to 8N.
                        continue;
                    }
                    if gap > GAP_FLUSH_THRESHOLD {
                        any |= emit(stream, media, &record);
                        record.clear();
                    }
                    record.push(val);
                }
                Err(FrameError::Done) => {
                    any |= emit(stream, media, &record);
                    break;
                }
                Err(_) => {
                    any |= emit(stream, media, &record);
                    record.clear();
                }
            }
        }
        any
    }
}
