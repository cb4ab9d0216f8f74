/*
    fluxrecover

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/stream.rs

    KryoFlux stream-frame deframing (C1). The OOB block shapes and the
    filename-expansion regex idiom follow the same conventions used
    elsewhere in this codebase for binary container framing, narrowed to
    this format's byte-for-byte opcode table - in particular, 0x0c is not
    a recognized opcode here and is rejected as `StreamMalformed`, unlike
    some flux-capture readers that treat it as a three-byte absolute flux
    block.
*/

use crate::cellstring::CellString;
use crate::chs::PhysicalChs;
use crate::clock::{ClockRecovery, ClockSpec, Modulation};
use crate::error::FluxError;
use binrw::{BinRead, BinReaderExt};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

/// The stream's physical address hint: cylinder and head are parsed from
/// the filename; the sector is never known at the stream level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamHint {
    pub cylinder: u16,
    pub head: u8,
}

impl StreamHint {
    pub fn with_sector(&self, sector: u8) -> PhysicalChs {
        PhysicalChs::new(self.cylinder, self.head, sector)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexEvent {
    pub stream_offset: u32,
    pub sample_time: u32,
    pub index_counter: u32,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct IndexPayload {
    stream_position: u32,
    sample_time: u32,
    index_counter: u32,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct StreamEndPayload {
    stream_position: u32,
    result_code: u32,
}

pub struct Stream {
    pub filename: String,
    pub hint: StreamHint,
    pub sck: Option<f64>,
    pub ick: Option<f64>,
    pub result_code: Option<u32>,
    intervals: Vec<u32>,
    index_events: Vec<IndexEvent>,
    cell_cache: RefCell<HashMap<(Modulation, u64), Rc<CellString>>>,
}

impl Stream {
    /// Parse a KryoFlux stream file. `relative_filename` is used both for
    /// the `(cylinder, head)` hint (via the `…bin<CC>.<H>.raw` grammar) and
    /// as the stream's serialization identifier.
    pub fn parse(relative_filename: &str, data: &[u8]) -> Result<Self, FluxError> {
        let hint = parse_filename_hint(relative_filename)?;
        let (intervals, index_events, sck, ick, result_code) = deframe(data)?;
        Ok(Self {
            filename: relative_filename.to_string(),
            hint,
            sck,
            ick,
            result_code,
            intervals,
            index_events,
            cell_cache: RefCell::new(HashMap::new()),
        })
    }

    /// Build a stream directly from already-decoded flux intervals, bypassing
    /// frame parsing. Used to assemble synthetic tracks for format-recognizer
    /// tests, where constructing a byte-accurate KryoFlux frame would obscure
    /// the behavior under test.
    #[cfg(test)]
    pub(crate) fn synthetic(cylinder: u16, head: u8, intervals: Vec<u32>) -> Self {
        Self {
            filename: format!("synthetic_bin{cylinder:02}.{head}.raw"),
            hint: StreamHint { cylinder, head },
            sck: None,
            ick: None,
            result_code: None,
            intervals,
            index_events: Vec::new(),
            cell_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn iter_intervals(&self) -> impl Iterator<Item = u32> + '_ {
        self.intervals.iter().copied()
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn index_events(&self) -> &[IndexEvent] {
        &self.index_events
    }

    /// The stream's cell string at the given modulation and clock rate,
    /// computed once per (modulation, rate) pair and cached for the
    /// lifetime of the stream.
    pub fn cell_string(&self, modulation: Modulation, rate: f64) -> Rc<CellString> {
        let key = (modulation, rate.to_bits());
        if let Some(existing) = self.cell_cache.borrow().get(&key) {
            return existing.clone();
        }
        let spec = ClockSpec::for_modulation(modulation, rate);
        let recovery = ClockRecovery::new(spec);
        let cs = Rc::new(recovery.process(self.intervals.iter().copied()));
        self.cell_cache.borrow_mut().insert(key, cs.clone());
        cs
    }
}

fn parse_filename_hint(filename: &str) -> Result<StreamHint, FluxError> {
    let re = regex::Regex::new(r"(?i)bin(\d{2})\.(\d)\.raw$").expect("static regex is valid");
    let base = std::path::Path::new(filename)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(filename);
    let caps = re.captures(base).ok_or_else(|| FluxError::NotAFluxStream(filename.to_string()))?;
    let cylinder: u16 = caps[1].parse().map_err(|_| FluxError::NotAFluxStream(filename.to_string()))?;
    let head: u8 = caps[2].parse().map_err(|_| FluxError::NotAFluxStream(filename.to_string()))?;
    Ok(StreamHint { cylinder, head })
}

type DeframeResult = (Vec<u32>, Vec<IndexEvent>, Option<f64>, Option<f64>, Option<u32>);

fn deframe(data: &[u8]) -> Result<DeframeResult, FluxError> {
    let mut intervals = Vec::with_capacity(data.len() / 2);
    let mut index_events = Vec::new();
    let mut sck = None;
    let mut ick = None;
    let mut result_code = None;
    let mut overflow: u32 = 0;
    let mut cursor = 0usize;
    let len = data.len();

    while cursor < len {
        let byte = data[cursor];
        match byte {
            0x00..=0x07 => {
                if cursor + 1 >= len {
                    return Err(malformed(cursor, "truncated flux2 interval"));
                }
                let value = (byte as u32) * 256 + data[cursor + 1] as u32;
                intervals.push(overflow + value);
                overflow = 0;
                cursor += 2;
            }
            0x08 => cursor += 1,
            0x09 => {
                if cursor + 1 >= len {
                    return Err(malformed(cursor, "truncated Nop2 block"));
                }
                cursor += 2;
            }
            0x0a => {
                if cursor + 2 >= len {
                    return Err(malformed(cursor, "truncated Nop3 block"));
                }
                cursor += 3;
            }
            0x0b => {
                overflow += 65536;
                cursor += 1;
            }
            0x0d => {
                if cursor + 3 >= len {
                    return Err(malformed(cursor, "truncated OOB header"));
                }
                let kind = data[cursor + 1];
                let length = data[cursor + 2] as usize + (data[cursor + 3] as usize) * 256;
                let total = 4 + length;
                if cursor + total > len {
                    return Err(malformed(cursor, "truncated OOB block payload"));
                }
                let payload = &data[cursor + 4..cursor + 4 + length];
                match kind {
                    2 => {
                        let mut reader = Cursor::new(payload);
                        let ib: IndexPayload = reader.read_le().map_err(|e| malformed(cursor, &e.to_string()))?;
                        index_events.push(IndexEvent {
                            stream_offset: ib.stream_position,
                            sample_time: ib.sample_time,
                            index_counter: ib.index_counter,
                        });
                    }
                    3 => {
                        let mut reader = Cursor::new(payload);
                        let seb: StreamEndPayload = reader.read_le().map_err(|e| malformed(cursor, &e.to_string()))?;
                        result_code = Some(seb.result_code);
                    }
                    4 => {
                        if let Ok(text) = std::str::from_utf8(payload) {
                            let text = text.trim_end_matches('\0');
                            for field in text.split(", ") {
                                if let Some((key, value)) = field.split_once('=') {
                                    match key {
                                        "sck" => sck = value.trim().parse::<f64>().ok(),
                                        "ick" => ick = value.trim().parse::<f64>().ok(),
                                        _ => {}
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
                cursor += total;
            }
            0x0e..=0xff => {
                while cursor < len && data[cursor] >= 0x0e {
                    intervals.push(overflow + data[cursor] as u32);
                    overflow = 0;
                    cursor += 1;
                }
            }
            _ => return Err(malformed(cursor, &format!("unrecognized opcode byte 0x{byte:02x}"))),
        }
    }

    Ok((intervals, index_events, sck, ick, result_code))
}

fn malformed(offset: usize, reason: &str) -> FluxError {
    FluxError::StreamMalformed { offset: offset as u64, reason: reason.to_string() }
}
