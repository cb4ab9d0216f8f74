/*
    fluxrecover

    src/cache.rs

    Cache-file serialization: a resumable line-oriented record of readings
    already decoded. This module implements the line format an external
    monitor loop would read and write across runs; it does not watch a
    directory or drive a CLI itself, which stays an external concern. `hex`
    handles the payload field's nibble encoding.
*/

use crate::chs::PhysicalChs;
use crate::error::FluxError;
use crate::media::Media;
use crate::sector::{ReadSector, SectorFlags};
use std::collections::BTreeSet;

/// One parsed line of a cache file.
#[derive(Debug, Clone)]
pub enum CacheLine {
    /// `file <relative-filename>`: the stream was fully processed.
    File(String),
    /// `sector ...`: one [`ReadSector`].
    Sector(ReadSector),
}

fn corrupt(line_no: usize, text: &str) -> FluxError {
    FluxError::CacheCorruption { line: line_no, text: text.to_string() }
}

fn format_chs(chs: PhysicalChs) -> String {
    format!("{},{},{}", chs.cylinder, chs.head, chs.sector)
}

fn parse_chs(field: &str, line_no: usize, text: &str) -> Result<PhysicalChs, FluxError> {
    let mut parts = field.split(',');
    let cylinder: u16 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| corrupt(line_no, text))?;
    let head: u8 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| corrupt(line_no, text))?;
    let sector: u8 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| corrupt(line_no, text))?;
    if parts.next().is_some() {
        return Err(corrupt(line_no, text));
    }
    Ok(PhysicalChs::new(cylinder, head, sector))
}

/// Unordered flag tokens for one reading, sorted lexicographically on write.
fn flag_tokens(reading: &ReadSector) -> Vec<String> {
    let mut tokens = Vec::new();
    if reading.flags.contains(SectorFlags::DELETED) {
        tokens.push("deleted".to_string());
    }
    if reading.flags.contains(SectorFlags::FM) {
        tokens.push("fm".to_string());
    }
    if reading.flags.contains(SectorFlags::MFM) {
        tokens.push("mfm".to_string());
    }
    if reading.flags.contains(SectorFlags::M2FM) {
        tokens.push("m2fm".to_string());
    }
    if reading.flags.contains(SectorFlags::UNUSED) {
        tokens.push("unused".to_string());
    }
    if reading.flags.contains(SectorFlags::WEIRD_AM) {
        tokens.push("weird_am".to_string());
    }
    if let Some(clock) = reading.clock {
        tokens.push(format!("clock={clock}"));
    }
    tokens.sort();
    tokens
}

/// Serialize a `file <relative-filename>` line.
pub fn serialize_file_line(relative_filename: &str) -> String {
    format!("file {relative_filename}")
}

/// Serialize a `sector ...` line for one reading.
pub fn serialize_sector_line(reading: &ReadSector) -> String {
    let mut line = format!(
        "sector {} {} {} {} {}",
        reading.source,
        reading.rel_pos,
        format_chs(reading.phys_chs),
        format_chs(reading.am_chs),
        hex::encode(&reading.octets),
    );
    for token in flag_tokens(reading) {
        line.push(' ');
        line.push_str(&token);
    }
    line
}

/// Serialize every processed-file marker and every reading currently held by
/// `media`, in the shape a cache file on disk would have.
pub fn serialize_media<'a>(processed_files: impl IntoIterator<Item = &'a str>, media: &Media) -> String {
    let mut out = String::new();
    for filename in processed_files {
        out.push_str(&serialize_file_line(filename));
        out.push('\n');
    }
    for sector in media.sectors() {
        for reading in &sector.readings {
            out.push_str(&serialize_sector_line(reading));
            out.push('\n');
        }
    }
    out
}

/// Parse one non-blank, non-comment cache line. `line_no` is 1-based, used
/// only for error reporting.
pub fn parse_line(text: &str, line_no: usize) -> Result<Option<CacheLine>, FluxError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let mut fields = trimmed.split_whitespace();
    match fields.next() {
        Some("file") => {
            let name = fields.next().ok_or_else(|| corrupt(line_no, trimmed))?;
            Ok(Some(CacheLine::File(name.to_string())))
        }
        Some("sector") => {
            let source = fields.next().ok_or_else(|| corrupt(line_no, trimmed))?;
            let rel_pos: usize = fields.next().and_then(|s| s.parse().ok()).ok_or_else(|| corrupt(line_no, trimmed))?;
            let phys_chs = parse_chs(fields.next().ok_or_else(|| corrupt(line_no, trimmed))?, line_no, trimmed)?;
            let am_chs = parse_chs(fields.next().ok_or_else(|| corrupt(line_no, trimmed))?, line_no, trimmed)?;
            let octets = hex::decode(fields.next().ok_or_else(|| corrupt(line_no, trimmed))?).map_err(|_| corrupt(line_no, trimmed))?;

            let mut reading = ReadSector::new(source, rel_pos, am_chs, phys_chs, octets);
            for token in fields {
                match token {
                    "deleted" => reading.flags.insert(SectorFlags::DELETED),
                    "fm" => reading.flags.insert(SectorFlags::FM),
                    "mfm" => reading.flags.insert(SectorFlags::MFM),
                    "m2fm" => reading.flags.insert(SectorFlags::M2FM),
                    "unused" => reading.flags.insert(SectorFlags::UNUSED),
                    "weird_am" => reading.flags.insert(SectorFlags::WEIRD_AM),
                    other => match other.strip_prefix("clock=").and_then(|s| s.parse().ok()) {
                        Some(clock) => reading.clock = Some(clock),
                        None => return Err(corrupt(line_no, trimmed)),
                    },
                }
            }
            Ok(Some(CacheLine::Sector(reading)))
        }
        _ => Err(corrupt(line_no, trimmed)),
    }
}

/// Parse a whole cache file's text and apply it to `media`, returning the
/// set of relative filenames recorded as fully processed.
pub fn load_into(text: &str, media: &mut Media) -> Result<BTreeSet<String>, FluxError> {
    let mut processed = BTreeSet::new();
    for (i, line) in text.lines().enumerate() {
        match parse_line(line, i + 1)? {
            Some(CacheLine::File(name)) => {
                processed.insert(name);
            }
            Some(CacheLine::Sector(reading)) => {
                media.add_reading(reading);
            }
            None => {}
        }
    }
    Ok(processed)
}
