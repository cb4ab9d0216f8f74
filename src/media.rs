/*
    fluxrecover

    src/media.rs

    Media aggregator (C5): majority voting per CHS, geometry
    pre-declaration, the anomaly counters, and the `picture`/`summary`
    reporting utilities. `SectorStatus` is a `strum`-derived enum carrying
    its own glyph rather than a bare string.
*/

use crate::chs::PhysicalChs;
use crate::chsset::summarize_chs;
use crate::sector::{ReadSector, SectorFlags};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strum::Display;

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct MediaSectorFlags: u32 {
        /// Geometry was pre-declared via [`Media::define_geometry`].
        const DEFINED = 0b0000_0001;
        /// Known-empty allocation (Q1 catalog "unused" slot).
        const UNUSED  = 0b0000_0010;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum SectorStatus {
    /// A single consistent reading, or a clear majority among several.
    Ok,
    /// No readings at all.
    Missing,
    /// More than one distinct payload, no majority.
    Mismatch,
    /// The only payload observed is shorter than the expected length.
    Short,
    /// The only payload observed is longer than the expected length.
    Long,
    /// Several payloads, one is a majority that falls short of the 2:1 bar.
    PartialMajority,
    /// Pre-declared as known-empty.
    Unused,
}

impl SectorStatus {
    /// A one-character status glyph, loosely following
    /// `MediaAbc.real_sector_status`'s ramp (`×▁▂▃▄▅▆▇█` / `░`/`╬`/`x`).
    pub fn glyph(self) -> char {
        match self {
            SectorStatus::Ok => '░',
            SectorStatus::Missing => 'x',
            SectorStatus::Mismatch => '╬',
            SectorStatus::Short => '<',
            SectorStatus::Long => '>',
            SectorStatus::PartialMajority => '?',
            SectorStatus::Unused => 'u',
        }
    }

    /// Whether this status counts as a successfully recovered sector.
    pub fn is_good(self) -> bool {
        matches!(self, SectorStatus::Ok | SectorStatus::Unused)
    }
}

/// What we know about one physical sector.
#[derive(Debug, Default)]
pub struct MediaSector {
    pub am_chs: Option<PhysicalChs>,
    pub phys_chs: PhysicalChs,
    pub sector_length: Option<usize>,
    pub readings: Vec<ReadSector>,
    /// payload bytes -> readings that produced that exact payload
    values: HashMap<Vec<u8>, Vec<usize>>,
    pub flags: MediaSectorFlags,
    majority_cache: std::cell::Cell<Option<MajorityCacheEntry>>,
}

#[derive(Copy, Clone, Debug)]
struct MajorityCacheEntry {
    has_majority: bool,
    index: usize,
}

impl MediaSector {
    pub fn new(phys_chs: PhysicalChs) -> Self {
        Self { phys_chs, ..Default::default() }
    }

    pub fn add_reading(&mut self, reading: ReadSector) {
        if self.am_chs.is_none() {
            self.am_chs = Some(reading.am_chs);
        }
        let new_length = reading.octets.len();
        self.values.entry(reading.octets.clone()).or_default().push(self.readings.len());
        self.readings.push(reading);

        let lengths: BTreeSet<usize> = self.readings.iter().map(|r| r.len()).collect();
        if lengths.len() == 1 {
            self.sector_length = Some(new_length);
        }
        else if !self.flags.contains(MediaSectorFlags::DEFINED) {
            self.sector_length = None;
        }
        self.majority_cache.set(None);
    }

    /// The payload with strictly more than 2x the votes of everything else
    /// combined, restricted to payloads matching the expected length when
    /// one is known. `None` otherwise.
    pub fn majority_payload(&self) -> Option<&[u8]> {
        if let Some(cached) = self.majority_cache.get() {
            return cached.has_majority.then(|| self.readings[cached.index].octets.as_slice());
        }

        let mut best: Option<(&[u8], usize)> = None;
        let mut total_votes = 0usize;
        for (payload, indices) in &self.values {
            if let Some(expected) = self.sector_length {
                if payload.len() != expected {
                    continue;
                }
            }
            total_votes += indices.len();
            if best.map(|(_, n)| indices.len() > n).unwrap_or(true) {
                best = Some((payload.as_slice(), indices.len()));
            }
        }

        match best {
            Some((payload, votes)) if votes * 1 > 2 * (total_votes - votes) => {
                let index = self.values[payload][0];
                self.majority_cache.set(Some(MajorityCacheEntry { has_majority: true, index }));
                Some(self.readings[index].octets.as_slice())
            }
            _ => {
                self.majority_cache.set(Some(MajorityCacheEntry { has_majority: false, index: 0 }));
                None
            }
        }
    }

    pub fn status(&self) -> SectorStatus {
        if self.flags.contains(MediaSectorFlags::UNUSED) {
            return SectorStatus::Unused;
        }
        if self.values.is_empty() {
            return SectorStatus::Missing;
        }
        if self.majority_payload().is_some() {
            return SectorStatus::Ok;
        }
        if self.values.len() > 1 {
            return SectorStatus::Mismatch;
        }
        if let Some(expected) = self.sector_length {
            let (only_len, _) = self.values.iter().next().map(|(p, _)| (p.len(), ())).unwrap();
            if only_len > expected {
                return SectorStatus::Long;
            }
            if only_len < expected {
                return SectorStatus::Short;
            }
        }
        SectorStatus::Ok
    }
}

/// Top-level aggregation container.
#[derive(Debug, Default)]
pub struct Media {
    sectors: BTreeMap<PhysicalChs, MediaSector>,
    cylinders: BTreeSet<u16>,
    heads: BTreeSet<u8>,
    sector_numbers: BTreeSet<u8>,
    expected_count: usize,
    messages: BTreeSet<String>,
    pub weird_am_count: u32,
}

impl Media {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chs: PhysicalChs) -> Option<&MediaSector> {
        self.sectors.get(&chs)
    }

    pub fn sectors(&self) -> impl Iterator<Item = &MediaSector> {
        self.sectors.values()
    }

    /// A one-shot message: returns `true` the first time it is seen for
    /// this media, `false` on repeats. Mirrors `MediaAbc.message`.
    fn message_once(&mut self, text: &str) -> bool {
        if self.messages.contains(text) {
            return false;
        }
        self.messages.insert(text.to_string());
        true
    }

    /// Pre-register every CHS in the rectangular range `first_chs..=last_chs`
    /// at `sector_size`. Idempotent: a mismatched length on a later call
    /// does not overwrite the first declaration, and logs
    /// `SECTOR_LENGTH_CONFUSION` once.
    pub fn define_geometry(&mut self, first_chs: PhysicalChs, last_chs: PhysicalChs, sector_size: usize) {
        for cylinder in first_chs.cylinder..=last_chs.cylinder {
            for head in first_chs.head..=last_chs.head {
                for sector in first_chs.sector..=last_chs.sector {
                    self.define_sector(PhysicalChs::new(cylinder, head, sector), sector_size);
                }
            }
        }
    }

    pub fn define_sector(&mut self, chs: PhysicalChs, sector_length: usize) {
        self.cylinders.insert(chs.cylinder);
        self.heads.insert(chs.head);
        self.sector_numbers.insert(chs.sector);

        let already_defined = self.sectors.get(&chs).map(|ms| ms.flags.contains(MediaSectorFlags::DEFINED)).unwrap_or(false);
        let existing_length = self.sectors.get(&chs).and_then(|ms| ms.sector_length);

        if !already_defined {
            let entry = self.sectors.entry(chs).or_insert_with(|| MediaSector::new(chs));
            entry.sector_length = Some(sector_length);
            entry.flags.insert(MediaSectorFlags::DEFINED);
            self.expected_count += 1;
        }
        else if existing_length.is_none() {
            self.sectors.get_mut(&chs).unwrap().sector_length = Some(sector_length);
        }
        else if existing_length != Some(sector_length) {
            log::warn!("SECTOR_LENGTH_CONFUSION at {chs}: have {existing_length:?}, saw {sector_length}");
            self.message_once("SECTOR_LENGTH_CONFUSION");
        }
    }

    pub fn mark_unused(&mut self, chs: PhysicalChs) {
        if let Some(ms) = self.sectors.get_mut(&chs) {
            ms.flags.insert(MediaSectorFlags::UNUSED);
        }
    }

    /// Accumulate one successful decoding. Increments `weird_am_count` when
    /// the address-mark CHS disagrees with the stream's physical hint.
    pub fn add_reading(&mut self, reading: ReadSector) {
        if reading.am_chs != reading.phys_chs {
            self.weird_am_count += 1;
        }
        let chs = reading.phys_chs;
        self.cylinders.insert(chs.cylinder);
        self.heads.insert(chs.head);
        self.sector_numbers.insert(chs.sector);
        let flagged_unused = reading.flags.contains(SectorFlags::UNUSED);
        let entry = self.sectors.entry(chs).or_insert_with(|| MediaSector::new(chs));
        entry.add_reading(reading);
        if flagged_unused {
            entry.flags.insert(MediaSectorFlags::UNUSED);
        }
    }

    pub fn majority(&self, chs: PhysicalChs) -> Option<&[u8]> {
        self.sectors.get(&chs).and_then(|ms| ms.majority_payload())
    }

    pub fn status(&self, chs: PhysicalChs) -> SectorStatus {
        self.sectors.get(&chs).map(|ms| ms.status()).unwrap_or(SectorStatus::Missing)
    }

    /// Text rendering of media completeness: one column per cylinder, one
    /// row per sector number, per head - transposed when sector numbers
    /// exceed 32.
    pub fn picture(&self) -> String {
        if self.cylinders.is_empty() || self.heads.is_empty() {
            return String::new();
        }
        let max_sector = *self.sector_numbers.iter().max().unwrap_or(&0);
        if max_sector > 32 {
            self.picture_by_cylinder_row()
        }
        else {
            self.picture_by_sector_row()
        }
    }

    fn picture_by_sector_row(&self) -> String {
        let (cyl_lo, cyl_hi) = (*self.cylinders.iter().next().unwrap(), *self.cylinders.iter().next_back().unwrap());
        let (sec_lo, sec_hi) = (*self.sector_numbers.iter().next().unwrap(), *self.sector_numbers.iter().next_back().unwrap());
        let mut out = String::new();
        for &head in &self.heads {
            out.push_str(&format!("h{head} "));
            for cylinder in cyl_lo..=cyl_hi {
                out.push(if cylinder % 10 == 0 { char::from_digit((cylinder as u32 / 10) % 10, 10).unwrap() } else { ' ' });
            }
            out.push('\n');
            for sector in sec_lo..=sec_hi {
                out.push_str(&format!("{sector:3} "));
                for cylinder in cyl_lo..=cyl_hi {
                    let glyph = self.sectors.get(&PhysicalChs::new(cylinder, head, sector)).map(|ms| ms.status().glyph()).unwrap_or(' ');
                    out.push(glyph);
                }
                out.push('\n');
            }
        }
        out
    }

    fn picture_by_cylinder_row(&self) -> String {
        let (sec_lo, sec_hi) = (*self.sector_numbers.iter().next().unwrap(), *self.sector_numbers.iter().next_back().unwrap());
        let mut out = String::new();
        for &head in &self.heads {
            for &cylinder in &self.cylinders {
                out.push_str(&format!("{cylinder:4},{head:2} "));
                for sector in sec_lo..=sec_hi {
                    let glyph = self.sectors.get(&PhysicalChs::new(cylinder, head, sector)).map(|ms| ms.status().glyph()).unwrap_or(' ');
                    out.push(glyph);
                }
                out.push('\n');
            }
        }
        out
    }

    /// One-line verdict: `NOTHING`, `COMPLETE`, `COMPLETE EXTRA`, or a
    /// `✓:N defects…` summary.
    pub fn summary(&self) -> String {
        let mut good = 0usize;
        let mut extra = 0usize;
        let mut defect_clusters: Vec<(u32, u32, u32, usize)> = Vec::new();

        for ms in self.sectors.values() {
            let status = ms.status();
            let defined = ms.flags.contains(MediaSectorFlags::DEFINED);
            if status.is_good() && defined {
                good += 1;
            }
            else if status.is_good() {
                extra += 1;
            }
            else {
                defect_clusters.push((ms.phys_chs.cylinder as u32, ms.phys_chs.head as u32, ms.phys_chs.sector as u32, 0));
            }
        }

        let mut parts = Vec::new();
        if good == 0 && extra == 0 {
            parts.push("NOTHING".to_string());
        }
        else if self.expected_count > 0 && good == self.expected_count {
            parts.push("COMPLETE".to_string());
            if extra > 0 {
                parts.push("EXTRA".to_string());
            }
        }
        else {
            let mut line = format!("✓:{good}");
            if !defect_clusters.is_empty() {
                let clusters = summarize_chs(defect_clusters);
                let rendered: Vec<String> = clusters.iter().map(|c| c.render()).collect();
                line.push_str(&format!(" defects {}", rendered.join(" ")));
            }
            parts.push(line);
        }
        if self.weird_am_count > 0 {
            parts.push(format!("AM!{}", self.weird_am_count));
        }
        parts.join("  ")
    }
}
