/*
    fluxrecover

    src/image.rs

    Output image and DDHF bitstore metadata rendering. Pure functions over an
    already-populated [`Media`] - no file-I/O driving CLI, matching the
    "library implements the format, the caller drives it" split already used
    by `cache`.
*/

use crate::chsset::{summarize_chs, ChsCluster};
use crate::media::Media;

const UNREAD_MARK: &[u8] = b"_UNREAD_";

/// `length` bytes of the literal ASCII marker `_UNREAD_`, repeated and
/// truncated to fit.
fn unread_fill(length: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(length);
    while out.len() < length {
        let remaining = length - out.len();
        if remaining >= UNREAD_MARK.len() {
            out.extend_from_slice(UNREAD_MARK);
        }
        else {
            out.extend_from_slice(&UNREAD_MARK[..remaining]);
        }
    }
    out
}

/// Concatenate every sector's majority payload in `(cylinder, head, sector)`
/// order; sectors with no majority are filled with [`unread_fill`].
pub fn build_image(media: &Media) -> Vec<u8> {
    let mut out = Vec::new();
    for sector in media.sectors() {
        match sector.majority_payload() {
            Some(payload) => out.extend_from_slice(payload),
            None => out.extend_from_slice(&unread_fill(sector.sector_length.unwrap_or(0))),
        }
    }
    out
}

fn sector_cuboid_length(sector: &crate::media::MediaSector) -> usize {
    sector.sector_length.unwrap_or_else(|| sector.readings.first().map(ReadSectorLen::len).unwrap_or(0))
}

/// Tiny local shim so `sector_cuboid_length` doesn't need to import
/// `ReadSector` just for its `len`.
trait ReadSectorLen {
    fn len(&self) -> usize;
}
impl ReadSectorLen for crate::sector::ReadSector {
    fn len(&self) -> usize {
        self.octets.len()
    }
}

fn geometry_clusters(media: &Media) -> Vec<ChsCluster> {
    let tuples = media
        .sectors()
        .map(|s| (s.phys_chs.cylinder as u32, s.phys_chs.head as u32, s.phys_chs.sector as u32, sector_cuboid_length(s)))
        .collect();
    summarize_chs(tuples)
}

fn bad_sector_clusters(media: &Media) -> Vec<ChsCluster> {
    let tuples = media
        .sectors()
        .filter(|s| !s.status().is_good())
        .map(|s| (s.phys_chs.cylinder as u32, s.phys_chs.head as u32, s.phys_chs.sector as u32, sector_cuboid_length(s)))
        .collect();
    summarize_chs(tuples)
}

/// Fields an operator may supply, overriding the defaults derived from
/// `media` and the capture directory name.
pub struct MetadataOptions<'a> {
    pub dirname: &'a str,
    pub format_name: &'a str,
    pub summary_override: Option<&'a str>,
    pub description_lines: &'a [String],
}

/// Render the DDHF bitstore metadata text block.
pub fn build_metadata(media: &Media, options: &MetadataOptions) -> String {
    let mut out = String::new();
    out.push_str("BitStore.Metadata_version:\n\t1.0\n\n");
    out.push_str("BitStore.Access:\n\tpublic\n\n");
    out.push_str(&format!("BitStore.Filename:\n\t{}.BIN\n\n", options.dirname));
    out.push_str("BitStore.Format:\n\tBINARY\n\n");

    out.push_str("Media.Geometry:\n");
    for cluster in geometry_clusters(media) {
        out.push_str(&format!("\t{}\n", cluster.render()));
    }
    out.push('\n');

    out.push_str(&format!("Media.Summary:\n\t{}\n\n", options.summary_override.unwrap_or(options.dirname)));

    out.push_str("Media.Description:\n");
    out.push_str(&format!("\tFloppyTools format: {}\n", options.format_name));
    for line in options.description_lines {
        out.push_str(&format!("\t{line}\n"));
    }
    out.push_str("\tBad (unread) sectors:\n");
    let bad = bad_sector_clusters(media);
    if bad.is_empty() {
        out.push_str("\t\tnone\n");
    }
    else {
        for cluster in bad {
            out.push_str(&format!("\t\t{}\n", cluster.render()));
        }
    }
    out.push('\n');

    out.push_str("*END*\n");
    out
}
