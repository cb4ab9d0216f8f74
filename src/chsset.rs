/*
    fluxrecover

    src/chsset.rs

    CHS-set summarizer (C6). Compresses lists of (cylinder, head, sector,
    length) tuples into compact cluster expressions: sort, then three passes
    of pairwise merging over (sector, head, cylinder) in that order, merging
    adjacent clusters that agree on every other axis and together form a
    contiguous interval on the pivot axis.
*/

use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Render a set of integers as `n`, `{lo-hi}`, or `{a,b,c-d,...}`.
pub fn summarize_ints(values: &BTreeSet<u32>) -> String {
    if values.is_empty() {
        return String::new();
    }
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &v in values {
        match runs.last_mut() {
            Some((_, hi)) if *hi + 1 == v => *hi = v,
            _ => runs.push((v, v)),
        }
    }
    if runs.len() == 1 && runs[0].0 == runs[0].1 {
        return runs[0].0.to_string();
    }
    let mut parts = Vec::new();
    for (lo, hi) in runs {
        if lo == hi {
            parts.push(lo.to_string());
        }
        else if lo + 1 == hi {
            parts.push(lo.to_string());
            parts.push(hi.to_string());
        }
        else {
            parts.push(format!("{lo}-{hi}"));
        }
    }
    format!("{{{}}}", parts.join(","))
}

/// One (cylinder-set × head-set × sector-set) hyperrectangle sharing a
/// single payload length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChsCluster {
    pub cylinders: BTreeSet<u32>,
    pub heads: BTreeSet<u32>,
    pub sectors: BTreeSet<u32>,
    pub payload_len: usize,
}

impl ChsCluster {
    /// Render as `c{lo-hi}h{lo-hi}s{lo-hi}{len}b`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        write!(
            out,
            "c{}h{}s{}{}b",
            summarize_ints(&self.cylinders),
            summarize_ints(&self.heads),
            summarize_ints(&self.sectors),
            self.payload_len
        )
        .unwrap();
        out
    }
}

/// Merge a sorted list of singleton (c, h, s, len) tuples into the smallest
/// set of [`ChsCluster`]s, via three passes of pairwise adjacent merging -
/// one per pivot axis, in the order sector, head, cylinder (matching
/// `CHSSet.seq`'s `for pivot in (2, 1, 0)`).
pub fn summarize_chs(mut tuples: Vec<(u32, u32, u32, usize)>) -> Vec<ChsCluster> {
    tuples.sort_unstable();
    tuples.dedup();

    let mut clusters: Vec<ChsCluster> = tuples
        .into_iter()
        .map(|(c, h, s, len)| ChsCluster {
            cylinders: BTreeSet::from([c]),
            heads: BTreeSet::from([h]),
            sectors: BTreeSet::from([s]),
            payload_len: len,
        })
        .collect();

    for pivot in [2usize, 1, 0] {
        let mut merged: Vec<ChsCluster> = Vec::new();
        'outer: for cluster in clusters {
            if pivot == 2 {
                for existing in merged.iter_mut() {
                    if existing.cylinders == cluster.cylinders
                        && existing.heads == cluster.heads
                        && existing.payload_len == cluster.payload_len
                        && contiguous_union(&existing.sectors, &cluster.sectors)
                    {
                        existing.sectors = existing.sectors.union(&cluster.sectors).copied().collect();
                        continue 'outer;
                    }
                }
            }
            else if pivot == 1 {
                for existing in merged.iter_mut() {
                    if existing.cylinders == cluster.cylinders
                        && existing.sectors == cluster.sectors
                        && existing.payload_len == cluster.payload_len
                        && contiguous_union(&existing.heads, &cluster.heads)
                    {
                        existing.heads = existing.heads.union(&cluster.heads).copied().collect();
                        continue 'outer;
                    }
                }
            }
            else {
                for existing in merged.iter_mut() {
                    if existing.heads == cluster.heads
                        && existing.sectors == cluster.sectors
                        && existing.payload_len == cluster.payload_len
                        && contiguous_union(&existing.cylinders, &cluster.cylinders)
                    {
                        existing.cylinders = existing.cylinders.union(&cluster.cylinders).copied().collect();
                        continue 'outer;
                    }
                }
            }
            merged.push(cluster);
        }
        clusters = merged;
    }

    clusters
}

/// True if the union of two (already-contiguous) sets of integers would
/// itself be contiguous - i.e. the sets are adjacent or overlapping.
fn contiguous_union(a: &BTreeSet<u32>, b: &BTreeSet<u32>) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    let (a_lo, a_hi) = (*a.first().unwrap(), *a.last().unwrap());
    let (b_lo, b_hi) = (*b.first().unwrap(), *b.last().unwrap());
    !(a_hi + 1 < b_lo || b_hi + 1 < a_lo)
}
