// Shared helpers for the crate-level integration tests. This crate has no
// bundled disk-image fixtures, so every scenario builds
// its flux intervals programmatically: assemble a cell-string byte
// sequence with `fluxrecover::pattern`, rewrite it back into the flux
// intervals that would reproduce it, then frame those intervals as a
// minimal KryoFlux stream file and hand it to `Stream::parse`.

use fluxrecover::cellstring::TRANSITION;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Invert a run of cell-string symbols into the flux intervals that would
/// reproduce it at `rate`: every symbol is worth `rate/2` sample clocks,
/// so a run of `n` symbols ending in a transition is `n * rate/2` ticks.
/// Mirrors `src/clock.rs`'s `symbols_to_intervals` test helper, which is
/// `pub(crate)` and so not reachable from here.
pub fn symbols_to_intervals(symbols: &[u8], rate: f64) -> Vec<u32> {
    let unit = rate / 2.0;
    let mut out = Vec::new();
    let mut run = 0usize;
    for &s in symbols {
        run += 1;
        if s == TRANSITION {
            out.push((run as f64 * unit).round() as u32);
            run = 0;
        }
    }
    out
}

/// Frame a list of flux intervals as a minimal KryoFlux stream-frame byte
/// sequence, using the 2-byte `flux2` opcode for every
/// interval. Every interval built by these tests comfortably fits the
/// flux2 range (`high <= 7`), so there is no need to pick the shortest
/// per-value encoding or emit overflow blocks.
pub fn encode_stream(intervals: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(intervals.len() * 2);
    for &value in intervals {
        assert!(value < 0x0800, "interval {value} exceeds this test encoder's flux2 range");
        out.push((value >> 8) as u8);
        out.push((value & 0xff) as u8);
    }
    out
}
