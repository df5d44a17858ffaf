//! The pattern-mining engine: two sibling miners sharing a common
//! enumerate / rescan / dedup skeleton.

pub mod candle;
pub mod zigzag;

use std::sync::Arc;

use crate::pattern::MiningResult;
use crate::quote::Series;

/// Per-global-position dedup mask, flat across series in concatenation
/// order. Owned by a single `mine()` call and discarded at its end.
///
/// Every matched position is marked scanned — including a base's own
/// position, since a base is trivially similar to itself — so later base
/// iterations skip positions already consumed by an earlier pattern.
pub struct ScannedMask {
    flags: Vec<bool>,
    /// Starting global offset of each series, in the order mining visits them.
    offsets: Vec<usize>,
}

impl ScannedMask {
    pub fn new(series: &[Arc<Series>]) -> Self {
        let mut offsets = Vec::with_capacity(series.len());
        let mut total = 0usize;
        for s in series {
            offsets.push(total);
            total += s.len();
        }
        ScannedMask {
            flags: vec![false; total],
            offsets,
        }
    }

    pub fn offset(&self, series_index: usize) -> usize {
        self.offsets[series_index]
    }

    pub fn is_scanned(&self, global_pos: usize) -> bool {
        self.flags[global_pos]
    }

    pub fn mark(&mut self, global_pos: usize) {
        self.flags[global_pos] = true;
    }
}

/// Atomic counterpart of [`ScannedMask`] for the opt-in parallel
/// base-iteration mode (see design note §9 option (a) in SPEC_FULL.md):
/// reads are used only for base-skip decisions and writes carry no
/// cross-thread ordering guarantee, so dedup under this mode is
/// opportunistic rather than exact.
pub struct AtomicScannedMask {
    flags: Vec<std::sync::atomic::AtomicBool>,
    offsets: Vec<usize>,
}

impl AtomicScannedMask {
    pub fn new(series: &[Arc<Series>]) -> Self {
        let mut offsets = Vec::with_capacity(series.len());
        let mut total = 0usize;
        for s in series {
            offsets.push(total);
            total += s.len();
        }
        let flags = (0..total)
            .map(|_| std::sync::atomic::AtomicBool::new(false))
            .collect();
        AtomicScannedMask { flags, offsets }
    }

    pub fn offset(&self, series_index: usize) -> usize {
        self.offsets[series_index]
    }

    pub fn is_scanned(&self, global_pos: usize) -> bool {
        self.flags[global_pos].load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn mark(&self, global_pos: usize) {
        self.flags[global_pos].store(true, std::sync::atomic::Ordering::Relaxed);
    }
}

/// Common interface over the candle and zigzag miners, dispatched as a
/// tagged enum by the orchestrator rather than a trait object — both
/// miners' `mine()` signatures agree exactly, so there is no need to pay
/// for dynamic dispatch on the single hot call per invocation.
pub trait Miner {
    /// Mine every series, in the given order, for recurrent patterns.
    /// Result emission order is the order base positions are visited:
    /// outer series in the given order, inner positions ascending,
    /// skipping positions already marked scanned.
    fn mine(&self, series: &[Arc<Series>]) -> Vec<MiningResult>;

    /// Parallel variant: base-pattern iterations across every series run
    /// concurrently. See [`AtomicScannedMask`] — this does not reproduce
    /// `mine()`'s exact dedup/ordering guarantees.
    fn mine_parallel(&self, series: &[Arc<Series>]) -> Vec<MiningResult>;
}

/// Holding-horizon forward-return accumulation for a candle miner match:
/// the exit return and the min/max excursion over the horizon.
pub struct MatchReturn {
    pub r: f64,
    pub low_excursion: f64,
    pub high_excursion: f64,
}

/// Momentum sign at anchor `s`, shared by both miners: `0` when disabled
/// (`m <= 0`) or out of range (`s < m`), otherwise the sign of
/// `series[s-m].close - series[s].open`, with ties (and negative
/// differences) resolving to `-1`.
pub fn momentum_sign(bars: &[crate::quote::Bar], s: usize, m: i64) -> i8 {
    if m <= 0 {
        return 0;
    }
    let m = m as usize;
    if s < m {
        return 0;
    }
    let diff = bars[s - m].close - bars[s].open;
    if diff > 0.0 {
        1
    } else {
        -1
    }
}

/// Compute the candle miner's forward return and min/max excursion over
/// `[sp + anchor_len, sp + anchor_len + horizon)`, for a match whose
/// pattern window ends at `sp + anchor_len - 1`. The zigzag miner's return
/// is anchored to the last zigzag vertex rather than an `anchor_len`-wide
/// window and is computed inline in `miner::zigzag`, not through here.
pub fn compute_match_return(
    bars: &[crate::quote::Bar],
    sp: usize,
    anchor_len: usize,
    horizon: usize,
) -> MatchReturn {
    let entry_idx = sp + anchor_len;
    let entry = bars[entry_idx].open;
    let exit_idx = sp + anchor_len + horizon - 1;
    let exit = bars[exit_idx].close;
    let r = (exit - entry) / entry;

    let mut low_r = f64::INFINITY;
    let mut high_r = f64::NEG_INFINITY;
    for k in 0..horizon {
        let bar = &bars[entry_idx + k];
        low_r = low_r.min((bar.low - entry) / entry);
        high_r = high_r.max((bar.high - entry) / entry);
    }

    MatchReturn {
        r,
        low_excursion: low_r,
        high_excursion: high_r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::Bar;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar {
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 1,
            time: (0, 0),
        }
    }

    #[test]
    fn scanned_mask_tracks_offsets_and_marks() {
        let a = Arc::new(Series::new("a", vec![bar(1.0, 1.0, 1.0, 1.0); 5]));
        let b = Arc::new(Series::new("b", vec![bar(1.0, 1.0, 1.0, 1.0); 3]));
        let series = vec![a, b];
        let mut mask = ScannedMask::new(&series);
        assert_eq!(mask.offset(0), 0);
        assert_eq!(mask.offset(1), 5);
        assert!(!mask.is_scanned(6));
        mask.mark(6);
        assert!(mask.is_scanned(6));
        assert!(!mask.is_scanned(5));
    }

    #[test]
    fn compute_match_return_basic() {
        let bars = vec![
            bar(1.0, 1.0, 1.0, 1.0),
            bar(1.0, 1.0, 1.0, 1.0),
            bar(2.0, 2.5, 1.5, 2.0),
        ];
        let mr = compute_match_return(&bars, 0, 2, 1);
        assert_eq!(mr.r, 0.0); // entry = open of bar 2 = 2.0, exit = close of bar 2 = 2.0
        assert_eq!(mr.low_excursion, (1.5 - 2.0) / 2.0);
        assert_eq!(mr.high_excursion, (2.5 - 2.0) / 2.0);
    }
}
