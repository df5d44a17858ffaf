//! Candle miner: recurrent shapes of `L` consecutive bars, assessed for a
//! significant forward return over a fixed holding horizon.

use std::sync::Arc;

use rayon::prelude::*;

use crate::errors::MiningError;
use crate::pattern::{CandleFitElement, CandlePattern, MiningResult, PatternShape, ReturnStats};
use crate::quote::{Bar, Series};
use crate::stats::{binomial_sign_p, students_t_p, summarise};

use super::{compute_match_return, momentum_sign, AtomicScannedMask, Miner, ScannedMask};

/// Parameters for the candle miner. Validated once at construction —
/// invalid values are a fatal `InvariantError`, not a best-effort clamp.
#[derive(Debug, Clone)]
pub struct CandleMinerConfig {
    pub pattern_length: usize,
    pub candle_tolerance: f64,
    /// Absolute volume tolerance; disabled when `<= 0.0`.
    pub volume_tolerance: f64,
    /// Percentage of series positions usable as base patterns; disabled
    /// when `<= 0.0`.
    pub limit: f64,
    pub exit_after: usize,
    /// Lookback in bars for the momentum sign; disabled when `<= 0`.
    pub momentum_order: i64,
    pub fit_signatures: bool,
}

impl CandleMinerConfig {
    pub fn validate(self) -> Result<Self, MiningError> {
        if !(2..=31).contains(&self.pattern_length) {
            return Err(MiningError::Invariant(format!(
                "pattern_length must be in [2,31], got {}",
                self.pattern_length
            )));
        }
        if self.candle_tolerance < 0.0 {
            return Err(MiningError::Invariant(
                "candle_tolerance must be non-negative".into(),
            ));
        }
        if self.exit_after < 1 {
            return Err(MiningError::Invariant(
                "exit_after must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

/// Normalise `L` bars starting at `s`, anchor-relative: open/high/low/close
/// become ratios to `series[s].open`, volume becomes a ratio to
/// `series[s].volume`.
fn normalise(bars: &[Bar], s: usize, len: usize) -> Vec<CandleFitElement> {
    let anchor = &bars[s];
    (0..len)
        .map(|i| {
            let bar = &bars[s + i];
            CandleFitElement {
                open: bar.open / anchor.open,
                high: bar.high / anchor.open,
                low: bar.low / anchor.open,
                close: bar.close / anchor.open,
                volume: bar.volume as f64 / anchor.volume as f64,
            }
        })
        .collect()
}

/// The total ordering of the `4*L` OHLC price levels in the window
/// `[s, s+len)`, encoded as a concatenation of `{O,H,L,C}<index>` tags
/// sorted by price ascending (ties broken by tag string ascending).
fn signature(bars: &[Bar], s: usize, len: usize) -> String {
    let mut entries: Vec<(f64, String)> = Vec::with_capacity(len * 4);
    for i in 0..len {
        let bar = &bars[s + i];
        entries.push((bar.open, format!("O{i}")));
        entries.push((bar.high, format!("H{i}")));
        entries.push((bar.low, format!("L{i}")));
        entries.push((bar.close, format!("C{i}")));
    }
    entries.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    entries.into_iter().map(|(_, tag)| tag).collect()
}

fn build_pattern(bars: &[Bar], s: usize, len: usize, momentum_order: i64, fit_signatures: bool) -> CandlePattern {
    CandlePattern {
        elements: normalise(bars, s, len),
        momentum_sign: momentum_sign(bars, s, momentum_order),
        signature: if fit_signatures {
            Some(signature(bars, s, len))
        } else {
            None
        },
    }
}

/// Similarity predicate between two normalised candle patterns of equal
/// length.
fn similar(base: &CandlePattern, cand: &CandlePattern, tau_c: f64, tau_v: f64) -> bool {
    if base.momentum_sign != cand.momentum_sign {
        return false;
    }

    let len = base.len();
    let amp = (0..len)
        .map(|i| base.elements[i].high.max(cand.elements[i].high))
        .fold(f64::NEG_INFINITY, f64::max)
        - (0..len)
            .map(|i| base.elements[i].low.min(cand.elements[i].low))
            .fold(f64::INFINITY, f64::min);
    let tau = amp * tau_c;

    for i in 0..len {
        let a = &base.elements[i];
        let b = &cand.elements[i];
        if (a.open - b.open).abs() > tau
            || (a.close - b.close).abs() > tau
            || (a.high - b.high).abs() > tau
            || (a.low - b.low).abs() > tau
        {
            return false;
        }
        if (a.open - a.close) * (b.open - b.close) < 0.0 {
            return false;
        }
    }

    if let (Some(bs), Some(cs)) = (&base.signature, &cand.signature) {
        if bs != cs {
            return false;
        }
    }

    if tau_v > 0.0 {
        for i in 0..len {
            if (base.elements[i].volume - cand.elements[i].volume).abs() > tau_v {
                return false;
            }
        }
    }

    true
}

pub struct CandleMiner {
    pub config: CandleMinerConfig,
}

impl CandleMiner {
    pub fn new(config: CandleMinerConfig) -> Self {
        CandleMiner { config }
    }
}

impl Miner for CandleMiner {
    fn mine(&self, series: &[Arc<Series>]) -> Vec<MiningResult> {
        let cfg = &self.config;
        let len = cfg.pattern_length;
        let h = cfg.exit_after;
        let mut mask = ScannedMask::new(series);
        let mut results = Vec::new();

        for (b_idx, s_base) in series.iter().enumerate() {
            let base_bars = s_base.bars();
            let n_base = base_bars.len();
            if n_base < len + h {
                continue;
            }
            let last_base_pos = n_base - len - h;

            for pos in 0..last_base_pos {
                if cfg.limit > 0.0 {
                    let pct = pos as f64 / n_base as f64 * 100.0;
                    if pct > cfg.limit {
                        break;
                    }
                }

                let base_global = mask.offset(b_idx) + pos;
                if mask.is_scanned(base_global) {
                    continue;
                }

                let base_pattern = build_pattern(
                    base_bars,
                    pos,
                    len,
                    cfg.momentum_order,
                    cfg.fit_signatures,
                );

                let mut returns = Vec::new();
                let mut low_returns = Vec::new();
                let mut high_returns = Vec::new();

                for (s_idx, s_scan) in series.iter().enumerate() {
                    let scan_bars = s_scan.bars();
                    let n_scan = scan_bars.len();
                    if n_scan < len + h {
                        continue;
                    }
                    let last_scan_pos = n_scan - len - h;

                    for sp in 0..last_scan_pos {
                        let cand_pattern = build_pattern(
                            scan_bars,
                            sp,
                            len,
                            cfg.momentum_order,
                            cfg.fit_signatures,
                        );

                        if similar(&base_pattern, &cand_pattern, cfg.candle_tolerance, cfg.volume_tolerance)
                        {
                            let mr = compute_match_return(scan_bars, sp, len, h);
                            returns.push(mr.r);
                            low_returns.push(mr.low_excursion);
                            high_returns.push(mr.high_excursion);
                            mask.mark(mask.offset(s_idx) + sp);
                        }
                    }
                }

                if returns.len() >= 2 {
                    let summary = summarise(&returns);
                    let pos_p = binomial_sign_p(summary.pos_count, returns.len());
                    let mean_p = students_t_p(summary.mean, summary.sigma, returns.len());
                    let min_low = low_returns
                        .iter()
                        .cloned()
                        .fold(f64::INFINITY, f64::min);
                    let max_high = high_returns
                        .iter()
                        .cloned()
                        .fold(f64::NEG_INFINITY, f64::max);

                    results.push(MiningResult {
                        shape: PatternShape::Candle(base_pattern),
                        stats: ReturnStats {
                            count: returns.len(),
                            mean: summary.mean,
                            sigma: summary.sigma,
                            mean_p,
                            mean_pos: summary.mean_pos,
                            mean_neg: summary.mean_neg,
                            pos_returns: summary.pos_count,
                            neg_returns: summary.neg_count,
                            min_return: summary.min,
                            max_return: summary.max,
                            median: summary.median,
                            min_low: Some(min_low),
                            max_high: Some(max_high),
                            p: pos_p,
                        },
                    });
                }
            }
        }

        results
    }

    fn mine_parallel(&self, series: &[Arc<Series>]) -> Vec<MiningResult> {
        let cfg = &self.config;
        let len = cfg.pattern_length;
        let h = cfg.exit_after;
        let mask = AtomicScannedMask::new(series);

        let mut base_positions: Vec<(usize, usize)> = Vec::new();
        for (b_idx, s_base) in series.iter().enumerate() {
            let n_base = s_base.bars().len();
            if n_base < len + h {
                continue;
            }
            let last_base_pos = n_base - len - h;
            for pos in 0..last_base_pos {
                if cfg.limit > 0.0 {
                    let pct = pos as f64 / n_base as f64 * 100.0;
                    if pct > cfg.limit {
                        break;
                    }
                }
                base_positions.push((b_idx, pos));
            }
        }

        base_positions
            .into_par_iter()
            .filter_map(|(b_idx, pos)| {
                let base_global = mask.offset(b_idx) + pos;
                if mask.is_scanned(base_global) {
                    return None;
                }

                let base_bars = series[b_idx].bars();
                let base_pattern = build_pattern(
                    base_bars,
                    pos,
                    len,
                    cfg.momentum_order,
                    cfg.fit_signatures,
                );

                let mut returns = Vec::new();
                let mut low_returns = Vec::new();
                let mut high_returns = Vec::new();

                for (s_idx, s_scan) in series.iter().enumerate() {
                    let scan_bars = s_scan.bars();
                    let n_scan = scan_bars.len();
                    if n_scan < len + h {
                        continue;
                    }
                    let last_scan_pos = n_scan - len - h;

                    for sp in 0..last_scan_pos {
                        let cand_pattern = build_pattern(
                            scan_bars,
                            sp,
                            len,
                            cfg.momentum_order,
                            cfg.fit_signatures,
                        );

                        if similar(&base_pattern, &cand_pattern, cfg.candle_tolerance, cfg.volume_tolerance)
                        {
                            let mr = compute_match_return(scan_bars, sp, len, h);
                            returns.push(mr.r);
                            low_returns.push(mr.low_excursion);
                            high_returns.push(mr.high_excursion);
                            mask.mark(mask.offset(s_idx) + sp);
                        }
                    }
                }

                if returns.len() < 2 {
                    return None;
                }

                let summary = summarise(&returns);
                let pos_p = binomial_sign_p(summary.pos_count, returns.len());
                let mean_p = students_t_p(summary.mean, summary.sigma, returns.len());
                let min_low = low_returns.iter().cloned().fold(f64::INFINITY, f64::min);
                let max_high = high_returns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

                Some(MiningResult {
                    shape: PatternShape::Candle(base_pattern),
                    stats: ReturnStats {
                        count: returns.len(),
                        mean: summary.mean,
                        sigma: summary.sigma,
                        mean_p,
                        mean_pos: summary.mean_pos,
                        mean_neg: summary.mean_neg,
                        pos_returns: summary.pos_count,
                        neg_returns: summary.neg_count,
                        min_return: summary.min,
                        max_return: summary.max,
                        median: summary.median,
                        min_low: Some(min_low),
                        max_high: Some(max_high),
                        p: pos_p,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::Bar;

    fn flat_bar(price: f64, volume: u64) -> Bar {
        Bar {
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            time: (0, 0),
        }
    }

    fn alternating_series(n: usize) -> Series {
        let bars: Vec<Bar> = (0..n)
            .map(|i| if i % 2 == 0 { flat_bar(1.0, 1000) } else { flat_bar(2.0, 1000) })
            .collect();
        Series::new("alt", bars)
    }

    fn monotonic_series(n: usize) -> Series {
        let bars: Vec<Bar> = (0..n)
            .map(|i| {
                let p = (i + 1) as f64;
                Bar {
                    open: p,
                    high: p,
                    low: p,
                    close: p,
                    volume: 1,
                    time: (0, 0),
                }
            })
            .collect();
        Series::new("mono", bars)
    }

    #[test]
    fn normalisation_anchor_open_is_one() {
        let series = monotonic_series(10);
        let pattern = normalise(series.bars(), 3, 4);
        assert_eq!(pattern[0].open, 1.0);
        for el in &pattern {
            assert!(el.open >= 0.0 && el.high >= 0.0 && el.low >= 0.0 && el.close >= 0.0);
        }
    }

    #[test]
    fn normalisation_round_trips() {
        let series = monotonic_series(10);
        let anchor = series.get(3).unwrap();
        let pattern = normalise(series.bars(), 3, 4);
        for (i, el) in pattern.iter().enumerate() {
            let bar = series.get(3 + i).unwrap();
            assert!((el.open * anchor.open - bar.open).abs() < 1e-9);
            assert!((el.volume * anchor.volume as f64 - bar.volume as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn momentum_zero_when_disabled_or_out_of_range() {
        let series = monotonic_series(10);
        assert_eq!(momentum_sign(series.bars(), 5, -1), 0);
        assert_eq!(momentum_sign(series.bars(), 5, 0), 0);
        assert_eq!(momentum_sign(series.bars(), 1, 5), 0); // s < m
    }

    #[test]
    fn momentum_zero_never_matches_nonzero() {
        let base = CandlePattern {
            elements: normalise(monotonic_series(5).bars(), 0, 2),
            momentum_sign: 0,
            signature: None,
        };
        let cand = CandlePattern {
            elements: normalise(monotonic_series(5).bars(), 0, 2),
            momentum_sign: 1,
            signature: None,
        };
        assert!(!similar(&base, &cand, 100.0, -1.0));
    }

    #[test]
    fn signature_is_stable_under_positive_scaling() {
        let s1 = monotonic_series(6);
        let bars1 = s1.bars();
        let sig1 = signature(bars1, 0, 3);

        // Build a second series with every price multiplied by 10 — the
        // total ordering of O/H/L/C levels is unchanged.
        let bars2: Vec<Bar> = bars1
            .iter()
            .map(|b| Bar {
                open: b.open * 10.0,
                high: b.high * 10.0,
                low: b.low * 10.0,
                close: b.close * 10.0,
                volume: b.volume,
                time: b.time,
            })
            .collect();
        let sig2 = signature(&bars2, 0, 3);
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn similarity_is_reflexive_without_signature_or_momentum() {
        let bars = monotonic_series(10);
        let pattern = CandlePattern {
            elements: normalise(bars.bars(), 2, 3),
            momentum_sign: 0,
            signature: None,
        };
        assert!(similar(&pattern, &pattern.clone(), 0.1, -1.0));
    }

    #[test]
    fn alternating_series_single_result_with_zero_returns() {
        let series = Arc::new(alternating_series(20));
        let miner = CandleMiner::new(
            CandleMinerConfig {
                pattern_length: 2,
                candle_tolerance: 0.01,
                volume_tolerance: -1.0,
                limit: -1.0,
                exit_after: 1,
                momentum_order: -1,
                fit_signatures: false,
            }
            .validate()
            .unwrap(),
        );
        let results = miner.mine(&[series]);
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.stats.count, 9);
        assert_eq!(r.stats.mean, 0.0);
        assert_eq!(r.stats.sigma, 0.0);
        assert_eq!(r.stats.pos_returns, 0);
        assert_eq!(r.stats.neg_returns, 9);
    }

    #[test]
    fn monotonic_series_yields_nonnegative_returns() {
        let series = Arc::new(monotonic_series(20));
        let miner = CandleMiner::new(
            CandleMinerConfig {
                pattern_length: 2,
                candle_tolerance: 0.5,
                volume_tolerance: -1.0,
                limit: -1.0,
                exit_after: 1,
                momentum_order: -1,
                fit_signatures: false,
            }
            .validate()
            .unwrap(),
        );
        let results = miner.mine(&[series]);
        assert!(!results.is_empty());
        for r in &results {
            assert!(r.stats.min_return >= 0.0);
            assert_eq!(r.stats.pos_returns, r.stats.count);
        }
    }

    #[test]
    fn identical_series_doubles_count() {
        let s1 = Arc::new(alternating_series(20));
        let s2 = Arc::new(alternating_series(20));
        let make_miner = || {
            CandleMiner::new(
                CandleMinerConfig {
                    pattern_length: 2,
                    candle_tolerance: 0.01,
                    volume_tolerance: -1.0,
                    limit: -1.0,
                    exit_after: 1,
                    momentum_order: -1,
                    fit_signatures: false,
                }
                .validate()
                .unwrap(),
            )
        };
        let single = make_miner().mine(&[s1.clone()]);
        let doubled = make_miner().mine(&[s1, s2]);
        assert_eq!(single.len(), doubled.len());
        assert_eq!(doubled[0].stats.count, single[0].stats.count * 2);
    }

    #[test]
    fn limit_at_100_matches_disabled_limit() {
        let series = Arc::new(alternating_series(20));
        let make = |limit: f64| {
            CandleMiner::new(
                CandleMinerConfig {
                    pattern_length: 2,
                    candle_tolerance: 0.01,
                    volume_tolerance: -1.0,
                    limit,
                    exit_after: 1,
                    momentum_order: -1,
                    fit_signatures: false,
                }
                .validate()
                .unwrap(),
            )
        };
        let unlimited = make(-1.0).mine(&[series.clone()]);
        let at_100 = make(100.0).mine(&[series]);
        assert_eq!(unlimited, at_100);
    }

    #[test]
    fn small_limit_restricts_base_positions_scanned() {
        let series = Arc::new(alternating_series(20));
        let make = |limit: f64| {
            CandleMiner::new(
                CandleMinerConfig {
                    pattern_length: 2,
                    candle_tolerance: 0.01,
                    volume_tolerance: -1.0,
                    limit,
                    exit_after: 1,
                    momentum_order: -1,
                    fit_signatures: false,
                }
                .validate()
                .unwrap(),
            )
        };
        let unlimited = make(-1.0).mine(&[series.clone()]);
        let tight = make(1.0).mine(&[series]);
        // A tight limit only lets the very first base position through,
        // so it can only ever find as many matches as the unlimited run's
        // single pattern (never more).
        assert!(tight.iter().map(|r| r.stats.count).sum::<usize>() <= unlimited.iter().map(|r| r.stats.count).sum());
    }

    #[test]
    fn invalid_pattern_length_is_rejected() {
        let cfg = CandleMinerConfig {
            pattern_length: 1,
            candle_tolerance: 0.1,
            volume_tolerance: -1.0,
            limit: -1.0,
            exit_after: 1,
            momentum_order: -1,
            fit_signatures: false,
        };
        assert!(cfg.validate().is_err());
    }

    fn alternating_series_with_high(n: usize, high: f64) -> Series {
        let bars: Vec<Bar> = (0..n)
            .map(|i| if i % 2 == 0 { flat_bar(1.0, 1000) } else { flat_bar(high, 1000) })
            .collect();
        Series::new("alt", bars)
    }

    #[test]
    fn mine_parallel_matches_mine_result_set_when_series_dont_overlap() {
        // Two series whose normalised shapes are distinct enough (2.0 vs
        // 1.5, with a tight tolerance) that neither ever matches the
        // other's base, and `limit` restricts each series to a single
        // candidate base position — so base selection can never race
        // across threads and both miners must agree exactly.
        let s_a = Arc::new(alternating_series_with_high(20, 2.0));
        let s_b = Arc::new(alternating_series_with_high(20, 1.5));
        let series = vec![s_a, s_b];

        let miner = CandleMiner::new(
            CandleMinerConfig {
                pattern_length: 2,
                candle_tolerance: 0.01,
                volume_tolerance: -1.0,
                limit: 0.01,
                exit_after: 1,
                momentum_order: -1,
                fit_signatures: false,
            }
            .validate()
            .unwrap(),
        );

        let mut seq = miner.mine(&series);
        let mut par = miner.mine_parallel(&series);

        let key = |r: &MiningResult| -> (usize, i64) {
            let close_key = match &r.shape {
                PatternShape::Candle(p) => (p.elements[1].close * 1000.0).round() as i64,
                PatternShape::Zigzag(_) => 0,
            };
            (r.stats.count, close_key)
        };
        seq.sort_by_key(&key);
        par.sort_by_key(&key);

        assert_eq!(seq.len(), 2);
        assert_eq!(seq, par);
    }
}
