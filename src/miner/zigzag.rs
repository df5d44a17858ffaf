//! Zigzag miner: recurrent sequences of `K` alternating price extrema,
//! assessed for a significant forward return over a fixed holding horizon.

use std::sync::Arc;

use rayon::prelude::*;

use crate::errors::MiningError;
use crate::pattern::{MiningResult, PatternShape, ReturnStats, ZigzagElement, ZigzagPattern};
use crate::quote::{Bar, Series};
use crate::stats::{binomial_sign_p, students_t_p, summarise};

use super::{momentum_sign, AtomicScannedMask, Miner, ScannedMask};

/// Parameters for the zigzag miner. Validated once at construction.
#[derive(Debug, Clone)]
pub struct ZigzagMinerConfig {
    pub zigzags: usize,
    pub epsilon: usize,
    pub price_tolerance: f64,
    /// Absolute volume tolerance; disabled when `<= 0.0`.
    pub volume_tolerance: f64,
    pub time_tolerance: i64,
    /// Percentage of series positions usable as base patterns; disabled
    /// when `<= 0.0`.
    pub limit: f64,
    pub exit_after: usize,
    /// Lookback in bars for the momentum sign; disabled when `<= 0`.
    pub momentum_order: i64,
}

impl ZigzagMinerConfig {
    pub fn validate(self) -> Result<Self, MiningError> {
        if self.zigzags < 2 {
            return Err(MiningError::Invariant("zigzags must be >= 2".into()));
        }
        if self.epsilon < 1 {
            return Err(MiningError::Invariant("epsilon must be >= 1".into()));
        }
        if self.exit_after < 1 {
            return Err(MiningError::Invariant(
                "exit_after must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtremumKind {
    Minimum,
    Maximum,
}

/// `pos` is an extremum of `kind` if it is at least `eps` bars from either
/// end and no bar in its `±eps` neighbourhood strictly beats its close on
/// the wrong side of the comparison.
fn is_extremum(bars: &[Bar], pos: usize, eps: usize, kind: ExtremumKind) -> bool {
    let len = bars.len();
    if pos < eps || pos + eps + 1 > len {
        return false;
    }
    let lo = pos - eps;
    let hi = pos + eps;
    let target = bars[pos].close;
    for p in lo..=hi {
        if p == pos {
            continue;
        }
        let other = bars[p].close;
        let ok = match kind {
            ExtremumKind::Minimum => other >= target,
            ExtremumKind::Maximum => other <= target,
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Scan forward from `start` collecting the first `zigzags` extrema (min
/// or max, whichever the bar satisfies — minimum checked first). Returns
/// `None` if the series is exhausted before `zigzags` are collected.
fn extract_zigzag(bars: &[Bar], start: usize, zigzags: usize, eps: usize) -> Option<ZigzagPattern> {
    let mut elements = Vec::with_capacity(zigzags);
    let mut first_pos = None;
    let mut unit_price = 1.0;
    let mut unit_vol = 1.0;

    let mut pos = start;
    while pos < bars.len() && elements.len() < zigzags {
        let kind = if is_extremum(bars, pos, eps, ExtremumKind::Minimum) {
            Some(ExtremumKind::Minimum)
        } else if is_extremum(bars, pos, eps, ExtremumKind::Maximum) {
            Some(ExtremumKind::Maximum)
        } else {
            None
        };

        if let Some(kind) = kind {
            let is_minimum = kind == ExtremumKind::Minimum;
            match first_pos {
                None => {
                    unit_price = bars[pos].close;
                    unit_vol = bars[pos].volume as f64;
                    first_pos = Some(pos);
                    elements.push(ZigzagElement {
                        time_offset: 0,
                        price_ratio: 1.0,
                        volume_ratio: 1.0,
                        is_minimum,
                    });
                }
                Some(fp) => {
                    elements.push(ZigzagElement {
                        time_offset: (pos - fp) as i64,
                        price_ratio: bars[pos].close / unit_price,
                        volume_ratio: bars[pos].volume as f64 / unit_vol,
                        is_minimum,
                    });
                }
            }
        }
        pos += 1;
    }

    if elements.len() < zigzags {
        return None;
    }

    Some(ZigzagPattern {
        elements,
        momentum_sign: 0, // filled in by the caller, which knows the enumeration position
    })
}

/// Similarity predicate between a base zigzag and a candidate extracted at
/// `(scan_bars, sp)`.
fn similar(base: &ZigzagPattern, scan_bars: &[Bar], sp: usize, cfg: &ZigzagMinerConfig, tolerance: f64) -> bool {
    let Some(mut cand) = extract_zigzag(scan_bars, sp, cfg.zigzags, cfg.epsilon) else {
        return false;
    };
    cand.momentum_sign = momentum_sign(scan_bars, sp, cfg.momentum_order);

    if cand.momentum_sign != base.momentum_sign {
        return false;
    }

    for i in 0..base.len() {
        let b = &base.elements[i];
        let c = &cand.elements[i];
        if (c.price_ratio - b.price_ratio).abs() > tolerance {
            return false;
        }
        if cfg.volume_tolerance > 0.0 && (c.volume_ratio - b.volume_ratio).abs() > cfg.volume_tolerance {
            return false;
        }
        if (c.time_offset - b.time_offset).abs() > cfg.time_tolerance {
            return false;
        }
        if c.is_minimum != b.is_minimum {
            return false;
        }
    }

    true
}

pub struct ZigzagMiner {
    pub config: ZigzagMinerConfig,
}

impl ZigzagMiner {
    pub fn new(config: ZigzagMinerConfig) -> Self {
        ZigzagMiner { config }
    }
}

impl Miner for ZigzagMiner {
    fn mine(&self, series: &[Arc<Series>]) -> Vec<MiningResult> {
        let cfg = &self.config;
        let h = cfg.exit_after;
        let mut mask = ScannedMask::new(series);
        let mut results = Vec::new();

        for (b_idx, s_base) in series.iter().enumerate() {
            let base_bars = s_base.bars();
            let n_base = base_bars.len();
            if n_base == 0 {
                continue;
            }

            for pos in 0..n_base.saturating_sub(1) {
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

                let mut base_pattern = match extract_zigzag(base_bars, pos, cfg.zigzags, cfg.epsilon) {
                    Some(p) => p,
                    None => continue,
                };
                base_pattern.momentum_sign = momentum_sign(base_bars, pos, cfg.momentum_order);

                let price_min = base_pattern
                    .elements
                    .iter()
                    .map(|e| e.price_ratio)
                    .fold(f64::INFINITY, f64::min);
                let price_max = base_pattern
                    .elements
                    .iter()
                    .map(|e| e.price_ratio)
                    .fold(f64::NEG_INFINITY, f64::max);
                let tolerance = (price_max - price_min) * cfg.price_tolerance;

                let mut returns = Vec::new();

                for (s_idx, s_scan) in series.iter().enumerate() {
                    let scan_bars = s_scan.bars();
                    let n_scan = scan_bars.len();
                    if n_scan == 0 {
                        continue;
                    }

                    for sp in 0..n_scan.saturating_sub(1) {
                        if similar(&base_pattern, scan_bars, sp, cfg, tolerance) {
                            let last_offset = base_pattern.elements[base_pattern.len() - 1].time_offset;
                            let last_pos = sp as i64 + last_offset + cfg.epsilon as i64;
                            let exit_pos = last_pos + h as i64;
                            if last_pos < 0 || exit_pos < 0 {
                                continue;
                            }
                            let (last_pos, exit_pos) = (last_pos as usize, exit_pos as usize);
                            if exit_pos >= scan_bars.len() {
                                continue;
                            }
                            let last_close = scan_bars[last_pos].close;
                            let r = (scan_bars[exit_pos].close - last_close) / last_close;
                            returns.push(r);
                            mask.mark(mask.offset(s_idx) + sp);
                        }
                    }
                }

                if returns.len() >= 2 {
                    let summary = summarise(&returns);
                    let pos_p = binomial_sign_p(summary.pos_count, returns.len());
                    let mean_p = students_t_p(summary.mean, summary.sigma, returns.len());

                    results.push(MiningResult {
                        shape: PatternShape::Zigzag(base_pattern),
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
                            min_low: None,
                            max_high: None,
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
        let h = cfg.exit_after;
        let mask = AtomicScannedMask::new(series);

        let mut base_positions: Vec<(usize, usize)> = Vec::new();
        for (b_idx, s_base) in series.iter().enumerate() {
            let n_base = s_base.bars().len();
            if n_base == 0 {
                continue;
            }
            for pos in 0..n_base.saturating_sub(1) {
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
                let mut base_pattern = extract_zigzag(base_bars, pos, cfg.zigzags, cfg.epsilon)?;
                base_pattern.momentum_sign = momentum_sign(base_bars, pos, cfg.momentum_order);

                let price_min = base_pattern
                    .elements
                    .iter()
                    .map(|e| e.price_ratio)
                    .fold(f64::INFINITY, f64::min);
                let price_max = base_pattern
                    .elements
                    .iter()
                    .map(|e| e.price_ratio)
                    .fold(f64::NEG_INFINITY, f64::max);
                let tolerance = (price_max - price_min) * cfg.price_tolerance;

                let mut returns = Vec::new();

                for (s_idx, s_scan) in series.iter().enumerate() {
                    let scan_bars = s_scan.bars();
                    let n_scan = scan_bars.len();
                    if n_scan == 0 {
                        continue;
                    }

                    for sp in 0..n_scan.saturating_sub(1) {
                        if similar(&base_pattern, scan_bars, sp, cfg, tolerance) {
                            let last_offset = base_pattern.elements[base_pattern.len() - 1].time_offset;
                            let last_pos = sp as i64 + last_offset + cfg.epsilon as i64;
                            let exit_pos = last_pos + h as i64;
                            if last_pos < 0 || exit_pos < 0 {
                                continue;
                            }
                            let (last_pos, exit_pos) = (last_pos as usize, exit_pos as usize);
                            if exit_pos >= scan_bars.len() {
                                continue;
                            }
                            let last_close = scan_bars[last_pos].close;
                            let r = (scan_bars[exit_pos].close - last_close) / last_close;
                            returns.push(r);
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

                Some(MiningResult {
                    shape: PatternShape::Zigzag(base_pattern),
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
                        min_low: None,
                        max_high: None,
                        p: pos_p,
                    },
                })
            })
            .collect()
    }
}
