//! Drives a chosen miner over a configured list of series, filters and
//! sorts the results, and hands them to a report sink.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::MiningError;
use crate::miner::candle::{CandleMiner, CandleMinerConfig};
use crate::miner::zigzag::{ZigzagMiner, ZigzagMinerConfig};
use crate::miner::Miner;
use crate::pattern::MiningResult;
use crate::quote::Series;
use crate::report::{ReportDestination, ReportSink};

/// Which miner the orchestrator should run.
pub enum MinerKind {
    Candle(CandleMinerConfig),
    Zigzag(ZigzagMinerConfig),
}

/// Filter thresholds applied after mining and before reporting, mirroring
/// the `report.filter-*` config keys. A threshold of `0`/`false` disables
/// that filter.
#[derive(Debug, Clone, Default)]
pub struct ReportFilters {
    pub filter_p: f64,
    pub filter_mean: f64,
    pub filter_mean_p: f64,
    pub filter_count: usize,
    pub filter_trivial: bool,
}

impl ReportFilters {
    fn keep(&self, result: &MiningResult) -> bool {
        if self.filter_p > 0.0 && result.stats.p > self.filter_p {
            return false;
        }
        if self.filter_mean > 0.0 && result.stats.mean.abs() < self.filter_mean {
            return false;
        }
        if self.filter_mean_p > 0.0 && result.stats.mean_p > self.filter_mean_p {
            return false;
        }
        if self.filter_count > 0 && result.stats.count < self.filter_count {
            return false;
        }
        if self.filter_trivial && is_trivial(result) {
            return false;
        }
        true
    }
}

/// A candle pattern is trivial when every element is exactly `(1,1,1,1)`
/// — a perfectly flat shape equal to the anchor itself. Zigzag patterns
/// have no such degenerate shape and are never considered trivial.
fn is_trivial(result: &MiningResult) -> bool {
    match &result.shape {
        crate::pattern::PatternShape::Candle(p) => p.elements.iter().all(|e| {
            e.open == 1.0 && e.high == 1.0 && e.low == 1.0 && e.close == 1.0
        }),
        crate::pattern::PatternShape::Zigzag(_) => false,
    }
}

pub struct Orchestrator {
    kind: MinerKind,
    filters: ReportFilters,
}

impl Orchestrator {
    pub fn new(kind: MinerKind, filters: ReportFilters) -> Self {
        Orchestrator { kind, filters }
    }

    fn mine(&self, series: &[Arc<Series>]) -> Vec<MiningResult> {
        match &self.kind {
            MinerKind::Candle(cfg) => CandleMiner::new(cfg.clone()).mine(series),
            MinerKind::Zigzag(cfg) => ZigzagMiner::new(cfg.clone()).mine(series),
        }
    }

    fn mine_parallel(&self, series: &[Arc<Series>]) -> Vec<MiningResult> {
        match &self.kind {
            MinerKind::Candle(cfg) => CandleMiner::new(cfg.clone()).mine_parallel(series),
            MinerKind::Zigzag(cfg) => ZigzagMiner::new(cfg.clone()).mine_parallel(series),
        }
    }

    /// Run the configured miner, sort by count descending (ties preserved
    /// in emission order via a stable sort), apply the configured
    /// filters, and drive every surviving result through the report sink.
    pub fn run(&self, series: &[Arc<Series>], sink: &mut dyn ReportSink) -> Result<(), MiningError> {
        info!(series = series.len(), "starting mining run");
        let mut results = self.mine(series);
        debug!(raw_results = results.len(), "mining pass complete");

        results.sort_by(|a, b| b.stats.count.cmp(&a.stats.count));
        results.retain(|r| self.filters.keep(r));
        info!(kept = results.len(), "filters applied");

        emit(series, &results, sink)
    }

    /// Parallel variant of [`Orchestrator::run`]: base-pattern iterations
    /// across every series run concurrently with `rayon`. The scanned
    /// mask is read for skip decisions only and marked without
    /// cross-thread ordering, so this mode trades the exact sequential
    /// dedup/emission order for throughput — never the default, and not
    /// guaranteed to reproduce [`Orchestrator::run`]'s result set exactly
    /// when patterns overlap across series.
    pub fn run_parallel(
        &self,
        series: &[Arc<Series>],
        sink: &mut dyn ReportSink,
    ) -> Result<(), MiningError> {
        info!(series = series.len(), "starting parallel mining run");
        let mut results = self.mine_parallel(series);
        debug!(raw_results = results.len(), "parallel mining pass complete");

        results.sort_by(|a, b| b.stats.count.cmp(&a.stats.count));
        results.retain(|r| self.filters.keep(r));

        emit(series, &results, sink)
    }
}

/// Drive every result through the sink's `begin_element`/`insert_*`/
/// `end_element` lifecycle, bracketed by a single `start`/`end`. Shared by
/// the sequential and parallel paths — they differ only in how `results`
/// was produced.
fn emit(
    series: &[Arc<Series>],
    results: &[MiningResult],
    sink: &mut dyn ReportSink,
) -> Result<(), MiningError> {
    let names: Vec<&str> = series.iter().map(|s| s.name()).collect();
    let start_time = series.iter().flat_map(|s| s.bars().first()).map(|b| b.time).min();
    let end_time = series.iter().flat_map(|s| s.bars().last()).map(|b| b.time).max();

    sink.start(&ReportDestination {
        start_time,
        end_time,
        tickers: &names,
    })?;
    for (i, result) in results.iter().enumerate() {
        let title = format!("pattern #{} (n={})", i + 1, result.stats.count);
        sink.begin_element(&title)?;
        match &result.shape {
            crate::pattern::PatternShape::Candle(p) => {
                sink.insert_fit_elements(&p.elements)?;
            }
            crate::pattern::PatternShape::Zigzag(p) => {
                sink.insert_zigzag_elements(&p.elements)?;
            }
        }
        for line in result_summary_lines(result) {
            sink.insert_text(&line)?;
        }
        sink.end_element()?;
    }
    sink.end()
}

fn result_summary_lines(result: &MiningResult) -> Vec<String> {
    let s = &result.stats;
    let mut lines = vec![
        format!("count: {}", s.count),
        format!("mean: {:.6}", s.mean),
        format!("sigma: {:.6}", s.sigma),
        format!("median: {:.6}", s.median),
        format!("min_return: {:.6}", s.min_return),
        format!("max_return: {:.6}", s.max_return),
        format!("pos_returns: {}  neg_returns: {}", s.pos_returns, s.neg_returns),
        format!("mean_pos: {:.6}  mean_neg: {:.6}", s.mean_pos, s.mean_neg),
        format!("p: {:.6}  mean_p: {:.6}", s.p, s.mean_p),
    ];
    if let Some(min_low) = s.min_low {
        lines.push(format!("min_low: {:.6}", min_low));
    }
    if let Some(max_high) = s.max_high {
        lines.push(format!("max_high: {:.6}", max_high));
    }
    if let crate::pattern::PatternShape::Candle(p) = &result.shape {
        lines.push(format!("momentum_sign: {}", p.momentum_sign));
        if let Some(sig) = &p.signature {
            lines.push(format!("signature: {sig}"));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{CandleFitElement, CandlePattern, PatternShape, ReturnStats};

    fn dummy_result(count: usize) -> MiningResult {
        MiningResult {
            shape: PatternShape::Candle(CandlePattern {
                elements: vec![CandleFitElement {
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                }],
                momentum_sign: 0,
                signature: None,
            }),
            stats: ReturnStats {
                count,
                mean: 0.1,
                sigma: 0.01,
                mean_p: 0.05,
                mean_pos: 0.1,
                mean_neg: 0.0,
                pos_returns: count,
                neg_returns: 0,
                min_return: 0.0,
                max_return: 0.2,
                median: 0.1,
                min_low: Some(-0.05),
                max_high: Some(0.2),
                p: 0.01,
            },
        }
    }

    #[test]
    fn filter_count_drops_small_results() {
        let filters = ReportFilters {
            filter_count: 5,
            ..Default::default()
        };
        assert!(!filters.keep(&dummy_result(3)));
        assert!(filters.keep(&dummy_result(10)));
    }

    #[test]
    fn filter_p_keeps_only_significant() {
        let filters = ReportFilters {
            filter_p: 0.02,
            ..Default::default()
        };
        assert!(filters.keep(&dummy_result(10))); // p = 0.01 <= 0.02
    }

    #[test]
    fn filter_trivial_drops_only_the_all_ones_shape() {
        let filters = ReportFilters {
            filter_trivial: true,
            ..Default::default()
        };

        // dummy_result's single element is exactly (1,1,1,1): trivial.
        assert!(!filters.keep(&dummy_result(10)));

        // An alternating shape [(1,1,1,1),(2,2,2,2)]: mean and sigma are
        // both zero, but element 1 isn't all-ones, so it must be kept.
        let mut alternating = dummy_result(9);
        alternating.shape = PatternShape::Candle(CandlePattern {
            elements: vec![
                CandleFitElement {
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                },
                CandleFitElement {
                    open: 2.0,
                    high: 2.0,
                    low: 2.0,
                    close: 2.0,
                    volume: 1.0,
                },
            ],
            momentum_sign: 0,
            signature: None,
        });
        alternating.stats.mean = 0.0;
        alternating.stats.sigma = 0.0;
        assert!(filters.keep(&alternating));
    }
}
