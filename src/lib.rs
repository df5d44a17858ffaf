//! Mines recurrent patterns in OHLCV candlestick series and assesses
//! whether each recurrent pattern is followed by a statistically
//! significant directional price move.
//!
//! The core is the pattern-mining engine ([`miner`]): a candle miner and a
//! zigzag miner sharing a common enumerate / rescan / dedup skeleton.
//! Everything else in this crate — quote loading, configuration, report
//! rendering — is ambient plumbing around that engine.

pub mod config;
pub mod errors;
pub mod miner;
pub mod orchestrator;
pub mod pattern;
pub mod quote;
pub mod report;
pub mod stats;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config, ReportTypeArg};
use crate::errors::MiningError;
use crate::orchestrator::Orchestrator;
use crate::quote::Series;
use crate::report::html::HtmlReportSink;
use crate::report::text::TextReportSink;
use crate::report::ReportSink;

/// Initialise the global `tracing` subscriber once. `--debug` raises the
/// default filter from `info` to `debug`; `RUST_LOG` always wins when set.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

/// Load every `--input-filename` series in order; a series' name is
/// derived from its ticker column when present, else its file stem.
pub fn load_series(cli: &Cli) -> Result<Vec<Arc<Series>>, MiningError> {
    cli.input_filename
        .iter()
        .map(|path| Series::load_csv(path, None).map(Arc::new))
        .collect()
}

/// Run the full pipeline: load quotes, run the configured miner, filter
/// and sort results, and write the report artifact named by
/// `--report-type`. Returns `Ok(())` on a successful write; every error
/// propagates to the caller as a fatal [`MiningError`], matching the
/// specification's "fatal at the invocation level" error model.
pub fn run(cli: &Cli) -> Result<(), MiningError> {
    let config = Config::load(cli)?;
    let series = load_series(cli)?;
    info!(series = series.len(), "quotes loaded");

    let orchestrator = Orchestrator::new(config.miner, config.filters);

    let mut sink: Box<dyn ReportSink> = match cli.report_type {
        ReportTypeArg::Txt => Box::new(TextReportSink::create(&config.output_filename)?),
        ReportTypeArg::Html => Box::new(HtmlReportSink::create(&config.output_filename)?),
    };

    orchestrator.run(&series, sink.as_mut())?;
    info!(path = %config.output_filename.display(), "report written");
    Ok(())
}
