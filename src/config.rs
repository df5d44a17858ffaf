//! CLI argument parsing and JSON configuration loading: the CLI flag set
//! and the `report.filter-*`/miner parameter key table.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::errors::MiningError;
use crate::miner::candle::CandleMinerConfig;
use crate::miner::zigzag::ZigzagMinerConfig;
use crate::orchestrator::{MinerKind, ReportFilters};

/// Which miner the CLI should drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MinerTypeArg {
    #[value(name = "c")]
    Candle,
    #[value(name = "z")]
    Zigzag,
}

/// Which report sink the CLI should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportTypeArg {
    Html,
    Txt,
}

/// Command-line surface: repeatable input files, a mandatory output path
/// and config file, and the miner/report selectors.
#[derive(Debug, Parser)]
#[command(name = "pattern-miner", about = "Mines recurrent OHLCV patterns and tests them for significant forward returns")]
pub struct Cli {
    /// CSV quote file to load; repeatable, series are mined together.
    #[arg(short = 'i', long = "input-filename", required = true)]
    pub input_filename: Vec<PathBuf>,

    #[arg(long = "output-filename")]
    pub output_filename: PathBuf,

    #[arg(long = "config")]
    pub config: PathBuf,

    #[arg(long = "miner-type", value_enum)]
    pub miner_type: MinerTypeArg,

    #[arg(long = "report-type", value_enum, default_value = "txt")]
    pub report_type: ReportTypeArg,

    #[arg(long = "debug")]
    pub debug: bool,
}

/// Raw JSON shape of the config file, matching the external key table
/// exactly: same key names (kebab-case), same types, same defaults.
/// `momentum-order` is read once into a single field — the source's
/// double-read-with-overwrite bug (design note §9, question 6) is not
/// reproduced.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    #[serde(default = "default_candle_fit_tolerance")]
    candle_fit_tolerance: f64,
    #[serde(default)]
    volume_fit_tolerance: f64,
    #[serde(default = "default_pattern_length")]
    pattern_length: usize,
    #[serde(default = "default_off")]
    sample_percentage: f64,
    #[serde(default = "default_exit_after")]
    exit_after: usize,
    #[serde(default = "default_off_i64")]
    momentum_order: i64,
    #[serde(default)]
    fit_signatures: bool,
    #[serde(default = "default_zigzags")]
    zigzags: usize,
    #[serde(default = "default_epsilon")]
    epsilon: usize,
    #[serde(default = "default_price_tolerance")]
    price_tolerance: f64,
    #[serde(default = "default_off")]
    volume_tolerance: f64,
    #[serde(default = "default_time_tolerance")]
    time_tolerance: i64,
    #[serde(default)]
    report: RawReportConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawReportConfig {
    output_filename: Option<PathBuf>,
    #[serde(default)]
    filter_p: f64,
    #[serde(default)]
    filter_mean: f64,
    #[serde(default)]
    filter_mean_p: f64,
    #[serde(default)]
    filter_count: usize,
    #[serde(default)]
    filter_trivial: bool,
}

fn default_candle_fit_tolerance() -> f64 {
    0.1
}
fn default_pattern_length() -> usize {
    2
}
fn default_off() -> f64 {
    -1.0
}
fn default_off_i64() -> i64 {
    -1
}
fn default_exit_after() -> usize {
    2
}
fn default_zigzags() -> usize {
    2
}
fn default_epsilon() -> usize {
    6
}
fn default_price_tolerance() -> f64 {
    0.1
}
fn default_time_tolerance() -> i64 {
    2
}

/// Parsed and validated configuration: the miner selection plus the
/// report filter thresholds and effective output path.
pub struct Config {
    pub miner: MinerKind,
    pub filters: ReportFilters,
    pub output_filename: PathBuf,
}

impl Config {
    /// Load the JSON config named by `--config`, combine it with the
    /// CLI's `--miner-type`/`--output-filename`, and validate the
    /// resulting miner parameters.
    pub fn load(cli: &Cli) -> Result<Config, MiningError> {
        let contents = std::fs::read_to_string(&cli.config)?;
        let raw: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| MiningError::Config(format!("{}: {e}", cli.config.display())))?;

        let miner = match cli.miner_type {
            MinerTypeArg::Candle => MinerKind::Candle(
                CandleMinerConfig {
                    pattern_length: raw.pattern_length,
                    candle_tolerance: raw.candle_fit_tolerance,
                    volume_tolerance: raw.volume_fit_tolerance,
                    limit: raw.sample_percentage,
                    exit_after: raw.exit_after,
                    momentum_order: raw.momentum_order,
                    fit_signatures: raw.fit_signatures,
                }
                .validate()?,
            ),
            MinerTypeArg::Zigzag => MinerKind::Zigzag(
                ZigzagMinerConfig {
                    zigzags: raw.zigzags,
                    epsilon: raw.epsilon,
                    price_tolerance: raw.price_tolerance,
                    volume_tolerance: raw.volume_tolerance,
                    time_tolerance: raw.time_tolerance,
                    limit: raw.sample_percentage,
                    exit_after: raw.exit_after,
                    momentum_order: raw.momentum_order,
                }
                .validate()?,
            ),
        };

        let filters = ReportFilters {
            filter_p: raw.report.filter_p,
            filter_mean: raw.report.filter_mean,
            filter_mean_p: raw.report.filter_mean_p,
            filter_count: raw.report.filter_count,
            filter_trivial: raw.report.filter_trivial,
        };

        let output_filename = raw
            .report
            .output_filename
            .unwrap_or_else(|| cli.output_filename.clone());

        Ok(Config {
            miner,
            filters,
            output_filename,
        })
    }
}
