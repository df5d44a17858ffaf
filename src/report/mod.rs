//! Report sink: an ordered-section interface for writing mined patterns
//! out as a human-facing artifact. Two implementations are provided —
//! [`text::TextReportSink`] and [`html::HtmlReportSink`].

pub mod html;
pub mod text;

use crate::errors::MiningError;
use crate::pattern::{CandleFitElement, ZigzagElement};

/// Metadata handed to [`ReportSink::start`]: the series time span actually
/// covered and the ticker names, in mining order. The output location
/// itself is fixed at sink construction, not here.
pub struct ReportDestination<'a> {
    pub start_time: Option<(i64, u32)>,
    pub end_time: Option<(i64, u32)>,
    pub tickers: &'a [&'a str],
}

/// Ordered-section sink a run's results are drained into. Implementations
/// own their own buffering; every method is fallible since both
/// implementations ultimately write to disk.
pub trait ReportSink {
    fn start(&mut self, destination: &ReportDestination) -> Result<(), MiningError>;
    fn begin_element(&mut self, title: &str) -> Result<(), MiningError>;
    fn insert_fit_elements(&mut self, elements: &[CandleFitElement]) -> Result<(), MiningError>;
    fn insert_zigzag_elements(&mut self, elements: &[ZigzagElement]) -> Result<(), MiningError>;
    fn insert_text(&mut self, line: &str) -> Result<(), MiningError>;
    fn end_element(&mut self) -> Result<(), MiningError>;
    fn end(&mut self) -> Result<(), MiningError>;
}
