//! Newline-delimited text report: `=== title ===` section markers, one
//! `insert_text` line per line, elements rendered as one CSV-ish line each.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::MiningError;
use crate::pattern::{CandleFitElement, ZigzagElement};

use super::{ReportDestination, ReportSink};

pub struct TextReportSink {
    writer: BufWriter<File>,
}

impl TextReportSink {
    pub fn create(path: &Path) -> Result<Self, MiningError> {
        let file = File::create(path)?;
        Ok(TextReportSink {
            writer: BufWriter::new(file),
        })
    }
}

impl ReportSink for TextReportSink {
    fn start(&mut self, destination: &ReportDestination) -> Result<(), MiningError> {
        writeln!(self.writer, "=== run ===")?;
        writeln!(self.writer, "tickers: {}", destination.tickers.join(", "))?;
        if let (Some(start), Some(end)) = (destination.start_time, destination.end_time) {
            writeln!(self.writer, "span: {}.{} .. {}.{}", start.0, start.1, end.0, end.1)?;
        }
        Ok(())
    }

    fn begin_element(&mut self, title: &str) -> Result<(), MiningError> {
        writeln!(self.writer, "=== {title} ===")?;
        Ok(())
    }

    fn insert_fit_elements(&mut self, elements: &[CandleFitElement]) -> Result<(), MiningError> {
        for (i, e) in elements.iter().enumerate() {
            writeln!(
                self.writer,
                "bar[{i}] o={:.6} h={:.6} l={:.6} c={:.6} v={:.6}",
                e.open, e.high, e.low, e.close, e.volume
            )?;
        }
        Ok(())
    }

    fn insert_zigzag_elements(&mut self, elements: &[ZigzagElement]) -> Result<(), MiningError> {
        for (i, e) in elements.iter().enumerate() {
            writeln!(
                self.writer,
                "vertex[{i}] t={} price={:.6} vol={:.6} min={}",
                e.time_offset, e.price_ratio, e.volume_ratio, e.is_minimum
            )?;
        }
        Ok(())
    }

    fn insert_text(&mut self, line: &str) -> Result<(), MiningError> {
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), MiningError> {
        writeln!(self.writer)?;
        Ok(())
    }

    fn end(&mut self) -> Result<(), MiningError> {
        self.writer.flush()?;
        Ok(())
    }
}
