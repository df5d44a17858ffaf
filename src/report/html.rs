//! HTML + PNG report: a directory with `index.html` linking to one
//! rendered chart per pattern, drawn with `plotters`.

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::errors::MiningError;
use crate::pattern::{CandleFitElement, ZigzagElement};

use super::{ReportDestination, ReportSink};

pub struct HtmlReportSink {
    dir: PathBuf,
    index_sections: Vec<String>,
    element_count: usize,
    current_title: String,
    current_candles: Vec<CandleFitElement>,
    current_zigzag: Vec<ZigzagElement>,
    current_text: Vec<String>,
}

impl HtmlReportSink {
    pub fn create(dir: &Path) -> Result<Self, MiningError> {
        std::fs::create_dir_all(dir)?;
        Ok(HtmlReportSink {
            dir: dir.to_path_buf(),
            index_sections: Vec::new(),
            element_count: 0,
            current_title: String::new(),
            current_candles: Vec::new(),
            current_zigzag: Vec::new(),
            current_text: Vec::new(),
        })
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> MiningError {
    MiningError::Format(e.to_string())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn render_candle_chart(path: &Path, elements: &[CandleFitElement]) -> Result<(), MiningError> {
    let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let lo = elements.iter().map(|e| e.low).fold(f64::INFINITY, f64::min);
    let hi = elements.iter().map(|e| e.high).fold(f64::NEG_INFINITY, f64::max);
    let pad = (hi - lo).max(1e-9) * 0.1;

    let mut chart = ChartBuilder::on(&root)
        .caption("candle pattern", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0..elements.len(), (lo - pad)..(hi + pad))
        .map_err(plot_err)?;
    chart.configure_mesh().draw().map_err(plot_err)?;

    chart
        .draw_series(elements.iter().enumerate().map(|(i, e)| {
            CandleStick::new(i, e.open, e.high, e.low, e.close, GREEN.filled(), RED.filled(), 10)
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn render_zigzag_chart(path: &Path, elements: &[ZigzagElement]) -> Result<(), MiningError> {
    let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let min_t = elements.iter().map(|e| e.time_offset).min().unwrap_or(0);
    let max_t = elements.iter().map(|e| e.time_offset).max().unwrap_or(1).max(min_t + 1);
    let min_p = elements.iter().map(|e| e.price_ratio).fold(f64::INFINITY, f64::min);
    let max_p = elements.iter().map(|e| e.price_ratio).fold(f64::NEG_INFINITY, f64::max);
    let pad = (max_p - min_p).max(1e-9) * 0.1;

    let mut chart = ChartBuilder::on(&root)
        .caption("zigzag pattern", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(min_t..max_t, (min_p - pad)..(max_p + pad))
        .map_err(plot_err)?;
    chart.configure_mesh().draw().map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            elements.iter().map(|e| (e.time_offset, e.price_ratio)),
            &BLUE,
        ))
        .map_err(plot_err)?;
    chart
        .draw_series(elements.iter().map(|e| {
            let colour = if e.is_minimum { RED } else { GREEN };
            Circle::new((e.time_offset, e.price_ratio), 4, colour.filled())
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

impl ReportSink for HtmlReportSink {
    fn start(&mut self, destination: &ReportDestination) -> Result<(), MiningError> {
        self.index_sections.push(format!(
            "<h1>mined patterns</h1><p>tickers: {}</p>",
            html_escape(&destination.tickers.join(", "))
        ));
        Ok(())
    }

    fn begin_element(&mut self, title: &str) -> Result<(), MiningError> {
        self.element_count += 1;
        self.current_title = title.to_string();
        self.current_candles.clear();
        self.current_zigzag.clear();
        self.current_text.clear();
        Ok(())
    }

    fn insert_fit_elements(&mut self, elements: &[CandleFitElement]) -> Result<(), MiningError> {
        self.current_candles.extend_from_slice(elements);
        Ok(())
    }

    fn insert_zigzag_elements(&mut self, elements: &[ZigzagElement]) -> Result<(), MiningError> {
        self.current_zigzag.extend_from_slice(elements);
        Ok(())
    }

    fn insert_text(&mut self, line: &str) -> Result<(), MiningError> {
        self.current_text.push(line.to_string());
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), MiningError> {
        let png_name = format!("pattern-{}.png", self.element_count);
        let png_path = self.dir.join(&png_name);

        if !self.current_candles.is_empty() {
            render_candle_chart(&png_path, &self.current_candles)?;
        } else if !self.current_zigzag.is_empty() {
            render_zigzag_chart(&png_path, &self.current_zigzag)?;
        }

        self.index_sections.push(format!(
            "<section><h2>{}</h2><img src=\"{}\" alt=\"chart\"><pre>{}</pre></section>",
            html_escape(&self.current_title),
            png_name,
            html_escape(&self.current_text.join("\n"))
        ));
        Ok(())
    }

    fn end(&mut self) -> Result<(), MiningError> {
        let mut body = String::from("<!doctype html><html><body>\n");
        for section in &self.index_sections {
            body.push_str(section);
            body.push('\n');
        }
        body.push_str("</body></html>\n");
        std::fs::write(self.dir.join("index.html"), body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_index_and_per_pattern_png() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("report");
        let mut sink = HtmlReportSink::create(&out_dir).unwrap();

        sink.start(&ReportDestination {
            start_time: None,
            end_time: None,
            tickers: &["ABC"],
        })
        .unwrap();
        sink.begin_element("pattern #1 (n=2)").unwrap();
        sink.insert_fit_elements(&[
            CandleFitElement {
                open: 1.0,
                high: 1.2,
                low: 0.9,
                close: 1.1,
                volume: 1.0,
            },
            CandleFitElement {
                open: 1.1,
                high: 1.3,
                low: 1.0,
                close: 1.2,
                volume: 1.1,
            },
        ])
        .unwrap();
        sink.insert_text("count: 2").unwrap();
        sink.end_element().unwrap();
        sink.end().unwrap();

        assert!(out_dir.join("index.html").exists());
        assert!(out_dir.join("pattern-1.png").exists());
    }
}
