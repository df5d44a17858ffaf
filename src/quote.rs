//! Quote model: an immutable OHLCV bar sequence with a stable display name.

use std::path::Path;

use chrono::{NaiveDate, NaiveTime};

use crate::errors::MiningError;

/// A single OHLCV observation at a timestamp.
///
/// Invariant (assumed from input, not enforced): `low <= min(open, close)
/// <= max(open, close) <= high` and `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Epoch seconds and the sub-second nanosecond remainder, UTC.
    pub time: (i64, u32),
}

/// An ordered, immutable sequence of bars with a stable display name.
///
/// Series are shared read-only across miners; positions are zero-based.
#[derive(Debug, Clone)]
pub struct Series {
    name: String,
    bars: Vec<Bar>,
}

impl Series {
    pub fn new(name: impl Into<String>, bars: Vec<Bar>) -> Self {
        Series {
            name: name.into(),
            bars,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, pos: usize) -> Option<&Bar> {
        self.bars.get(pos)
    }

    /// Load a series from the broker CSV format: a header containing (in
    /// any order) `<TICKER>, <DATE>, <TIME>,
    /// <OPEN>, <HIGH>, <LOW>, <CLOSE>, <VOL>`, followed by rows of
    /// `YYYYMMDD`, `HHMMSS`, four reals and a non-negative integer.
    ///
    /// Rows with fewer fields than the header terminate parsing — this
    /// mirrors the source format and is not treated as an error.
    pub fn load_csv(path: &Path, name: Option<String>) -> Result<Series, MiningError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let col = |token: &str| -> Result<usize, MiningError> {
            headers
                .iter()
                .position(|h| h.trim() == token)
                .ok_or_else(|| {
                    MiningError::Format(format!("missing required column {token}"))
                })
        };

        let ticker_idx = headers.iter().position(|h| h.trim() == "<TICKER>");
        let date_idx = col("<DATE>")?;
        let time_idx = col("<TIME>")?;
        let open_idx = col("<OPEN>")?;
        let high_idx = col("<HIGH>")?;
        let low_idx = col("<LOW>")?;
        let close_idx = col("<CLOSE>")?;
        let vol_idx = col("<VOL>")?;
        let n_header_fields = headers.len();

        let mut bars = Vec::new();
        let mut discovered_name: Option<String> = None;

        for record in reader.records() {
            let record = record?;
            if record.len() < n_header_fields {
                break;
            }

            if discovered_name.is_none() {
                if let Some(idx) = ticker_idx {
                    if let Some(ticker) = record.get(idx) {
                        if !ticker.trim().is_empty() {
                            discovered_name = Some(ticker.trim().to_string());
                        }
                    }
                }
            }

            let date_str = record
                .get(date_idx)
                .ok_or_else(|| MiningError::Format("row missing date field".into()))?;
            let time_str = record
                .get(time_idx)
                .ok_or_else(|| MiningError::Format("row missing time field".into()))?;
            let date = NaiveDate::parse_from_str(date_str, "%Y%m%d")
                .map_err(|e| MiningError::Format(format!("bad date {date_str}: {e}")))?;
            let time = NaiveTime::parse_from_str(time_str, "%H%M%S")
                .map_err(|e| MiningError::Format(format!("bad time {time_str}: {e}")))?;
            let datetime = date.and_time(time);

            let open = parse_f64(&record, open_idx, "open")?;
            let high = parse_f64(&record, high_idx, "high")?;
            let low = parse_f64(&record, low_idx, "low")?;
            let close = parse_f64(&record, close_idx, "close")?;
            let volume: u64 = record
                .get(vol_idx)
                .ok_or_else(|| MiningError::Format("row missing volume field".into()))?
                .trim()
                .parse()
                .map_err(|e| MiningError::Format(format!("bad volume: {e}")))?;

            bars.push(Bar {
                open,
                high,
                low,
                close,
                volume,
                time: (datetime.and_utc().timestamp(), datetime.and_utc().timestamp_subsec_nanos()),
            });
        }

        let final_name = name.or(discovered_name).unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "series".to_string())
        });

        Ok(Series::new(final_name, bars))
    }
}

fn parse_f64(record: &csv::StringRecord, idx: usize, field: &str) -> Result<f64, MiningError> {
    record
        .get(idx)
        .ok_or_else(|| MiningError::Format(format!("row missing {field} field")))?
        .trim()
        .parse()
        .map_err(|e| MiningError::Format(format!("bad {field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_canonical_header_order() {
        let f = write_csv(
            "<TICKER>,<DATE>,<TIME>,<OPEN>,<HIGH>,<LOW>,<CLOSE>,<VOL>\n\
             ABC,20240101,093000,1.0,2.0,0.5,1.5,1000\n\
             ABC,20240101,093100,1.5,2.5,1.0,2.0,1500\n",
        );
        let series = Series::load_csv(f.path(), None).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.name(), "ABC");
        assert_eq!(series.get(0).unwrap().open, 1.0);
        assert_eq!(series.get(1).unwrap().volume, 1500);
    }

    #[test]
    fn loads_permuted_header_order() {
        // Same three rows as scenario 5 in spec.md §8, with the header
        // columns permuted relative to the canonical order.
        let f = write_csv(
            "<DATE>,<TICKER>,<VOL>,<TIME>,<OPEN>,<HIGH>,<LOW>,<CLOSE>\n\
             20240101,XYZ,100,093000,10.0,11.0,9.0,10.5\n\
             20240101,XYZ,200,093100,10.5,11.5,9.5,11.0\n\
             20240101,XYZ,300,093200,11.0,12.0,10.0,11.5\n",
        );
        let series = Series::load_csv(f.path(), None).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.name(), "XYZ");
        assert_eq!(series.get(0).unwrap().open, 10.0);
        assert_eq!(series.get(2).unwrap().close, 11.5);
    }

    #[test]
    fn truncated_row_stops_parsing() {
        let f = write_csv(
            "<TICKER>,<DATE>,<TIME>,<OPEN>,<HIGH>,<LOW>,<CLOSE>,<VOL>\n\
             ABC,20240101,093000,1.0,2.0,0.5,1.5,1000\n\
             ABC,20240101\n\
             ABC,20240101,093200,1.5,2.5,1.0,2.0,1500\n",
        );
        let series = Series::load_csv(f.path(), None).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn missing_column_is_format_error() {
        let f = write_csv("<TICKER>,<DATE>,<TIME>,<OPEN>,<HIGH>,<LOW>,<VOL>\nABC,1,1,1,1,1,1\n");
        let err = Series::load_csv(f.path(), None).unwrap_err();
        assert!(matches!(err, MiningError::Format(_)));
    }
}
