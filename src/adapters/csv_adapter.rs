//! CSV file price adapter.
//!
//! One file per instrument, `<base>/<INSTRUMENT>.csv`, with a header row.
//! Columns are located by name: `date` plus `close`, falling back to
//! `adj_close`. Header matching ignores case and treats spaces as underscores,
//! so `Date,Adj Close` exports work unchanged.

use crate::domain::error::MomentumError;
use crate::domain::price::{PriceBar, PriceSeries};
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{instrument}.csv"))
    }
}

fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase().replace(' ', "_")
}

fn data_error(reason: String) -> MomentumError {
    MomentumError::DataSource { reason }
}

/// Accepts `YYYY-MM-DD` optionally followed by a time component.
fn parse_date(raw: &str) -> Result<NaiveDate, MomentumError> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| data_error(format!("invalid date '{raw}': {e}")))
}

impl PriceDataPort for CsvPriceAdapter {
    fn fetch_closes(
        &self,
        instrument: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceSeries, MomentumError> {
        let path = self.csv_path(instrument);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| data_error(format!("CSV header error in {}: {}", path.display(), e)))?
            .iter()
            .map(normalize_header)
            .collect();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let date_col = column("date")
            .ok_or_else(|| data_error(format!("{}: missing date column", path.display())))?;
        let close_col = column("close")
            .or_else(|| column("adj_close"))
            .ok_or_else(|| data_error(format!("{}: missing close column", path.display())))?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {e}")))?;

            let date = parse_date(
                record
                    .get(date_col)
                    .ok_or_else(|| data_error("missing date value".into()))?,
            )?;
            if start_date.is_some_and(|s| date < s) || end_date.is_some_and(|e| date > e) {
                continue;
            }

            let raw_close = record
                .get(close_col)
                .ok_or_else(|| data_error("missing close value".into()))?
                .trim();
            let close: f64 = raw_close
                .parse()
                .map_err(|e| data_error(format!("invalid close '{raw_close}' on {date}: {e}")))?;

            bars.push(PriceBar::new(instrument, date, close));
        }

        if bars.is_empty() {
            return Err(MomentumError::NoData {
                instrument: instrument.to_string(),
            });
        }

        bars.sort_by_key(|b| b.date);
        debug!(instrument, bars = bars.len(), "loaded closes");
        PriceSeries::new(instrument, bars)
    }

    fn list_instruments(&self) -> Result<Vec<String>, MomentumError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut instruments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {e}")))?;
            let name = entry.file_name();
            if let Some(stem) = name.to_string_lossy().strip_suffix(".csv") {
                instruments.push(stem.to_string());
            }
        }

        instruments.sort();
        Ok(instruments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("SPY.csv"),
            "date,open,close\n\
             2024-01-17,1.0,115.0\n\
             2024-01-15,1.0,105.0\n\
             2024-01-16,1.0,110.0\n",
        )
        .unwrap();
        fs::write(
            path.join("QQQ.csv"),
            "Date,Adj Close\n2024-01-15 00:00:00-05:00,400.5\n",
        )
        .unwrap();
        fs::write(path.join("EMPTY.csv"), "date,close\n").unwrap();
        fs::write(path.join("BAD.csv"), "date,close\n2024-01-15,abc\n").unwrap();
        fs::write(path.join("DUP.csv"), "date,close\n2024-01-15,1\n2024-01-15,2\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn fetch_closes_sorts_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);

        let series = adapter.fetch_closes("SPY", None, None).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[0].date, d(15));
        assert_eq!(series.bars()[0].close, 105.0);
        assert_eq!(series.bars()[2].close, 115.0);
    }

    #[test]
    fn fetch_closes_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);

        let series = adapter.fetch_closes("SPY", Some(d(16)), Some(d(16))).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].date, d(16));
    }

    #[test]
    fn adj_close_header_with_timestamped_dates() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);

        let series = adapter.fetch_closes("QQQ", None, None).unwrap();
        assert_eq!(series.bars()[0].date, d(15));
        assert_eq!(series.bars()[0].close, 400.5);
    }

    #[test]
    fn missing_file_is_a_data_source_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        let err = adapter.fetch_closes("XYZ", None, None).unwrap_err();
        assert!(matches!(err, MomentumError::DataSource { .. }));
    }

    #[test]
    fn empty_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        let err = adapter.fetch_closes("EMPTY", None, None).unwrap_err();
        assert!(matches!(err, MomentumError::NoData { .. }));
    }

    #[test]
    fn bad_close_and_duplicate_dates_are_rejected() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert!(matches!(
            adapter.fetch_closes("BAD", None, None).unwrap_err(),
            MomentumError::DataSource { .. }
        ));
        assert!(matches!(
            adapter.fetch_closes("DUP", None, None).unwrap_err(),
            MomentumError::InvalidSeries { .. }
        ));
    }

    #[test]
    fn list_instruments_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert_eq!(
            adapter.list_instruments().unwrap(),
            vec!["BAD", "DUP", "EMPTY", "QQQ", "SPY"]
        );
    }
}
