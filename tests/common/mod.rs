#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use momentum_wf::domain::error::MomentumError;
use momentum_wf::domain::params::{FrozenParameters, RebalanceCadence};
use momentum_wf::domain::price::{PriceBar, PriceSeries, PriceUniverse};
use momentum_wf::ports::data_port::PriceDataPort;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub struct MockPriceData {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_closes(mut self, id: &str, start: NaiveDate, closes: &[f64]) -> Self {
        self.data.insert(id.to_string(), make_bars(id, start, closes));
        self
    }

    pub fn with_error(mut self, id: &str, reason: &str) -> Self {
        self.errors.insert(id.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockPriceData {
    fn fetch_closes(
        &self,
        instrument: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceSeries, MomentumError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(MomentumError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars: Vec<PriceBar> = self
            .data
            .get(instrument)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| {
                start_date.is_none_or(|s| b.date >= s) && end_date.is_none_or(|e| b.date <= e)
            })
            .collect();
        if bars.is_empty() {
            return Err(MomentumError::NoData {
                instrument: instrument.to_string(),
            });
        }
        PriceSeries::new(instrument, bars)
    }

    fn list_instruments(&self) -> Result<Vec<String>, MomentumError> {
        let mut ids: Vec<String> = self.data.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive weekdays starting on or after `start`.
pub fn weekdays(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut day = start;
    while dates.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(day);
        }
        day += Duration::days(1);
    }
    dates
}

pub fn make_bars(id: &str, start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    weekdays(start, closes.len())
        .into_iter()
        .zip(closes)
        .map(|(date, &close)| PriceBar::new(id, date, close))
        .collect()
}

pub fn make_series(id: &str, start: NaiveDate, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(id, make_bars(id, start, closes)).unwrap()
}

pub fn make_universe(start: NaiveDate, series: &[(&str, Vec<f64>)]) -> PriceUniverse {
    series
        .iter()
        .fold(PriceUniverse::new(), |u, (id, closes)| {
            u.with_series(make_series(id, start, closes))
        })
}

pub fn make_params(
    lookbacks: &[usize],
    weights: &[f64],
    cadence: RebalanceCadence,
    cost: f64,
) -> Arc<FrozenParameters> {
    FrozenParameters::freeze(lookbacks.to_vec(), weights.to_vec(), cadence, cost).unwrap()
}

/// Deterministic wandering closes, strictly positive.
pub fn wave(n: usize, base: f64, drift: f64, phase: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            base * (1.0 + drift * t) + 5.0 * ((t / 9.0) + phase).sin()
        })
        .collect()
}

/// Two instruments whose leadership alternates a few times a year.
pub fn rotating_universe(n: usize) -> PriceUniverse {
    make_universe(
        date(2022, 1, 3),
        &[
            ("AAA", wave(n, 100.0, 0.001, 0.0)),
            ("BBB", wave(n, 80.0, 0.0015, 2.0)),
            ("CCC", wave(n, 60.0, 0.0005, 4.0)),
        ],
    )
}

pub fn write_price_csv(dir: &Path, id: &str, start: NaiveDate, closes: &[f64]) {
    let mut wtr = csv::Writer::from_path(dir.join(format!("{id}.csv"))).unwrap();
    wtr.write_record(["date", "close"]).unwrap();
    for (date, close) in weekdays(start, closes.len()).into_iter().zip(closes) {
        wtr.write_record([date.to_string(), close.to_string()]).unwrap();
    }
    wtr.flush().unwrap();
}
