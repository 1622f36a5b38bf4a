//! Closing-price series and zero-copy universe views.
//!
//! A [`PriceSeries`] owns one instrument's bars and guarantees strictly
//! increasing dates. [`UniverseView`] borrows slices of several series so that
//! splitting and no-lookahead truncation never copy or resample bars.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::error::MomentumError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub instrument_id: String,
    pub date: NaiveDate,
    pub close: f64,
}

impl PriceBar {
    pub fn new(instrument_id: impl Into<String>, date: NaiveDate, close: f64) -> Self {
        PriceBar {
            instrument_id: instrument_id.into(),
            date,
            close,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    instrument_id: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, rejecting unordered or duplicate dates, negative or
    /// non-finite closes, and bars tagged with another instrument.
    pub fn new(
        instrument_id: impl Into<String>,
        bars: Vec<PriceBar>,
    ) -> Result<Self, MomentumError> {
        let instrument_id = instrument_id.into();
        let invalid = |reason: String| MomentumError::InvalidSeries {
            instrument: instrument_id.clone(),
            reason,
        };

        for bar in &bars {
            if bar.instrument_id != instrument_id {
                return Err(invalid(format!(
                    "bar on {} belongs to {}",
                    bar.date, bar.instrument_id
                )));
            }
            if !bar.close.is_finite() || bar.close < 0.0 {
                return Err(invalid(format!(
                    "close {} on {} is not a valid price",
                    bar.close, bar.date
                )));
            }
        }
        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(invalid(format!(
                "dates not strictly increasing: {} followed by {}",
                w[0].date, w[1].date
            )));
        }

        Ok(PriceSeries { instrument_id, bars })
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Owned collection of series keyed by instrument id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceUniverse {
    series: BTreeMap<String, PriceSeries>,
}

impl PriceUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.instrument_id.clone(), series);
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn get(&self, instrument_id: &str) -> Option<&PriceSeries> {
        self.series.get(instrument_id)
    }

    pub fn instrument_count(&self) -> usize {
        self.series.len()
    }

    pub fn view(&self) -> UniverseView<'_> {
        UniverseView {
            series: self
                .series
                .iter()
                .map(|(id, s)| (id.as_str(), s.bars.as_slice()))
                .collect(),
        }
    }
}

/// Borrowed, read-only window over a [`PriceUniverse`].
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseView<'a> {
    series: BTreeMap<&'a str, &'a [PriceBar]>,
}

impl<'a> UniverseView<'a> {
    pub fn instruments(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.series.keys().copied()
    }

    pub fn bars(&self, instrument_id: &str) -> Option<&'a [PriceBar]> {
        self.series.get(instrument_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a [PriceBar])> + '_ {
        self.series.iter().map(|(id, bars)| (*id, *bars))
    }

    pub fn instrument_count(&self) -> usize {
        self.series.len()
    }

    pub fn total_bars(&self) -> usize {
        self.series.values().map(|b| b.len()).sum()
    }

    fn map_slices(&self, f: impl Fn(&'a [PriceBar]) -> &'a [PriceBar]) -> UniverseView<'a> {
        UniverseView {
            series: self.series.iter().map(|(id, bars)| (*id, f(bars))).collect(),
        }
    }

    /// Bars dated on or before `date`. Nothing later is reachable from the result.
    pub fn up_to(&self, date: NaiveDate) -> UniverseView<'a> {
        self.map_slices(|bars| &bars[..bars.partition_point(|b| b.date <= date)])
    }

    /// Bars dated strictly before `date`.
    pub fn before(&self, date: NaiveDate) -> UniverseView<'a> {
        self.map_slices(|bars| &bars[..bars.partition_point(|b| b.date < date)])
    }

    /// Bars dated on or after `date`.
    pub fn from_date(&self, date: NaiveDate) -> UniverseView<'a> {
        self.map_slices(|bars| &bars[bars.partition_point(|b| b.date < date)..])
    }

    /// Sorted union of all bar dates.
    pub fn timeline(&self) -> Vec<NaiveDate> {
        let unique: BTreeSet<NaiveDate> = self
            .series
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.date))
            .collect();
        unique.into_iter().collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.series.values().filter_map(|b| b.first()).map(|b| b.date).min()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series.values().filter_map(|b| b.last()).map(|b| b.date).max()
    }

    /// Closes of the bars dated exactly `date`. Instruments without a bar on
    /// that date are absent; no close is carried forward.
    pub fn prices_on(&self, date: NaiveDate) -> PriceMap {
        self.series
            .iter()
            .filter_map(|(id, bars)| bar_on(bars, date).map(|b| (id.to_string(), b.close)))
            .collect()
    }
}

pub type PriceMap = BTreeMap<String, f64>;

/// Index of the nearest bar at or before `date`.
pub fn index_at_or_before(bars: &[PriceBar], date: NaiveDate) -> Option<usize> {
    bars.partition_point(|b| b.date <= date).checked_sub(1)
}

/// The bar dated exactly `date`, if there is one.
pub fn bar_on(bars: &[PriceBar], date: NaiveDate) -> Option<&PriceBar> {
    bars.binary_search_by_key(&date, |b| b.date).ok().map(|i| &bars[i])
}
