//! Walk-forward pipeline: split → IS run → OOS run → validate → compare.
//!
//! Each window is simulated on its own bars only. The first rebalance in a
//! window is the earliest date on which every instrument in that window can be
//! scored, so the OOS run never borrows IS history for its warm-up.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::backtest::{warmup_start, BacktestConfig, BacktestEngine, BacktestResult};
use super::comparator::{compare, ComparatorConfig, ComparisonReport};
use super::error::{MomentumError, WindowSide};
use super::params::FrozenParameters;
use super::price::UniverseView;
use super::split::{period_summary, recommended_split_date, split, PeriodSummary, SplitBoundary};
use super::validation::{accept, ValidationOutcome};

pub const DEFAULT_OOS_FRACTION: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkForwardConfig {
    /// Explicit split; when absent one is derived from `oos_fraction`.
    pub split_date: Option<NaiveDate>,
    pub oos_fraction: f64,
    pub backtest: BacktestConfig,
    pub comparator: ComparatorConfig,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        WalkForwardConfig {
            split_date: None,
            oos_fraction: DEFAULT_OOS_FRACTION,
            backtest: BacktestConfig::default(),
            comparator: ComparatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkForwardReport {
    pub boundary: SplitBoundary,
    pub periods: PeriodSummary,
    pub validation: ValidationOutcome,
    pub comparison: ComparisonReport,
}

/// Resolve the split date from the config or the OOS fraction.
pub fn resolve_split_date(
    view: &UniverseView<'_>,
    config: &WalkForwardConfig,
) -> Result<NaiveDate, MomentumError> {
    match config.split_date {
        Some(date) => Ok(date),
        None => recommended_split_date(view, config.oos_fraction),
    }
}

pub fn run_walk_forward(
    view: &UniverseView<'_>,
    params: &Arc<FrozenParameters>,
    config: &WalkForwardConfig,
) -> Result<WalkForwardReport, MomentumError> {
    let split_date = resolve_split_date(view, config)?;
    let max_lookback = params.max_lookback();
    let windows = split(view, split_date, max_lookback)?;
    let boundary = windows.boundary;

    let is_result = run_window(
        &windows.in_sample,
        WindowSide::InSample,
        split_date,
        boundary.is_end,
        params,
        &config.backtest,
    )?;
    let oos_result = run_window(
        &windows.out_of_sample,
        WindowSide::OutOfSample,
        split_date,
        boundary.oos_end,
        params,
        &config.backtest,
    )?;

    let accepted = accept(&is_result, oos_result, &boundary)?;
    let comparison = compare(is_result, accepted, &config.comparator);
    info!(verdict = %comparison.verdict, %split_date, "walk-forward complete");

    Ok(WalkForwardReport {
        boundary,
        periods: period_summary(view, split_date),
        validation: ValidationOutcome::Pass,
        comparison,
    })
}

fn run_window(
    window: &UniverseView<'_>,
    side: WindowSide,
    split_date: NaiveDate,
    end: NaiveDate,
    params: &Arc<FrozenParameters>,
    config: &BacktestConfig,
) -> Result<BacktestResult, MomentumError> {
    let max_lookback = params.max_lookback();
    let start = warmup_start(window, max_lookback).ok_or_else(|| {
        let (instrument, bars) = window
            .iter()
            .map(|(id, bars)| (id, bars.len()))
            .min_by_key(|(_, n)| *n)
            .unwrap_or(("universe", 0));
        MomentumError::InsufficientSplitData {
            instrument: instrument.to_string(),
            side,
            split_date,
            bars,
            required: max_lookback + 1,
        }
    })?;
    info!(%side, %start, %end, "running window");

    BacktestEngine::new(Arc::clone(params), config.clone()).run(window, start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comparator::Verdict;
    use crate::domain::params::RebalanceCadence;
    use crate::domain::price::{PriceBar, PriceSeries, PriceUniverse};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn daily(id: &str, closes: impl Iterator<Item = f64>) -> PriceSeries {
        let start = d("2024-01-01");
        let bars = closes
            .enumerate()
            .map(|(i, c)| PriceBar::new(id, start + chrono::Duration::days(i as i64), c))
            .collect();
        PriceSeries::new(id, bars).unwrap()
    }

    fn universe() -> PriceUniverse {
        PriceUniverse::new()
            .with_series(daily("A", (0..120).map(|i| 100.0 + i as f64)))
            .with_series(daily("B", (0..120).map(|i| 100.0 + 0.5 * i as f64)))
    }

    fn params() -> Arc<FrozenParameters> {
        FrozenParameters::freeze(vec![5, 10], vec![0.5, 0.5], RebalanceCadence::Weekly, 0.001)
            .unwrap()
    }

    #[test]
    fn pipeline_runs_both_windows_with_same_parameters() {
        let universe = universe();
        let config = WalkForwardConfig {
            split_date: Some(d("2024-03-01")),
            ..Default::default()
        };
        let p = params();
        let report = run_walk_forward(&universe.view(), &p, &config).unwrap();

        let c = &report.comparison;
        assert!(Arc::ptr_eq(&c.is_result.params, &c.oos_result.params));
        assert!(Arc::ptr_eq(&c.is_result.params, &p));
        assert_eq!(c.is_result.start_date, d("2024-01-11"));
        assert_eq!(c.is_result.end_date, d("2024-02-29"));
        assert_eq!(c.oos_result.start_date, d("2024-03-11"));
        assert!(report.validation.is_pass());
        assert_eq!(c.is_result.final_holding.as_deref(), Some("A"));
    }

    #[test]
    fn recommended_split_is_used_without_explicit_date() {
        let universe = universe();
        let report =
            run_walk_forward(&universe.view(), &params(), &WalkForwardConfig::default()).unwrap();
        // 120 days, 36 out of sample
        assert_eq!(report.boundary.split_date, d("2024-03-25"));
        assert_eq!(report.boundary.oos_start, d("2024-03-25"));
    }

    #[test]
    fn window_that_cannot_warm_up_is_rejected() {
        let universe = universe();
        let config = WalkForwardConfig {
            // exactly 10 OOS bars: enough to split, not enough to score
            split_date: Some(d("2024-04-20")),
            ..Default::default()
        };
        let err = run_walk_forward(&universe.view(), &params(), &config).unwrap_err();
        assert!(matches!(
            err,
            MomentumError::InsufficientSplitData {
                side: WindowSide::OutOfSample,
                required: 11,
                ..
            }
        ));
    }

    #[test]
    fn steady_trend_is_not_degraded_beyond_reason() {
        let universe = universe();
        let config = WalkForwardConfig {
            split_date: Some(d("2024-03-01")),
            comparator: ComparatorConfig::new(1.0).unwrap(),
            ..Default::default()
        };
        let report = run_walk_forward(&universe.view(), &params(), &config).unwrap();
        assert_ne!(report.comparison.verdict, Verdict::Degraded);
    }
}
