//! In-sample / out-of-sample partitioning.
//!
//! A split never copies bars: both windows are sub-slices of the series held by
//! the source view, cut at the first bar dated on or after the split date.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::error::{MomentumError, WindowSide};
use super::price::UniverseView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitBoundary {
    pub split_date: NaiveDate,
    pub is_start: NaiveDate,
    pub is_end: NaiveDate,
    pub oos_start: NaiveDate,
    pub oos_end: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct SplitWindows<'a> {
    pub in_sample: UniverseView<'a>,
    pub out_of_sample: UniverseView<'a>,
    pub boundary: SplitBoundary,
}

/// Partition `view` at `split_date`: IS holds bars dated before it, OOS holds
/// the rest. Every instrument must keep at least `min_bars` on each side.
pub fn split<'a>(
    view: &UniverseView<'a>,
    split_date: NaiveDate,
    min_bars: usize,
) -> Result<SplitWindows<'a>, MomentumError> {
    if view.instrument_count() == 0 {
        return Err(MomentumError::NoData {
            instrument: "universe".into(),
        });
    }

    let in_sample = view.before(split_date);
    let out_of_sample = view.from_date(split_date);

    for (side, window) in [
        (WindowSide::InSample, &in_sample),
        (WindowSide::OutOfSample, &out_of_sample),
    ] {
        for (id, bars) in window.iter() {
            if bars.is_empty() || bars.len() < min_bars {
                return Err(MomentumError::InsufficientSplitData {
                    instrument: id.to_string(),
                    side,
                    split_date,
                    bars: bars.len(),
                    required: min_bars.max(1),
                });
            }
        }
    }

    let missing = || MomentumError::NoData {
        instrument: "universe".into(),
    };
    let boundary = SplitBoundary {
        split_date,
        is_start: in_sample.first_date().ok_or_else(missing)?,
        is_end: in_sample.last_date().ok_or_else(missing)?,
        oos_start: out_of_sample.first_date().ok_or_else(missing)?,
        oos_end: out_of_sample.last_date().ok_or_else(missing)?,
    };

    info!(
        %split_date,
        is_bars = in_sample.total_bars(),
        oos_bars = out_of_sample.total_bars(),
        is_end = %boundary.is_end,
        oos_start = %boundary.oos_start,
        "data split"
    );

    Ok(SplitWindows {
        in_sample,
        out_of_sample,
        boundary,
    })
}

/// Split date leaving roughly `oos_fraction` of the trading timeline out of
/// sample.
pub fn recommended_split_date(
    view: &UniverseView<'_>,
    oos_fraction: f64,
) -> Result<NaiveDate, MomentumError> {
    if !(oos_fraction > 0.0 && oos_fraction < 1.0) {
        return Err(MomentumError::InvalidParameter {
            field: "oos_fraction".into(),
            reason: format!("{oos_fraction} outside (0, 1)"),
        });
    }
    let timeline = view.timeline();
    if timeline.is_empty() {
        return Err(MomentumError::NoData {
            instrument: "universe".into(),
        });
    }

    let n = timeline.len();
    let oos_days = (n as f64 * oos_fraction).floor() as usize;
    let index = (n - oos_days).min(n - 1);
    Ok(timeline[index])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodInfo {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub duration_days: i64,
    pub observations: usize,
    pub share_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub split_date: NaiveDate,
    pub total: PeriodInfo,
    pub in_sample: PeriodInfo,
    pub out_of_sample: PeriodInfo,
}

/// Descriptive summary of a prospective split. Unlike [`split`] this never
/// fails, so it can be shown for a rejected split date too.
pub fn period_summary(view: &UniverseView<'_>, split_date: NaiveDate) -> PeriodSummary {
    let total_bars = view.total_bars();
    let info = |window: &UniverseView<'_>| {
        let start = window.first_date();
        let end = window.last_date();
        let observations = window.total_bars();
        PeriodInfo {
            start,
            end,
            duration_days: match (start, end) {
                (Some(s), Some(e)) => (e - s).num_days(),
                _ => 0,
            },
            observations,
            share_of_total: if total_bars > 0 {
                observations as f64 / total_bars as f64
            } else {
                0.0
            },
        }
    };

    PeriodSummary {
        split_date,
        total: info(view),
        in_sample: info(&view.before(split_date)),
        out_of_sample: info(&view.from_date(split_date)),
    }
}
