//! Momentum scoring and ranking.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

use super::error::MomentumError;
use super::params::{validate_lookbacks, validate_weights};
use super::price::{index_at_or_before, PriceBar};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumScore {
    pub instrument_id: String,
    pub as_of_date: NaiveDate,
    /// (lookback in trading days, simple return), in configuration order.
    pub component_returns: Vec<(usize, f64)>,
    pub composite_score: f64,
}

/// Score one instrument as of `as_of_date`.
///
/// The scoring bar is the latest bar dated on or before `as_of_date`; each
/// lookback `L` compares it with the bar `L` trading days earlier. Only bars
/// up to the scoring bar are ever read.
pub fn score(
    instrument_id: &str,
    bars: &[PriceBar],
    as_of_date: NaiveDate,
    lookback_days: &[usize],
    weights: &[f64],
) -> Result<MomentumScore, MomentumError> {
    validate_lookbacks(lookback_days)?;
    validate_weights(weights, lookback_days.len())?;

    let required = lookback_days.iter().copied().max().unwrap_or(0);
    let insufficient = |bars: usize| MomentumError::InsufficientHistory {
        instrument: instrument_id.to_string(),
        as_of: as_of_date,
        bars,
        required,
    };

    let current = index_at_or_before(bars, as_of_date).ok_or_else(|| insufficient(0))?;
    if current < required {
        return Err(insufficient(current));
    }

    let current_price = bars[current].close;
    let mut component_returns = Vec::with_capacity(lookback_days.len());
    for &lookback in lookback_days {
        let past = &bars[current - lookback];
        if past.close <= 0.0 {
            return Err(MomentumError::InvalidPrice {
                instrument: instrument_id.to_string(),
                date: past.date,
                price: past.close,
            });
        }
        component_returns.push((lookback, current_price / past.close - 1.0));
    }

    let composite_score = component_returns
        .iter()
        .zip(weights)
        .map(|((_, ret), w)| ret * w)
        .sum();

    Ok(MomentumScore {
        instrument_id: instrument_id.to_string(),
        as_of_date,
        component_returns,
        composite_score,
    })
}

/// Highest composite first; equal scores fall back to instrument id ascending.
pub fn rank(mut scores: Vec<MomentumScore>) -> Vec<MomentumScore> {
    scores.sort_by(compare_scores);
    scores
}

fn compare_scores(a: &MomentumScore, b: &MomentumScore) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| a.instrument_id.cmp(&b.instrument_id))
}
