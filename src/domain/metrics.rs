//! Performance metrics computed from an equity curve.

use serde::Serialize;
use statrs::statistics::Statistics;

use super::portfolio::EquityPoint;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// Number of daily returns.
    pub observations: usize,
    pub total_return: f64,
    pub annualized_return: f64,
    pub mean_return: f64,
    /// Sample standard deviation of daily returns.
    pub volatility: f64,
    pub annualized_volatility: f64,
    pub downside_deviation: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    /// Share of days with a positive return.
    pub win_rate: f64,
    pub best_return: f64,
    pub worst_return: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
}

impl PerformanceMetrics {
    pub fn from_equity_curve(curve: &[EquityPoint]) -> Self {
        let values: Vec<f64> = curve.iter().map(|p| p.total_value).collect();
        let returns = simple_returns(&values);
        let (max_drawdown, max_drawdown_duration) = drawdown(&values);

        let total_return = match (values.first(), values.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => last / first - 1.0,
            _ => 0.0,
        };

        let mut metrics = PerformanceMetrics {
            observations: returns.len(),
            total_return,
            max_drawdown,
            max_drawdown_duration,
            ..Default::default()
        };
        if returns.is_empty() {
            return metrics;
        }

        let n = returns.len() as f64;
        let mean = returns.as_slice().mean();
        let volatility = if returns.len() > 1 {
            returns.as_slice().std_dev()
        } else {
            0.0
        };
        let downside_deviation =
            (returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum::<f64>() / n).sqrt();

        metrics.annualized_return = if total_return > -1.0 {
            (1.0 + total_return).powf(TRADING_DAYS_PER_YEAR / n) - 1.0
        } else {
            -1.0
        };
        metrics.mean_return = mean;
        metrics.volatility = volatility;
        metrics.annualized_volatility = volatility * TRADING_DAYS_PER_YEAR.sqrt();
        metrics.downside_deviation = downside_deviation;
        metrics.sharpe_ratio = annualized_ratio(mean, volatility);
        metrics.sortino_ratio = annualized_ratio(mean, downside_deviation);
        metrics.win_rate = returns.iter().filter(|r| **r > 0.0).count() as f64 / n;
        metrics.best_return = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        metrics.worst_return = returns.iter().copied().fold(f64::INFINITY, f64::min);
        metrics.skewness = standardized_moment(&returns, mean, volatility, 3, 3);
        metrics.excess_kurtosis = if returns.len() >= 4 && volatility > 0.0 {
            standardized_moment(&returns, mean, volatility, 4, 4) - 3.0
        } else {
            0.0
        };
        metrics
    }
}

/// Day-over-day simple returns; steps from a non-positive value are skipped.
pub fn simple_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn annualized_ratio(mean: f64, deviation: f64) -> f64 {
    if deviation > 0.0 {
        mean / deviation * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Mean of ((r - mean) / sd)^power, zero below `min_len` samples or with no
/// dispersion.
fn standardized_moment(returns: &[f64], mean: f64, sd: f64, power: i32, min_len: usize) -> f64 {
    if returns.len() < min_len || sd <= 0.0 {
        return 0.0;
    }
    returns
        .iter()
        .map(|r| ((r - mean) / sd).powi(power))
        .sum::<f64>()
        / returns.len() as f64
}

fn drawdown(values: &[f64]) -> (f64, usize) {
    let Some(&first) = values.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut duration = 0usize;
    let mut max_duration = 0usize;

    for &value in values {
        if value >= peak {
            peak = value;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}
