//! In-sample vs out-of-sample comparison.
//!
//! The headline number is the return degradation `is_return - oos_return`,
//! classified against a tolerance. Everything else in the report (trade and
//! cost statistics, risk metrics, consistency, significance tests) exists so a
//! reader can tell cheaper trading apart from genuine decay.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use std::fmt;
use tracing::info;

use super::backtest::BacktestResult;
use super::consistency::{conclude, ConsistencyAnalysis, RiskChanges, RobustnessConclusion};
use super::error::MomentumError;
use super::metrics::PerformanceMetrics;
use super::validation::AcceptedOos;

pub const DEFAULT_DEGRADATION_TOLERANCE: f64 = 0.05;
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparatorConfig {
    degradation_tolerance: f64,
}

impl ComparatorConfig {
    pub fn new(degradation_tolerance: f64) -> Result<Self, MomentumError> {
        if !degradation_tolerance.is_finite() || degradation_tolerance < 0.0 {
            return Err(MomentumError::InvalidParameter {
                field: "degradation_tolerance".into(),
                reason: format!("{degradation_tolerance} must be a non-negative fraction"),
            });
        }
        Ok(ComparatorConfig {
            degradation_tolerance,
        })
    }

    pub fn degradation_tolerance(&self) -> f64 {
        self.degradation_tolerance
    }
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        ComparatorConfig {
            degradation_tolerance: DEFAULT_DEGRADATION_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Improved,
    Acceptable,
    Degraded,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Improved => "IMPROVED",
            Verdict::Acceptable => "ACCEPTABLE",
            Verdict::Degraded => "DEGRADED",
        };
        f.write_str(s)
    }
}

/// Both bounds are inclusive: zero degradation is IMPROVED and degradation
/// equal to the tolerance is ACCEPTABLE.
pub fn classify(degradation_fraction: f64, tolerance: f64) -> Verdict {
    if degradation_fraction <= 0.0 {
        Verdict::Improved
    } else if degradation_fraction <= tolerance {
        Verdict::Acceptable
    } else {
        Verdict::Degraded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryStats {
    pub is_rebalance_count: usize,
    pub oos_rebalance_count: usize,
    /// OOS minus IS.
    pub rebalance_count_difference: i64,
    pub is_trade_count: usize,
    pub oos_trade_count: usize,
    pub is_transaction_cost_total: f64,
    pub oos_transaction_cost_total: f64,
    pub is_cost_fraction_of_capital: f64,
    pub oos_cost_fraction_of_capital: f64,
}

impl SecondaryStats {
    fn from_results(is: &BacktestResult, oos: &BacktestResult) -> Self {
        let cost_share = |r: &BacktestResult| {
            if r.initial_capital > 0.0 {
                r.transaction_cost_total / r.initial_capital
            } else {
                0.0
            }
        };
        SecondaryStats {
            is_rebalance_count: is.rebalance_count,
            oos_rebalance_count: oos.rebalance_count,
            rebalance_count_difference: oos.rebalance_count as i64 - is.rebalance_count as i64,
            is_trade_count: is.trade_count(),
            oos_trade_count: oos.trade_count(),
            is_transaction_cost_total: is.transaction_cost_total,
            oos_transaction_cost_total: oos.transaction_cost_total,
            is_cost_fraction_of_capital: cost_share(is),
            oos_cost_fraction_of_capital: cost_share(oos),
        }
    }
}

/// Positive values mean OOS is worse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationAnalysis {
    pub return_degradation: f64,
    pub sharpe_degradation: f64,
    pub drawdown_increase: f64,
    pub volatility_increase: f64,
}

impl DegradationAnalysis {
    fn from_metrics(is: &PerformanceMetrics, oos: &PerformanceMetrics) -> Self {
        DegradationAnalysis {
            return_degradation: is.total_return - oos.total_return,
            sharpe_degradation: is.sharpe_ratio - oos.sharpe_ratio,
            drawdown_increase: oos.max_drawdown - is.max_drawdown,
            volatility_increase: oos.annualized_volatility - is.annualized_volatility,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanDifferenceTest {
    pub is_mean: f64,
    pub oos_mean: f64,
    pub difference: f64,
    pub t_statistic: f64,
    /// Two-sided, normal approximation.
    pub p_value: f64,
    pub significant: bool,
}

/// Welch's unequal-variance t statistic on daily returns. `None` when either
/// side has fewer than two observations.
pub fn mean_difference_test(
    is_returns: &[f64],
    oos_returns: &[f64],
) -> Option<MeanDifferenceTest> {
    if is_returns.len() < 2 || oos_returns.len() < 2 {
        return None;
    }
    let is_mean = is_returns.mean();
    let oos_mean = oos_returns.mean();
    let se = (is_returns.variance() / is_returns.len() as f64
        + oos_returns.variance() / oos_returns.len() as f64)
        .sqrt();

    let (t_statistic, p_value) = if se > 0.0 {
        let t = (is_mean - oos_mean) / se;
        let p = 2.0 * (1.0 - Normal::standard().cdf(t.abs()));
        (t, p.clamp(0.0, 1.0))
    } else {
        (0.0, 1.0)
    };

    Some(MeanDifferenceTest {
        is_mean,
        oos_mean,
        difference: is_mean - oos_mean,
        t_statistic,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceComparison {
    pub is_variance: f64,
    pub oos_variance: f64,
    /// Larger variance over smaller, always ≥ 1.
    pub f_statistic: f64,
    /// OOS over IS.
    pub variance_ratio: f64,
}

pub fn variance_comparison(is_returns: &[f64], oos_returns: &[f64]) -> Option<VarianceComparison> {
    if is_returns.len() < 2 || oos_returns.len() < 2 {
        return None;
    }
    let is_variance = is_returns.variance();
    let oos_variance = oos_returns.variance();
    if !(is_variance > 0.0 && oos_variance > 0.0) {
        return None;
    }
    Some(VarianceComparison {
        is_variance,
        oos_variance,
        f_statistic: is_variance.max(oos_variance) / is_variance.min(oos_variance),
        variance_ratio: oos_variance / is_variance,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub parameter_fingerprint: String,
    pub degradation_fraction: f64,
    pub degradation_tolerance: f64,
    pub verdict: Verdict,
    pub secondary: SecondaryStats,
    pub is_metrics: PerformanceMetrics,
    pub oos_metrics: PerformanceMetrics,
    pub degradation: DegradationAnalysis,
    pub risk_changes: RiskChanges,
    pub consistency: ConsistencyAnalysis,
    pub conclusion: RobustnessConclusion,
    pub mean_difference: Option<MeanDifferenceTest>,
    pub variance: Option<VarianceComparison>,
    pub is_result: BacktestResult,
    pub oos_result: BacktestResult,
}

/// Compare an IS run with a validated OOS run.
pub fn compare(
    is_result: BacktestResult,
    oos_result: AcceptedOos,
    config: &ComparatorConfig,
) -> ComparisonReport {
    let oos_result = oos_result.into_inner();
    let degradation_fraction = is_result.total_return_fraction - oos_result.total_return_fraction;
    let verdict = classify(degradation_fraction, config.degradation_tolerance);
    let conclusion = conclude(degradation_fraction);

    let is_metrics = PerformanceMetrics::from_equity_curve(&is_result.equity_curve);
    let oos_metrics = PerformanceMetrics::from_equity_curve(&oos_result.equity_curve);
    let is_returns = is_result.daily_returns();
    let oos_returns = oos_result.daily_returns();

    info!(
        is_return = is_result.total_return_fraction,
        oos_return = oos_result.total_return_fraction,
        degradation = degradation_fraction,
        %verdict,
        robustness = %conclusion.strategy_robustness,
        "comparison complete"
    );

    ComparisonReport {
        parameter_fingerprint: is_result.params.fingerprint(),
        degradation_fraction,
        degradation_tolerance: config.degradation_tolerance,
        verdict,
        secondary: SecondaryStats::from_results(&is_result, &oos_result),
        degradation: DegradationAnalysis::from_metrics(&is_metrics, &oos_metrics),
        risk_changes: RiskChanges::from_metrics(&is_metrics, &oos_metrics),
        consistency: ConsistencyAnalysis::from_metrics(&is_metrics, &oos_metrics),
        conclusion,
        is_metrics,
        oos_metrics,
        mean_difference: mean_difference_test(&is_returns, &oos_returns),
        variance: variance_comparison(&is_returns, &oos_returns),
        is_result,
        oos_result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::{FrozenParameters, RebalanceCadence};
    use crate::domain::consistency::RecommendedAction;
    use crate::domain::portfolio::EquityPoint;
    use crate::domain::split::SplitBoundary;
    use crate::domain::validation::accept;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn curve(start: &str, values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                date: d(start) + chrono::Duration::days(i as i64),
                total_value: v,
            })
            .collect()
    }

    fn result(
        params: &Arc<FrozenParameters>,
        start: &str,
        total_return: f64,
        values: &[f64],
    ) -> BacktestResult {
        let equity_curve = curve(start, values);
        BacktestResult {
            params: Arc::clone(params),
            start_date: equity_curve[0].date,
            end_date: equity_curve[equity_curve.len() - 1].date,
            initial_capital: 100.0,
            final_value: 100.0 * (1.0 + total_return),
            final_holding: None,
            equity_curve,
            trade_log: vec![],
            decisions: vec![],
            total_return_fraction: total_return,
            rebalance_count: 0,
            transaction_cost_total: 0.0,
        }
    }

    fn pair(is_return: f64, oos_return: f64) -> (BacktestResult, AcceptedOos) {
        let params =
            FrozenParameters::freeze(vec![1], vec![1.0], RebalanceCadence::Monthly, 0.0).unwrap();
        let is = result(&params, "2024-01-01", is_return, &[100.0, 101.0, 103.0, 102.0]);
        let oos = result(&params, "2024-03-01", oos_return, &[100.0, 99.0, 100.5, 100.0]);
        let boundary = SplitBoundary {
            split_date: d("2024-02-01"),
            is_start: d("2024-01-01"),
            is_end: d("2024-01-31"),
            oos_start: d("2024-02-01"),
            oos_end: d("2024-03-31"),
        };
        let accepted = accept(&is, oos, &boundary).unwrap();
        (is, accepted)
    }

    #[test]
    fn degradation_equal_to_tolerance_is_acceptable() {
        let (is, oos) = pair(0.05, 0.0);
        let report = compare(is, oos, &ComparatorConfig::new(0.05).unwrap());
        assert_eq!(report.degradation_fraction, 0.05);
        assert_eq!(report.verdict, Verdict::Acceptable);
    }

    #[test]
    fn boundary_is_inclusive_for_binary_exact_values() {
        let (is, oos) = pair(0.25, 0.1875);
        let report = compare(is, oos, &ComparatorConfig::new(0.0625).unwrap());
        assert_eq!(report.degradation_fraction, 0.0625);
        assert_eq!(report.verdict, Verdict::Acceptable);
    }

    #[test]
    fn beyond_tolerance_is_degraded() {
        let (is, oos) = pair(0.25, 0.125);
        let report = compare(is, oos, &ComparatorConfig::default());
        assert_eq!(report.verdict, Verdict::Degraded);
    }

    #[test]
    fn matching_or_beating_is_improved() {
        assert_eq!(classify(0.0, 0.05), Verdict::Improved);
        assert_eq!(classify(-0.1, 0.05), Verdict::Improved);
        assert_eq!(classify(1e-12, 0.0), Verdict::Degraded);
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        assert!(ComparatorConfig::new(-0.01).is_err());
        assert!(ComparatorConfig::new(f64::NAN).is_err());
    }

    #[test]
    fn secondary_stats_report_both_windows() {
        let (mut is, oos) = pair(0.1, 0.1);
        is.rebalance_count = 5;
        is.transaction_cost_total = 2.0;
        let report = compare(is, oos, &ComparatorConfig::default());
        assert_eq!(report.secondary.is_rebalance_count, 5);
        assert_eq!(report.secondary.rebalance_count_difference, -5);
        assert_relative_eq!(report.secondary.is_cost_fraction_of_capital, 0.02);
        assert_eq!(report.secondary.oos_transaction_cost_total, 0.0);
    }

    #[test]
    fn report_carries_metrics_and_tests() {
        let (is, oos) = pair(0.02, 0.0);
        let report = compare(is, oos, &ComparatorConfig::default());
        assert_eq!(report.is_metrics.observations, 3);
        assert!(report.mean_difference.is_some());
        assert!(report.variance.is_some());
        assert_relative_eq!(
            report.degradation.return_degradation,
            report.is_metrics.total_return - report.oos_metrics.total_return
        );
    }

    #[test]
    fn report_grades_robustness_from_degradation() {
        let (is, oos) = pair(0.25, 0.1875);
        let report = compare(is, oos, &ComparatorConfig::default());
        assert_eq!(report.conclusion, conclude(0.0625));
        assert_eq!(report.conclusion.recommended_action, RecommendedAction::FurtherTestingNeeded);
        assert_eq!(
            report.consistency,
            ConsistencyAnalysis::from_metrics(&report.is_metrics, &report.oos_metrics)
        );
        assert_relative_eq!(
            report.risk_changes.tail_risk_change,
            report.oos_metrics.worst_return - report.is_metrics.worst_return
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["conclusion"]["strategy_robustness"], "MODERATE");
        assert!(json["consistency"]["overall_consistency_score"].is_number());
    }

    #[test]
    fn identical_series_are_not_significant() {
        let r = [0.01, -0.02, 0.015, 0.0, 0.005];
        let test = mean_difference_test(&r, &r).unwrap();
        assert_eq!(test.t_statistic, 0.0);
        assert_relative_eq!(test.p_value, 1.0, epsilon = 1e-12);
        assert!(!test.significant);
    }

    #[test]
    fn clearly_different_means_are_significant() {
        let a: Vec<f64> = (0..50).map(|i| 0.02 + 0.001 * ((i % 3) as f64)).collect();
        let b: Vec<f64> = (0..50).map(|i| -0.02 + 0.001 * ((i % 3) as f64)).collect();
        let test = mean_difference_test(&a, &b).unwrap();
        assert!(test.t_statistic > 10.0);
        assert!(test.significant);
    }

    #[test]
    fn constant_series_have_no_test() {
        let test = mean_difference_test(&[0.01, 0.01], &[0.01, 0.01]).unwrap();
        assert_eq!(test.p_value, 1.0);
        assert!(variance_comparison(&[0.01, 0.01], &[0.0, 0.02]).is_none());
        assert!(mean_difference_test(&[0.01], &[0.0, 0.02]).is_none());
    }

    #[test]
    fn variance_ratio_is_oos_over_is() {
        let v = variance_comparison(&[0.0, 0.02], &[0.0, 0.04]).unwrap();
        assert_relative_eq!(v.variance_ratio, 4.0, epsilon = 1e-9);
        assert_relative_eq!(v.f_statistic, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn verdict_serialises_screaming() {
        assert_eq!(serde_json::to_string(&Verdict::Acceptable).unwrap(), "\"ACCEPTABLE\"");
    }
}
