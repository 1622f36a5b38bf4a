//! Risk-profile drift and robustness grading between the two windows.
//!
//! Percentages here are percentage points or percent changes, matching how the
//! summary prints them. Ratios against a zero or negative in-sample base are
//! reported as 0.

use serde::Serialize;
use std::fmt;

use super::metrics::PerformanceMetrics;

/// OOS risk relative to IS. Positive changes mean OOS carried more of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskChanges {
    pub volatility_change_pct: f64,
    pub downside_risk_change_pct: f64,
    /// OOS worst daily return minus IS worst daily return.
    pub tail_risk_change: f64,
    pub risk_adjusted_change_pct: f64,
}

fn percent_change(is: f64, oos: f64) -> f64 {
    if is > 0.0 {
        (oos / is - 1.0) * 100.0
    } else {
        0.0
    }
}

impl RiskChanges {
    pub fn from_metrics(is: &PerformanceMetrics, oos: &PerformanceMetrics) -> Self {
        RiskChanges {
            volatility_change_pct: percent_change(
                is.annualized_volatility,
                oos.annualized_volatility,
            ),
            downside_risk_change_pct: percent_change(
                is.downside_deviation,
                oos.downside_deviation,
            ),
            tail_risk_change: oos.worst_return - is.worst_return,
            risk_adjusted_change_pct: percent_change(is.sharpe_ratio, oos.sharpe_ratio),
        }
    }
}

/// Scores run 0..=100, higher meaning the windows behave more alike.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyAnalysis {
    /// |IS win rate − OOS win rate| in percentage points.
    pub win_rate_gap_pct: f64,
    /// 100 less 50 per unit of Sharpe difference, floored at 0.
    pub risk_profile_consistency: f64,
    pub overall_consistency_score: f64,
}

impl ConsistencyAnalysis {
    pub fn from_metrics(is: &PerformanceMetrics, oos: &PerformanceMetrics) -> Self {
        let win_rate_gap_pct = (is.win_rate - oos.win_rate).abs() * 100.0;
        let sharpe_gap = (is.sharpe_ratio - oos.sharpe_ratio).abs();
        let risk_profile_consistency = (100.0 - sharpe_gap * 50.0).max(0.0);
        ConsistencyAnalysis {
            win_rate_gap_pct,
            risk_profile_consistency,
            overall_consistency_score: (100.0 - win_rate_gap_pct) * 0.5
                + risk_profile_consistency * 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    VeryHigh,
    High,
    Moderate,
    Low,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::VeryHigh => "VERY_HIGH",
            Grade::High => "HIGH",
            Grade::Moderate => "MODERATE",
            Grade::Low => "LOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverfittingRisk {
    VeryLow,
    Low,
    Moderate,
    High,
}

impl fmt::Display for OverfittingRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverfittingRisk::VeryLow => "VERY_LOW",
            OverfittingRisk::Low => "LOW",
            OverfittingRisk::Moderate => "MODERATE",
            OverfittingRisk::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    DeployWithConfidence,
    DeployWithMonitoring,
    FurtherTestingNeeded,
    RedesignStrategy,
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecommendedAction::DeployWithConfidence => "DEPLOY_WITH_CONFIDENCE",
            RecommendedAction::DeployWithMonitoring => "DEPLOY_WITH_MONITORING",
            RecommendedAction::FurtherTestingNeeded => "FURTHER_TESTING_NEEDED",
            RecommendedAction::RedesignStrategy => "REDESIGN_STRATEGY",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RobustnessConclusion {
    pub consistency: Grade,
    pub strategy_robustness: Grade,
    pub overfitting_risk: OverfittingRisk,
    pub recommended_action: RecommendedAction,
}

/// Grade the absolute return degradation: under 2, 5 and 10 percentage
/// points are the VERY_HIGH, HIGH and MODERATE bands; anything larger is LOW.
/// Improvement counts by its size too, so a large OOS gain is not robust.
pub fn conclude(degradation_fraction: f64) -> RobustnessConclusion {
    let gap = degradation_fraction.abs();
    let (grade, overfitting_risk, recommended_action) = if gap < 0.02 {
        (
            Grade::VeryHigh,
            OverfittingRisk::VeryLow,
            RecommendedAction::DeployWithConfidence,
        )
    } else if gap < 0.05 {
        (
            Grade::High,
            OverfittingRisk::Low,
            RecommendedAction::DeployWithMonitoring,
        )
    } else if gap < 0.10 {
        (
            Grade::Moderate,
            OverfittingRisk::Moderate,
            RecommendedAction::FurtherTestingNeeded,
        )
    } else {
        (Grade::Low, OverfittingRisk::High, RecommendedAction::RedesignStrategy)
    };
    RobustnessConclusion {
        consistency: grade,
        strategy_robustness: grade,
        overfitting_risk,
        recommended_action,
    }
}
