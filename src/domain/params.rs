//! Frozen strategy parameters.
//!
//! [`FrozenParameters`] holds the look-backs, weights, cadence and cost of a
//! strategy. It is validated once and wrapped in an `Arc`. The same instance is
//! handed to both the in-sample and out-of-sample runs, and the validator checks
//! identity rather than equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::error::MomentumError;

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
pub const MAX_TRANSACTION_COST: f64 = 0.05;

pub const DEFAULT_LOOKBACK_DAYS: [usize; 3] = [30, 90, 180];
pub const DEFAULT_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];
pub const DEFAULT_TRANSACTION_COST: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceCadence {
    Monthly,
    Weekly,
}

impl fmt::Display for RebalanceCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceCadence::Monthly => write!(f, "monthly"),
            RebalanceCadence::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for RebalanceCadence {
    type Err = MomentumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(RebalanceCadence::Monthly),
            "weekly" => Ok(RebalanceCadence::Weekly),
            other => Err(MomentumError::InvalidParameter {
                field: "rebalance_cadence".into(),
                reason: format!("unknown cadence '{other}', expected monthly or weekly"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrozenParameters {
    lookback_days: Vec<usize>,
    weights: Vec<f64>,
    rebalance_cadence: RebalanceCadence,
    transaction_cost_fraction: f64,
}

impl FrozenParameters {
    /// Validate and freeze. The returned `Arc` is the only handle ever given out.
    pub fn freeze(
        lookback_days: Vec<usize>,
        weights: Vec<f64>,
        rebalance_cadence: RebalanceCadence,
        transaction_cost_fraction: f64,
    ) -> Result<Arc<Self>, MomentumError> {
        validate_lookbacks(&lookback_days)?;
        validate_weights(&weights, lookback_days.len())?;
        if !(0.0..=MAX_TRANSACTION_COST).contains(&transaction_cost_fraction) {
            return Err(MomentumError::InvalidParameter {
                field: "transaction_cost_fraction".into(),
                reason: format!(
                    "{transaction_cost_fraction} outside [0, {MAX_TRANSACTION_COST}]"
                ),
            });
        }
        Ok(Arc::new(FrozenParameters {
            lookback_days,
            weights,
            rebalance_cadence,
            transaction_cost_fraction,
        }))
    }

    pub fn lookback_days(&self) -> &[usize] {
        &self.lookback_days
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn rebalance_cadence(&self) -> RebalanceCadence {
        self.rebalance_cadence
    }

    pub fn transaction_cost_fraction(&self) -> f64 {
        self.transaction_cost_fraction
    }

    pub fn max_lookback(&self) -> usize {
        self.lookback_days.iter().copied().max().unwrap_or(0)
    }

    /// BLAKE3 hash of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "lookback_days": &self.lookback_days,
            "rebalance_cadence": self.rebalance_cadence,
            "transaction_cost_fraction": self.transaction_cost_fraction,
            "weights": &self.weights,
        });
        blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string()
    }
}

impl Default for FrozenParameters {
    fn default() -> Self {
        FrozenParameters {
            lookback_days: DEFAULT_LOOKBACK_DAYS.to_vec(),
            weights: DEFAULT_WEIGHTS.to_vec(),
            rebalance_cadence: RebalanceCadence::Monthly,
            transaction_cost_fraction: DEFAULT_TRANSACTION_COST,
        }
    }
}

pub fn validate_lookbacks(lookback_days: &[usize]) -> Result<(), MomentumError> {
    if lookback_days.is_empty() {
        return Err(MomentumError::InvalidParameter {
            field: "lookback_days".into(),
            reason: "at least one lookback is required".into(),
        });
    }
    if lookback_days.contains(&0) {
        return Err(MomentumError::InvalidParameter {
            field: "lookback_days".into(),
            reason: "lookbacks must be positive".into(),
        });
    }
    Ok(())
}

pub fn validate_weights(weights: &[f64], lookback_count: usize) -> Result<(), MomentumError> {
    if weights.len() != lookback_count {
        return Err(MomentumError::InvalidWeights {
            reason: format!(
                "{} weights for {} lookbacks",
                weights.len(),
                lookback_count
            ),
        });
    }
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(MomentumError::InvalidWeights {
            reason: "weights must be finite".into(),
        });
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(MomentumError::InvalidWeights {
            reason: format!("weights sum to {sum}, expected 1.0"),
        });
    }
    Ok(())
}
