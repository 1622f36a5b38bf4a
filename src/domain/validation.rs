//! Out-of-sample acceptance.
//!
//! An OOS result is only usable once it has been checked against the IS run:
//! both must have been driven by the very same frozen parameter instance and
//! the OOS run must lie entirely after the split. The only way to obtain an
//! [`AcceptedOos`] is through [`accept`], and the comparator takes nothing else.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{info, warn};

use super::backtest::BacktestResult;
use super::error::MomentumError;
use super::params::FrozenParameters;
use super::split::SplitBoundary;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeakReason {
    FieldMismatch {
        field: String,
        in_sample: String,
        out_of_sample: String,
    },
    /// Equal values, but not the instance frozen for the IS run.
    DistinctInstance,
    StartsBeforeSplit {
        oos_start: NaiveDate,
        split_date: NaiveDate,
    },
    DateOverlap {
        is_end: NaiveDate,
        oos_start: NaiveDate,
    },
}

impl fmt::Display for LeakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeakReason::FieldMismatch {
                field,
                in_sample,
                out_of_sample,
            } => write!(
                f,
                "{field} differs (in-sample {in_sample}, out-of-sample {out_of_sample})"
            ),
            LeakReason::DistinctInstance => {
                write!(f, "out-of-sample run used a re-created parameter set")
            }
            LeakReason::StartsBeforeSplit {
                oos_start,
                split_date,
            } => write!(f, "out-of-sample run starts {oos_start}, before split {split_date}"),
            LeakReason::DateOverlap { is_end, oos_start } => write!(
                f,
                "in-sample run ends {is_end}, not before out-of-sample start {oos_start}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reasons", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    Pass,
    ParameterLeak(Vec<LeakReason>),
}

impl ValidationOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ValidationOutcome::Pass)
    }

    pub fn reasons(&self) -> &[LeakReason] {
        match self {
            ValidationOutcome::Pass => &[],
            ValidationOutcome::ParameterLeak(reasons) => reasons,
        }
    }

    fn from_reasons(reasons: Vec<LeakReason>) -> Self {
        if reasons.is_empty() {
            ValidationOutcome::Pass
        } else {
            ValidationOutcome::ParameterLeak(reasons)
        }
    }
}

/// Compare the parameter sets of the two runs field by field.
pub fn check_parameters(
    is_params: &Arc<FrozenParameters>,
    oos_params: &Arc<FrozenParameters>,
) -> ValidationOutcome {
    if Arc::ptr_eq(is_params, oos_params) {
        return ValidationOutcome::Pass;
    }

    let mut reasons = Vec::new();
    let mut field = |name: &str, a: String, b: String| {
        if a != b {
            reasons.push(LeakReason::FieldMismatch {
                field: name.to_string(),
                in_sample: a,
                out_of_sample: b,
            });
        }
    };
    field(
        "lookback_days",
        format!("{:?}", is_params.lookback_days()),
        format!("{:?}", oos_params.lookback_days()),
    );
    field(
        "weights",
        format!("{:?}", is_params.weights()),
        format!("{:?}", oos_params.weights()),
    );
    field(
        "rebalance_cadence",
        is_params.rebalance_cadence().to_string(),
        oos_params.rebalance_cadence().to_string(),
    );
    field(
        "transaction_cost_fraction",
        format!("{:?}", is_params.transaction_cost_fraction()),
        format!("{:?}", oos_params.transaction_cost_fraction()),
    );

    if reasons.is_empty() {
        reasons.push(LeakReason::DistinctInstance);
    }
    ValidationOutcome::ParameterLeak(reasons)
}

/// Full check of an OOS run against its IS counterpart.
pub fn validate(
    is_result: &BacktestResult,
    oos_result: &BacktestResult,
    boundary: &SplitBoundary,
) -> ValidationOutcome {
    let mut reasons = check_parameters(&is_result.params, &oos_result.params)
        .reasons()
        .to_vec();

    if oos_result.start_date < boundary.split_date {
        reasons.push(LeakReason::StartsBeforeSplit {
            oos_start: oos_result.start_date,
            split_date: boundary.split_date,
        });
    }
    if is_result.end_date >= oos_result.start_date {
        reasons.push(LeakReason::DateOverlap {
            is_end: is_result.end_date,
            oos_start: oos_result.start_date,
        });
    }

    ValidationOutcome::from_reasons(reasons)
}

/// An OOS result that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AcceptedOos(BacktestResult);

impl AcceptedOos {
    pub fn into_inner(self) -> BacktestResult {
        self.0
    }
}

impl Deref for AcceptedOos {
    type Target = BacktestResult;

    fn deref(&self) -> &BacktestResult {
        &self.0
    }
}

/// Validate and, on success, wrap the OOS result for comparison. A leak is a
/// hard error.
pub fn accept(
    is_result: &BacktestResult,
    oos_result: BacktestResult,
    boundary: &SplitBoundary,
) -> Result<AcceptedOos, MomentumError> {
    match validate(is_result, &oos_result, boundary) {
        ValidationOutcome::Pass => {
            info!(
                fingerprint = %oos_result.params.fingerprint(),
                oos_start = %oos_result.start_date,
                "out-of-sample run accepted"
            );
            Ok(AcceptedOos(oos_result))
        }
        ValidationOutcome::ParameterLeak(reasons) => {
            for reason in &reasons {
                warn!(%reason, "out-of-sample run rejected");
            }
            Err(MomentumError::ParameterLeak { reasons })
        }
    }
}
