//! Domain error types.

use chrono::NaiveDate;

use super::validation::LeakReason;

/// Which side of a split a window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowSide {
    InSample,
    OutOfSample,
}

impl std::fmt::Display for WindowSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowSide::InSample => write!(f, "in-sample"),
            WindowSide::OutOfSample => write!(f, "out-of-sample"),
        }
    }
}

/// Top-level error type for momentum-wf.
#[derive(Debug, thiserror::Error)]
pub enum MomentumError {
    #[error(
        "insufficient history for {instrument} as of {as_of}: {bars} prior bars, need {required}"
    )]
    InsufficientHistory {
        instrument: String,
        as_of: NaiveDate,
        bars: usize,
        required: usize,
    },

    #[error("invalid weights: {reason}")]
    InvalidWeights { reason: String },

    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error(
        "insufficient {side} data for {instrument} at {split_date}: {bars} bars, need {required}"
    )]
    InsufficientSplitData {
        instrument: String,
        side: WindowSide,
        split_date: NaiveDate,
        bars: usize,
        required: usize,
    },

    #[error("insufficient cash on {date}: balance {cash:.6} before buy")]
    InsufficientCash { date: NaiveDate, cash: f64 },

    #[error("parameter leak: {}", format_reasons(.reasons))]
    ParameterLeak { reasons: Vec<LeakReason> },

    #[error("missing price for {instrument} on {date}")]
    MissingPrice { instrument: String, date: NaiveDate },

    #[error("invalid price {price} for {instrument} on {date}")]
    InvalidPrice {
        instrument: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("invalid series for {instrument}: {reason}")]
    InvalidSeries { instrument: String, reason: String },

    #[error("backtest engine cannot run from state {state}")]
    EngineState { state: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("no trading days between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_reasons(reasons: &[LeakReason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl MomentumError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        MomentumError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&MomentumError> for std::process::ExitCode {
    fn from(err: &MomentumError) -> Self {
        let code: u8 = match err {
            MomentumError::Io(_) | MomentumError::Serialization(_) => 1,
            MomentumError::ConfigParse { .. }
            | MomentumError::ConfigInvalid { .. }
            | MomentumError::InvalidWeights { .. }
            | MomentumError::InvalidParameter { .. } => 2,
            MomentumError::NoData { .. }
            | MomentumError::EmptyRange { .. }
            | MomentumError::DataSource { .. }
            | MomentumError::InvalidSeries { .. }
            | MomentumError::InsufficientSplitData { .. } => 3,
            MomentumError::InsufficientHistory { .. }
            | MomentumError::InsufficientCash { .. }
            | MomentumError::MissingPrice { .. }
            | MomentumError::InvalidPrice { .. }
            | MomentumError::EngineState { .. } => 4,
            MomentumError::ParameterLeak { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_split_data_names_the_side() {
        let err = MomentumError::InsufficientSplitData {
            instrument: "SPY".into(),
            side: WindowSide::OutOfSample,
            split_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            bars: 10,
            required: 30,
        };
        assert_eq!(
            err.to_string(),
            "insufficient out-of-sample data for SPY at 2024-06-01: 10 bars, need 30"
        );
    }

    #[test]
    fn parameter_leak_lists_every_reason() {
        let err = MomentumError::ParameterLeak {
            reasons: vec![
                LeakReason::FieldMismatch {
                    field: "weights".into(),
                    in_sample: "[0.5,0.5]".into(),
                    out_of_sample: "[0.6,0.4]".into(),
                },
                LeakReason::DistinctInstance,
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("parameter leak: "));
        assert!(msg.contains("weights"));
        assert!(msg.contains("; "));
    }

    #[test]
    fn config_invalid_helper() {
        let err = MomentumError::config_invalid("strategy", "weights", "must sum to 1");
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] weights: must sum to 1"
        );
    }
}
