//! Configuration validation.
//!
//! Every field is parsed and checked here before any data is loaded or any run
//! starts. Values that are present but unparsable are errors rather than being
//! replaced by defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::backtest::{BacktestConfig, DEFAULT_INITIAL_CAPITAL};
use crate::domain::comparator::{ComparatorConfig, DEFAULT_DEGRADATION_TOLERANCE};
use crate::domain::error::MomentumError;
use crate::domain::params::{
    FrozenParameters, RebalanceCadence, DEFAULT_LOOKBACK_DAYS, DEFAULT_TRANSACTION_COST,
    DEFAULT_WEIGHTS,
};
use crate::domain::walk_forward::{WalkForwardConfig, DEFAULT_OOS_FRACTION};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_DATA_DIR: &str = "data";

/// Where prices come from and which slice of them to use.
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseConfig {
    /// Empty means every instrument found in `data_dir`.
    pub instruments: Vec<String>,
    pub data_dir: PathBuf,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub params: Arc<FrozenParameters>,
    pub universe: UniverseConfig,
    pub walk_forward: WalkForwardConfig,
}

/// Validate the whole file and freeze the strategy parameters.
pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, MomentumError> {
    let params = load_parameters(config)?;
    let universe = load_universe_config(config)?;
    let backtest = load_backtest_config(config)?;
    let walk_forward = load_walk_forward_config(config, backtest)?;
    Ok(RunConfig {
        params,
        universe,
        walk_forward,
    })
}

pub fn load_parameters(config: &dyn ConfigPort) -> Result<Arc<FrozenParameters>, MomentumError> {
    let lookback_days = parse_list::<usize>(config, "strategy", "lookback_days")?
        .unwrap_or_else(|| DEFAULT_LOOKBACK_DAYS.to_vec());
    let weights = parse_list::<f64>(config, "strategy", "weights")?
        .unwrap_or_else(|| DEFAULT_WEIGHTS.to_vec());
    let cadence = match config.get_string("strategy", "rebalance_cadence") {
        Some(raw) => raw.parse::<RebalanceCadence>().map_err(|e| {
            MomentumError::config_invalid("strategy", "rebalance_cadence", e.to_string())
        })?,
        None => RebalanceCadence::Monthly,
    };
    let cost = parse_value::<f64>(config, "strategy", "transaction_cost")?
        .unwrap_or(DEFAULT_TRANSACTION_COST);

    FrozenParameters::freeze(lookback_days, weights, cadence, cost)
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, MomentumError> {
    let initial_capital = parse_value::<f64>(config, "backtest", "initial_capital")?
        .unwrap_or(DEFAULT_INITIAL_CAPITAL);
    if !initial_capital.is_finite() || initial_capital <= 0.0 {
        return Err(MomentumError::config_invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(BacktestConfig { initial_capital })
}

pub fn load_universe_config(config: &dyn ConfigPort) -> Result<UniverseConfig, MomentumError> {
    let instruments = config.get_list("backtest", "instruments").unwrap_or_default();
    let data_dir = config
        .get_string("backtest", "data_dir")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
    let start_date = parse_date(config, "backtest", "start_date")?;
    let end_date = parse_date(config, "backtest", "end_date")?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start >= end {
            return Err(MomentumError::config_invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }

    Ok(UniverseConfig {
        instruments,
        data_dir: PathBuf::from(data_dir),
        start_date,
        end_date,
    })
}

pub fn load_walk_forward_config(
    config: &dyn ConfigPort,
    backtest: BacktestConfig,
) -> Result<WalkForwardConfig, MomentumError> {
    let split_date = parse_date(config, "walk_forward", "split_date")?;

    let oos_fraction = parse_value::<f64>(config, "walk_forward", "oos_fraction")?
        .unwrap_or(DEFAULT_OOS_FRACTION);
    if !(oos_fraction > 0.0 && oos_fraction < 1.0) {
        return Err(MomentumError::config_invalid(
            "walk_forward",
            "oos_fraction",
            "oos_fraction must be between 0 and 1",
        ));
    }

    let tolerance = parse_value::<f64>(config, "walk_forward", "degradation_tolerance")?
        .unwrap_or(DEFAULT_DEGRADATION_TOLERANCE);
    let comparator = ComparatorConfig::new(tolerance).map_err(|_| {
        MomentumError::config_invalid(
            "walk_forward",
            "degradation_tolerance",
            "degradation_tolerance must be a non-negative fraction",
        )
    })?;

    Ok(WalkForwardConfig {
        split_date,
        oos_fraction,
        backtest,
        comparator,
    })
}

fn parse_value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, MomentumError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| {
                MomentumError::config_invalid(section, key, format!("cannot parse '{raw}'"))
            }),
    }
}

fn parse_list<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<T>>, MomentumError> {
    let Some(items) = config.get_list(section, key) else {
        return Ok(None);
    };
    items
        .iter()
        .map(|item| {
            item.parse().map_err(|_| {
                let reason = format!("cannot parse list item '{item}'");
                MomentumError::config_invalid(section, key, reason)
            })
        })
        .collect::<Result<Vec<T>, _>>()
        .map(Some)
}

fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, MomentumError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                MomentumError::config_invalid(
                    section,
                    key,
                    format!("invalid {key} format, expected YYYY-MM-DD"),
                )
            }),
    }
}
