//! Backtest engine and event loop.
//!
//! The engine walks the union trading timeline one day at a time. On scheduled
//! rebalance days it scores every instrument on a view truncated to that day,
//! hands the leader to the portfolio, and then marks the portfolio to market.
//! Non-rebalance days only mark to market. Only closes dated that day are used.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::MomentumError;
use super::metrics::simple_returns;
use super::momentum::{rank, score, MomentumScore};
use super::params::FrozenParameters;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::Trade;
use super::price::{bar_on, UniverseView};
use super::schedule::rebalance_dates;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::NotStarted => "NOT_STARTED",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// What the engine saw and chose on one rebalance date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceDecision {
    pub date: NaiveDate,
    pub selected: String,
    pub rankings: Vec<MomentumScore>,
    pub value_before: f64,
    pub switched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub params: Arc<FrozenParameters>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_value: f64,
    pub final_holding: Option<String>,
    pub equity_curve: Vec<EquityPoint>,
    pub trade_log: Vec<Trade>,
    pub decisions: Vec<RebalanceDecision>,
    pub total_return_fraction: f64,
    /// Rebalance dates on which the holding changed, including the first buy.
    pub rebalance_count: usize,
    pub transaction_cost_total: f64,
}

impl BacktestResult {
    pub fn trade_count(&self) -> usize {
        self.trade_log.len()
    }

    /// Daily simple returns of the equity curve.
    pub fn daily_returns(&self) -> Vec<f64> {
        let values: Vec<f64> = self.equity_curve.iter().map(|p| p.total_value).collect();
        simple_returns(&values)
    }
}

/// Single-use engine: NOT_STARTED → RUNNING → COMPLETED | FAILED.
#[derive(Debug)]
pub struct BacktestEngine {
    params: Arc<FrozenParameters>,
    config: BacktestConfig,
    state: RunState,
}

impl BacktestEngine {
    pub fn new(params: Arc<FrozenParameters>, config: BacktestConfig) -> Self {
        BacktestEngine {
            params,
            config,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run over [start_date, end_date]. Either the whole run completes or an
    /// error is returned and the engine is FAILED; there is no partial result.
    pub fn run(
        &mut self,
        universe: &UniverseView<'_>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BacktestResult, MomentumError> {
        if self.state != RunState::NotStarted {
            return Err(MomentumError::EngineState {
                state: self.state.to_string(),
            });
        }
        self.state = RunState::Running;
        info!(
            %start_date,
            %end_date,
            instruments = universe.instrument_count(),
            cadence = %self.params.rebalance_cadence(),
            "backtest started"
        );

        match simulate(&self.params, &self.config, universe, start_date, end_date) {
            Ok(result) => {
                self.state = RunState::Completed;
                info!(
                    total_return = result.total_return_fraction,
                    rebalances = result.rebalance_count,
                    trades = result.trade_count(),
                    "backtest completed"
                );
                Ok(result)
            }
            Err(e) => {
                self.state = RunState::Failed;
                warn!(error = %e, "backtest failed");
                Err(e)
            }
        }
    }
}

/// Score and rank every instrument in `view` as of `as_of`.
///
/// Every instrument must have a bar dated `as_of`; a series that has ended or
/// skipped the day fails with `MissingPrice` instead of being scored on stale
/// closes.
pub fn rank_universe(
    view: &UniverseView<'_>,
    as_of: NaiveDate,
    params: &FrozenParameters,
) -> Result<Vec<MomentumScore>, MomentumError> {
    let scores = view
        .iter()
        .map(|(id, bars)| {
            let scored = score(id, bars, as_of, params.lookback_days(), params.weights())?;
            if bar_on(bars, as_of).is_none() {
                return Err(MomentumError::MissingPrice {
                    instrument: id.to_string(),
                    date: as_of,
                });
            }
            Ok(scored)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rank(scores))
}

/// Earliest date on which every instrument has `max_lookback` prior bars.
pub fn warmup_start(view: &UniverseView<'_>, max_lookback: usize) -> Option<NaiveDate> {
    if view.instrument_count() == 0 {
        return None;
    }
    view.iter()
        .map(|(_, bars)| bars.get(max_lookback).map(|b| b.date))
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .max()
}

fn simulate(
    params: &Arc<FrozenParameters>,
    config: &BacktestConfig,
    universe: &UniverseView<'_>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<BacktestResult, MomentumError> {
    if start_date > end_date {
        return Err(MomentumError::InvalidParameter {
            field: "start_date".into(),
            reason: format!("{start_date} is after end_date {end_date}"),
        });
    }
    if !config.initial_capital.is_finite() || config.initial_capital <= 0.0 {
        return Err(MomentumError::InvalidParameter {
            field: "initial_capital".into(),
            reason: "initial_capital must be positive".into(),
        });
    }

    let history = universe.up_to(end_date);
    let timeline: Vec<NaiveDate> = history
        .timeline()
        .into_iter()
        .filter(|d| *d >= start_date)
        .collect();
    if timeline.is_empty() {
        return Err(MomentumError::EmptyRange {
            start: start_date,
            end: end_date,
        });
    }

    let schedule = rebalance_dates(&timeline, params.rebalance_cadence());
    let mut pending = schedule.iter().peekable();
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut decisions = Vec::with_capacity(schedule.len());
    let mut rebalance_count = 0usize;

    for &date in &timeline {
        let visible = history.up_to(date);
        let prices = visible.prices_on(date);

        if pending.next_if(|d| **d == date).is_some() {
            let value_before = portfolio.total_value(date, &prices)?;
            let rankings = rank_universe(&visible, date, params)?;
            let selected = rankings
                .first()
                .map(|s| s.instrument_id.clone())
                .ok_or_else(|| MomentumError::NoData {
                    instrument: "universe".into(),
                })?;

            let outcome = portfolio.rebalance(
                date,
                &selected,
                &prices,
                params.transaction_cost_fraction(),
            )?;
            let switched = outcome.is_switch();
            if switched {
                rebalance_count += 1;
            }
            debug!(%date, %selected, switched, value_before, "rebalance");

            decisions.push(RebalanceDecision {
                date,
                selected,
                rankings,
                value_before,
                switched,
            });
        }

        portfolio.record_equity(date, &prices)?;
    }

    let final_value = portfolio
        .equity_curve
        .last()
        .map(|p| p.total_value)
        .unwrap_or(portfolio.cash);
    let transaction_cost_total = portfolio.transaction_cost_total();
    let final_holding = portfolio.held_instrument().map(str::to_string);

    Ok(BacktestResult {
        params: Arc::clone(params),
        start_date: timeline[0],
        end_date: timeline[timeline.len() - 1],
        initial_capital: config.initial_capital,
        final_value,
        final_holding,
        equity_curve: portfolio.equity_curve,
        trade_log: portfolio.trade_log,
        decisions,
        total_return_fraction: final_value / config.initial_capital - 1.0,
        rebalance_count,
        transaction_cost_total,
    })
}
