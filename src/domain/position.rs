//! Single-instrument position and the trade records it produces.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Position {
    pub instrument_id: Option<String>,
    pub shares: f64,
    /// Cash paid for the current holding, including the buy cost.
    pub cost_basis: f64,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.instrument_id.is_none()
    }

    pub fn holds(&self, instrument_id: &str) -> bool {
        self.instrument_id.as_deref() == Some(instrument_id)
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub instrument_id: String,
    pub shares: f64,
    pub price: f64,
    pub cost: f64,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.shares * self.price
    }

    /// Signed cash movement: proceeds for a sale, outlay for a purchase.
    pub fn cash_flow(&self) -> f64 {
        match self.action {
            TradeAction::Sell => self.notional() - self.cost,
            TradeAction::Buy => -(self.notional() + self.cost),
        }
    }
}
