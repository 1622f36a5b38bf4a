//! Portfolio state, rebalancing and equity tracking.
//!
//! The portfolio holds at most one instrument. A rebalance either confirms the
//! current holding (no trade, no cost) or sells everything and buys as many
//! whole shares of the target as the cash covers. The remainder stays as cash.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::MomentumError;
use super::position::{Position, Trade, TradeAction};
use super::price::PriceMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RebalanceOutcome {
    /// Target already held, or flat and the target costs more than the cash.
    Unchanged,
    /// `bought` is `None` when not even one share of the target is affordable;
    /// the portfolio is then left in cash.
    Switched {
        sold: Option<Trade>,
        bought: Option<Trade>,
    },
}

impl RebalanceOutcome {
    pub fn is_switch(&self) -> bool {
        matches!(self, RebalanceOutcome::Switched { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Position,
    pub trade_log: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: Position::flat(),
            trade_log: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn held_instrument(&self) -> Option<&str> {
        self.position.instrument_id.as_deref()
    }

    /// cash + shares × price of the held instrument.
    pub fn total_value(&self, date: NaiveDate, prices: &PriceMap) -> Result<f64, MomentumError> {
        match self.held_instrument() {
            None => Ok(self.cash),
            Some(id) => {
                let price = lookup_price(prices, id, date)?;
                Ok(self.cash + self.position.market_value(price))
            }
        }
    }

    /// Append one mark-to-market sample for `date`.
    pub fn record_equity(
        &mut self,
        date: NaiveDate,
        prices: &PriceMap,
    ) -> Result<f64, MomentumError> {
        let total_value = self.total_value(date, prices)?;
        self.equity_curve.push(EquityPoint { date, total_value });
        Ok(total_value)
    }

    /// Move the whole portfolio into `target`.
    ///
    /// All prices are resolved before any state changes, so an error leaves the
    /// portfolio untouched.
    pub fn rebalance(
        &mut self,
        date: NaiveDate,
        target: &str,
        prices: &PriceMap,
        cost_fraction: f64,
    ) -> Result<RebalanceOutcome, MomentumError> {
        if self.position.holds(target) {
            return Ok(RebalanceOutcome::Unchanged);
        }

        let target_price = lookup_price(prices, target, date)?;
        if target_price <= 0.0 {
            return Err(MomentumError::InvalidPrice {
                instrument: target.to_string(),
                date,
                price: target_price,
            });
        }
        let held_price = match self.held_instrument() {
            Some(id) => Some(lookup_price(prices, id, date)?),
            None => None,
        };

        let sold = held_price.map(|price| self.sell_all(date, price, cost_fraction));

        if self.cash < 0.0 {
            return Err(MomentumError::InsufficientCash {
                date,
                cash: self.cash,
            });
        }
        let bought = self.buy_all(date, target, target_price, cost_fraction);

        if sold.is_none() && bought.is_none() {
            return Ok(RebalanceOutcome::Unchanged);
        }
        Ok(RebalanceOutcome::Switched { sold, bought })
    }

    fn sell_all(&mut self, date: NaiveDate, price: f64, cost_fraction: f64) -> Trade {
        let held = std::mem::take(&mut self.position);
        let notional = held.shares * price;
        let trade = Trade {
            date,
            action: TradeAction::Sell,
            instrument_id: held.instrument_id.unwrap_or_default(),
            shares: held.shares,
            price,
            cost: notional * cost_fraction,
        };
        self.cash += trade.cash_flow();
        self.trade_log.push(trade.clone());
        trade
    }

    /// Buy the largest whole number of shares whose notional plus cost fits in
    /// the cash balance.
    fn buy_all(
        &mut self,
        date: NaiveDate,
        target: &str,
        price: f64,
        cost_fraction: f64,
    ) -> Option<Trade> {
        let outlay = |shares: f64| {
            let notional = shares * price;
            notional + notional * cost_fraction
        };
        let mut shares = (self.cash / (price * (1.0 + cost_fraction))).floor();
        // the division can round up across an integer boundary
        while shares >= 1.0 && outlay(shares) > self.cash {
            shares -= 1.0;
        }
        if shares < 1.0 {
            return None;
        }

        let notional = shares * price;
        let trade = Trade {
            date,
            action: TradeAction::Buy,
            instrument_id: target.to_string(),
            shares,
            price,
            cost: notional * cost_fraction,
        };
        self.cash += trade.cash_flow();
        self.position = Position {
            instrument_id: Some(target.to_string()),
            shares,
            cost_basis: -trade.cash_flow(),
        };
        self.trade_log.push(trade.clone());
        Some(trade)
    }

    pub fn transaction_cost_total(&self) -> f64 {
        self.trade_log.iter().map(|t| t.cost).sum()
    }
}

fn lookup_price(
    prices: &PriceMap,
    instrument: &str,
    date: NaiveDate,
) -> Result<f64, MomentumError> {
    prices
        .get(instrument)
        .copied()
        .ok_or_else(|| MomentumError::MissingPrice {
            instrument: instrument.to_string(),
            date,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn prices(pairs: &[(&str, f64)]) -> PriceMap {
        pairs.iter().map(|(id, p)| (id.to_string(), *p)).collect()
    }

    #[test]
    fn new_portfolio_is_all_cash() {
        let p = Portfolio::new(100_000.0);
        assert_eq!(p.cash, 100_000.0);
        assert!(p.position.is_flat());
        assert!(p.trade_log.is_empty());
        assert_eq!(p.total_value(d(2), &PriceMap::new()).unwrap(), 100_000.0);
    }

    #[test]
    fn initial_buy_takes_whole_shares_and_keeps_the_remainder() {
        // 1/64 is exact in binary, so every amount below is exact too
        let mut p = Portfolio::new(100_000.0);
        let outcome = p
            .rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.015625)
            .unwrap();

        let RebalanceOutcome::Switched { sold, bought } = outcome else {
            panic!("expected a switch");
        };
        let bought = bought.unwrap();
        assert!(sold.is_none());
        assert_eq!(bought.action, TradeAction::Buy);
        assert_eq!(bought.shares, 984.0);
        assert_eq!(bought.notional(), 98_400.0);
        assert_eq!(bought.cost, 1_537.5);
        assert_eq!(p.cash, 62.5);
        assert_eq!(bought.notional() + bought.cost + p.cash, 100_000.0);
        assert_eq!(p.position.cost_basis, 99_937.5);
        assert_eq!(p.trade_log.len(), 1);
    }

    #[test]
    fn buy_never_spends_more_than_the_cash() {
        for (cash, price, cost) in [
            (100_000.0, 102.0, 0.001),
            (10_000.0, 3.3, 0.0),
            (1_234.56, 7.89, 0.05),
            (999.0, 0.999, 0.001),
        ] {
            let mut p = Portfolio::new(cash);
            p.rebalance(d(2), "SPY", &prices(&[("SPY", price)]), cost).unwrap();
            let bought = &p.trade_log[0];
            assert_eq!(bought.shares, bought.shares.floor());
            assert!(p.cash >= 0.0);
            assert!(p.cash < price * (1.0 + cost) + 1e-9, "one more share was affordable");
            assert_relative_eq!(
                bought.notional() + bought.cost + p.cash,
                cash,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn unaffordable_target_leaves_portfolio_in_cash() {
        let mut p = Portfolio::new(50.0);
        let outcome = p.rebalance(d(2), "BRK", &prices(&[("BRK", 60.0)]), 0.0).unwrap();
        assert_eq!(outcome, RebalanceOutcome::Unchanged);
        assert!(p.position.is_flat());
        assert_eq!(p.cash, 50.0);
        assert!(p.trade_log.is_empty());
    }

    #[test]
    fn sale_into_unaffordable_target_ends_flat() {
        let mut p = Portfolio::new(100.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 10.0)]), 0.0).unwrap();
        let outcome = p
            .rebalance(d(3), "BRK", &prices(&[("SPY", 10.0), ("BRK", 500.0)]), 0.0)
            .unwrap();

        let RebalanceOutcome::Switched { sold, bought } = outcome else {
            panic!("expected a switch");
        };
        assert_eq!(sold.unwrap().instrument_id, "SPY");
        assert!(bought.is_none());
        assert!(p.position.is_flat());
        assert_eq!(p.cash, 100.0);
    }

    #[test]
    fn switch_sells_then_buys() {
        let mut p = Portfolio::new(10_000.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.0).unwrap();
        let outcome = p
            .rebalance(d(3), "QQQ", &prices(&[("SPY", 110.0), ("QQQ", 50.0)]), 0.0)
            .unwrap();

        let RebalanceOutcome::Switched { sold, bought } = outcome else {
            panic!("expected a switch");
        };
        let (sold, bought) = (sold.unwrap(), bought.unwrap());
        assert_eq!(sold.instrument_id, "SPY");
        assert_eq!(sold.notional(), 11_000.0);
        assert_eq!(bought.instrument_id, "QQQ");
        assert_eq!(bought.shares, 220.0);
        assert_eq!(p.cash, 0.0);
        assert_eq!(p.trade_log.len(), 3);
        assert!(p.position.holds("QQQ"));
    }

    #[test]
    fn rebalance_to_held_instrument_is_a_no_op() {
        let mut p = Portfolio::new(10_000.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.01).unwrap();
        let cash = p.cash;
        let trades = p.trade_log.len();

        let outcome = p.rebalance(d(3), "SPY", &prices(&[("SPY", 120.0)]), 0.01).unwrap();
        assert_eq!(outcome, RebalanceOutcome::Unchanged);
        assert_eq!(p.cash, cash);
        assert_eq!(p.trade_log.len(), trades);
    }

    #[test]
    fn missing_target_price_leaves_state_untouched() {
        let mut p = Portfolio::new(10_000.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.0).unwrap();
        let before = p.clone();

        let err = p.rebalance(d(3), "QQQ", &prices(&[("SPY", 100.0)]), 0.0).unwrap_err();
        assert!(matches!(
            err,
            MomentumError::MissingPrice { ref instrument, .. } if instrument == "QQQ"
        ));
        assert_eq!(p, before);
    }

    #[test]
    fn negative_cash_is_an_invariant_violation() {
        let mut p = Portfolio::new(10_000.0);
        p.cash = -1.0;
        let err = p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.0).unwrap_err();
        assert!(matches!(err, MomentumError::InsufficientCash { .. }));
    }

    #[test]
    fn zero_target_price_is_rejected() {
        let mut p = Portfolio::new(10_000.0);
        let err = p.rebalance(d(2), "SPY", &prices(&[("SPY", 0.0)]), 0.0).unwrap_err();
        assert!(matches!(err, MomentumError::InvalidPrice { .. }));
    }

    #[test]
    fn record_equity_marks_to_market() {
        let mut p = Portfolio::new(10_000.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.0).unwrap();
        let value = p.record_equity(d(3), &prices(&[("SPY", 105.0)])).unwrap();
        assert_relative_eq!(value, 10_500.0, max_relative = 1e-12);
        assert_eq!(p.equity_curve.len(), 1);
        assert_eq!(p.equity_curve[0].date, d(3));
    }

    #[test]
    fn record_equity_without_price_for_holding_fails() {
        let mut p = Portfolio::new(10_000.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.0).unwrap();
        assert!(p.record_equity(d(3), &PriceMap::new()).is_err());
        assert!(p.equity_curve.is_empty());
    }

    #[test]
    fn sale_credits_notional_less_cost() {
        let mut p = Portfolio::new(10_000.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.0).unwrap();
        p.rebalance(d(3), "QQQ", &prices(&[("SPY", 128.0), ("QQQ", 1e6)]), 0.0078125)
            .unwrap();
        // 100 shares at 128, cost 1/128 of the notional
        assert_eq!(p.trade_log[1].cost, 100.0);
        assert_eq!(p.cash, 12_700.0);
    }

    #[test]
    fn transaction_costs_accumulate() {
        let mut p = Portfolio::new(10_000.0);
        p.rebalance(d(2), "SPY", &prices(&[("SPY", 100.0)]), 0.01).unwrap();
        p.rebalance(d(3), "QQQ", &prices(&[("SPY", 100.0), ("QQQ", 10.0)]), 0.01)
            .unwrap();
        let expected: f64 = p.trade_log.iter().map(|t| 0.01 * t.notional()).sum();
        assert_relative_eq!(p.transaction_cost_total(), expected, max_relative = 1e-9);
    }
}
