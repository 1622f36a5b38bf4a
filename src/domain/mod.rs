//! Core domain types and logic.

pub mod backtest;
pub mod comparator;
pub mod config_validation;
pub mod consistency;
pub mod error;
pub mod metrics;
pub mod momentum;
pub mod params;
pub mod portfolio;
pub mod position;
pub mod price;
pub mod schedule;
pub mod split;
pub mod validation;
pub mod walk_forward;
