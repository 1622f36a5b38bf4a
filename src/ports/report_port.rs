//! Result output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::MomentumError;
use crate::domain::walk_forward::WalkForwardReport;
use std::path::Path;

/// Port for persisting run results.
pub trait ReportPort {
    fn write_backtest(&self, result: &BacktestResult, output: &Path) -> Result<(), MomentumError>;

    fn write_walk_forward(
        &self,
        report: &WalkForwardReport,
        output: &Path,
    ) -> Result<(), MomentumError>;
}
