//! CSV export of equity curves and trade logs.
//!
//! `output` is a directory. A backtest writes `equity.csv` and `trades.csv`;
//! a walk-forward report writes the same pair per window with an `is_` or
//! `oos_` prefix.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::MomentumError;
use crate::domain::walk_forward::WalkForwardReport;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct CsvExportAdapter;

impl CsvExportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_rows<T: Serialize>(rows: &[T], path: &Path) -> Result<(), MomentumError> {
        let mut writer = csv::Writer::from_path(path).map_err(io::Error::from)?;
        for row in rows {
            writer.serialize(row).map_err(io::Error::from)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_result(
        result: &BacktestResult,
        dir: &Path,
        prefix: &str,
    ) -> Result<(), MomentumError> {
        Self::write_rows(&result.equity_curve, &dir.join(format!("{prefix}equity.csv")))?;
        Self::write_rows(&result.trade_log, &dir.join(format!("{prefix}trades.csv")))
    }
}

impl ReportPort for CsvExportAdapter {
    fn write_backtest(&self, result: &BacktestResult, output: &Path) -> Result<(), MomentumError> {
        fs::create_dir_all(output)?;
        Self::write_result(result, output, "")
    }

    fn write_walk_forward(
        &self,
        report: &WalkForwardReport,
        output: &Path,
    ) -> Result<(), MomentumError> {
        fs::create_dir_all(output)?;
        Self::write_result(&report.comparison.is_result, output, "is_")?;
        Self::write_result(&report.comparison.oos_result, output, "oos_")
    }
}
