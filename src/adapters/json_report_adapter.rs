//! JSON report adapter implementing ReportPort.
//!
//! The schema is the serde form of the domain structs: snake_case field names,
//! ISO-8601 dates, SCREAMING_SNAKE_CASE enums.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::MomentumError;
use crate::domain::walk_forward::WalkForwardReport;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_json<T: Serialize>(value: &T, output: &Path) -> Result<(), MomentumError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(fs::File::create(output)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        info!(path = %output.display(), "report written");
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtest(&self, result: &BacktestResult, output: &Path) -> Result<(), MomentumError> {
        Self::write_json(result, output)
    }

    fn write_walk_forward(
        &self,
        report: &WalkForwardReport,
        output: &Path,
    ) -> Result<(), MomentumError> {
        Self::write_json(report, output)
    }
}
