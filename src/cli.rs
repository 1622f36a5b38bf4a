//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_export_adapter::CsvExportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{warmup_start, BacktestEngine, BacktestResult};
use crate::domain::config_validation::{load_run_config, RunConfig, UniverseConfig};
use crate::domain::error::MomentumError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::price::{PriceUniverse, UniverseView};
use crate::domain::split::{period_summary, split, PeriodInfo};
use crate::domain::walk_forward::{resolve_split_date, run_walk_forward, WalkForwardReport};
use crate::logging::{init_logging, LoggingConfig};
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "momentum-wf",
    about = "Momentum rotation backtester with walk-forward validation"
)]
pub struct Cli {
    /// Overrides [logging] level; RUST_LOG overrides both
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest over a date range
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for equity.csv and trades.csv
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Split, run in-sample and out-of-sample, validate and compare
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        split_date: Option<NaiveDate>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the in-sample / out-of-sample periods for a split date
    SplitInfo {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        split_date: Option<NaiveDate>,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Backtest { config, .. }
            | Command::WalkForward { config, .. }
            | Command::Validate { config }
            | Command::SplitInfo { config, .. } => config,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let adapter = match load_config(cli.command.config_path()) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = setup_logging(&adapter, cli.log_level.as_deref()) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let outcome = match cli.command {
        Command::Backtest {
            start,
            end,
            output,
            csv_dir,
            ..
        } => run_backtest(&adapter, start, end, output.as_deref(), csv_dir.as_deref()),
        Command::WalkForward {
            split_date,
            output,
            csv_dir,
            ..
        } => run_walk_forward_command(&adapter, split_date, output.as_deref(), csv_dir.as_deref()),
        Command::Validate { config } => run_validate(&adapter, &config),
        Command::SplitInfo { split_date, .. } => run_split_info(&adapter, split_date),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// `[logging]` with the `--log-level` override applied, then the subscriber.
fn setup_logging(adapter: &FileConfigAdapter, level: Option<&str>) -> Result<(), MomentumError> {
    let mut logging = LoggingConfig::from_config(adapter)?;
    if let Some(level) = level {
        logging = logging.with_level(level)?;
    }
    init_logging(&logging)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Load every configured instrument (or every file in the data directory).
pub fn load_universe(
    data_port: &dyn PriceDataPort,
    universe: &UniverseConfig,
) -> Result<PriceUniverse, MomentumError> {
    let instruments = if universe.instruments.is_empty() {
        data_port.list_instruments()?
    } else {
        universe.instruments.clone()
    };
    if instruments.is_empty() {
        return Err(MomentumError::NoData {
            instrument: "universe".into(),
        });
    }

    let mut prices = PriceUniverse::new();
    for instrument in &instruments {
        prices.insert(data_port.fetch_closes(instrument, universe.start_date, universe.end_date)?);
    }
    eprintln!(
        "Loaded {} instruments from {}",
        prices.instrument_count(),
        universe.data_dir.display()
    );
    Ok(prices)
}

fn load_run(adapter: &FileConfigAdapter) -> Result<(RunConfig, PriceUniverse), MomentumError> {
    let run = load_run_config(adapter)?;
    let data_port = CsvPriceAdapter::new(run.universe.data_dir.clone());
    let prices = load_universe(&data_port, &run.universe)?;
    Ok((run, prices))
}

fn insufficient_history(view: &UniverseView<'_>, required: usize) -> MomentumError {
    let (instrument, bars, as_of) = view
        .iter()
        .min_by_key(|(_, bars)| bars.len())
        .map(|(id, bars)| (id.to_string(), bars.len(), bars.last().map(|b| b.date)))
        .unwrap_or_else(|| ("universe".to_string(), 0, None));
    MomentumError::InsufficientHistory {
        instrument,
        as_of: as_of.or_else(|| view.last_date()).unwrap_or_default(),
        bars,
        required,
    }
}

fn run_backtest(
    adapter: &FileConfigAdapter,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    output: Option<&Path>,
    csv_dir: Option<&Path>,
) -> Result<(), MomentumError> {
    let (run, prices) = load_run(adapter)?;
    let view = prices.view();
    let max_lookback = run.params.max_lookback();

    let start = match start {
        Some(s) => s,
        None => warmup_start(&view, max_lookback)
            .ok_or_else(|| insufficient_history(&view, max_lookback + 1))?,
    };
    let end = match end.or_else(|| view.last_date()) {
        Some(e) => e,
        None => {
            return Err(MomentumError::NoData {
                instrument: "universe".into(),
            })
        }
    };

    eprintln!("Running backtest: {} to {}", start, end);
    let mut engine = BacktestEngine::new(run.params.clone(), run.walk_forward.backtest.clone());
    let result = engine.run(&view, start, end)?;

    print_backtest_summary("Backtest", &result);

    if let Some(path) = output {
        JsonReportAdapter::new().write_backtest(&result, path)?;
        eprintln!("\nResult written to: {}", path.display());
    }
    if let Some(dir) = csv_dir {
        CsvExportAdapter::new().write_backtest(&result, dir)?;
        eprintln!("CSV exported to: {}", dir.display());
    }
    Ok(())
}

fn run_walk_forward_command(
    adapter: &FileConfigAdapter,
    split_override: Option<NaiveDate>,
    output: Option<&Path>,
    csv_dir: Option<&Path>,
) -> Result<(), MomentumError> {
    let (mut run, prices) = load_run(adapter)?;
    if split_override.is_some() {
        run.walk_forward.split_date = split_override;
    }

    eprintln!("Parameters frozen: {}", run.params.fingerprint());
    let report = run_walk_forward(&prices.view(), &run.params, &run.walk_forward)?;
    print_walk_forward_summary(&report);

    if let Some(path) = output {
        JsonReportAdapter::new().write_walk_forward(&report, path)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    if let Some(dir) = csv_dir {
        CsvExportAdapter::new().write_walk_forward(&report, dir)?;
        eprintln!("CSV exported to: {}", dir.display());
    }
    Ok(())
}

fn run_validate(adapter: &FileConfigAdapter, config_path: &Path) -> Result<(), MomentumError> {
    eprintln!("Validating config: {}", config_path.display());
    let run = load_run_config(adapter)?;
    let params = &run.params;

    eprintln!("\nStrategy:");
    eprintln!("  lookback_days:    {:?}", params.lookback_days());
    eprintln!("  weights:          {:?}", params.weights());
    eprintln!("  cadence:          {}", params.rebalance_cadence());
    eprintln!("  transaction_cost: {}", params.transaction_cost_fraction());
    eprintln!("  fingerprint:      {}", params.fingerprint());

    eprintln!("\nUniverse:");
    eprintln!("  data_dir:    {}", run.universe.data_dir.display());
    if run.universe.instruments.is_empty() {
        eprintln!("  instruments: (all files in data_dir)");
    } else {
        eprintln!("  instruments: {}", run.universe.instruments.join(", "));
    }

    let wf = &run.walk_forward;
    eprintln!("\nWalk-forward:");
    match wf.split_date {
        Some(d) => eprintln!("  split_date:            {d}"),
        None => eprintln!(
            "  split_date:            (recommended, oos_fraction {})",
            wf.oos_fraction
        ),
    }
    eprintln!("  initial_capital:       {:.2}", wf.backtest.initial_capital);
    eprintln!("  degradation_tolerance: {}", wf.comparator.degradation_tolerance());

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_split_info(
    adapter: &FileConfigAdapter,
    split_override: Option<NaiveDate>,
) -> Result<(), MomentumError> {
    let (mut run, prices) = load_run(adapter)?;
    if split_override.is_some() {
        run.walk_forward.split_date = split_override;
    }
    let view = prices.view();
    let split_date = resolve_split_date(&view, &run.walk_forward)?;
    let summary = period_summary(&view, split_date);

    eprintln!("\n=== Split at {} ===", split_date);
    print_period("Total", &summary.total);
    print_period("In-sample", &summary.in_sample);
    print_period("Out-of-sample", &summary.out_of_sample);

    match split(&view, split_date, run.params.max_lookback()) {
        Ok(_) => eprintln!("\nSplit is usable with max lookback {}", run.params.max_lookback()),
        Err(e) => eprintln!("\nSplit rejected: {e}"),
    }
    Ok(())
}

fn print_period(label: &str, info: &PeriodInfo) {
    let fmt_date = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    eprintln!(
        "  {:<14} {} to {}  ({} days, {} bars, {:.1}%)",
        label,
        fmt_date(info.start),
        fmt_date(info.end),
        info.duration_days,
        info.observations,
        info.share_of_total * 100.0
    );
}

fn print_backtest_summary(label: &str, result: &BacktestResult) {
    let metrics = PerformanceMetrics::from_equity_curve(&result.equity_curve);
    eprintln!("\n=== {} Results ({} to {}) ===", label, result.start_date, result.end_date);
    eprintln!("Total Return:     {:.2}%", result.total_return_fraction * 100.0);
    eprintln!("Final Value:      {:.2}", result.final_value);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Rebalances:       {}", result.rebalance_count);
    eprintln!("Trades:           {}", result.trade_count());
    eprintln!("Costs:            {:.2}", result.transaction_cost_total);
    eprintln!(
        "Holding:          {}",
        result.final_holding.as_deref().unwrap_or("cash")
    );
}

fn print_walk_forward_summary(report: &WalkForwardReport) {
    let c = &report.comparison;
    print_backtest_summary("In-Sample", &c.is_result);
    print_backtest_summary("Out-of-Sample", &c.oos_result);

    eprintln!("\n=== Comparison ===");
    eprintln!("Degradation:      {:.2} pp", c.degradation_fraction * 100.0);
    eprintln!("Tolerance:        {:.2} pp", c.degradation_tolerance * 100.0);
    eprintln!("Verdict:          {}", c.verdict);
    eprintln!(
        "Rebalances:       {} IS / {} OOS ({:+})",
        c.secondary.is_rebalance_count,
        c.secondary.oos_rebalance_count,
        c.secondary.rebalance_count_difference
    );
    eprintln!(
        "Costs:            {:.2} IS / {:.2} OOS",
        c.secondary.is_transaction_cost_total, c.secondary.oos_transaction_cost_total
    );
    if let Some(t) = &c.mean_difference {
        eprintln!(
            "Mean diff test:   t = {:.3}, p = {:.3}{}",
            t.t_statistic,
            t.p_value,
            if t.significant { " (significant)" } else { "" }
        );
    }

    eprintln!("\n=== Risk & Consistency ===");
    eprintln!("Volatility:       {:+.1}%", c.risk_changes.volatility_change_pct);
    eprintln!("Downside risk:    {:+.1}%", c.risk_changes.downside_risk_change_pct);
    eprintln!("Worst day:        {:+.2} pp", c.risk_changes.tail_risk_change * 100.0);
    eprintln!("Sharpe:           {:+.1}%", c.risk_changes.risk_adjusted_change_pct);
    eprintln!("Win-rate gap:     {:.1} pp", c.consistency.win_rate_gap_pct);
    eprintln!("Consistency:      {:.1} / 100", c.consistency.overall_consistency_score);

    eprintln!("\n=== Conclusion ===");
    eprintln!("Robustness:       {}", c.conclusion.strategy_robustness);
    eprintln!("Overfitting risk: {}", c.conclusion.overfitting_risk);
    eprintln!("Action:           {}", c.conclusion.recommended_action);
}
