// Zalyshok CLI - reconcile unspent event budgets into an estimate changes sheet

mod console;
mod exit_codes;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::info;
use tracing_subscriber::EnvFilter;
use zalyshok_io::{load_sheet, write_changes, IoError};
use zalyshok_recon::locator::list_events;
use zalyshok_recon::model::CategoryStatus;
use zalyshok_recon::{format_cents, run, AutoDisambiguator, Disambiguator, ReconConfig, ReconError, RunReport};

use console::ConsoleDisambiguator;
use exit_codes::*;

#[derive(Parser)]
#[command(name = "zalyshok")]
#[command(about = "Move unspent event budget residuals into a changes sheet for a new estimate")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile events and write the changes workbook
    #[command(after_help = "\
Examples:
  zalyshok run --calc rozrakhunok.xlsx --estimate koshtorys.xlsx --output zminy.xlsx
  zalyshok run --calc r.xlsx --estimate k.xlsx --output z.xlsx --events 1,4 --batch
  zalyshok run --calc r.xlsx --estimate k.xlsx --output z.xlsx --events 2 --report run.json")]
    Run {
        /// Calculation workbook (events and their budgets)
        #[arg(long)]
        calc: PathBuf,

        /// Estimate workbook of the event that receives the money
        #[arg(long)]
        estimate: PathBuf,

        /// Changes workbook; created when absent, existing rows are kept
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// TOML config (layout, categories, tolerances)
        #[arg(long, short = 'c', env = "ZALYSHOK_CONFIG")]
        config: Option<PathBuf>,

        /// Event numbers, comma-separated (prompted for when omitted)
        #[arg(long, short = 'e', value_delimiter = ',')]
        events: Vec<i64>,

        /// No prompts: answer every question from the config's [auto] policy
        #[arg(long)]
        batch: bool,

        /// Also write the full run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List the events of a calculation workbook
    Events {
        #[arg(long)]
        calc: PathBuf,

        #[arg(long, short = 'c', env = "ZALYSHOK_CONFIG")]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a config file and print the effective settings
    Validate {
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  zalyshok-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  zalyshok-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run { calc, estimate, output, config, events, batch, report } => {
            cmd_run(&calc, &estimate, &output, config.as_deref(), events, batch, report.as_deref())
        }
        Commands::Events { calc, config, json } => cmd_events(&calc, config.as_deref(), json),
        Commands::Validate { config } => cmd_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Library crates log through `log`; the subscriber picks those records up.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let code = match &err {
            IoError::NotFound(_) | IoError::MissingSheet { .. } => EXIT_INPUT_MISSING,
            IoError::Open { .. } | IoError::Read { .. } => EXIT_INPUT_READ,
            IoError::Write { .. } => EXIT_OUTPUT_WRITE,
        };
        let hint = match &err {
            IoError::MissingSheet { .. } => Some("set `sheet` in the config's [calculation] or [estimate] section".to_string()),
            IoError::Write { .. } => Some("is the changes workbook open in another program?".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        match &err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => Self::new(EXIT_CONFIG, err.to_string()),
            ReconError::EstimateNameMissing { .. } => Self::new(EXIT_ESTIMATE, err.to_string())
                .with_hint("check `name_cell` in the config's [estimate] section"),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    if !path.exists() {
        return Err(CliError::new(EXIT_INPUT_MISSING, format!("config not found: {}", path.display())));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_INPUT_READ, format!("cannot read {}: {}", path.display(), e)))?;
    let config = ReconConfig::from_toml(&text)?;
    info!("config loaded from {}", path.display());
    Ok(config)
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(
    calc_path: &Path,
    estimate_path: &Path,
    output: &Path,
    config_path: Option<&Path>,
    events: Vec<i64>,
    batch: bool,
    report_path: Option<&Path>,
) -> Result<(), CliError> {
    if batch && events.is_empty() {
        return Err(CliError::usage("--batch needs the event numbers up front")
            .with_hint("pass --events 1,2,..."));
    }

    let config = load_config(config_path)?;
    let calculation = load_sheet(calc_path, config.calculation.sheet.as_deref())?;
    let estimate = load_sheet(estimate_path, config.estimate.sheet.as_deref())?;

    let report = if batch {
        let mut auto = AutoDisambiguator::new(config.auto.clone());
        reconcile(&config, &calculation, &estimate, &events, &mut auto)?
    } else {
        let stdin = io::stdin();
        let mut console = ConsoleDisambiguator::new(stdin.lock(), io::stdout());
        let events = if events.is_empty() {
            let available = list_events(&calculation, &config.calculation);
            console
                .prompt_event_numbers(&available)
                .map_err(|e| CliError::io(format!("console: {}", e)))?
        } else {
            events
        };
        if events.is_empty() {
            return Err(CliError::new(EXIT_NO_EVENTS, "no events selected"));
        }
        reconcile(&config, &calculation, &estimate, &events, &mut console)?
    };

    print_summary(&report).map_err(|e| CliError::io(e.to_string()))?;

    let summary = write_changes(output, &report.blocks, &config.categories)?;
    println!(
        "wrote {} block(s), {} row(s) to {} ({} earlier row(s) kept)",
        summary.blocks_written,
        summary.rows_written,
        output.display(),
        summary.rows_preserved
    );

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(EXIT_REPORT_WRITE, e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            CliError::new(EXIT_REPORT_WRITE, format!("cannot write {}: {}", path.display(), e))
        })?;
        info!("report written to {}", path.display());
    }

    Ok(())
}

fn reconcile(
    config: &ReconConfig,
    calculation: &zalyshok_engine::Sheet,
    estimate: &zalyshok_engine::Sheet,
    events: &[i64],
    disambiguator: &mut dyn Disambiguator,
) -> Result<RunReport, CliError> {
    Ok(run(config, calculation, estimate, events, disambiguator)?)
}

fn print_summary(report: &RunReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for skipped in &report.skipped {
        writeln!(out, "event {}: skipped, {}", skipped.number, skipped.reason)?;
    }
    for rec in &report.events {
        writeln!(out, "event {} «{}»", rec.event.number, rec.event.name)?;
        for outcome in &rec.outcomes {
            let state = match outcome.status {
                CategoryStatus::Aborted => "aborted, needs manual review",
                CategoryStatus::Excluded => "nothing left",
                CategoryStatus::Accepted if rec.selection.includes(&outcome.category) => "withdrawn",
                CategoryStatus::Accepted => "kept",
            };
            writeln!(
                out,
                "  {}  {:<13} residual {:>12}  {}",
                outcome.category,
                outcome.strategy.to_string(),
                format_cents(outcome.residual_cents()),
                state
            )?;
        }
    }
    writeln!(out, "{}", report.balance)?;
    Ok(())
}

// ============================================================================
// events
// ============================================================================

fn cmd_events(calc_path: &Path, config_path: Option<&Path>, json: bool) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let calculation = load_sheet(calc_path, config.calculation.sheet.as_deref())?;
    let events = list_events(&calculation, &config.calculation);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        let text = serde_json::to_string_pretty(&events).map_err(|e| CliError::io(e.to_string()))?;
        writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()))?;
        return Ok(());
    }
    for event in &events {
        writeln!(
            out,
            "{:>4}  {}  ({})  rows {}-{}",
            event.number,
            event.name,
            event.term,
            event.start_row + 1,
            event.end_row + 1
        )
        .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(path: &Path) -> Result<(), CliError> {
    let config = load_config(Some(path))?;
    let effective = toml::to_string_pretty(&config).map_err(|e| CliError::io(e.to_string()))?;
    println!("# {}: ok, categories {}", path.display(), config.category_codes().join(", "));
    print!("{}", effective);
    Ok(())
}
