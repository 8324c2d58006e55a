//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;

use crate::adapters::csv_market_data_adapter::CsvMarketDataClient;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::simulated_order_adapter::SimulatedOrderClient;
use crate::adapters::system_time_adapter::SystemTimeClient;
use crate::adapters::thread_timer_adapter::ThreadTimerFactory;
use crate::domain::catalog;
use crate::domain::context::CompilationContext;
use crate::domain::error::TradeflowError;
use crate::domain::node::NodeKind;
use crate::domain::reactor::RunOutcome;
use crate::domain::session::{self, build_program, SessionReport, SessionSettings};
use crate::domain::signatures::{signatures, tabulated_kinds};
use crate::domain::translator::translate;
use crate::ports::config_port::ConfigPort;
use crate::ports::time_port::TimeClient;

#[derive(Parser, Debug)]
#[command(name = "tradeflow", about = "Compile and simulate trading node trees")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the built-in node templates
    Catalog,
    /// Show the signature tables of node kinds
    Signatures {
        /// Only this kind, e.g. Addition
        kind: Option<String>,
    },
    /// Validate a session configuration and compile its program
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run a session against the simulated venue
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [session] max_ticks
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Catalog => {
            init_logging(None);
            run_catalog()
        }
        Command::Signatures { kind } => {
            init_logging(None);
            run_signatures(kind.as_deref())
        }
        Command::Validate { config } => run_validate(&config),
        Command::Simulate { config, max_ticks } => run_simulate(&config, max_ticks),
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TradeflowError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_catalog() -> ExitCode {
    for entry in catalog::entries() {
        println!("{:<18} {}", entry.name, entry.description);
    }
    ExitCode::SUCCESS
}

/// Kinds whose name matches `filter`, ignoring case. All kinds without one.
pub fn matching_kinds(filter: Option<&str>) -> Vec<NodeKind> {
    tabulated_kinds()
        .into_iter()
        .filter(|kind| filter.is_none_or(|name| kind.name().eq_ignore_ascii_case(name)))
        .collect()
}

fn run_signatures(filter: Option<&str>) -> ExitCode {
    let kinds = matching_kinds(filter);
    if kinds.is_empty() {
        eprintln!("error: no node kind named '{}'", filter.unwrap_or_default());
        return ExitCode::from(2);
    }
    for kind in kinds {
        println!("{}", kind.name());
        for signature in signatures(&kind) {
            println!("  {signature}");
        }
    }
    ExitCode::SUCCESS
}

/// Loads, validates and reads the session out of the file at `path`.
fn load_session(path: &Path) -> Result<SessionSettings, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    init_logging(adapter.get_string("logging", "level").as_deref());
    SessionSettings::from_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_validate(config_path: &Path) -> ExitCode {
    let settings = match load_session(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match compile_only(&settings) {
        Ok(native) => {
            eprintln!("Program: {} compiling to {native}", settings.entry);
            eprintln!("Session configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Compiles the session program without any venue attached.
pub fn compile_only(settings: &SessionSettings) -> Result<String, TradeflowError> {
    let program = build_program(settings)?;
    let mut context = CompilationContext::new(&settings.account, Rc::new(SystemTimeClient))?;
    let root = translate(&mut context, &program)?;
    Ok(root.native_type().to_string())
}

fn run_simulate(config_path: &Path, max_ticks: Option<u64>) -> ExitCode {
    let mut settings = match load_session(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if let Some(max_ticks) = max_ticks {
        settings.max_ticks = max_ticks.max(1);
    }
    match simulate(&settings) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Runs a session with the simulated venue, the system clock, thread timers
/// and, when configured, time and sales replay.
pub fn simulate(settings: &SessionSettings) -> Result<SessionReport, TradeflowError> {
    let program = build_program(settings)?;
    let time: Rc<dyn TimeClient> = Rc::new(SystemTimeClient);
    let orders = Rc::new(SimulatedOrderClient::new(
        settings.simulation,
        Rc::clone(&time),
    ));
    let mut context = CompilationContext::new(&settings.account, time)?
        .with_order_client(orders)
        .with_timers(Rc::new(ThreadTimerFactory));
    if let Some(path) = &settings.time_and_sales {
        context = context.with_market_data(Rc::new(CsvMarketDataClient::from_file(path)?));
    }
    session::run(
        &mut context,
        &program,
        settings.max_ticks,
        settings.idle_timeout,
    )
}

fn print_report(report: &SessionReport) {
    let summary = match report.outcome {
        RunOutcome::Complete { ticks } => format!("completed after {ticks} ticks"),
        RunOutcome::Idle { ticks } => format!("idle after {ticks} ticks"),
        RunOutcome::TickLimit { ticks } => format!("stopped at the {ticks} tick limit"),
    };
    println!("Session {summary}");
    if report.orders.is_empty() {
        println!("No orders submitted");
    }
    for order in &report.orders {
        let fields = order.fields();
        println!(
            "  #{} {} {} {} @ {} {}: {} (filled {})",
            order.id(),
            fields.side,
            fields.quantity,
            fields.security,
            fields.price,
            fields.currency,
            order.status(),
            order.filled_quantity(),
        );
    }
}
