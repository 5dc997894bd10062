//! `slotctl`: inspect and edit a clinic's appointment slots from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Print the configured shift grid
//! slotctl grid
//!
//! # Status of every slot on a day
//! slotctl --config clinic.toml status --date 2024-11-20
//!
//! # Slots a patient can still pick
//! slotctl --config clinic.toml available --date 2024-11-20
//!
//! # Staff toggles
//! slotctl --config clinic.toml block --date 2024-11-20 --time 17:00
//! slotctl --config clinic.toml unblock --date 2024-11-20 --time 17:00
//!
//! # Book an appointment (naive starts are read in the calendar's timezone)
//! slotctl --config clinic.toml book --start 2024-11-20T10:00 --summary Checkup
//!
//! # Remove duplicate blocking events left behind by concurrent writers
//! slotctl --config clinic.toml reconcile --date 2024-11-20
//! ```
//!
//! Output is pretty-printed JSON on stdout. Mutations print
//! `{"success": .., "message": ..}` and exit with status 1 when they fail.
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use slot_engine::config::{ClinicConfig, DynGateway};
use slot_engine::mutator::{DEFAULT_BOOKING_MINUTES, DEFAULT_BOOKING_SUMMARY};
use slot_engine::{
    parse_date, BookingRequest, BookingStart, FixedClock, Outcome, ShiftGrid, ShiftWindow,
    SlotEngine, SlotTime,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "slotctl",
    version,
    about = "Fixed-grid clinic appointment slots over a calendar backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Clinic configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Pin the current instant (RFC 3339), e.g. 2024-11-20T11:15:00+05:30
    #[arg(long, global = true)]
    now: Option<String>,

    /// Write logs to stderr as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the shift grid
    Grid,
    /// Status of every grid slot on a day
    Status {
        /// Day to inspect (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
    /// Available slot times on a day
    Available {
        /// Day to inspect (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
    /// Block an available slot
    Block {
        #[arg(long)]
        date: String,
        /// Slot start (HH:MM)
        #[arg(long)]
        time: String,
    },
    /// Remove the block on a slot
    Unblock {
        #[arg(long)]
        date: String,
        /// Slot start (HH:MM)
        #[arg(long)]
        time: String,
    },
    /// Create an appointment
    Book {
        /// ISO-8601 start, with or without an offset
        #[arg(long)]
        start: String,
        /// Length in minutes
        #[arg(long, default_value_t = DEFAULT_BOOKING_MINUTES)]
        duration: u32,
        #[arg(long, default_value = DEFAULT_BOOKING_SUMMARY)]
        summary: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Repair slots controlled by more than one event
    Reconcile {
        #[arg(long)]
        date: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if let Commands::Grid = cli.command {
        let grid = match cli.config.as_deref() {
            Some(path) => load_config(path)?.grid()?,
            None => ShiftGrid::default(),
        };
        return print_grid(&grid);
    }

    let path = cli
        .config
        .as_deref()
        .context("--config is required for calendar commands")?;
    let config = load_config(path)?;
    let gateway = config
        .open_gateway()
        .context("Failed to open calendar backend")?;
    let mut engine = config.build_engine(gateway)?;
    if let Some(now) = cli.now.as_deref() {
        engine = engine.with_clock(FixedClock(parse_now(now)?));
    }

    run(&engine, cli.command)
}

fn run(engine: &SlotEngine<DynGateway>, command: Commands) -> Result<()> {
    match command {
        Commands::Grid => print_grid(engine.grid()),
        Commands::Status { date } => {
            let status = engine.get_slot_status(parse_date(&date)?);
            print_json(&status)
        }
        Commands::Available { date } => {
            let slots = engine.available_slots(parse_date(&date)?);
            print_json(&slots)
        }
        Commands::Block { date, time } => {
            let (date, time) = (parse_date(&date)?, time.parse::<SlotTime>()?);
            finish(Outcome::from(engine.block(date, time)))
        }
        Commands::Unblock { date, time } => {
            let (date, time) = (parse_date(&date)?, time.parse::<SlotTime>()?);
            finish(Outcome::from(engine.unblock(date, time)))
        }
        Commands::Book {
            start,
            duration,
            summary,
            description,
        } => {
            let start: BookingStart = start.parse()?;
            let request = BookingRequest::new(start)
                .duration(duration)
                .summary(&summary)
                .description(&description);
            finish(Outcome::from(engine.book_slot(&request)))
        }
        Commands::Reconcile { date } => {
            let report = engine
                .reconcile(parse_date(&date)?)
                .context("Reconciliation failed")?;
            print_json(&report)
        }
    }
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: &Path) -> Result<ClinicConfig> {
    ClinicConfig::from_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>> {
    let now = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("--now '{}' is not an RFC 3339 timestamp", raw))?;
    Ok(now.with_timezone(&Utc))
}

fn print_grid(grid: &ShiftGrid) -> Result<()> {
    #[derive(Serialize)]
    struct GridOutput<'a> {
        step_minutes: u32,
        windows: &'a [ShiftWindow],
        slots: &'a [SlotTime],
    }

    print_json(&GridOutput {
        step_minutes: grid.step_minutes(),
        windows: grid.windows(),
        slots: grid.slots(),
    })
}

/// Print a mutation outcome; a failed mutation exits with status 1.
fn finish(outcome: Outcome) -> Result<()> {
    print_json(&outcome)?;
    if !outcome.success {
        process::exit(1);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", pretty);
    Ok(())
}
