//! Greenhouse controller: command-line entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  GpioActuators    Htu21d / SimulatedSensor   LogStore         │
//! │  (ActuatorPort)   (SensorPort)               (RecordSink)     │
//! │  SystemClock      ThreadDelay                LogEventSink     │
//! │                                                               │
//! │  ──────────────── Port Trait Boundary ───────────────────     │
//! │                                                               │
//! │  ┌───────────────────────────────────────────────────────┐    │
//! │  │         GreenhouseService (pure logic)                │    │
//! │  │  ValveController · SensorSampler · schedule           │    │
//! │  └───────────────────────────────────────────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! `greenhouse cycle` is meant to be run hourly from cron.  The inspection
//! commands only read the log directory and may run while a cycle writes.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};

use greenhouse::adapters::clock::{SystemClock, ThreadDelay};
use greenhouse::adapters::hardware::GpioActuators;
use greenhouse::adapters::log_sink::LogEventSink;
use greenhouse::adapters::ownership::FileOwner;
use greenhouse::adapters::signals;
use greenhouse::app::ports::{ActuatorPort, SensorPort};
use greenhouse::app::service::GreenhouseService;
use greenhouse::config::{HardwareBackend, SystemConfig, ValveId};
use greenhouse::drivers::gpio::{SimBackend, SysfsBackend};
use greenhouse::drivers::i2c_dev::LinuxI2c;
use greenhouse::sensors::SimulatedSensor;
use greenhouse::sensors::htu21d::Htu21d;
use greenhouse::telemetry::repair::{replace_with_repaired, repair_file};
use greenhouse::telemetry::scanner::Records;
use greenhouse::telemetry::series::Series;
use greenhouse::telemetry::{self, LogScanner, LogStore, RangeOutcome};

// ── CLI ───────────────────────────────────────────────────────

/// Greenhouse valve controller and telemetry log tools
#[derive(Parser, Debug)]
#[command(name = "greenhouse", version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the log directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Drive simulated valves and sensor (requires a non-production log dir)
    #[arg(long, global = true)]
    simulate: bool,

    /// Debug-level logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only (for cron)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hourly job: scheduled watering, then a sensor reading
    Cycle,

    /// Open one valve for a number of seconds, then close all
    Water {
        /// Valve name or id
        valve: String,
        seconds: u64,
    },

    /// Print a log file as text (default: the active log)
    Print {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print every record from logs created in a date range
    Range {
        /// First day, YYYY-MM-DD or yymmdd
        #[arg(value_parser = parse_date)]
        start: NaiveDate,
        /// Last day (inclusive)
        #[arg(value_parser = parse_date)]
        end: NaiveDate,
        /// Emit plot series as JSON instead of text
        #[arg(long)]
        series: bool,
    },

    /// Emit plot series for a log file as JSON (default: the active log)
    Series {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Copy a log keeping only well-formed records
    Repair {
        /// Log to repair (default: the active log)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Where to write the cleaned copy (default: `repairtemp` in the log dir)
        #[arg(long, conflicts_with = "replace")]
        output: Option<PathBuf>,
        /// Replace the source with the cleaned copy
        #[arg(long)]
        replace: bool,
    },
}

fn parse_date(arg: &str) -> Result<NaiveDate, String> {
    let yymmdd = arg.len() == 6 && arg.bytes().all(|b| b.is_ascii_digit());
    let format = if yymmdd { "%y%m%d" } else { "%Y-%m-%d" };
    NaiveDate::parse_from_str(arg, format)
        .map_err(|_| format!("'{arg}' is not a date (YYYY-MM-DD or yymmdd)"))
}

// ── Entry point ───────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => SystemConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SystemConfig::default(),
    };
    if let Some(dir) = cli.log_dir {
        config.log.dir = dir;
    }
    if cli.simulate {
        config.hardware.backend = HardwareBackend::Simulated;
    }
    config.validate().context("invalid configuration")?;
    debug!("log directory: {}", config.log.dir.display());

    match cli.command {
        Command::Cycle => run_on_hardware(&config, Job::Cycle),
        Command::Water { valve, seconds } => {
            let id = config
                .valves
                .resolve(&valve)
                .filter(|id| !id.is_all_closed())
                .ok_or_else(|| anyhow!("unknown valve '{valve}'"))?;
            run_on_hardware(&config, Job::Water { valve: id, seconds })
        }
        Command::Print { file } => print_log(&active_or(&config, file)?),
        Command::Range { start, end, series } => print_range(&config, start, end, series),
        Command::Series { file } => {
            let path = active_or(&config, file)?;
            let series = collect_series(telemetry::read_log(&path)?.records(), &path)?;
            print_json(&series)
        }
        Command::Repair {
            file,
            output,
            replace,
        } => {
            let src = active_or(&config, file)?;
            let report = if replace {
                replace_with_repaired(&src)?
            } else {
                let dst = output.unwrap_or_else(|| config.log.dir.join("repairtemp"));
                repair_file(&src, &dst)?
            };
            println!(
                "kept {} records, dropped {}, ignored {} trailing bytes",
                report.kept, report.dropped, report.trailing_bytes
            );
            Ok(())
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Warn
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG, when set, overrides the flag-derived level.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

// ── Controller commands ───────────────────────────────────────

enum Job {
    Cycle,
    Water { valve: ValveId, seconds: u64 },
}

/// Build the adapters for the configured backend and run `job`.
fn run_on_hardware(config: &SystemConfig, job: Job) -> Result<()> {
    let hw = &config.hardware;
    match hw.backend {
        HardwareBackend::Simulated => {
            info!("running with simulated hardware");
            let actuators = GpioActuators::new(SimBackend::new(), &config.valves);
            let sensor = SimulatedSensor::new(hw.simulated_temperature_c, hw.simulated_humidity_pct);
            run_job(config, actuators, sensor, job)
        }
        HardwareBackend::Linux => {
            let bus = LinuxI2c::open(&hw.i2c_bus)
                .with_context(|| format!("opening I2C bus {}", hw.i2c_bus.display()))?;
            let actuators = GpioActuators::new(SysfsBackend::new(&hw.gpio_root), &config.valves);
            run_job(config, actuators, Htu21d::new(bus, hw.sensor_address), job)
        }
    }
}

fn run_job(
    config: &SystemConfig,
    actuators: impl ActuatorPort,
    sensor: impl SensorPort,
    job: Job,
) -> Result<()> {
    signals::install().context("installing signal handlers")?;
    let mut store = open_store(config)?;
    let mut events = LogEventSink::new();
    let mut service = GreenhouseService::new(config, actuators, sensor, SystemClock, ThreadDelay);

    match job {
        Job::Cycle => {
            let report = service.run_periodic_cycle(&mut store, &mut events)?;
            debug!("cycle report: {report:?}");
        }
        Job::Water { valve, seconds } => {
            service.open_valve_for(valve, seconds, &mut store, &mut events)?;
        }
    }
    exit_status(signals::interrupted())
}

/// A signal that arrived outside a valve hold still fails the job.
fn exit_status(interrupted: bool) -> Result<()> {
    if interrupted {
        bail!("interrupted by signal; all valves closed");
    }
    Ok(())
}

/// The log store for writing commands, creating the directory if needed.
fn open_store(config: &SystemConfig) -> Result<LogStore<SystemClock>> {
    fs::create_dir_all(&config.log.dir)
        .with_context(|| format!("creating log directory {}", config.log.dir.display()))?;
    let mut store = LogStore::new(&config.log, SystemClock);
    if let Some(user) = &config.log.owner {
        match FileOwner::lookup(user) {
            Ok(owner) => store = store.with_owner(owner),
            Err(e) => warn!("log owner '{user}' not resolvable ({e}); keeping current owner"),
        }
    }
    Ok(store)
}

// ── Inspection commands ───────────────────────────────────────

/// `file`, or the log the pointer currently names.
fn active_or(config: &SystemConfig, file: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file);
    }
    LogStore::new(&config.log, SystemClock)
        .current_log_file()?
        .ok_or_else(|| anyhow!("no active log in {}", config.log.dir.display()))
}

fn print_log(path: &Path) -> Result<()> {
    let mut records = telemetry::read_log(path)?.records();
    let mut out = io::stdout().lock();
    for record in records.by_ref() {
        writeln!(out, "{record}")?;
    }
    if records.corrupt_count() > 0 {
        warn!("{} corrupt records skipped", records.corrupt_count());
    }
    if let Some(e) = records.scanner_mut().take_error() {
        bail!("reading {}: {e}", path.display());
    }
    Ok(())
}

/// Drain `records` into plot series, failing if the read stopped early.
fn collect_series<R: Read>(mut records: Records<R>, path: &Path) -> Result<Series> {
    let series = Series::from_records(records.by_ref());
    if let Some(e) = records.scanner_mut().take_error() {
        bail!("reading {}: {e}", path.display());
    }
    Ok(series)
}

fn print_range(config: &SystemConfig, start: NaiveDate, end: NaiveDate, series: bool) -> Result<()> {
    let merged = match telemetry::query_range(&config.log.dir, &config.log.pointer_name, start, end)? {
        RangeOutcome::Found(merged) => merged,
        RangeOutcome::NotFound => {
            println!("No logs found in the date range");
            return Ok(());
        }
    };
    debug!("range {start}..={end} spans {} files", merged.sources().len());

    if series {
        let mut plot = Series::default();
        merged.for_each_record(|record| -> Result<()> {
            plot.push(record);
            Ok(())
        })?;
        return print_json(&plot);
    }

    let mut out = io::stdout().lock();
    let summary = merged.for_each_record(|record| -> Result<()> {
        writeln!(out, "{record}")?;
        Ok(())
    })?;
    if summary.corrupt > 0 {
        warn!("{} corrupt records skipped", summary.corrupt);
    }
    Ok(())
}

fn print_json(series: &Series) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, series)?;
    writeln!(out)?;
    Ok(())
}
