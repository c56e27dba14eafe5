//! # BVM Control Unit
//!
//! Runs the ventilator control core against the simulated plant.
//!
//! Loads a single TOML configuration (or the built-in defaults), homes the
//! arm, applies the operator settings given on the command line and runs
//! for a fixed simulated duration. With `--telemetry` one JSON line is
//! printed per slow tick.

use bvm_common::config::{ConfigError, LogLevel};
use bvm_common::consts::DEFAULT_CONFIG_PATH;
use bvm_common::control_unit::config::BvmConfig;
use bvm_common::control_unit::telemetry::CoreTelemetry;
use bvm_control_unit::config::load_config;
use bvm_control_unit::sim::{SimParams, build_sim_runner};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// BVM Control Unit: ventilator control core on a simulated plant
#[derive(Parser, Debug)]
#[command(name = "bvm_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Bag-valve-mask ventilator control core (simulation)")]
struct Args {
    /// Path to the TOML configuration. Falls back to /etc/bvm/bvm.toml,
    /// then to built-in defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Simulated run time in seconds.
    #[arg(long, default_value_t = 30.0)]
    duration_s: f64,

    /// Start breathing once homing completes.
    #[arg(long)]
    operational: bool,

    /// Breath-rate setting index.
    #[arg(long, default_value_t = 0)]
    rate_idx: usize,

    /// Tidal-volume setting index.
    #[arg(long, default_value_t = 0)]
    tv_idx: usize,

    /// Airway obstruction factor of the simulated lung (1.0 = normal).
    #[arg(long, default_value_t = 1.0)]
    obstruction: f64,

    /// Print one JSON telemetry line per slow tick on stdout.
    #[arg(long)]
    telemetry: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Tracing takes its level from the config, so load before logging.
    let config = resolve_config(&args);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("BVM Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, &config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("BVM Control Unit shutdown complete");
}

/// `--config`, else the system path if present, else built-in defaults.
fn resolve_config(args: &Args) -> Result<BvmConfig, ConfigError> {
    match &args.config {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_config(Path::new(DEFAULT_CONFIG_PATH))
        }
        None => Ok(BvmConfig::default()),
    }
}

fn run(args: &Args, config: &BvmConfig) -> Result<(), Box<dyn std::error::Error>> {
    if args.config.is_none() && !Path::new(DEFAULT_CONFIG_PATH).exists() {
        warn!("No --config given and {DEFAULT_CONFIG_PATH} absent, using built-in defaults");
    }

    info!(
        service = %config.shared.service_name,
        servo_ms = config.timing.servo_period_ms,
        control_ms = config.timing.control_period_ms,
        ui_ms = config.timing.ui_period_ms,
        "Config OK"
    );

    let (plant, mut runner) = build_sim_runner(config, SimParams::default());
    plant.borrow_mut().set_obstruction(args.obstruction);
    runner.init();

    let servo_period_ms = u64::from(config.timing.servo_period_ms);
    let dt_s = servo_period_ms as f64 / 1000.0;
    let total_ticks = (args.duration_s.max(0.0) * 1000.0) as u64 / servo_period_ms;

    let mut settings_applied = false;
    let mut last = CoreTelemetry::default();

    for _ in 0..total_ticks {
        plant.borrow_mut().step(dt_s);
        let snapshot = runner.step();

        // Homing resets the ventilator, so operator settings go in afterwards.
        if !settings_applied && runner.homing().is_done() {
            let ventilator = runner.ventilator_mut();
            ventilator.set_tv_idx(args.tv_idx);
            ventilator.set_rate_idx(args.rate_idx);
            runner.set_operational(args.operational);
            settings_applied = true;
        }

        if let Some(t) = snapshot {
            if args.telemetry {
                println!("{}", serde_json::to_string(&t)?);
            }
            last = t;
        }
    }

    let stats = runner.stats();
    info!(
        sim_time_ms = runner.now_ms(),
        servo_ticks = stats.servo_ticks,
        control_ticks = stats.control_ticks,
        ui_ticks = stats.ui_ticks,
        homed_at_ms = ?stats.homed_at_ms,
        breaths = last.ventilator.breath_count,
        peak_pressure = last.ventilator.peak_pressure,
        interlock_trips = last.ventilator.interlock_trips,
        rejected_pressure_samples = last.ventilator.rejected_pressure_samples,
        servo_faults = last.servo.faults,
        alarms = last.alarms,
        "Run complete"
    );

    if !settings_applied {
        warn!("Homing did not complete within the run");
    }

    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
/// `RUST_LOG` wins over both. Logs go to stderr so stdout carries only
/// telemetry.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
