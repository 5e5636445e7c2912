/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};

use ilight::config::FixtureConfig;
use ilight::fixture::{self, Hardware};
use ilight::sim::scenario::Scenario;
use ilight::waveform::{AWAKEN, IDLE};

// ── CLI argument definition ───────────────────────────────────────────────────

/// iLight fixture runtime on simulated hardware.
///
/// Example:
///   ilight --config fixture.yaml --scenario walk_up.yaml --max-restarts 3
#[derive(Debug, Parser)]
#[command(
    name = "ilight",
    about = "iLight fixture runtime – idle/awaken lighting on simulated sensors",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML fixture configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Path to the YAML simulation scenario (per-sensor distance scripts).
    #[arg(short = 's', long = "scenario")]
    scenario: Option<PathBuf>,

    /// Give up after this many restarts (0 = keep restarting).
    #[arg(short = 'r', long = "max-restarts", default_value_t = 0)]
    max_restarts: u32,

    /// Validate the configuration, print the bring-up plan and exit.
    #[arg(long = "check", default_value_t = false)]
    check: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        config       = ?cli.config,
        scenario     = ?cli.scenario,
        max_restarts = cli.max_restarts,
        check        = cli.check,
        "iLight starting up"
    );

    // ── Load fixture configuration ────────────────────────────────────────────
    let config = match &cli.config {
        Some(path) => match FixtureConfig::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Failed to load fixture configuration: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No configuration file provided, using default fixture settings");
            FixtureConfig::default()
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid fixture configuration: {}", e);
        process::exit(1);
    }

    print_plan(&config);
    if cli.check {
        return;
    }

    // ── Load simulation scenario ──────────────────────────────────────────────
    let scenario = match &cli.scenario {
        Some(path) => match Scenario::load_from_file(path) {
            Ok(sc) => sc,
            Err(e) => {
                error!("Failed to load scenario: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            info!("No scenario provided, running the built-in walk-up demo");
            Scenario::demo()
        }
    };

    // ── Supervisor: every fatal fault reboots from bring-up ───────────────────
    let mut restarts: u32 = 0;
    loop {
        let hw = scenario.build(&config);
        let hardware = Hardware {
            bus: hw.bus,
            reset_lines: hw.reset_lines,
            pwm: hw.pwm,
            restart: hw.restart,
        };

        tokio::select! {
            fault = fixture::run(&config, hardware) => {
                restarts += 1;
                warn!(restart = restarts, error = %fault, "fixture restarted");
                if cli.max_restarts > 0 && restarts >= cli.max_restarts {
                    error!("Giving up after {} restart(s)", restarts);
                    process::exit(1);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }
}

/// Log the sensor addressing plan and waveform timings.
fn print_plan(config: &FixtureConfig) {
    let sensors = &config.sensors;
    info!(
        "Bring-up plan: {} sensor(s), default address {:#04x}",
        sensors.count, sensors.default_address
    );
    for (i, line) in config.active_reset_lines().iter().enumerate() {
        info!(
            "  [sensor {i}]  reset_gpio={line}  address={addr:#04x}  interval={interval}ms  timeout={timeout}ms",
            addr = sensors.address_of(i),
            interval = sensors.sample_interval_ms,
            timeout = sensors.read_timeout_ms,
        );
    }
    info!(
        "Trigger: {} consecutive read(s) below {}mm",
        config.trigger.debounce_reads, config.trigger.threshold_mm
    );
    info!(
        "Output: channel {} @ {}Hz, {} bit (max level {}), pin {}",
        config.output.pwm_channel,
        config.output.pwm_frequency_hz,
        config.output.pwm_resolution_bits,
        config.output.max_level(),
        config.output.pin,
    );
    for w in [IDLE, AWAKEN] {
        info!(
            "Waveform [{}]: {} level steps, {}ms per cycle",
            w.name,
            w.level_steps(),
            w.duration().as_millis()
        );
    }
}
