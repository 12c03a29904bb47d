//! `proxisafe-cli` – ProxiSafe monitor
//!
//! This binary wires the whole monitor together.  It:
//!
//! 1. Installs the `tracing` subscriber (optional OTLP export).
//! 2. Resolves `~/.proxisafe/config.toml` plus environment overrides.
//! 3. Probes the capture sources (stream → snapshot → local device →
//!    synthetic) and starts the frame pipeline on its own thread.
//! 4. Runs the sensor task, the watchdog sweep and the cockpit server on a
//!    Tokio runtime.
//! 5. Intercepts **Ctrl-C** and shuts every worker down.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use tracing::{error, warn};

use proxisafe_cockpit::{AppState, CockpitServer};
use proxisafe_hal::{CaptureSourceManager, DeviceBackend, SensorBank, TelemetrySource};
use proxisafe_kernel::Watchdog;
use proxisafe_middleware::EventBus;
use proxisafe_perception::DistanceFilter;
use proxisafe_runtime::{FramePipeline, ResultSlot, init_tracing, run_sensor_task};

const WATCHDOG_SWEEP: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

const USAGE: &str = "\
Usage: proxisafe [OPTIONS]

Options:
  --synthetic      skip camera probing and use the synthetic source
  --print-config   print the resolved configuration as TOML and exit
  --save-config    write the resolved configuration to ~/.proxisafe/config.toml and exit
  -h, --help       show this help";

#[derive(Debug, Default, PartialEq)]
struct Args {
    synthetic: bool,
    print_config: bool,
    save_config: bool,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    for arg in args {
        match arg.as_str() {
            "--synthetic" => parsed.synthetic = true,
            "--print-config" => parsed.print_config = true,
            "--save-config" => parsed.save_config = true,
            "-h" | "--help" => parsed.help = true,
            other => return Err(format!("unknown option `{other}`")),
        }
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {e}\n\n{USAGE}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    if args.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            eprintln!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    if args.print_config || args.save_config {
        return config_command(&cfg, &args);
    }

    // ── Logging / tracing ─────────────────────────────────────────────────
    let _tracing = init_tracing("proxisafe");
    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; stop the process with a signal");
    }

    // ── Capture probe ─────────────────────────────────────────────────────
    // The network drivers use blocking clients, so probing happens before
    // the Tokio runtime exists.
    let capture_config = cfg.capture();
    let capture = if args.synthetic {
        CaptureSourceManager::synthetic(&capture_config)
    } else {
        let backends: Vec<Box<dyn DeviceBackend>> = Vec::new();
        CaptureSourceManager::probe(&capture_config, &backends)
    };
    println!("  Capture source: {}", capture.mode().to_string().bold());

    // ── Shared state ──────────────────────────────────────────────────────
    let bus = EventBus::default();
    let slot = ResultSlot::new();
    let bank = Arc::new(SensorBank::new());
    let telemetry: Arc<dyn TelemetrySource> = bank.clone();
    let watchdog = Arc::new(Watchdog::new());

    let pipeline = FramePipeline::new(capture, Arc::clone(&telemetry), slot.clone(), cfg.pipeline())
        .with_filter(DistanceFilter::new(cfg.distance_filter()))
        .with_bus(bus.clone())
        .with_watchdog(Arc::clone(&watchdog));
    let pipeline_handle = match pipeline.spawn(Arc::clone(&shutdown)) {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "frame pipeline failed to start");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build the async runtime");
            shutdown.store(true, Ordering::SeqCst);
            let _ = pipeline_handle.join();
            return ExitCode::FAILURE;
        }
    };

    let state = Arc::new(AppState::new(slot, telemetry, bus).with_watchdog(Arc::clone(&watchdog)));
    let server = CockpitServer::new(state)
        .with_port(cfg.http_port)
        .with_ws_port(cfg.ws_port);
    println!(
        "  Dashboard: {}\n",
        format!("http://localhost:{}", server.port()).bold().cyan()
    );

    let served = runtime.block_on(async {
        tokio::spawn(run_sensor_task(
            bank,
            cfg.sensor_interval(),
            Some(Arc::clone(&watchdog)),
            Arc::clone(&shutdown),
        ));
        tokio::spawn(sweep_watchdog(Arc::clone(&watchdog), Arc::clone(&shutdown)));

        tokio::select! {
            result = server.run() => result,
            () = wait_for_shutdown(&shutdown) => Ok(()),
        }
    });

    shutdown.store(true, Ordering::SeqCst);
    if pipeline_handle.join().is_err() {
        error!("frame pipeline thread panicked");
    }
    runtime.shutdown_timeout(Duration::from_secs(1));

    match served {
        Ok(()) => {
            println!("{}", "  ✓ ProxiSafe stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "cockpit server failed");
            ExitCode::FAILURE
        }
    }
}

fn config_command(cfg: &config::Config, args: &Args) -> ExitCode {
    if args.print_config {
        match config::to_toml(cfg) {
            Ok(raw) => print!("{raw}"),
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                return ExitCode::FAILURE;
            }
        }
    }
    if args.save_config {
        match config::save(cfg) {
            Ok(path) => println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => {
                eprintln!("{}: {e}", "Error saving config".red());
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

async fn wait_for_shutdown(shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
}

/// Log stalled components; each outage is reported once by the watchdog.
async fn sweep_watchdog(watchdog: Arc<Watchdog>, shutdown: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(WATCHDOG_SWEEP);
    while !shutdown.load(Ordering::Relaxed) {
        ticker.tick().await;
        watchdog.check_all();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                _ ____         __     "#.bold().cyan());
    println!("{}", r#"  / _ \_______ __ __ (_) __/__ _ ___/ /__   "#.bold().cyan());
    println!("{}", r#" / ___/ __/ _ \\ \ // /\ \/ _ `/ _/ / -_)  "#.bold().cyan());
    println!("{}", r#"/_/  /_/  \___/_\_\/_/___/\_,_/_//_/\__/   "#.bold().cyan());
    println!();
    println!("  {}", "Proximity + telemetry safety monitor".dimmed());
    println!();
}
