use std::io::BufRead;
use std::time::Duration;

use tracing::{debug, error, info};

use super::{build_engine, CommandContext};
use crate::models::config::AppConfig;
use crate::models::reading::Metric;
use crate::services::dispatcher::{ActionDispatcher, DryRunDispatcher, KeyboardDispatcher};
use crate::services::monitor_loop::{MonitorHandle, MonitorLoop, StatusSnapshot, StopReason};
use crate::services::ocr::NumberExtractor;
use crate::services::region_store::{region_for, RegionMap};
use crate::services::screen_capture::ScreenCapture;

/// How often the terminal status line refreshes
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub max_hp: Option<u32>,
    pub max_mana: Option<u32>,
    pub haste: bool,
}

/// Apply command-line overrides on top of the loaded configuration
///
/// Passing a mana maximum also enables mana monitoring.
pub fn apply_overrides(config: &mut AppConfig, options: &RunOptions) {
    if let Some(max) = options.max_hp {
        config.hp.max_value = max;
    }
    if let Some(max) = options.max_mana {
        config.mana.max_value = max;
        config.mana.enabled = true;
    }
    if options.haste {
        config.haste.enabled = true;
    }
}

/// Load the configuration, apply overrides, then validate the result
fn prepare_config(context: &CommandContext, options: &RunOptions) -> Result<AppConfig, String> {
    let mut config = context.load_config()?;
    apply_overrides(&mut config, options);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }
    Ok(config)
}

/// Start monitoring until Ctrl-C or the fail-safe stops it
pub async fn run(context: &CommandContext, options: RunOptions) -> Result<(), String> {
    let config = prepare_config(context, &options)?;

    let regions = context.region_store(&config).load().map_err(|e| e.to_string())?;
    check_regions(&config, &regions)?;

    let handle = MonitorHandle::new();
    let worker_handle = handle.clone();
    let dry_run = options.dry_run;

    // Capture, OCR and input handles are thread-bound, so the loop is built on its own thread
    let mut worker = tokio::task::spawn_blocking(move || -> Result<StopReason, String> {
        let (engine, _server) = build_engine(&config.ocr)?;
        let source = ScreenCapture::open(config.capture.monitor_index).map_err(|e| e.to_string())?;
        let dispatcher: Box<dyn ActionDispatcher> = if dry_run {
            Box::new(DryRunDispatcher::new())
        } else {
            Box::new(KeyboardDispatcher::new().map_err(|e| e.to_string())?)
        };
        let extractor = NumberExtractor::new(engine, config.ocr.lower_bound);

        let monitor = MonitorLoop::new(
            &config,
            &regions,
            extractor,
            Box::new(source),
            dispatcher,
            worker_handle,
        );
        Ok(monitor.run())
    });

    if dry_run {
        println!("Dry run: no keys will be pressed");
    }
    println!("Monitoring started. Press Ctrl+C to stop (move the mouse to the top-left corner for fail-safe).");
    println!("Type p + Enter to pause/resume, h + Enter to toggle auto-haste, q + Enter to stop.");
    spawn_console(handle.clone());

    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    let mut interrupted = false;
    let outcome = loop {
        tokio::select! {
            result = &mut worker => {
                break result.map_err(|e| format!("Monitor thread failed: {}", e))?;
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Stop requested");
                interrupted = true;
                handle.stop();
            }
            _ = ticker.tick() => {
                let status = handle.status();
                if status.active {
                    println!("{}", status.summary());
                }
            }
        }
    };

    let reason = outcome?;
    print_final_status(&handle.status(), reason);
    Ok(())
}

/// Read control lines from stdin on a detached thread
///
/// A plain thread so a pending read never holds up runtime shutdown.
fn spawn_console(handle: MonitorHandle) {
    let spawned = std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(message) = apply_console_command(&handle, &line) {
                    println!("{}", message);
                }
                if handle.is_stopped() {
                    break;
                }
            }
            debug!("Console input closed");
        });
    if let Err(e) = spawned {
        error!("Failed to start console input: {}", e);
    }
}

/// Apply one console line to the running loop
///
/// Returns the confirmation to print, `None` for unknown input.
fn apply_console_command(handle: &MonitorHandle, line: &str) -> Option<&'static str> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(if handle.toggle() { "Resumed" } else { "Paused" }),
        "h" | "haste" => {
            handle.toggle_haste();
            Some("Auto-haste toggle requested")
        }
        "q" | "quit" => {
            info!("Stop requested from console");
            handle.stop();
            Some("Stopping...")
        }
        _ => None,
    }
}

/// Enabled metrics without a region can never be read
fn check_regions(config: &AppConfig, regions: &RegionMap) -> Result<(), String> {
    let enabled: Vec<Metric> = Metric::ALL
        .into_iter()
        .filter(|m| config.metric(*m).enabled)
        .collect();

    let configured = enabled.iter().filter(|m| region_for(regions, **m).is_some()).count();
    if configured == 0 {
        return Err(format!(
            "No region configured for {}; use `regions set` first",
            enabled
                .iter()
                .map(|m| m.label())
                .collect::<Vec<_>>()
                .join(" or ")
        ));
    }
    Ok(())
}

fn print_final_status(status: &StatusSnapshot, reason: StopReason) {
    let reason = match reason {
        StopReason::Requested => "stopped by user",
        StopReason::Failsafe => "fail-safe triggered",
    };
    println!("Monitoring ended ({}) after {} cycles", reason, status.cycles);

    for metric in &status.metrics {
        println!(
            "  {}: last {} | critical presses {} | moderate presses {}",
            metric.metric, metric.last_value, metric.critical_count, metric.moderate_count
        );
    }
    if status.haste.enabled || status.haste.cast_count > 0 {
        println!("  Haste ({}): {} casts", status.haste.key, status.haste.cast_count);
    }
}
