use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::config::{AppConfig, TimingConfig};
use crate::models::reading::{Action, ExtractedValue, HealthPhase, Metric};
use crate::models::region::Region;
use crate::services::auto_haste::AutoHaste;
use crate::services::dispatcher::ActionDispatcher;
use crate::services::ocr::NumberExtractor;
use crate::services::region_store::{region_for, RegionMap};
use crate::services::screen_capture::FrameSource;
use crate::services::threshold_monitor::{MonitorState, ThresholdMonitor};

/// Why the loop ended
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Stop requested through the handle (Ctrl-C, shell command)
    Requested,
    /// Input device fail-safe tripped
    Failsafe,
}

/// Per-metric view for a presentation layer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricStatus {
    pub metric: Metric,
    pub region: Option<Region>,
    pub last_value: ExtractedValue,
    pub fraction: Option<f64>,
    pub phase: HealthPhase,
    pub consecutive_failures: u32,
    pub warning: bool,
    pub critical_count: u32,
    pub moderate_count: u32,
    pub last_action: Option<Action>,
    pub last_action_at: Option<DateTime<Local>>,
}

/// Auto-haste state for a presentation layer
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct HasteStatus {
    pub enabled: bool,
    pub key: String,
    pub cast_count: u32,
}

/// Current tracking statistics
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct StatusSnapshot {
    pub active: bool,
    pub cycles: u64,
    pub stop_reason: Option<StopReason>,
    pub metrics: Vec<MetricStatus>,
    pub haste: HasteStatus,
}

impl StatusSnapshot {
    pub fn metric(&self, metric: Metric) -> Option<&MetricStatus> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    /// One-line summary, e.g. `HP: 864 (81.0%) | Mana: N/A | Haste: 3`
    ///
    /// Haste only shows while it is switched on.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .metrics
            .iter()
            .map(|m| match m.fraction {
                Some(fraction) if m.last_value.is_known() => {
                    format!("{}: {} ({:.1}%)", m.metric, m.last_value, fraction * 100.0)
                }
                _ => format!("{}: {}", m.metric, m.last_value),
            })
            .collect();
        if self.haste.enabled {
            parts.push(format!("Haste: {}", self.haste.cast_count));
        }
        parts.join(" | ")
    }
}

struct Shared {
    stop: AtomicBool,
    paused: AtomicBool,
    haste_toggle: AtomicBool,
    status: RwLock<StatusSnapshot>,
}

/// Cloneable control surface for a running loop
#[derive(Clone)]
pub struct MonitorHandle {
    shared: Arc<Shared>,
}

impl Default for MonitorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                haste_toggle: AtomicBool::new(false),
                status: RwLock::new(StatusSnapshot::default()),
            }),
        }
    }

    /// Ask the loop to stop after the current cycle
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        self.shared.status.write().active = false;
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.status.write().active = !self.is_stopped();
    }

    /// Flip between paused and active; returns whether the loop is now active
    pub fn toggle(&self) -> bool {
        if self.is_active() {
            self.pause();
        } else {
            self.resume();
        }
        self.is_active()
    }

    /// Ask the loop to switch auto-haste on or off at its next active cycle
    ///
    /// Two requests before the loop sees them cancel out.
    pub fn toggle_haste(&self) {
        self.shared.haste_toggle.fetch_xor(true, Ordering::SeqCst);
    }

    fn take_haste_toggle(&self) -> bool {
        self.shared.haste_toggle.swap(false, Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        !self.shared.paused.load(Ordering::SeqCst) && !self.is_stopped()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> StatusSnapshot {
        self.shared.status.read().clone()
    }

    fn publish(&self, snapshot: StatusSnapshot) {
        *self.shared.status.write() = snapshot;
    }
}

/// One monitored metric: its decision engine, state and region
struct MetricChannel {
    monitor: ThresholdMonitor,
    state: MonitorState,
    region: Option<Region>,
    last_reading: ExtractedValue,
    last_action: Option<(Action, DateTime<Local>)>,
}

impl MetricChannel {
    fn status(&self) -> MetricStatus {
        MetricStatus {
            metric: self.monitor.metric(),
            region: self.region,
            last_value: self.last_reading,
            fraction: self
                .last_reading
                .is_known()
                .then(|| self.state.last_fraction())
                .flatten(),
            phase: self.state.phase(),
            consecutive_failures: self.state.consecutive_failures(),
            warning: self.state.warning_raised(),
            critical_count: self.state.dispatch_count(Action::Critical),
            moderate_count: self.state.dispatch_count(Action::Moderate),
            last_action: self.last_action.map(|(action, _)| action),
            last_action_at: self.last_action.map(|(_, at)| at),
        }
    }
}

/// Capture, extract, decide and dispatch, once per poll interval
pub struct MonitorLoop {
    extractor: NumberExtractor,
    source: Box<dyn FrameSource>,
    dispatcher: Box<dyn ActionDispatcher>,
    channels: Vec<MetricChannel>,
    haste: AutoHaste,
    timing: TimingConfig,
    handle: MonitorHandle,
    cycles: u64,
}

impl MonitorLoop {
    /// Build a loop over every enabled metric, controlled through `handle`
    pub fn new(
        config: &AppConfig,
        regions: &RegionMap,
        extractor: NumberExtractor,
        source: Box<dyn FrameSource>,
        dispatcher: Box<dyn ActionDispatcher>,
        handle: MonitorHandle,
    ) -> Self {
        let channels: Vec<MetricChannel> = Metric::ALL
            .into_iter()
            .filter(|metric| config.metric(*metric).enabled)
            .map(|metric| {
                let region = region_for(regions, metric).copied();
                if region.is_none() {
                    warn!("{}: no region configured, readings will be N/A", metric);
                }
                MetricChannel {
                    monitor: ThresholdMonitor::from_config(metric, config),
                    state: MonitorState::new(),
                    region,
                    last_reading: ExtractedValue::Unknown,
                    last_action: None,
                }
            })
            .collect();

        let looper = Self {
            extractor,
            source,
            dispatcher,
            channels,
            haste: AutoHaste::new(&config.haste),
            timing: config.timing.clone(),
            handle,
            cycles: 0,
        };
        looper.publish(None);
        looper
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// One full pass over every metric, then the auto-haste timer
    ///
    /// Returns the threshold actions dispatched during this cycle.
    pub fn run_cycle(&mut self, now: Instant) -> Vec<(Metric, Action)> {
        let mut dispatched = Vec::new();

        for channel in &mut self.channels {
            let max_value = channel.monitor.config().max_value;
            let extraction =
                self.extractor
                    .read_region(self.source.as_ref(), channel.region.as_ref(), max_value);

            let action = channel.monitor.evaluate(
                &mut channel.state,
                extraction.value,
                now,
                self.dispatcher.as_mut(),
            );
            channel.last_reading = extraction.value;

            if let Some(action) = action {
                channel.last_action = Some((action, Local::now()));
                dispatched.push((channel.monitor.metric(), action));
            }
        }

        if self.handle.take_haste_toggle() {
            self.haste.toggle(now, self.dispatcher.as_mut());
        } else {
            self.haste.tick(now, self.dispatcher.as_mut());
        }

        self.cycles += 1;
        self.publish(None);
        debug!("Cycle {}: {}", self.cycles, self.handle.status().summary());
        dispatched
    }

    /// Sleep before the next cycle; shorter while HP looks critical
    pub fn next_interval(&self) -> Duration {
        let hp_critical = self
            .channels
            .iter()
            .any(|c| c.monitor.metric() == Metric::Hp && c.state.is_critical());

        match self.timing.emergency_interval() {
            Some(emergency) if hp_critical => emergency,
            _ => self.timing.poll_interval(),
        }
    }

    /// Run until stopped or the fail-safe trips
    ///
    /// Blocking; a cycle in flight always completes before the loop exits.
    pub fn run(mut self) -> StopReason {
        info!(
            "Monitoring {} metric(s) every {:?} with {} OCR",
            self.channels.len(),
            self.timing.poll_interval(),
            self.extractor.engine_name()
        );

        let reason = loop {
            if self.handle.is_stopped() {
                break StopReason::Requested;
            }
            if self.dispatcher.failsafe_tripped() {
                warn!("Fail-safe triggered, stopping");
                self.handle.stop();
                break StopReason::Failsafe;
            }

            if self.handle.is_active() {
                self.run_cycle(Instant::now());
            }

            thread::sleep(self.next_interval());
        };

        self.publish(Some(reason));
        info!("Monitoring stopped ({:?}) after {} cycles", reason, self.cycles);
        reason
    }

    fn publish(&self, stop_reason: Option<StopReason>) {
        self.handle.publish(StatusSnapshot {
            active: stop_reason.is_none() && self.handle.is_active(),
            cycles: self.cycles,
            stop_reason,
            metrics: self.channels.iter().map(MetricChannel::status).collect(),
            haste: HasteStatus {
                enabled: self.haste.is_enabled(),
                key: self.haste.key().to_string(),
                cast_count: self.haste.cast_count(),
            },
        });
    }
}
