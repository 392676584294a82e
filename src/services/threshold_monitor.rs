use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::models::config::{AppConfig, ThresholdConfig};
use crate::models::reading::{Action, ExtractedValue, HealthPhase, Metric};
use crate::services::dispatcher::ActionDispatcher;

/// Decision state for one metric, mutated only by [`ThresholdMonitor::evaluate`]
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    last_critical: Option<Instant>,
    last_moderate: Option<Instant>,
    consecutive_failures: u32,
    warning_raised: bool,
    last_stable_value: Option<u32>,
    pending_critical: Option<u32>,
    phase: HealthPhase,
    last_value: Option<u32>,
    last_fraction: Option<f64>,
    critical_count: u32,
    moderate_count: u32,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, as if the process had just started
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the repeated-failure warning has fired since the last valid reading
    pub fn warning_raised(&self) -> bool {
        self.warning_raised
    }

    pub fn last_stable_value(&self) -> Option<u32> {
        self.last_stable_value
    }

    pub fn pending_critical(&self) -> Option<u32> {
        self.pending_critical
    }

    pub fn phase(&self) -> HealthPhase {
        self.phase
    }

    pub fn last_value(&self) -> Option<u32> {
        self.last_value
    }

    pub fn last_fraction(&self) -> Option<f64> {
        self.last_fraction
    }

    pub fn dispatch_count(&self, action: Action) -> u32 {
        match action {
            Action::Critical => self.critical_count,
            Action::Moderate => self.moderate_count,
        }
    }

    pub fn last_action_at(&self, action: Action) -> Option<Instant> {
        match action {
            Action::Critical => self.last_critical,
            Action::Moderate => self.last_moderate,
        }
    }

    /// Whether the last reading sat in the critical band, confirmed or not
    pub fn is_critical(&self) -> bool {
        matches!(
            self.phase,
            HealthPhase::CriticalConfirmed | HealthPhase::CriticalPendingConfirmation
        )
    }

    fn record_dispatch(&mut self, action: Action, now: Instant) {
        match action {
            Action::Critical => {
                self.last_critical = Some(now);
                self.critical_count += 1;
            }
            Action::Moderate => {
                self.last_moderate = Some(now);
                self.moderate_count += 1;
            }
        }
    }
}

/// Threshold decision engine for one metric
pub struct ThresholdMonitor {
    metric: Metric,
    config: ThresholdConfig,
    critical_key: String,
    moderate_key: String,
}

impl ThresholdMonitor {
    pub fn new(
        metric: Metric,
        config: ThresholdConfig,
        critical_key: impl Into<String>,
        moderate_key: impl Into<String>,
    ) -> Self {
        Self {
            metric,
            config,
            critical_key: critical_key.into(),
            moderate_key: moderate_key.into(),
        }
    }

    pub fn from_config(metric: Metric, config: &AppConfig) -> Self {
        let section = config.metric(metric);
        Self::new(
            metric,
            config.thresholds(metric),
            section.key_for(Action::Critical),
            section.key_for(Action::Moderate),
        )
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn key_for(&self, action: Action) -> &str {
        match action {
            Action::Critical => &self.critical_key,
            Action::Moderate => &self.moderate_key,
        }
    }

    /// Decide on one reading and dispatch at most one key press
    ///
    /// Returns the action that was actually dispatched. Decisions blocked by
    /// cooldown, pending confirmation or a failed press return `None`.
    pub fn evaluate(
        &self,
        state: &mut MonitorState,
        value: ExtractedValue,
        now: Instant,
        dispatcher: &mut dyn ActionDispatcher,
    ) -> Option<Action> {
        let metric = self.metric;
        if self.config.max_value == 0 {
            error!("{}: max value is 0, refusing to evaluate", metric);
            return None;
        }

        let Some(value) = value.known().filter(|v| *v > 0) else {
            state.consecutive_failures += 1;
            debug!("{}: no valid reading ({} in a row)", metric, state.consecutive_failures);
            if !state.warning_raised && state.consecutive_failures >= self.config.max_failures_warning {
                state.warning_raised = true;
                warn!(
                    "{}: {} consecutive failed readings, check the region",
                    metric, state.consecutive_failures
                );
            }
            return None;
        };

        state.consecutive_failures = 0;
        state.warning_raised = false;

        let max_value = self.config.max_value as f64;
        let fraction = value as f64 / max_value;
        state.last_value = Some(value);
        state.last_fraction = Some(fraction);
        debug!(
            "{}: {} = {:.1}% (critical < {:.0}%, moderate < {:.0}%)",
            metric,
            value,
            fraction * 100.0,
            self.config.critical_fraction * 100.0,
            self.config.moderate_fraction * 100.0
        );

        let dramatic_drop = match state.last_stable_value {
            Some(stable) => {
                let drop = (stable as f64 - value as f64) / max_value;
                if drop > self.config.dramatic_drop_fraction {
                    debug!("{}: dramatic drop {} -> {} ({:.1}%)", metric, stable, value, drop * 100.0);
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        let mut dispatched = None;
        if fraction < self.config.critical_fraction {
            match (dramatic_drop, state.pending_critical) {
                (true, None) => {
                    debug!("{}: critical reading {} needs confirmation", metric, value);
                    state.pending_critical = Some(value);
                    state.phase = HealthPhase::CriticalPendingConfirmation;
                }
                (true, Some(pending)) if value.abs_diff(pending) <= self.config.confirmation_tolerance => {
                    debug!("{}: critical confirmed ({} -> {})", metric, pending, value);
                    state.pending_critical = None;
                    state.phase = HealthPhase::CriticalConfirmed;
                    dispatched = self.fire(state, Action::Critical, now, dispatcher);
                }
                (true, Some(_)) => {
                    debug!("{}: critical reading changed, pending is now {}", metric, value);
                    state.pending_critical = Some(value);
                    state.phase = HealthPhase::CriticalPendingConfirmation;
                }
                (false, _) => {
                    state.pending_critical = None;
                    state.phase = HealthPhase::CriticalConfirmed;
                    dispatched = self.fire(state, Action::Critical, now, dispatcher);
                }
            }
        } else if fraction < self.config.moderate_fraction {
            state.pending_critical = None;
            state.phase = HealthPhase::ModerateNeed;
            dispatched = self.fire(state, Action::Moderate, now, dispatcher);
        } else {
            state.pending_critical = None;
            state.phase = HealthPhase::Healthy;
        }

        if !dramatic_drop || fraction > self.config.critical_fraction {
            state.last_stable_value = Some(value);
        }

        dispatched
    }

    /// Press the key for `action` unless its cooldown is still running
    fn fire(
        &self,
        state: &mut MonitorState,
        action: Action,
        now: Instant,
        dispatcher: &mut dyn ActionDispatcher,
    ) -> Option<Action> {
        let key = self.key_for(action);

        if let Some(last) = state.last_action_at(action) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.config.cooldown {
                debug!(
                    "{}: {} key {} blocked ({:.3}s cooldown remaining)",
                    self.metric,
                    action,
                    key,
                    (self.config.cooldown - elapsed).as_secs_f64()
                );
                return None;
            }
        }

        match dispatcher.press(key) {
            Ok(()) => {
                state.record_dispatch(action, now);
                info!("{}: {} -> pressed {}", self.metric, action, key);
                Some(action)
            }
            Err(e) => {
                warn!("{}: {} key {} failed: {}", self.metric, action, key, e);
                None
            }
        }
    }
}
