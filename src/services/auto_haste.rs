use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::models::config::HasteConfig;
use crate::services::dispatcher::ActionDispatcher;

/// Presses a buff key again and again, at a random interval each time
pub struct AutoHaste {
    key: String,
    min_interval: Duration,
    max_interval: Duration,
    rng: StdRng,
    enabled: bool,
    next_cast: Option<Instant>,
    cast_count: u32,
}

impl AutoHaste {
    pub fn new(config: &HasteConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic interval sequence
    pub fn with_seed(config: &HasteConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &HasteConfig, rng: StdRng) -> Self {
        let min_interval = Duration::try_from_secs_f64(config.min_interval_seconds).unwrap_or_default();
        let max_interval = Duration::try_from_secs_f64(config.max_interval_seconds)
            .unwrap_or_default()
            .max(min_interval);

        Self {
            key: config.key.clone(),
            min_interval,
            max_interval,
            rng,
            // Starting enabled with nothing scheduled casts on the first tick
            enabled: config.enabled,
            next_cast: None,
            cast_count: 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cast_count(&self) -> u32 {
        self.cast_count
    }

    pub fn next_cast(&self) -> Option<Instant> {
        self.next_cast
    }

    /// Flip on/off; returns whether it is now on
    ///
    /// Switching on casts right away.
    pub fn toggle(&mut self, now: Instant, dispatcher: &mut dyn ActionDispatcher) -> bool {
        self.enabled = !self.enabled;
        info!("Auto-haste {}", if self.enabled { "enabled" } else { "disabled" });

        if self.enabled {
            self.cast(now, dispatcher);
        } else {
            self.next_cast = None;
        }
        self.enabled
    }

    /// Cast if switched on and the scheduled time has come
    ///
    /// Returns whether the key was pressed.
    pub fn tick(&mut self, now: Instant, dispatcher: &mut dyn ActionDispatcher) -> bool {
        if !self.enabled {
            return false;
        }
        match self.next_cast {
            Some(at) if now < at => false,
            _ => self.cast(now, dispatcher),
        }
    }

    fn cast(&mut self, now: Instant, dispatcher: &mut dyn ActionDispatcher) -> bool {
        let pressed = match dispatcher.press(&self.key) {
            Ok(()) => {
                self.cast_count += 1;
                info!("Auto-haste: pressed {} ({} casts)", self.key, self.cast_count);
                true
            }
            Err(e) => {
                warn!("Auto-haste: key {} failed: {}", self.key, e);
                false
            }
        };

        // A failed press waits for the next slot as well
        let delay = self.next_delay();
        self.next_cast = Some(now + delay);
        debug!("Next haste in {:.1}s", delay.as_secs_f64());
        pressed
    }

    fn next_delay(&mut self) -> Duration {
        if self.max_interval <= self.min_interval {
            return self.min_interval;
        }
        let secs = self
            .rng
            .gen_range(self.min_interval.as_secs_f64()..=self.max_interval.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dispatcher::{DispatchError, DryRunDispatcher};

    fn haste_config(enabled: bool) -> HasteConfig {
        HasteConfig {
            enabled,
            key: "f5".to_string(),
            min_interval_seconds: 10.0,
            max_interval_seconds: 20.0,
        }
    }

    struct DeadKeyboard;

    impl ActionDispatcher for DeadKeyboard {
        fn press(&mut self, key: &str) -> Result<(), DispatchError> {
            Err(DispatchError::Send {
                key: key.to_string(),
                reason: "no device".to_string(),
            })
        }
    }

    #[test]
    fn test_disabled_never_casts() {
        let mut haste = AutoHaste::with_seed(&haste_config(false), 1);
        let mut keys = DryRunDispatcher::new();
        let t0 = Instant::now();

        assert!(!haste.tick(t0, &mut keys));
        assert!(!haste.tick(t0 + Duration::from_secs(3600), &mut keys));
        assert!(keys.presses().is_empty());
        assert_eq!(haste.next_cast(), None);
    }

    #[test]
    fn test_toggle_on_casts_immediately() {
        let mut haste = AutoHaste::with_seed(&haste_config(false), 1);
        let mut keys = DryRunDispatcher::new();
        let t0 = Instant::now();

        assert!(haste.toggle(t0, &mut keys));
        assert_eq!(keys.presses(), &["f5".to_string()]);
        assert_eq!(haste.cast_count(), 1);

        let wait = haste.next_cast().unwrap() - t0;
        assert!(
            wait >= Duration::from_secs(10) && wait <= Duration::from_secs(20),
            "interval {:?} outside 10-20s",
            wait
        );
    }

    #[test]
    fn test_casts_again_only_after_interval() {
        let mut haste = AutoHaste::with_seed(&haste_config(false), 7);
        let mut keys = DryRunDispatcher::new();
        let t0 = Instant::now();
        haste.toggle(t0, &mut keys);

        assert!(!haste.tick(t0 + Duration::from_millis(9_999), &mut keys));
        assert_eq!(haste.cast_count(), 1);

        let due = haste.next_cast().unwrap();
        assert!(haste.tick(due, &mut keys));
        assert_eq!(haste.cast_count(), 2);
        assert!(haste.next_cast().unwrap() >= due + Duration::from_secs(10));
    }

    #[test]
    fn test_enabled_in_config_casts_on_first_tick() {
        let mut haste = AutoHaste::with_seed(&haste_config(true), 3);
        let mut keys = DryRunDispatcher::new();

        assert!(haste.is_enabled());
        assert!(haste.tick(Instant::now(), &mut keys));
        assert_eq!(keys.presses().len(), 1);
    }

    #[test]
    fn test_toggle_off_clears_schedule() {
        let mut haste = AutoHaste::with_seed(&haste_config(true), 3);
        let mut keys = DryRunDispatcher::new();
        let t0 = Instant::now();
        haste.tick(t0, &mut keys);

        assert!(!haste.toggle(t0, &mut keys));
        assert_eq!(haste.next_cast(), None);
        assert!(!haste.tick(t0 + Duration::from_secs(60), &mut keys));
        assert_eq!(keys.presses().len(), 1, "switching off presses nothing");
    }

    #[test]
    fn test_intervals_stay_in_range() {
        let mut haste = AutoHaste::with_seed(&haste_config(true), 42);
        let mut keys = DryRunDispatcher::new();
        let mut now = Instant::now();

        for _ in 0..50 {
            assert!(haste.tick(now, &mut keys));
            let next = haste.next_cast().unwrap();
            let wait = next - now;
            assert!(wait >= Duration::from_secs(10) && wait <= Duration::from_secs(20));
            now = next;
        }
        assert_eq!(haste.cast_count(), 50);
    }

    #[test]
    fn test_fixed_interval_when_bounds_equal() {
        let config = HasteConfig {
            min_interval_seconds: 15.0,
            max_interval_seconds: 15.0,
            ..haste_config(true)
        };
        let mut haste = AutoHaste::with_seed(&config, 0);
        let t0 = Instant::now();
        haste.tick(t0, &mut DryRunDispatcher::new());

        assert_eq!(haste.next_cast(), Some(t0 + Duration::from_secs(15)));
    }

    #[test]
    fn test_failed_press_not_counted_but_rescheduled() {
        let mut haste = AutoHaste::with_seed(&haste_config(true), 5);
        let t0 = Instant::now();

        assert!(!haste.tick(t0, &mut DeadKeyboard));
        assert_eq!(haste.cast_count(), 0);
        assert!(haste.next_cast().is_some());
        assert!(!haste.tick(t0 + Duration::from_secs(1), &mut DeadKeyboard));
    }
}
