use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::reading::{Action, Metric};
use crate::models::keys::KeyName;

/// Per-metric thresholds and key bindings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricConfig {
    pub enabled: bool,
    pub max_value: u32,
    /// Fraction of max below which the critical key fires (0.0 disables)
    pub critical_fraction: f64,
    /// Fraction of max below which the moderate key fires
    pub moderate_fraction: f64,
    pub critical_key: String,
    pub moderate_key: String,
}

impl MetricConfig {
    pub fn hp_default() -> Self {
        Self {
            enabled: true,
            max_value: 1067,
            critical_fraction: 0.55,
            moderate_fraction: 0.75,
            critical_key: "f2".to_string(),
            moderate_key: "f1".to_string(),
        }
    }

    /// Mana only has one restore key, so the critical band is disabled
    pub fn mana_default() -> Self {
        Self {
            enabled: false,
            max_value: 1224,
            critical_fraction: 0.0,
            moderate_fraction: 0.75,
            critical_key: "f4".to_string(),
            moderate_key: "f4".to_string(),
        }
    }

    /// Key bound to an action kind
    pub fn key_for(&self, action: Action) -> &str {
        match action {
            Action::Critical => &self.critical_key,
            Action::Moderate => &self.moderate_key,
        }
    }

    pub fn validate(&self, metric: Metric) -> Result<(), String> {
        if self.max_value == 0 {
            return Err(format!("{}: max value must be greater than 0", metric));
        }

        for (name, fraction) in [
            ("critical", self.critical_fraction),
            ("moderate", self.moderate_fraction),
        ] {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(format!(
                    "{}: {} fraction {} out of range (0.0-1.0)",
                    metric, name, fraction
                ));
            }
        }

        if self.critical_fraction > self.moderate_fraction {
            return Err(format!(
                "{}: critical fraction {} must not exceed moderate fraction {}",
                metric, self.critical_fraction, self.moderate_fraction
            ));
        }

        for key in [&self.critical_key, &self.moderate_key] {
            if !KeyName::is_supported(key) {
                return Err(format!("{}: unsupported key '{}'", metric, key));
            }
        }

        Ok(())
    }
}

/// A metric section as written in the file; absent fields keep the metric's defaults
#[derive(Deserialize, Default)]
#[serde(default)]
struct MetricOverrides {
    enabled: Option<bool>,
    max_value: Option<u32>,
    critical_fraction: Option<f64>,
    moderate_fraction: Option<f64>,
    critical_key: Option<String>,
    moderate_key: Option<String>,
}

impl MetricOverrides {
    fn apply(self, base: MetricConfig) -> MetricConfig {
        MetricConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            max_value: self.max_value.unwrap_or(base.max_value),
            critical_fraction: self.critical_fraction.unwrap_or(base.critical_fraction),
            moderate_fraction: self.moderate_fraction.unwrap_or(base.moderate_fraction),
            critical_key: self.critical_key.unwrap_or(base.critical_key),
            moderate_key: self.moderate_key.unwrap_or(base.moderate_key),
        }
    }
}

fn deserialize_hp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MetricConfig, D::Error> {
    Ok(MetricOverrides::deserialize(deserializer)?.apply(MetricConfig::hp_default()))
}

fn deserialize_mana<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MetricConfig, D::Error> {
    Ok(MetricOverrides::deserialize(deserializer)?.apply(MetricConfig::mana_default()))
}

fn default_hp() -> MetricConfig {
    MetricConfig::hp_default()
}

fn default_mana() -> MetricConfig {
    MetricConfig::mana_default()
}

/// Loop timing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum time between two presses of the same action kind
    pub cooldown_seconds: f64,
    pub poll_interval_ms: u64,
    /// Faster interval used while HP sits in the critical band
    pub emergency_interval_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 0.2,
            poll_interval_ms: 50,
            emergency_interval_ms: Some(10),
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn emergency_interval(&self) -> Option<Duration> {
        self.emergency_interval_ms.map(Duration::from_millis)
    }
}

/// OCR-noise filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StabilityConfig {
    /// Single-sample drop (fraction of max) treated as a suspected misread
    pub dramatic_drop_fraction: f64,
    /// Absolute distance within which a second low reading confirms the first
    pub confirmation_tolerance: u32,
    /// Consecutive failed readings before a warning is raised
    pub max_failures_warning: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            dramatic_drop_fraction: 0.4,
            confirmation_tolerance: 50,
            max_failures_warning: 5,
        }
    }
}

/// OCR backend choice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    #[default]
    Http,
    Tesseract,
}

/// OCR configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    pub backend: OcrBackend,
    pub server_url: String,
    pub language: String,
    pub timeout_ms: u64,
    /// Readings below this are treated as OCR noise by the primary pass
    pub lower_bound: u32,
    /// Program and arguments that start the OCR server when it is not running
    pub server_command: Vec<String>,
    /// How long a launched server gets to answer its health check
    pub server_startup_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Http,
            server_url: "http://127.0.0.1:39836".to_string(),
            language: "eng".to_string(),
            timeout_ms: 2000,
            lower_bound: 100,
            server_command: Vec::new(),
            server_startup_ms: 30_000,
        }
    }
}

/// Screen capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CaptureConfig {
    /// Monitor to capture from; primary monitor when absent
    pub monitor_index: Option<usize>,
}

/// Diagnostic output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub log_file: Option<PathBuf>,
    pub json: bool,
}

/// Periodic buff key, pressed at a random interval while switched on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HasteConfig {
    /// Switched on when monitoring starts
    pub enabled: bool,
    pub key: String,
    pub min_interval_seconds: f64,
    pub max_interval_seconds: f64,
}

impl Default for HasteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key: "f5".to_string(),
            min_interval_seconds: 110.0,
            max_interval_seconds: 125.0,
        }
    }
}

impl HasteConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !KeyName::is_supported(&self.key) {
            return Err(format!("Haste: unsupported key '{}'", self.key));
        }

        let (min, max) = (self.min_interval_seconds, self.max_interval_seconds);
        if !min.is_finite() || !max.is_finite() || min <= 0.0 {
            return Err(format!("Haste: intervals must be positive seconds, got {}-{}", min, max));
        }
        if min > max {
            return Err(format!("Haste: minimum interval {} exceeds maximum {}", min, max));
        }
        Ok(())
    }
}

fn default_regions_file() -> PathBuf {
    PathBuf::from("regions.txt")
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_hp", deserialize_with = "deserialize_hp")]
    pub hp: MetricConfig,
    #[serde(default = "default_mana", deserialize_with = "deserialize_mana")]
    pub mana: MetricConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default = "default_regions_file")]
    pub regions_file: PathBuf,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub haste: HasteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hp: MetricConfig::hp_default(),
            mana: MetricConfig::mana_default(),
            timing: TimingConfig::default(),
            stability: StabilityConfig::default(),
            ocr: OcrConfig::default(),
            capture: CaptureConfig::default(),
            regions_file: default_regions_file(),
            debug: DebugConfig::default(),
            haste: HasteConfig::default(),
        }
    }
}

/// Read-only view of everything the decision engine needs for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    pub max_value: u32,
    pub critical_fraction: f64,
    pub moderate_fraction: f64,
    pub cooldown: Duration,
    pub dramatic_drop_fraction: f64,
    pub confirmation_tolerance: u32,
    pub max_failures_warning: u32,
}

impl AppConfig {
    pub fn metric(&self, metric: Metric) -> &MetricConfig {
        match metric {
            Metric::Hp => &self.hp,
            Metric::Mana => &self.mana,
        }
    }

    pub fn thresholds(&self, metric: Metric) -> ThresholdConfig {
        let m = self.metric(metric);
        ThresholdConfig {
            max_value: m.max_value,
            critical_fraction: m.critical_fraction,
            moderate_fraction: m.moderate_fraction,
            cooldown: Duration::try_from_secs_f64(self.timing.cooldown_seconds).unwrap_or_default(),
            dramatic_drop_fraction: self.stability.dramatic_drop_fraction,
            confirmation_tolerance: self.stability.confirmation_tolerance,
            max_failures_warning: self.stability.max_failures_warning,
        }
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), String> {
        for metric in Metric::ALL {
            let m = self.metric(metric);
            if m.enabled {
                m.validate(metric)?;
            }
        }

        if !self.timing.cooldown_seconds.is_finite() || self.timing.cooldown_seconds < 0.0 {
            return Err(format!(
                "Cooldown {} must be a non-negative number of seconds",
                self.timing.cooldown_seconds
            ));
        }

        if self.timing.poll_interval_ms == 0 {
            return Err("Poll interval must be greater than 0 ms".to_string());
        }

        if !(0.0..=1.0).contains(&self.stability.dramatic_drop_fraction) {
            return Err(format!(
                "Dramatic drop fraction {} out of range (0.0-1.0)",
                self.stability.dramatic_drop_fraction
            ));
        }

        self.haste.validate()?;

        Ok(())
    }
}
