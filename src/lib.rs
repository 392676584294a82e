//! Screen-reading vital monitor
//!
//! Reads a health (and optionally mana) number from a screen region with OCR
//! and presses a recovery key when it drops below configured thresholds.

pub mod commands;
pub mod models;
pub mod services;

pub use models::config::AppConfig;
pub use models::reading::{Action, ExtractedValue, HealthPhase, Metric};
pub use models::region::Region;
pub use services::monitor_loop::{MonitorHandle, MonitorLoop, StatusSnapshot, StopReason};
pub use services::ocr::NumberExtractor;
pub use services::threshold_monitor::{MonitorState, ThresholdMonitor};
