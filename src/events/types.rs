use chrono::{DateTime, Local};
use serde::Serialize;

use super::catalog::action_label;
use super::classifier::PerformanceCategory;

/// One key pattern reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedEvent {
    /// Firmware pattern id; ids outside the catalog are kept as-is
    pub key_id: u64,
    /// Milliseconds between this pattern and the previous one
    pub interval_ms: u64,
    /// Running counter supplied by the device, passed through untouched
    pub session_count: u64,
    pub action_label: &'static str,
    /// Wall-clock time the line was decoded
    pub timestamp: DateTime<Local>,
}

impl DecodedEvent {
    pub fn new(key_id: u64, interval_ms: u64, session_count: u64, timestamp: DateTime<Local>) -> Self {
        Self {
            key_id,
            interval_ms,
            session_count,
            action_label: action_label(key_id),
            timestamp,
        }
    }

    pub fn category(&self) -> PerformanceCategory {
        PerformanceCategory::from_interval(self.interval_ms)
    }
}
