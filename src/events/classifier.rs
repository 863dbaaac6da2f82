use serde::{Deserialize, Serialize};

/// Intervals below this are rapid responses.
pub const RAPID_BELOW_MS: u64 = 1100;
/// Intervals at or above this are slow.
pub const SLOW_FROM_MS: u64 = 2000;

/// Response pace derived from the interval between inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceCategory {
    Rapid,
    Normal,
    Slow,
}

impl PerformanceCategory {
    pub fn from_interval(interval_ms: u64) -> Self {
        if interval_ms < RAPID_BELOW_MS {
            PerformanceCategory::Rapid
        } else if interval_ms < SLOW_FROM_MS {
            PerformanceCategory::Normal
        } else {
            PerformanceCategory::Slow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceCategory::Rapid => "RAPID",
            PerformanceCategory::Normal => "NORMAL",
            PerformanceCategory::Slow => "SLOW",
        }
    }

    /// Feedback line shown on the dashboard.
    pub fn feedback(&self) -> &'static str {
        match self {
            PerformanceCategory::Rapid => "RAPID RESPONSE",
            PerformanceCategory::Normal => "NORMAL PACE",
            PerformanceCategory::Slow => "SLOW / DELAY",
        }
    }
}

impl std::fmt::Display for PerformanceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
