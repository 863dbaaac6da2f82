use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BAUD_RATE: u32 = 115200;
pub const DEFAULT_LOG_FILE: &str = "session_log.csv";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("At least one candidate port is required")]
    NoCandidatePorts,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Baud rate must be greater than zero")]
    ZeroBaudRate,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Static link settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkSettings {
    /// Ports tried in order, wrapping around
    pub candidate_ports: Vec<String>,
    pub baud_rate: u32,
    /// Pause between failed attempts
    pub backoff_ms: u64,
    /// Hard deadline for seeing the handshake marker after opening
    pub handshake_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Drop a linked port that has been silent this long. Off when unset.
    pub idle_timeout_ms: Option<u64>,
    pub log_path: PathBuf,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            candidate_ports: default_ports(),
            baud_rate: DEFAULT_BAUD_RATE,
            backoff_ms: 500,
            handshake_timeout_ms: 2000,
            poll_interval_ms: 50,
            idle_timeout_ms: None,
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

#[cfg(windows)]
fn default_ports() -> Vec<String> {
    vec!["COM16".to_string(), "COM17".to_string()]
}

#[cfg(not(windows))]
fn default_ports() -> Vec<String> {
    vec!["/dev/rfcomm0".to_string(), "/dev/rfcomm1".to_string()]
}

impl LinkSettings {
    /// Load settings from a JSON file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidate_ports.is_empty() {
            return Err(ConfigError::NoCandidatePorts);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("handshake_timeout_ms"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("poll_interval_ms"));
        }
        if self.idle_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroDuration("idle_timeout_ms"));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}
