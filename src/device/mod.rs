pub mod manager;
pub mod models;

pub use manager::{LinkHandle, LinkManager};
pub use models::*;

use std::time::Duration;

/// Recoverable failures inside the link loop. None of these escape the
/// manager; they are logged and counted in the telemetry metrics.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Port open failed: {0}")]
    PortOpenFailure(#[source] crate::serial::SerialError),

    #[error("No handshake on {port} within {timeout:?}")]
    HandshakeTimeout { port: String, timeout: Duration },

    #[error("No data on {port} for {timeout:?}")]
    IdleTimeout { port: String, timeout: Duration },

    #[error("Read failed: {0}")]
    TransientReadFailure(#[source] crate::serial::SerialError),
}

pub type Result<T> = std::result::Result<T, LinkError>;
