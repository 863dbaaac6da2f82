pub mod config;
pub mod device;
pub mod events;
pub mod pipeline;
pub mod serial;
pub mod session_log;
pub mod telemetry;

pub use config::LinkSettings;
pub use device::{LinkHandle, LinkManager, LinkState};
pub use events::{DecodedEvent, PerformanceCategory};
pub use pipeline::ProcessedEvent;
pub use telemetry::TelemetrySnapshot;
