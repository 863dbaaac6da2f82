//! Observability surface for the presentation layer.
//!
//! The link task is the only writer. Observers either poll the latest
//! [`TelemetrySnapshot`] through a `watch` receiver or subscribe to the
//! ordered stream of [`ProcessedEvent`]s, each carrying the history as it
//! stood right after that event.
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::device::{LinkState, LinkStatus};
use crate::events::{DecodedEvent, PerformanceCategory};
use crate::pipeline::{Ingested, ProcessedEvent};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct LinkMetrics {
    pub lines_read: u64,
    pub events_decoded: u64,
    pub lines_rejected: u64,
    pub read_errors: u64,
    pub open_failures: u64,
    pub handshake_timeouts: u64,
    pub idle_timeouts: u64,
    pub log_write_failures: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TelemetrySnapshot {
    pub link: LinkStatus,
    pub session_count: Option<u64>,
    pub interval_ms: Option<u64>,
    /// Most recent action labels, oldest first
    pub history: Vec<String>,
    pub category: Option<PerformanceCategory>,
    pub last_event: Option<DecodedEvent>,
    pub metrics: LinkMetrics,
}

/// Failure classes the link loop reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    OpenFailed,
    HandshakeTimeout,
    IdleTimeout,
    ReadError,
}

/// Write side of the telemetry channels, owned by the link task.
pub struct TelemetryPublisher {
    snapshot_tx: watch::Sender<TelemetrySnapshot>,
    events_tx: broadcast::Sender<ProcessedEvent>,
}

impl TelemetryPublisher {
    pub fn new() -> (Self, watch::Receiver<TelemetrySnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(TelemetrySnapshot::default());
        let (events_tx, _events_rx) = broadcast::channel(EVENT_CAPACITY);
        (Self { snapshot_tx, events_tx }, snapshot_rx)
    }

    pub fn events_sender(&self) -> broadcast::Sender<ProcessedEvent> {
        self.events_tx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ProcessedEvent> {
        self.events_tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn set_link(&self, state: LinkState) {
        log::info!("{}", state.status_text());
        self.snapshot_tx.send_modify(|snap| snap.link = LinkStatus::new(state));
    }

    pub fn record_fault(&self, fault: LinkFault) {
        self.snapshot_tx.send_modify(|snap| {
            let metrics = &mut snap.metrics;
            match fault {
                LinkFault::OpenFailed => metrics.open_failures += 1,
                LinkFault::HandshakeTimeout => metrics.handshake_timeouts += 1,
                LinkFault::IdleTimeout => metrics.idle_timeouts += 1,
                LinkFault::ReadError => metrics.read_errors += 1,
            }
        });
    }

    /// Publish the outcome of one line read while linked.
    pub fn record_line(&self, ingested: Ingested) {
        match ingested {
            Ingested::Rejected(_) => self.snapshot_tx.send_modify(|snap| {
                snap.metrics.lines_read += 1;
                snap.metrics.lines_rejected += 1;
            }),
            Ingested::Event(processed) => self.record_event(processed),
        }
    }

    fn record_event(&self, processed: ProcessedEvent) {
        self.snapshot_tx.send_modify(|snap| {
            snap.metrics.lines_read += 1;
            snap.metrics.events_decoded += 1;
            if !processed.persisted {
                snap.metrics.log_write_failures += 1;
            }
            snap.session_count = Some(processed.event.session_count);
            snap.interval_ms = Some(processed.event.interval_ms);
            snap.history = processed.history.to_vec();
            snap.category = Some(processed.category);
            snap.last_event = Some(processed.event.clone());
        });
        // No subscribers is fine
        let _ = self.events_tx.send(processed);
    }
}
