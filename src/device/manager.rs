use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout_at, Instant, Interval, MissedTickBehavior};

use crate::config::{ConfigError, LinkSettings};
use crate::events::is_handshake;
use crate::pipeline::{EventPipeline, ProcessedEvent};
use crate::serial::{PortOpener, SerialInterface};
use crate::session_log::EventLog;
use crate::telemetry::{LinkFault, TelemetryPublisher, TelemetrySnapshot};
use super::{LinkError, LinkState, Result, ScanCursor};

/// Owns the serial link: scans the candidate ports, waits for the
/// handshake, then polls the linked port and feeds every line through the
/// event pipeline.
///
/// Runs as a single task. Port handles are always closed before the next
/// candidate is opened.
pub struct LinkManager {
    settings: LinkSettings,
    opener: Arc<dyn PortOpener>,
    cursor: ScanCursor,
    pipeline: EventPipeline,
    telemetry: TelemetryPublisher,
    snapshot_rx: watch::Receiver<TelemetrySnapshot>,
}

/// Handle to a running [`LinkManager`] task
pub struct LinkHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    snapshot_rx: watch::Receiver<TelemetrySnapshot>,
    events_tx: broadcast::Sender<ProcessedEvent>,
}

impl LinkHandle {
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn snapshot_receiver(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ProcessedEvent> {
        self.events_tx.subscribe()
    }

    /// Stop the task, closing any open port. The final state is `Disconnected`.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(e) = self.task.await {
            log::error!("Link task ended abnormally: {}", e);
        }
    }
}

impl LinkManager {
    /// Validate `settings` and reset the event log.
    pub fn new(settings: LinkSettings, opener: Arc<dyn PortOpener>) -> std::result::Result<Self, ConfigError> {
        settings.validate()?;
        let pipeline = EventPipeline::new(EventLog::create_or_warn(settings.log_path.clone()));
        let (telemetry, snapshot_rx) = TelemetryPublisher::new();
        Ok(Self {
            cursor: ScanCursor::new(settings.candidate_ports.len()),
            settings,
            opener,
            pipeline,
            telemetry,
            snapshot_rx,
        })
    }

    /// Start the link loop on the current tokio runtime.
    pub fn spawn(self) -> LinkHandle {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let snapshot_rx = self.snapshot_rx.clone();
        let events_tx = self.telemetry.events_sender();
        let task = tokio::spawn(self.run(stop_rx));
        LinkHandle { stop_tx, task, snapshot_rx, events_tx }
    }

    /// Scan, link and read until a stop signal arrives or the sender drops.
    pub async fn run(mut self, mut stop_rx: mpsc::Receiver<()>) {
        loop {
            let port = self.cursor.current(&self.settings.candidate_ports).to_string();
            self.telemetry.set_link(LinkState::Scanning(port.clone()));

            let attempt = tokio::select! {
                _ = stop_rx.recv() => break,
                attempt = self.connect(&port) => attempt,
            };

            match attempt {
                Ok((mut iface, pending)) => {
                    self.telemetry.set_link(LinkState::Linked(port.clone()));
                    let stopped = tokio::select! {
                        _ = stop_rx.recv() => true,
                        lost = self.read_loop(&mut iface, pending) => {
                            self.report(&lost);
                            false
                        }
                    };
                    iface.close();
                    if stopped {
                        break;
                    }
                }
                Err(e) => self.report(&e),
            }

            self.cursor = self.cursor.advance();
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = sleep(self.settings.backoff()) => {}
            }
        }

        self.telemetry.set_link(LinkState::Disconnected);
    }

    /// Open `port` and wait for the handshake marker.
    ///
    /// On success returns the interface together with any complete lines
    /// that arrived after the handshake line in the same read.
    async fn connect(&self, port: &str) -> Result<(SerialInterface, Vec<String>)> {
        let mut iface = SerialInterface::open(self.opener.as_ref(), port, self.settings.baud_rate)
            .await
            .map_err(LinkError::PortOpenFailure)?;

        match self.await_handshake(&mut iface).await {
            Ok(pending) => Ok((iface, pending)),
            Err(e) => {
                iface.close();
                Err(e)
            }
        }
    }

    async fn await_handshake(&self, iface: &mut SerialInterface) -> Result<Vec<String>> {
        let window = self.settings.handshake_timeout();
        let deadline = Instant::now() + window;
        let mut tick = self.poll_timer();

        let outcome = timeout_at(deadline, async {
            loop {
                tick.tick().await;
                let lines = iface.poll_lines().map_err(LinkError::TransientReadFailure)?;
                if let Some(pos) = lines.iter().position(|line| is_handshake(line)) {
                    log::debug!("Handshake on {}: {:?}", iface.port_name(), lines[pos]);
                    return Ok::<Vec<String>, LinkError>(lines.into_iter().skip(pos + 1).collect());
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_elapsed) => {
                iface.discard_partial();
                Err(LinkError::HandshakeTimeout {
                    port: iface.port_name().to_string(),
                    timeout: window,
                })
            }
        }
    }

    /// Poll the linked port. Only returns when the idle timeout is enabled
    /// and has elapsed; otherwise runs until cancelled.
    async fn read_loop(&mut self, iface: &mut SerialInterface, pending: Vec<String>) -> LinkError {
        for line in pending {
            self.deliver(&line);
        }

        let idle_limit = self.settings.idle_timeout();
        let mut last_line = Instant::now();
        let mut tick = self.poll_timer();

        loop {
            tick.tick().await;
            match iface.poll_lines() {
                Ok(lines) => {
                    if !lines.is_empty() {
                        last_line = Instant::now();
                    }
                    for line in lines {
                        self.deliver(&line);
                    }
                }
                Err(e) => {
                    log::debug!("{}", LinkError::TransientReadFailure(e));
                    self.telemetry.record_fault(LinkFault::ReadError);
                }
            }

            if let Some(limit) = idle_limit {
                if last_line.elapsed() >= limit {
                    return LinkError::IdleTimeout {
                        port: iface.port_name().to_string(),
                        timeout: limit,
                    };
                }
            }
        }
    }

    fn deliver(&mut self, line: &str) {
        let ingested = self.pipeline.ingest(line);
        self.telemetry.record_line(ingested);
    }

    fn poll_timer(&self) -> Interval {
        let mut tick = interval(self.settings.poll_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick
    }

    fn report(&self, error: &LinkError) {
        log::warn!("{}", error);
        let fault = match error {
            LinkError::PortOpenFailure(_) => LinkFault::OpenFailed,
            LinkError::HandshakeTimeout { .. } => LinkFault::HandshakeTimeout,
            LinkError::IdleTimeout { .. } => LinkFault::IdleTimeout,
            LinkError::TransientReadFailure(_) => LinkFault::ReadError,
        };
        self.telemetry.record_fault(fault);
    }
}
