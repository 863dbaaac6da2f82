use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use neurotrack_lib::config::LinkSettings;
use neurotrack_lib::device::{LinkHandle, LinkManager, LinkState};
use neurotrack_lib::serial::{PortOpener, SerialError, SerialTransport};
use neurotrack_lib::telemetry::TelemetrySnapshot;
use tokio::time::{sleep, timeout, Instant};

/// Bytes the simulated device has sent but the host has not read yet.
#[derive(Clone, Default)]
struct Wire {
    inbox: Arc<Mutex<VecDeque<u8>>>,
    broken: Arc<AtomicBool>,
}

impl Wire {
    fn send(&self, line: &str) {
        let mut inbox = self.inbox.lock().unwrap();
        inbox.extend(line.bytes());
        inbox.push_back(b'\n');
    }

    fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

struct WirePort(Wire);

impl SerialTransport for WirePort {
    fn bytes_to_read(&mut self) -> Result<u32, SerialError> {
        if self.0.broken.load(Ordering::SeqCst) {
            return Err(SerialError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device vanished",
            )));
        }
        Ok(self.0.inbox.lock().unwrap().len() as u32)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SerialError> {
        let mut inbox = self.0.inbox.lock().unwrap();
        let n = buffer.len().min(inbox.len());
        for (slot, byte) in buffer.iter_mut().zip(inbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Ports missing from the map fail to open.
#[derive(Default)]
struct FakeBus {
    devices: HashMap<String, Wire>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl FakeBus {
    fn with_device(mut self, port: &str, wire: &Wire) -> Self {
        self.devices.insert(port.to_string(), wire.clone());
        self
    }
}

#[async_trait::async_trait]
impl PortOpener for FakeBus {
    async fn open(&self, port_name: &str, _baud_rate: u32) -> Result<Box<dyn SerialTransport>, SerialError> {
        self.attempts.lock().unwrap().push(port_name.to_string());
        match self.devices.get(port_name) {
            Some(wire) => Ok(Box::new(WirePort(wire.clone()))),
            None => Err(SerialError::PortOpen {
                port: port_name.to_string(),
                reason: "No such device".to_string(),
            }),
        }
    }
}

fn settings(dir: &tempfile::TempDir, ports: &[&str]) -> LinkSettings {
    LinkSettings {
        candidate_ports: ports.iter().map(|p| p.to_string()).collect(),
        log_path: dir.path().join("session_log.csv"),
        ..Default::default()
    }
}

fn start(settings: LinkSettings, bus: FakeBus) -> (LinkHandle, Arc<Mutex<Vec<String>>>) {
    let attempts = bus.attempts.clone();
    let handle = LinkManager::new(settings, Arc::new(bus)).unwrap().spawn();
    (handle, attempts)
}

async fn wait_until(handle: &LinkHandle, pred: impl FnMut(&TelemetrySnapshot) -> bool) -> TelemetrySnapshot {
    let mut rx = handle.snapshot_receiver();
    let snap = timeout(Duration::from_secs(30), rx.wait_for(pred))
        .await
        .expect("condition not reached in time")
        .expect("link task ended");
    snap.clone()
}

fn linked_to(port: &'static str) -> impl FnMut(&TelemetrySnapshot) -> bool {
    move |snap| snap.link.state == LinkState::Linked(port.to_string())
}

#[tokio::test(start_paused = true)]
async fn test_skips_unopenable_port_and_links_next() {
    let dir = tempfile::tempdir().unwrap();
    let p2 = Wire::default();
    p2.send("KEY:0,INT:0,COUNT:0");
    let (handle, attempts) = start(settings(&dir, &["P1", "P2"]), FakeBus::default().with_device("P2", &p2));

    let snap = wait_until(&handle, linked_to("P2")).await;
    assert_eq!(*attempts.lock().unwrap(), vec!["P1", "P2"]);
    assert_eq!(snap.metrics.open_failures, 1);
    assert!(snap.link.link_id.is_some());
    // The handshake line itself is not an event
    assert_eq!(snap.metrics.events_decoded, 0);

    let mut events = handle.subscribe_events();
    p2.send("KEY:3,INT:950,COUNT:7");
    let processed = timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    let event = &processed.event;
    assert_eq!(event.key_id, 3);
    assert_eq!(event.interval_ms, 950);
    assert_eq!(event.session_count, 7);
    assert_eq!(event.action_label, "BOTH");

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_moves_to_next_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let silent = Wire::default();
    let chatty = Wire::default();
    chatty.send("KEY:1,INT:0,COUNT:0");
    let bus = FakeBus::default()
        .with_device("P1", &silent)
        .with_device("P2", &chatty);

    let started = Instant::now();
    let (handle, attempts) = start(settings(&dir, &["P1", "P2"]), bus);

    let snap = wait_until(&handle, linked_to("P2")).await;
    assert!(started.elapsed() >= Duration::from_millis(2500));
    assert_eq!(snap.metrics.handshake_timeouts, 1);
    assert_eq!(*attempts.lock().unwrap(), vec!["P1", "P2"]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_noise_without_marker_is_not_a_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let noisy = Wire::default();
    noisy.send("Therapy_Tracker_ESP32 booting");
    noisy.send("ready");
    let (handle, _attempts) = start(settings(&dir, &["P1"]), FakeBus::default().with_device("P1", &noisy));

    let snap = wait_until(&handle, |s| s.metrics.handshake_timeouts == 1).await;
    assert_eq!(snap.link.state, LinkState::Scanning("P1".to_string()));

    noisy.send("KEY:1,INT:0,COUNT:0");
    wait_until(&handle, linked_to("P1")).await;
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_scan_resumes_after_last_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    let (handle, attempts) = start(settings(&dir, &["P1", "P2", "P3"]), FakeBus::default().with_device("P1", &p1));

    // P1 silent, P2 and P3 absent; let one full cycle pass
    wait_until(&handle, |s| s.metrics.handshake_timeouts == 1 && s.metrics.open_failures == 2).await;
    p1.send("KEY:2,INT:0,COUNT:0");
    wait_until(&handle, linked_to("P1")).await;

    let attempts = attempts.lock().unwrap().clone();
    assert_eq!(&attempts[..4], &["P1", "P2", "P3", "P1"]);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_link_stays_linked() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    let (handle, attempts) = start(settings(&dir, &["P1", "P2"]), FakeBus::default().with_device("P1", &p1));

    wait_until(&handle, linked_to("P1")).await;
    sleep(Duration::from_secs(60)).await;

    let snap = handle.snapshot();
    assert_eq!(snap.link.state, LinkState::Linked("P1".to_string()));
    assert_eq!(*attempts.lock().unwrap(), vec!["P1"]);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_read_errors_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    let (handle, _attempts) = start(settings(&dir, &["P1"]), FakeBus::default().with_device("P1", &p1));
    wait_until(&handle, linked_to("P1")).await;

    p1.set_broken(true);
    sleep(Duration::from_millis(500)).await;
    let snap = handle.snapshot();
    assert!(snap.metrics.read_errors > 0);
    assert!(snap.link.state.is_linked());

    p1.set_broken(false);
    p1.send("KEY:37,INT:2100,COUNT:3");
    let snap = wait_until(&handle, |s| s.metrics.events_decoded == 1).await;
    assert_eq!(snap.history, vec!["DOUBLE RIGHT"]);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_lines_after_handshake_in_same_read_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    p1.send("KEY:2,INT:1500,COUNT:1");
    let (handle, _attempts) = start(settings(&dir, &["P1"]), FakeBus::default().with_device("P1", &p1));

    let snap = wait_until(&handle, |s| s.metrics.events_decoded == 1).await;
    assert_eq!(snap.history, vec!["RIGHT"]);
    assert_eq!(snap.session_count, Some(1));
    assert_eq!(snap.interval_ms, Some(1500));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_observability_surface_tracks_latest_event() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    let (handle, _attempts) = start(settings(&dir, &["P1"]), FakeBus::default().with_device("P1", &p1));
    wait_until(&handle, linked_to("P1")).await;

    for (i, key) in [1, 2, 3, 4, 5, 6].iter().enumerate() {
        p1.send(&format!("KEY:{},INT:{},COUNT:{}", key, 900 + i * 250, i + 1));
    }
    p1.send("garbage");

    let snap = wait_until(&handle, |s| s.metrics.events_decoded == 6 && s.metrics.lines_rejected == 1).await;
    assert_eq!(
        snap.history,
        vec!["RIGHT", "BOTH", "LEFT RIGHT RIGHT", "RIGHT LEFT LEFT", "DOUBLE DUO"]
    );
    assert_eq!(snap.session_count, Some(6));
    assert_eq!(snap.interval_ms, Some(2150));
    assert_eq!(snap.category.map(|c| c.as_str()), Some("SLOW"));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_events_carry_history_at_their_position() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    let (handle, _attempts) = start(settings(&dir, &["P1"]), FakeBus::default().with_device("P1", &p1));
    wait_until(&handle, linked_to("P1")).await;

    let mut events = handle.subscribe_events();
    // All three land in a single poll
    p1.send("KEY:1,INT:500,COUNT:1");
    p1.send("KEY:2,INT:500,COUNT:2");
    p1.send("KEY:3,INT:500,COUNT:3");

    let mut histories = Vec::new();
    for _ in 0..3 {
        let processed = timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        histories.push(processed.history.joined());
    }
    assert_eq!(histories, vec!["LEFT", "LEFT | RIGHT", "LEFT | RIGHT | BOTH"]);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_rescans_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    let p2 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    p2.send("KEY:1,INT:0,COUNT:0");
    let settings = LinkSettings {
        idle_timeout_ms: Some(3000),
        ..settings(&dir, &["P1", "P2"])
    };
    let bus = FakeBus::default().with_device("P1", &p1).with_device("P2", &p2);
    let (handle, attempts) = start(settings, bus);

    wait_until(&handle, linked_to("P1")).await;
    let snap = wait_until(&handle, linked_to("P2")).await;
    assert_eq!(snap.metrics.idle_timeouts, 1);
    assert_eq!(*attempts.lock().unwrap(), vec!["P1", "P2"]);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_linked() {
    let dir = tempfile::tempdir().unwrap();
    let p1 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    let (handle, _attempts) = start(settings(&dir, &["P1"]), FakeBus::default().with_device("P1", &p1));
    wait_until(&handle, linked_to("P1")).await;

    let rx = handle.snapshot_receiver();
    handle.shutdown().await;
    assert_eq!(rx.borrow().link.state, LinkState::Disconnected);
    assert_eq!(rx.borrow().link.state.port(), None);
}

#[tokio::test(start_paused = true)]
async fn test_log_has_header_and_one_row_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir, &["P1"]);
    let log_path = settings.log_path.clone();
    std::fs::write(&log_path, "left over from a previous run\n").unwrap();

    let p1 = Wire::default();
    p1.send("KEY:1,INT:0,COUNT:0");
    let (handle, _attempts) = start(settings, FakeBus::default().with_device("P1", &p1));
    wait_until(&handle, linked_to("P1")).await;

    let sent = [(16, 1250, 10), (99, 800, 11), (25, 3000, 12)];
    for (key, interval, count) in sent {
        p1.send(&format!("KEY:{},INT:{},COUNT:{}", key, interval, count));
    }
    wait_until(&handle, |s| s.metrics.events_decoded == 3).await;
    handle.shutdown().await;

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), sent.len() + 1);
    assert_eq!(lines[0], "Timestamp,Action_Name,Interval_ms,Session_Count");

    let labels = ["TRIPLE LEFT", "UNKNOWN", "L-R-L-R"];
    for ((row, (_, interval, count)), label) in lines[1..].iter().zip(sent).zip(labels) {
        let cols: Vec<&str> = row.split(',').collect();
        assert_eq!(cols.len(), 4);
        assert_eq!(cols[0].len(), "HH:MM:SS".len());
        assert_eq!(cols[1], label);
        assert_eq!(cols[2], interval.to_string());
        assert_eq!(cols[3], count.to_string());
    }
}
