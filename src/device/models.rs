use serde::Serialize;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Link state machine position
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "port")]
pub enum LinkState {
    /// Trying to open and handshake with this candidate
    Scanning(String),
    /// Handshake succeeded; lines are being read
    Linked(String),
    /// Manager stopped
    Disconnected,
}

impl LinkState {
    pub fn port(&self) -> Option<&str> {
        match self {
            LinkState::Scanning(port) | LinkState::Linked(port) => Some(port),
            LinkState::Disconnected => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, LinkState::Linked(_))
    }

    /// Status line for the dashboard header.
    pub fn status_text(&self) -> String {
        match self {
            LinkState::Scanning(port) => format!("SCANNING: {}", port),
            LinkState::Linked(port) => format!("LINK ESTABLISHED: {}", port),
            LinkState::Disconnected => "DISCONNECTED".to_string(),
        }
    }
}

/// Current link state plus bookkeeping for observers
#[derive(Debug, Clone, Serialize)]
pub struct LinkStatus {
    pub state: LinkState,
    /// Fresh id each time a link is established
    pub link_id: Option<Uuid>,
    pub since: DateTime<Utc>,
}

impl LinkStatus {
    pub fn new(state: LinkState) -> Self {
        let link_id = state.is_linked().then(Uuid::new_v4);
        Self {
            state,
            link_id,
            since: Utc::now(),
        }
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new(LinkState::Disconnected)
    }
}

/// Position in the cyclic candidate list.
///
/// Owned by the link manager and replaced, never mutated in place, so a
/// scan always resumes at the candidate after the last one tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    index: usize,
    len: usize,
}

impl ScanCursor {
    /// `len` must be non-zero; settings validation guarantees it.
    pub fn new(len: usize) -> Self {
        debug_assert!(len > 0);
        Self { index: 0, len: len.max(1) }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(self) -> Self {
        Self {
            index: (self.index + 1) % self.len,
            len: self.len,
        }
    }

    pub fn current<'a>(&self, ports: &'a [String]) -> &'a str {
        &ports[self.index]
    }
}
