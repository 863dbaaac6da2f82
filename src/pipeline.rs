use chrono::{DateTime, Local};

use crate::events::{parse_line, DecodeError, DecodedEvent, HistoryBuffer, PerformanceCategory};
use crate::session_log::EventLog;

/// Result of feeding one line through the pipeline.
#[derive(Debug, Clone)]
pub enum Ingested {
    Event(ProcessedEvent),
    Rejected(DecodeError),
}

#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub event: DecodedEvent,
    pub category: PerformanceCategory,
    /// History after this event was appended
    pub history: HistoryBuffer,
    /// False when the log row could not be written
    pub persisted: bool,
}

/// Decoder, classifier, history and log applied to one line at a time.
pub struct EventPipeline {
    history: HistoryBuffer,
    log: EventLog,
}

impl EventPipeline {
    pub fn new(log: EventLog) -> Self {
        Self {
            history: HistoryBuffer::new(),
            log,
        }
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn ingest(&mut self, line: &str) -> Ingested {
        self.ingest_at(line, Local::now())
    }

    pub fn ingest_at(&mut self, line: &str, at: DateTime<Local>) -> Ingested {
        let event = match parse_line(line, at) {
            Ok(event) => event,
            Err(reason) => {
                log::trace!("Dropped line {:?}: {}", line, reason);
                return Ingested::Rejected(reason);
            }
        };

        let category = event.category();
        self.history.push(event.action_label);

        let persisted = match self.log.append(&event) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        };

        Ingested::Event(ProcessedEvent {
            event,
            category,
            history: self.history.clone(),
            persisted,
        })
    }
}
