use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::events::DecodedEvent;

pub const LOG_HEADER: [&str; 4] = ["Timestamp", "Action_Name", "Interval_ms", "Session_Count"];
const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode row for {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, EventLogError>;

/// Append-only CSV record of every decoded event.
///
/// The file is truncated and given a fresh header when the log is created.
/// Each row is written through its own append handle so a file removed or
/// locked mid-session only costs the rows written while it is unavailable.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Truncate `path` and write the header row.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let event_log = Self { path: path.into() };
        let file = File::create(&event_log.path).map_err(|e| event_log.io_error(e))?;
        event_log.write_record(file, LOG_HEADER)?;
        Ok(event_log)
    }

    /// Like [`EventLog::create`], but a failed reset is only logged; rows
    /// are still attempted afterwards.
    pub fn create_or_warn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::create(&path) {
            Ok(event_log) => event_log,
            Err(e) => {
                log::warn!("Event log not initialised: {}", e);
                Self { path }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row for `event`.
    pub fn append(&self, event: &DecodedEvent) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        self.write_record(file, row(event))
    }

    fn write_record<I, T>(&self, file: File, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(record).map_err(|source| EventLogError::Csv {
            path: self.path.clone(),
            source,
        })?;
        writer.flush().map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> EventLogError {
        EventLogError::Io { path: self.path.clone(), source }
    }
}

/// Column values for `event`, in header order.
pub fn row(event: &DecodedEvent) -> [String; 4] {
    [
        event.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        event.action_label.to_string(),
        event.interval_ms.to_string(),
        event.session_count.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn event(key_id: u64, interval_ms: u64, session_count: u64) -> DecodedEvent {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap();
        DecodedEvent::new(key_id, interval_ms, session_count, at)
    }

    #[test]
    fn test_row_columns() {
        assert_eq!(row(&event(3, 950, 7)), ["14:05:07", "BOTH", "950", "7"]);
        assert_eq!(row(&event(12, 2100, 8)), ["14:05:07", "3-LEFT 2-RIGHT", "2100", "8"]);
    }

    #[test]
    fn test_rows_append_after_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_log.csv");
        let log = EventLog::create(&path).unwrap();
        log.append(&event(12, 2100, 8)).unwrap();
        log.append(&event(99, 400, 9)).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap(), LOG_HEADER.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0], ["14:05:07", "3-LEFT 2-RIGHT", "2100", "8"].as_slice());
        assert_eq!(&rows[1], ["14:05:07", "UNKNOWN", "400", "9"].as_slice());
    }

    #[test]
    fn test_create_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_log.csv");
        std::fs::write(&path, "old,row\nanother,row\n").unwrap();

        let log = EventLog::create(&path).unwrap();
        log.append(&event(1, 800, 1)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["Timestamp,Action_Name,Interval_ms,Session_Count", "14:05:07,LEFT,800,1"]);
    }

    #[test]
    fn test_append_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("session_log.csv");
        assert!(EventLog::create(&path).is_err());

        let log = EventLog::create_or_warn(&path);
        assert!(matches!(log.append(&event(1, 1, 1)), Err(EventLogError::Io { .. })));
    }
}
