use chrono::{DateTime, Local};

use super::types::DecodedEvent;

/// Substring that marks a line as coming from the tracker.
pub const HANDSHAKE_MARKER: &str = "KEY:";

const KEY_PREFIX: &str = "KEY:";
const INTERVAL_PREFIXES: [&str; 2] = ["INT:", "INTERVAL:"];
const COUNT_PREFIX: &str = "COUNT:";
const FIELD_COUNT: usize = 3;

/// Why a line did not decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("line does not start with KEY:")]
    MissingMarker,

    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),

    #[error("field {index} lacks prefix {expected}")]
    FieldPrefix { index: usize, expected: &'static str },

    #[error("field {index} is not an unsigned integer: {value:?}")]
    InvalidNumber { index: usize, value: String },
}

/// Whether `line` carries the handshake marker anywhere.
pub fn is_handshake(line: &str) -> bool {
    line.contains(HANDSHAKE_MARKER)
}

/// Parse a metrics line
/// Format: KEY:[id],INT:[ms],COUNT:[n]
///
/// The firmware's USB console writes `INTERVAL:` and pads fields with a
/// space after the comma; both are accepted.
pub fn parse_line(line: &str, at: DateTime<Local>) -> Result<DecodedEvent, DecodeError> {
    let line = line.trim();
    if !line.starts_with(KEY_PREFIX) {
        return Err(DecodeError::MissingMarker);
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() != FIELD_COUNT {
        return Err(DecodeError::FieldCount(parts.len()));
    }

    let key_str = parts[0]
        .strip_prefix(KEY_PREFIX)
        .ok_or(DecodeError::FieldPrefix { index: 0, expected: KEY_PREFIX })?;
    let interval_str = INTERVAL_PREFIXES
        .iter()
        .find_map(|prefix| parts[1].strip_prefix(*prefix))
        .ok_or(DecodeError::FieldPrefix { index: 1, expected: INTERVAL_PREFIXES[0] })?;
    let count_str = parts[2]
        .strip_prefix(COUNT_PREFIX)
        .ok_or(DecodeError::FieldPrefix { index: 2, expected: COUNT_PREFIX })?;

    let key_id = parse_key_id(key_str)?;
    let interval_ms = parse_unsigned::<u64>(1, interval_str)?;
    let session_count = parse_unsigned::<u64>(2, count_str)?;

    Ok(DecodedEvent::new(key_id, interval_ms, session_count, at))
}

/// Decode a line, dropping anything malformed.
pub fn decode_line(line: &str, at: DateTime<Local>) -> Option<DecodedEvent> {
    parse_line(line, at).ok()
}

/// Key ids are not range checked. A digit string too long for `u64` still
/// decodes and lands outside the catalog.
fn parse_key_id(value: &str) -> Result<u64, DecodeError> {
    match parse_unsigned::<u64>(0, value) {
        Err(DecodeError::InvalidNumber { .. }) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
            Ok(u64::MAX)
        }
        other => other,
    }
}

fn parse_unsigned<T: std::str::FromStr>(index: usize, value: &str) -> Result<T, DecodeError> {
    // `u64::from_str` tolerates a leading '+', the wire format does not
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidNumber { index, value: value.to_string() });
    }
    value
        .parse::<T>()
        .map_err(|_| DecodeError::InvalidNumber { index, value: value.to_string() })
}
