pub mod catalog;
pub mod classifier;
pub mod history;
pub mod parser;
pub mod types;

pub use catalog::{action_label, UNKNOWN_ACTION};
pub use classifier::PerformanceCategory;
pub use history::HistoryBuffer;
pub use parser::{decode_line, is_handshake, parse_line, DecodeError, HANDSHAKE_MARKER};
pub use types::DecodedEvent;
