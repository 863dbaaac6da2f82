/// Upper bound on buffered bytes without a line terminator.
const MAX_PARTIAL_BYTES: usize = 8192;
/// Bytes kept from the tail when the bound is exceeded.
const TRIMMED_PARTIAL_BYTES: usize = 4096;

/// Assembles newline-terminated lines out of arbitrary byte chunks.
///
/// Both `\n` and `\r` terminate a line, so `\r\n` endings never leave a
/// stray carriage return behind. Empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed, oldest first.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.partial.is_empty() {
                    let line = String::from_utf8_lossy(&self.partial).into_owned();
                    self.partial.clear();
                    lines.push(line);
                }
            } else {
                self.partial.push(byte);
            }
        }

        if self.partial.len() > MAX_PARTIAL_BYTES {
            let keep_from = self.partial.len() - TRIMMED_PARTIAL_BYTES;
            self.partial.drain(..keep_from);
            log::warn!("Dropped {} bytes of an unterminated line", keep_from);
        }
        lines
    }

    /// Drop any unterminated bytes.
    pub fn clear(&mut self) {
        self.partial.clear();
    }

    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }
}
