//! Newline framing for the legacy TCP stream.

use tracing::warn;

use crate::constants::legacy::LINE_TERMINATOR;

/// Reassembles newline-terminated lines from arbitrary read chunks
///
/// A chunk boundary may fall anywhere, including inside a multi-byte UTF-8
/// sequence, so bytes are buffered until a terminator arrives. Lines longer
/// than `max_line_bytes` are flushed as-is.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes: max_line_bytes.max(1),
        }
    }

    /// Feed a chunk, returning every line it completes
    ///
    /// A trailing `\r` is stripped, invalid UTF-8 is replaced, and empty
    /// lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == LINE_TERMINATOR) {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            collect_line(&mut lines, &line);
        }

        if self.pending.len() > self.max_line_bytes {
            warn!(
                buffered_bytes = self.pending.len(),
                max_line_bytes = self.max_line_bytes,
                "⚠️ Legacy line exceeded maximum length, flushing without terminator"
            );
            let line = std::mem::take(&mut self.pending);
            collect_line(&mut lines, &line);
        }

        lines
    }

    /// Bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop any partial line, returning how many bytes were discarded
    pub fn discard_partial(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}

fn collect_line(lines: &mut Vec<String>, bytes: &[u8]) {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    if bytes.is_empty() {
        return;
    }
    lines.push(String::from_utf8_lossy(bytes).into_owned());
}
