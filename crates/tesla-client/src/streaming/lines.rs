//! Newline framing for the telemetry body

use super::types::{StreamError, StreamResult};

/// Default upper bound for a single buffered line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Splits an incoming byte stream into lines
///
/// Bytes are buffered until a `\n` arrives. A trailing `\r` is stripped. A line
/// that grows past `max_len` is dropped up to its next newline and reported once
/// as [`StreamError::LineTooLong`].
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    max_len: usize,
    /// Inside an oversized line, waiting for its newline
    discarding: bool,
}

impl LineBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Feed a chunk and collect every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamResult<String>> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let head = &rest[..pos];
            rest = &rest[pos + 1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }

            if self.buffer.len() + head.len() > self.max_len {
                self.buffer.clear();
                lines.push(Err(self.too_long()));
                continue;
            }

            self.buffer.extend_from_slice(head);
            lines.push(Ok(self.take_line()));
        }

        if !self.discarding && !rest.is_empty() {
            self.buffer.extend_from_slice(rest);
            if self.buffer.len() > self.max_len {
                self.buffer.clear();
                self.discarding = true;
                lines.push(Err(self.too_long()));
            }
        }

        lines
    }

    /// Flush an unterminated final line at end of input
    pub fn finish(&mut self) -> Option<String> {
        if self.discarding || self.buffer.is_empty() {
            self.discarding = false;
            self.buffer.clear();
            return None;
        }
        Some(self.take_line())
    }

    fn take_line(&mut self) -> String {
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        match String::from_utf8(line) {
            Ok(line) => line,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    fn too_long(&self) -> StreamError {
        StreamError::LineTooLong {
            limit: self.max_len,
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}
