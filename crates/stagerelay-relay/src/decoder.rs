//! Incremental line decoding of the upstream event stream
//!
//! Chunks are appended as raw bytes and only complete, `\n`-terminated lines
//! come out. Text decoding happens per complete line, so a multi-byte
//! character split across two chunks is reassembled before it is read.

use bytes::BytesMut;

/// Buffer turning arbitrary chunks into complete lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no `\n`
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one upstream chunk
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line, without its terminator (`\n` or `\r\n`)
    pub fn next_line(&mut self) -> Option<String> {
        let end = match self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => self.scanned + offset,
            None => {
                self.scanned = self.buffer.len();
                return None;
            }
        };
        let line = self.buffer.split_to(end + 1);
        self.scanned = 0;

        let mut content = &line[..end];
        if let Some(stripped) = content.strip_suffix(b"\r") {
            content = stripped;
        }
        Some(String::from_utf8_lossy(content).into_owned())
    }

    /// Bytes of an unterminated line still waiting for the rest
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// One upstream line, by prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireLine<'a> {
    /// Frame separator
    Blank,
    /// `data:` payload
    Data(&'a str),
    /// `event:` name
    Event(&'a str),
    /// Comments, `id:`, `retry:` and anything unrecognized
    Ignored,
}

pub fn parse_line(line: &str) -> WireLine<'_> {
    if line.is_empty() {
        WireLine::Blank
    } else if let Some(value) = line.strip_prefix("data:") {
        WireLine::Data(value.strip_prefix(' ').unwrap_or(value))
    } else if let Some(value) = line.strip_prefix("event:") {
        WireLine::Event(value.trim())
    } else {
        WireLine::Ignored
    }
}
