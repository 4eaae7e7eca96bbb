//! Stream frame decoding.
//!
//! Workers answer a streaming call with newline-delimited JSON frames:
//!
//! ```text
//! {"type":"data","payload":"<base64>"}
//! {"type":"end"}
//! {"type":"error","message":"..."}
//! ```

use base64::Engine;
use serde::Deserialize;

use crate::pool::StreamEvent;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireFrame {
    Data { payload: String },
    End,
    Error { message: String },
}

/// Longest frame line accepted from a worker.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Incremental splitter turning raw body chunks into stream events.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a newline.
    scanned: usize,
    max_frame: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame(MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_frame,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete frame, if a full line is buffered.
    ///
    /// A line longer than the frame limit discards the buffer and yields an
    /// error event, which ends the stream.
    pub fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buf.len();
                return self.check_pending();
            };
            let newline = self.scanned + offset;
            self.scanned = 0;
            if newline > self.max_frame {
                return Some(self.oversized());
            }
            let line: Vec<u8> = self.buf.drain(..=newline).collect();
            if let Some(event) = decode_line(&line) {
                return Some(event);
            }
        }
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest)
    }

    fn check_pending(&mut self) -> Option<StreamEvent> {
        (self.buf.len() > self.max_frame).then(|| self.oversized())
    }

    fn oversized(&mut self) -> StreamEvent {
        self.buf = Vec::new();
        self.scanned = 0;
        StreamEvent::Error(format!("stream frame exceeds {} bytes", self.max_frame))
    }
}

fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let event = match serde_json::from_slice::<WireFrame>(line) {
        Ok(WireFrame::Data { payload }) => {
            match base64::engine::general_purpose::STANDARD.decode(payload.as_bytes()) {
                Ok(bytes) => StreamEvent::data(bytes),
                Err(e) => StreamEvent::Error(format!("invalid data frame payload: {}", e)),
            }
        }
        Ok(WireFrame::End) => StreamEvent::End,
        Ok(WireFrame::Error { message }) => StreamEvent::Error(message),
        Err(e) => StreamEvent::Error(format!("invalid stream frame: {}", e)),
    };
    Some(event)
}
