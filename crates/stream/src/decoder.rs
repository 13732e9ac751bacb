use thiserror::Error;
use tracing::warn;

use crate::encoder::{FRAME_PREFIX, FRAME_TERMINATOR};
use crate::event::StreamEvent;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Incremental frame decoder for an arbitrarily chunked byte stream.
///
/// Single accumulating state: bytes are appended to an internal buffer, and
/// complete frames are extracted by scanning for the `data: ` prefix followed
/// by a JSON object whose closing brace returns the brace depth to zero and is
/// immediately followed by the terminator. The scan tracks string and escape
/// state so braces and terminator-shaped whitespace inside the payload never
/// split a frame. Splitting on the terminator with a regex would be wrong:
/// the payload can legitimately contain `\n\n` between JSON tokens.
///
/// Malformed payloads are logged and skipped; decoding continues with the
/// next frame.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered while waiting for the rest of a frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Append a chunk and return every frame completed by it, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(chunk);
        self.strip_comment_lines();

        let mut events = Vec::new();
        let mut consumed = 0;

        loop {
            let Some(found) = self.buffer[consumed..].find(FRAME_PREFIX) else {
                break;
            };
            let payload_start = consumed + found + FRAME_PREFIX.len();
            let Some(payload_end) = scan_payload_end(self.buffer.as_bytes(), payload_start) else {
                // Incomplete frame; wait for more bytes.
                break;
            };

            let payload = &self.buffer[payload_start..payload_end];
            match serde_json::from_str::<StreamEvent>(payload) {
                Ok(event) => events.push(event),
                Err(error) => {
                    warn!(
                        event_name = "stream.decode.frame_skipped",
                        error = %DecodeError::from(error),
                        payload_len = payload.len(),
                        "skipping malformed frame"
                    );
                }
            }
            consumed = payload_end + FRAME_TERMINATOR.len();
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        events
    }

    /// Drop every complete comment line (`: ...\n\n`). Partial comments stay
    /// buffered until their terminator arrives.
    fn strip_comment_lines(&mut self) {
        loop {
            let Some(start) = find_comment_start(&self.buffer) else {
                return;
            };
            let Some(end) = self.buffer[start..].find(FRAME_TERMINATOR) else {
                return;
            };
            self.buffer.drain(start..start + end + FRAME_TERMINATOR.len());
        }
    }
}

fn find_comment_start(buffer: &str) -> Option<usize> {
    if buffer.starts_with(':') {
        return Some(0);
    }
    buffer.find("\n:").map(|pos| pos + 1)
}

/// Scan from `start` for the byte index one past the payload's closing brace,
/// requiring the terminator to follow immediately. Returns `None` while the
/// frame is incomplete. Operates on bytes: every byte of a multi-byte UTF-8
/// character is >= 0x80 and never collides with the structural ASCII bytes.
fn scan_payload_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for index in start..bytes.len() {
        let byte = bytes[index];

        if escaped {
            escaped = false;
            continue;
        }
        if byte == b'\\' {
            escaped = true;
            continue;
        }
        if byte == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }

        if byte == b'{' {
            depth += 1;
        } else if byte == b'}' {
            depth -= 1;
        }

        if depth == 0 && bytes.get(index + 1..index + 3) == Some(FRAME_TERMINATOR.as_bytes()) {
            return Some(index + 1);
        }
    }

    None
}
