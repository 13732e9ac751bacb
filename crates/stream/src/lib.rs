//! Streaming protocol for relaying agent progress to a client.
//!
//! Each lifecycle event is one self-delimited text frame:
//! `data: <compact JSON>\n\n`. The payload may contain nested braces, escaped
//! quotes, and whitespace (including the terminator byte sequence outside
//! string literals), so the decoder walks the payload character by character
//! instead of splitting on the terminator.

pub mod decoder;
pub mod encoder;
pub mod event;

pub use decoder::FrameDecoder;
pub use encoder::{encode_frame, FRAME_PREFIX, FRAME_TERMINATOR, KEEPALIVE_FRAME};
pub use event::StreamEvent;
