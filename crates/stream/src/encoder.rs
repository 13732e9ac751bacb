use crate::event::StreamEvent;

pub const FRAME_PREFIX: &str = "data: ";
pub const FRAME_TERMINATOR: &str = "\n\n";

/// Comment line used to keep idle connections open. Decoders drop it.
pub const KEEPALIVE_FRAME: &str = ": keepalive\n\n";

/// Serialize one event as a self-delimited frame.
pub fn encode_frame(event: &StreamEvent) -> String {
    match serde_json::to_string(event) {
        Ok(payload) => format!("{FRAME_PREFIX}{payload}{FRAME_TERMINATOR}"),
        Err(error) => {
            // Serializing these in-memory enums cannot realistically fail;
            // degrade to an error frame rather than dropping the event.
            let message = format!("frame encoding failed: {error}");
            let fallback = StreamEvent::Error { message };
            serde_json::to_string(&fallback)
                .map(|payload| format!("{FRAME_PREFIX}{payload}{FRAME_TERMINATOR}"))
                .unwrap_or_else(|_| format!("{FRAME_PREFIX}{{}}{FRAME_TERMINATOR}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{encode_frame, FRAME_PREFIX, FRAME_TERMINATOR};
    use crate::event::StreamEvent;

    #[test]
    fn frames_carry_prefix_payload_and_terminator() {
        let frame = encode_frame(&StreamEvent::Step { message: "searching".to_string() });
        assert!(frame.starts_with(FRAME_PREFIX));
        assert!(frame.ends_with(FRAME_TERMINATOR));
        let payload = &frame[FRAME_PREFIX.len()..frame.len() - FRAME_TERMINATOR.len()];
        let value: serde_json::Value = serde_json::from_str(payload).expect("payload is JSON");
        assert_eq!(value["type"], "step");
    }

    #[test]
    fn payload_newlines_are_escaped_inside_strings() {
        let frame = encode_frame(&StreamEvent::DirectAnswer {
            content: "line one\nline two".to_string(),
        });
        // The only raw newlines in a frame are the terminator.
        assert_eq!(frame.matches('\n').count(), 2);
        assert!(frame.contains("line one\\nline two"));
    }
}
