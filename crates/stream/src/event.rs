use pricebot_core::domain::PriceRecord;
use serde::{Deserialize, Serialize};

/// One frame payload. The wire shape is `{"type": ..., "data": {...}}`.
///
/// Ordering invariant within a turn: `session_token` precedes any
/// `price_data`/answer event, `price_data` for an invocation precedes the
/// answer text that references it, and `answer_complete` (or `direct_answer`
/// / `error`) is terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Step { message: String },
    PriceData { items: Vec<PriceRecord>, filter: String, total_count: usize },
    AnswerChunk { content: String },
    AnswerComplete { content: String, items: Vec<PriceRecord>, filter: String },
    SessionToken { token: String },
    DirectAnswer { content: String },
    Error { message: String },
}

impl StreamEvent {
    /// Terminal frames end the stream; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AnswerComplete { .. } | Self::DirectAnswer { .. } | Self::Error { .. })
    }
}
