//! The conversation loop: prompt in, streamed answer out.
//!
//! `ConversationDriver` owns one turn end to end. It asks the completion
//! endpoint for a response, executes any `price_query` tool calls against the
//! catalog (in parallel, each at most once), feeds the outputs back, and
//! repeats until the model answers in plain text or the round bound trips.

pub mod adapter;
pub mod driver;
pub mod llm;
pub mod prompt;
pub mod tools;

pub use adapter::{adapt_response, Completion};
pub use driver::{ConversationDriver, TurnError, TurnOutcome};
pub use llm::{CompletionClient, CompletionRequest, InputItem, LlmError, ResponsesClient};
pub use prompt::PromptPack;
