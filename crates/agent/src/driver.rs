use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use pricebot_catalog::{lookup_with_broadening, CatalogClient, PageFetcher};
use pricebot_core::domain::{PriceResultSet, ToolInvocation};
use pricebot_core::filter::validate;
use pricebot_stream::StreamEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adapter::adapt_response;
use crate::llm::{CompletionClient, CompletionRequest, InputItem, LlmError};
use crate::prompt::PromptPack;
use crate::tools::{self, PRICE_QUERY_TOOL};

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("conversation did not converge within {rounds} tool rounds")]
    RoundLimit { rounds: u32 },
}

/// Result of one finished turn. `response_id` is the continuation token the
/// client replays to keep the conversation going.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub answer: String,
    pub last_result_set: Option<PriceResultSet>,
    pub response_id: String,
}

struct InvocationOutcome {
    payload: serde_json::Value,
    result_set: Option<PriceResultSet>,
}

/// Runs one conversation turn: completion, tool fan-out, feedback, repeat.
///
/// Each tool call id executes at most once per turn, even when the endpoint
/// echoes already-answered calls on a later round. Rounds are bounded so a
/// model stuck requesting tools cannot loop forever.
pub struct ConversationDriver<L, F = pricebot_catalog::HttpPageFetcher> {
    llm: Arc<L>,
    catalog: Arc<CatalogClient<F>>,
    prompts: PromptPack,
    max_rounds: u32,
    broaden_attempts: u32,
}

impl<L, F> ConversationDriver<L, F>
where
    L: CompletionClient,
    F: PageFetcher,
{
    pub fn new(
        llm: Arc<L>,
        catalog: Arc<CatalogClient<F>>,
        prompts: PromptPack,
        max_rounds: u32,
        broaden_attempts: u32,
    ) -> Self {
        Self { llm, catalog, prompts, max_rounds, broaden_attempts }
    }

    /// Drive `prompt` to a final answer, emitting progress on `events`.
    ///
    /// The continuation token is emitted as soon as the opening completion
    /// returns, before any price data, so the client can resume the session
    /// even if the turn later fails.
    pub async fn run_turn(
        &self,
        prompt: &str,
        previous_token: Option<String>,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<TurnOutcome, TurnError> {
        let request = CompletionRequest {
            input: self.prompts.turn_input(prompt),
            previous_response_id: previous_token,
        };
        let mut completion = adapt_response(&self.llm.create(request).await?)?;

        let _ = events
            .send(StreamEvent::SessionToken { token: completion.response_id.clone() })
            .await;

        let mut processed: HashSet<String> = HashSet::new();
        let mut last_result_set: Option<PriceResultSet> = None;

        // `round` counts completed tool rounds. The completion produced by
        // round `max_rounds` is still examined: a turn that converges on
        // exactly the last allowed round is an answer, not a limit error.
        for round in 0..=self.max_rounds {
            let pending: Vec<ToolInvocation> = completion
                .tool_calls
                .iter()
                .filter(|call| !processed.contains(&call.call_id))
                .cloned()
                .collect();

            if pending.is_empty() {
                info!(
                    event_name = "agent.turn.complete",
                    rounds = round,
                    answered_with_prices = last_result_set.is_some(),
                    "turn converged"
                );
                return Ok(TurnOutcome {
                    answer: completion.answer_text.trim().to_string(),
                    last_result_set,
                    response_id: completion.response_id,
                });
            }

            if round == self.max_rounds {
                break;
            }

            for call in &pending {
                processed.insert(call.call_id.clone());
            }
            debug!(
                event_name = "agent.round.fan_out",
                round = round + 1,
                invocations = pending.len(),
                "executing tool calls in parallel"
            );

            let outcomes =
                join_all(pending.iter().map(|call| self.execute_invocation(call, events))).await;

            let mut outputs = Vec::with_capacity(pending.len());
            for (call, outcome) in pending.iter().zip(outcomes) {
                if let Some(set) = outcome.result_set {
                    last_result_set = Some(set);
                }
                outputs.push(InputItem::FunctionCallOutput {
                    call_id: call.call_id.clone(),
                    output: outcome.payload.to_string(),
                });
            }

            let follow_up = CompletionRequest {
                input: outputs,
                previous_response_id: Some(completion.response_id.clone()),
            };
            completion = adapt_response(&self.llm.create(follow_up).await?)?;
        }

        warn!(
            event_name = "agent.turn.round_limit",
            rounds = self.max_rounds,
            "model kept requesting tools past the round bound"
        );
        Err(TurnError::RoundLimit { rounds: self.max_rounds })
    }

    /// Execute one tool call. Never fails the turn: anything wrong with the
    /// call becomes a structured error payload the model can repair from.
    /// Filter syntax is checked before any network traffic.
    async fn execute_invocation(
        &self,
        call: &ToolInvocation,
        events: &mpsc::Sender<StreamEvent>,
    ) -> InvocationOutcome {
        if call.name != PRICE_QUERY_TOOL {
            return InvocationOutcome {
                payload: tools::error_payload(
                    "unknown_tool",
                    &format!("no tool named `{}`", call.name),
                    "the only available tool is price_query",
                ),
                result_set: None,
            };
        }

        let filter = match tools::parse_filter_arguments(&call.raw_arguments) {
            Ok(filter) => filter,
            Err(error) => {
                return InvocationOutcome {
                    payload: tools::error_payload(
                        "bad_arguments",
                        &error.to_string(),
                        "pass a JSON object with a non-empty `filter` string",
                    ),
                    result_set: None,
                };
            }
        };

        if let Err(error) = validate(&filter) {
            warn!(
                event_name = "agent.invocation.invalid_filter",
                call_id = %call.call_id,
                error = %error,
                "rejecting filter before catalog call"
            );
            return InvocationOutcome {
                payload: tools::error_payload(
                    "invalid_filter",
                    &error.to_string(),
                    &error.remediation_hint(),
                ),
                result_set: None,
            };
        }

        let _ = events
            .send(StreamEvent::Step { message: format!("querying price catalog: `{filter}`") })
            .await;

        match lookup_with_broadening(&self.catalog, &filter, self.broaden_attempts, events).await {
            Ok(result) => {
                let _ = events
                    .send(StreamEvent::PriceData {
                        items: result.records.clone(),
                        filter: result.filter_used.clone(),
                        total_count: result.records.len(),
                    })
                    .await;
                InvocationOutcome { payload: tools::success_payload(&result), result_set: Some(result) }
            }
            Err(error) => {
                warn!(
                    event_name = "agent.invocation.catalog_error",
                    call_id = %call.call_id,
                    error = %error,
                    "catalog lookup failed"
                );
                InvocationOutcome {
                    payload: tools::error_payload(
                        "catalog_error",
                        &error.to_string(),
                        "retry once with the same filter, then tell the user the catalog is unavailable",
                    ),
                    result_set: None,
                }
            }
        }
    }
}
