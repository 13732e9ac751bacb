use pricebot_core::domain::ToolInvocation;
use serde_json::Value;

use crate::llm::LlmError;

/// Completion response reduced to what the driver needs: the continuation id,
/// any pending tool calls, and whatever answer text the model produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    pub response_id: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub answer_text: String,
}

/// Reduce a raw responses-endpoint body. Tolerant of the shapes the endpoint
/// actually produces: a convenience `output_text` string, `function_call`
/// output items, and `message` items whose content mixes `output_text` and
/// `text` parts. Unknown item kinds are ignored.
pub fn adapt_response(raw: &Value) -> Result<Completion, LlmError> {
    let response_id = raw["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or(LlmError::MalformedResponse { field: "id" })?
        .to_string();

    let mut tool_calls = Vec::new();
    let mut answer_text = String::new();

    if let Some(text) = raw["output_text"].as_str() {
        answer_text.push_str(text);
    }

    if let Some(items) = raw["output"].as_array() {
        for item in items {
            match item["type"].as_str() {
                Some("function_call") => {
                    let call_id = item["call_id"]
                        .as_str()
                        .ok_or(LlmError::MalformedResponse { field: "call_id" })?;
                    let name = item["name"]
                        .as_str()
                        .ok_or(LlmError::MalformedResponse { field: "name" })?;
                    let raw_arguments = item["arguments"].as_str().unwrap_or("{}");
                    tool_calls.push(ToolInvocation {
                        call_id: call_id.to_string(),
                        name: name.to_string(),
                        raw_arguments: raw_arguments.to_string(),
                    });
                }
                Some("message") => {
                    if let Some(parts) = item["content"].as_array() {
                        for part in parts {
                            let is_text = matches!(
                                part["type"].as_str(),
                                Some("output_text") | Some("text")
                            );
                            if is_text {
                                if let Some(text) = part["text"].as_str() {
                                    answer_text.push_str(text);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(Completion { response_id, tool_calls, answer_text })
}
