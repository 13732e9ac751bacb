use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use pricebot_agent::{CompletionClient, ConversationDriver};
use pricebot_catalog::PageFetcher;
use pricebot_stream::{encode_frame, StreamEvent, KEEPALIVE_FRAME};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

const KEEPALIVE_INTERVAL_SECS: u64 = 15;
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct ChatState<L, F> {
    pub driver: Arc<ConversationDriver<L, F>>,
    pub turn_timeout_secs: u64,
}

// Manual impl: `#[derive(Clone)]` would demand `L: Clone` and `F: Clone`.
impl<L, F> Clone for ChatState<L, F> {
    fn clone(&self) -> Self {
        Self { driver: Arc::clone(&self.driver), turn_timeout_secs: self.turn_timeout_secs }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: Option<String>,
    pub session_token: Option<String>,
}

pub fn router<L, F>(state: ChatState<L, F>) -> Router
where
    L: CompletionClient + 'static,
    F: PageFetcher + 'static,
{
    Router::new().route("/api/chat", post(chat)).with_state(state)
}

/// One conversation turn as a framed event stream.
///
/// The response starts immediately; frames arrive as the turn progresses and
/// keepalive comments cover the gaps so proxies do not cut the connection.
/// Failures after the stream has started are reported as a terminal `error`
/// frame, not an HTTP status.
pub async fn chat<L, F>(
    State(state): State<ChatState<L, F>>,
    Json(request): Json<ChatRequest>,
) -> Response
where
    L: CompletionClient + 'static,
    F: PageFetcher + 'static,
{
    let Some(prompt) = request.prompt.filter(|prompt| !prompt.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "prompt is required"})))
            .into_response();
    };

    let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(EVENT_CHANNEL_CAPACITY);
    let (byte_tx, byte_rx) = mpsc::channel::<Result<Bytes, Infallible>>(EVENT_CHANNEL_CAPACITY);

    let driver = Arc::clone(&state.driver);
    let turn_timeout = Duration::from_secs(state.turn_timeout_secs);
    let session_token = request.session_token;
    tokio::spawn(async move {
        run_turn_to_channel(driver, prompt, session_token, turn_timeout, event_tx).await;
    });
    tokio::spawn(pump_frames(event_rx, byte_tx));

    let headers = [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache, no-transform"),
        (header::CONNECTION, "keep-alive"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    (headers, Body::from_stream(ReceiverStream::new(byte_rx))).into_response()
}

/// Drive the turn and close it out with exactly one terminal event. Dropping
/// the sender at the end is what terminates the client's stream.
async fn run_turn_to_channel<L, F>(
    driver: Arc<ConversationDriver<L, F>>,
    prompt: String,
    session_token: Option<String>,
    turn_timeout: Duration,
    events: mpsc::Sender<StreamEvent>,
) where
    L: CompletionClient,
    F: PageFetcher,
{
    let outcome =
        tokio::time::timeout(turn_timeout, driver.run_turn(&prompt, session_token, &events)).await;

    let terminal_events = match outcome {
        Ok(Ok(outcome)) => match outcome.last_result_set {
            None => vec![StreamEvent::DirectAnswer { content: outcome.answer }],
            Some(result) => {
                let mut finals = Vec::with_capacity(2);
                if !outcome.answer.is_empty() {
                    finals.push(StreamEvent::AnswerChunk { content: outcome.answer.clone() });
                }
                finals.push(StreamEvent::AnswerComplete {
                    content: outcome.answer,
                    items: result.records,
                    filter: result.filter_used,
                });
                finals
            }
        },
        Ok(Err(turn_error)) => {
            error!(event_name = "server.chat.turn_failed", error = %turn_error, "turn failed");
            vec![StreamEvent::Error { message: turn_error.to_string() }]
        }
        Err(_elapsed) => {
            error!(
                event_name = "server.chat.turn_timeout",
                timeout_secs = turn_timeout.as_secs(),
                "turn exceeded its deadline"
            );
            vec![StreamEvent::Error {
                message: format!("turn timed out after {}s", turn_timeout.as_secs()),
            }]
        }
    };

    for event in terminal_events {
        let _ = events.send(event).await;
    }
    info!(event_name = "server.chat.turn_closed", "event stream closed");
}

/// Encode events into wire frames, interleaving keepalive comments while the
/// turn is quiet.
async fn pump_frames(
    mut events: mpsc::Receiver<StreamEvent>,
    bytes: mpsc::Sender<Result<Bytes, Infallible>>,
) {
    let mut keepalive = tokio::time::interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECS));
    keepalive.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let frame = encode_frame(&event);
                    if bytes.send(Ok(Bytes::from(frame))).await.is_err() {
                        return; // client went away
                    }
                }
                None => return,
            },
            _ = keepalive.tick() => {
                if bytes.send(Ok(Bytes::from_static(KEEPALIVE_FRAME.as_bytes()))).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use pricebot_agent::{
        CompletionClient, CompletionRequest, ConversationDriver, LlmError, PromptPack,
    };
    use pricebot_catalog::{CatalogClient, CatalogError, PageFetcher, PricePage};
    use pricebot_core::config::CatalogConfig;
    use pricebot_core::domain::PriceRecord;
    use pricebot_stream::{FrameDecoder, StreamEvent};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, ChatState};

    fn test_config() -> CatalogConfig {
        CatalogConfig {
            base_url: "https://catalog.test/api/retail/prices".to_string(),
            api_version: "2023-01-01-preview".to_string(),
            page_timeout_secs: 30,
            max_attempts: 3,
        }
    }

    fn record() -> PriceRecord {
        PriceRecord {
            arm_sku_name: "Standard_D8s_v4".to_string(),
            retail_price: 0.384,
            unit_of_measure: "1 Hour".to_string(),
            arm_region_name: "eastus".to_string(),
            meter_id: "m-1".to_string(),
            meter_name: "D8s v4".to_string(),
            product_name: "Virtual Machines Dsv4 Series".to_string(),
            price_type: "Consumption".to_string(),
            location: None,
            reservation_term: None,
            savings_plan: None,
        }
    }

    #[derive(Clone)]
    struct ScriptedLlm {
        responses: Arc<Mutex<Vec<Value>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Value>) -> Self {
            let mut reversed = responses;
            reversed.reverse();
            Self { responses: Arc::new(Mutex::new(reversed)) }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedLlm {
        async fn create(&self, _request: CompletionRequest) -> Result<Value, LlmError> {
            self.responses
                .lock()
                .expect("lock")
                .pop()
                .ok_or(LlmError::MalformedResponse { field: "scripted response" })
        }
    }

    #[derive(Clone)]
    struct OneRecordFetcher;

    #[async_trait]
    impl PageFetcher for OneRecordFetcher {
        async fn fetch_page(&self, _url: &str) -> Result<PricePage, CatalogError> {
            Ok(PricePage { items: vec![record()], next_page_link: None })
        }
    }

    fn state(llm: ScriptedLlm) -> ChatState<ScriptedLlm, OneRecordFetcher> {
        let driver = ConversationDriver::new(
            Arc::new(llm),
            Arc::new(CatalogClient::new(OneRecordFetcher, &test_config())),
            PromptPack::default(),
            6,
            3,
        );
        ChatState { driver: Arc::new(driver), turn_timeout_secs: 5 }
    }

    fn chat_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    async fn decode_stream(response: axum::response::Response) -> Vec<StreamEvent> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should collect");
        let text = String::from_utf8(bytes.to_vec()).expect("stream is UTF-8");
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(&text);
        assert_eq!(decoder.pending_bytes(), 0, "stream ended mid-frame");
        events
    }

    #[tokio::test]
    async fn missing_prompt_is_a_400_not_a_stream() {
        let app = router(state(ScriptedLlm::new(Vec::new())));
        let response = app
            .oneshot(chat_request(json!({"session_token": "resp_1"})))
            .await
            .expect("request should route");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = router(state(ScriptedLlm::new(Vec::new())));
        let response =
            app.oneshot(chat_request(json!({"prompt": "   "}))).await.expect("request should route");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stream_response_carries_event_stream_headers() {
        let llm = ScriptedLlm::new(vec![json!({"id": "resp_1", "output_text": "hi"})]);
        let app = router(state(llm));
        let response =
            app.oneshot(chat_request(json!({"prompt": "hi"}))).await.expect("request should route");

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-transform");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn tool_turn_streams_token_steps_prices_then_answer() {
        let llm = ScriptedLlm::new(vec![
            json!({
                "id": "resp_1",
                "output": [{
                    "type": "function_call",
                    "call_id": "call_1",
                    "name": "price_query",
                    "arguments": json!({"filter": "contains(tolower(meterName), 'd8s v4')"}).to_string(),
                }]
            }),
            json!({
                "id": "resp_2",
                "output": [{
                    "type": "message",
                    "content": [{"type": "output_text", "text": "The D8s v4 costs $0.384/hour."}]
                }]
            }),
        ]);
        let app = router(state(llm));
        let response = app
            .oneshot(chat_request(json!({"prompt": "d8s v4 price in east us?"})))
            .await
            .expect("request should route");

        let events = decode_stream(response).await;
        let kinds: Vec<&str> = events
            .iter()
            .map(|event| match event {
                StreamEvent::SessionToken { .. } => "session_token",
                StreamEvent::Step { .. } => "step",
                StreamEvent::PriceData { .. } => "price_data",
                StreamEvent::AnswerChunk { .. } => "answer_chunk",
                StreamEvent::AnswerComplete { .. } => "answer_complete",
                StreamEvent::DirectAnswer { .. } => "direct_answer",
                StreamEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["session_token", "step", "price_data", "answer_chunk", "answer_complete"]
        );

        match &events[0] {
            StreamEvent::SessionToken { token } => assert_eq!(token, "resp_1"),
            other => panic!("expected session token, got {other:?}"),
        }
        match events.last() {
            Some(StreamEvent::AnswerComplete { content, items, filter }) => {
                assert_eq!(content, "The D8s v4 costs $0.384/hour.");
                assert_eq!(items.len(), 1);
                assert_eq!(filter, "contains(tolower(meterName), 'd8s v4')");
            }
            other => panic!("expected answer_complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn toolless_turn_streams_token_then_direct_answer() {
        let llm = ScriptedLlm::new(vec![json!({
            "id": "resp_1",
            "output": [{
                "type": "message",
                "content": [{"type": "output_text", "text": "Hello! Ask me about cloud prices."}]
            }]
        })]);
        let app = router(state(llm));
        let response =
            app.oneshot(chat_request(json!({"prompt": "hello"}))).await.expect("request should route");

        let events = decode_stream(response).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::SessionToken { token: "resp_1".to_string() },
                StreamEvent::DirectAnswer { content: "Hello! Ask me about cloud prices.".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn turn_failure_ends_the_stream_with_an_error_frame() {
        // Only one scripted response: the follow-up completion fails.
        let llm = ScriptedLlm::new(vec![json!({
            "id": "resp_1",
            "output": [{
                "type": "function_call",
                "call_id": "call_1",
                "name": "price_query",
                "arguments": json!({"filter": "contains(tolower(meterName), 'd8s')"}).to_string(),
            }]
        })]);
        let app = router(state(llm));
        let response =
            app.oneshot(chat_request(json!({"prompt": "d8s?"}))).await.expect("request should route");

        let events = decode_stream(response).await;
        assert!(
            matches!(events.last(), Some(StreamEvent::Error { .. })),
            "stream ends with an error frame: {events:?}"
        );
        assert!(events.iter().filter(|event| event.is_terminal()).count() == 1);
    }
}
