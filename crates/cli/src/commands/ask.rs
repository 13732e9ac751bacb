use futures::StreamExt;
use pricebot_stream::{FrameDecoder, StreamEvent};
use serde_json::json;

use super::CommandResult;

/// Records printed per price_data frame before eliding the rest.
const MAX_PRINTED_RECORDS: usize = 10;

/// Stream one turn from a running server, printing frames as they arrive.
pub async fn run(server: &str, prompt: &str, session_token: Option<String>) -> CommandResult {
    let url = format!("{}/api/chat", server.trim_end_matches('/'));
    let body = json!({"prompt": prompt, "session_token": session_token});

    let client = reqwest::Client::new();
    let response = match client.post(&url).json(&body).send().await {
        Ok(response) => response,
        Err(error) => return CommandResult::failure(format!("request to {url} failed: {error}")),
    };

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return CommandResult::failure(format!("server returned {status}: {detail}"));
    }

    let mut stream = response.bytes_stream();
    let mut decoder = FrameDecoder::new();
    // Chunk boundaries can split a multi-byte character; feed the decoder only
    // the longest valid UTF-8 prefix and keep the tail for the next chunk.
    let mut pending = Vec::new();
    let mut failed = false;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => return CommandResult::failure(format!("stream interrupted: {error}")),
        };
        pending.extend_from_slice(&chunk);
        let valid_len = match std::str::from_utf8(&pending) {
            Ok(text) => text.len(),
            Err(error) => error.valid_up_to(),
        };
        for event in decoder.push(&String::from_utf8_lossy(&pending[..valid_len])) {
            failed |= matches!(event, StreamEvent::Error { .. });
            print_event(&event);
        }
        pending.drain(..valid_len);
    }

    if failed {
        CommandResult { exit_code: 1, output: String::new() }
    } else {
        CommandResult::success("")
    }
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::SessionToken { token } => {
            println!("session token: {token} (pass via --session-token to continue)");
        }
        StreamEvent::Step { message } => println!("  - {message}"),
        StreamEvent::PriceData { items, filter, total_count } => {
            println!("{total_count} price(s) for `{filter}`:");
            for record in items.iter().take(MAX_PRINTED_RECORDS) {
                println!(
                    "    {} [{}] {} per {} ({})",
                    record.meter_name,
                    record.arm_region_name,
                    record.retail_price,
                    record.unit_of_measure,
                    record.price_type,
                );
            }
            if items.len() > MAX_PRINTED_RECORDS {
                println!("    ... and {} more", items.len() - MAX_PRINTED_RECORDS);
            }
        }
        StreamEvent::AnswerChunk { .. } => {}
        StreamEvent::AnswerComplete { content, .. } | StreamEvent::DirectAnswer { content } => {
            println!("\n{content}");
        }
        StreamEvent::Error { message } => println!("\nerror: {message}"),
    }
}
