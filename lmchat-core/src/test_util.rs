//! Helpers shared by unit tests: build chat.completion.chunk payloads and
//! SSE bodies the way an OpenAI-compatible server streams them.

use serde_json::json;

use crate::error::CoreResult;
use crate::frame::{FrameStream, StreamFrame};

/// JSON payload of one streamed chunk.
pub fn sse_chunk(content: &str, finish_reason: Option<&str>) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "choices": [{
            "index": 0,
            "delta": { "content": content },
            "finish_reason": finish_reason,
        }]
    })
    .to_string()
}

/// Full SSE response body: one `data:` record per payload, then `[DONE]`.
pub fn sse_body(payloads: &[String]) -> String {
    let mut body = String::new();
    for p in payloads {
        body.push_str("data: ");
        body.push_str(p);
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// In-memory frame stream over ready payloads.
pub fn frames_from(payloads: &[String]) -> FrameStream {
    let items: Vec<CoreResult<StreamFrame>> = payloads
        .iter()
        .map(|p| {
            Ok(StreamFrame {
                payload: p.clone(),
            })
        })
        .collect();
    Box::pin(futures_util::stream::iter(items))
}
