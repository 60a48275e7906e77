use serde::Deserialize;
use tracing::warn;

use crate::frame::StreamFrame;

/// Incremental model output carried by one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentDelta {
    pub text: String,
    pub terminal_reason: Option<String>,
}

// ---- Wire structs (chat.completion.chunk, minimal) ----
#[derive(Deserialize)]
struct ChunkWire {
    #[serde(default)]
    choices: Vec<ChoiceWire>,
}

#[derive(Deserialize)]
struct ChoiceWire {
    #[serde(default)]
    delta: Option<DeltaWire>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct DeltaWire {
    #[serde(default)]
    content: Option<String>,
}

/// Parse a frame payload. `Ok(None)` is a keep-alive: no content and no
/// terminal reason.
pub fn parse_delta(payload: &str) -> Result<Option<ContentDelta>, serde_json::Error> {
    let chunk: ChunkWire = serde_json::from_str(payload)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };
    let text = choice.delta.and_then(|d| d.content).unwrap_or_default();
    let terminal_reason = choice.finish_reason.filter(|r| !r.is_empty());
    if text.is_empty() && terminal_reason.is_none() {
        return Ok(None);
    }
    Ok(Some(ContentDelta {
        text,
        terminal_reason,
    }))
}

/// Extract a delta from a frame, logging and skipping malformed payloads.
pub fn extract_delta(frame: &StreamFrame) -> Option<ContentDelta> {
    match parse_delta(&frame.payload) {
        Ok(delta) => delta,
        Err(e) => {
            warn!(error = %e, payload = %frame.payload, "dropping malformed frame");
            None
        }
    }
}
