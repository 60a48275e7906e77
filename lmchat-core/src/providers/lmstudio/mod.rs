use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::error::CoreResult;
use crate::frame::FrameStream;
use crate::http_client::HttpClient;
use crate::model::{ChatMessage, ModelInfo, ModelList};

/// Fixed sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodingPreset {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub min_p: f32,
    pub max_tokens: u32,
    /// Asks the model to emit a `<think>` segment. Omitted from the wire
    /// entirely for the standard preset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<bool>,
}

impl DecodingPreset {
    pub const fn reasoning() -> Self {
        Self {
            temperature: 0.6,
            top_p: 0.95,
            top_k: 20,
            min_p: 0.0,
            max_tokens: 2000,
            thinking: Some(true),
        }
    }

    pub const fn standard() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 20,
            min_p: 0.0,
            max_tokens: 2000,
            thinking: None,
        }
    }

    pub const fn for_thinking(enabled: bool) -> Self {
        if enabled {
            Self::reasoning()
        } else {
            Self::standard()
        }
    }
}

// ---- Wire structs ----
#[derive(Serialize)]
struct LmsChatReq<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    preset: DecodingPreset,
    stream: bool,
}

/// Client for one OpenAI-compatible LM Studio server.
#[derive(Debug, Clone)]
pub struct LmStudio {
    http: HttpClient,
    base: String,
    api_key: SecretString,
}

impl LmStudio {
    pub fn new(http: HttpClient, base: impl Into<String>, api_key: SecretString) -> Self {
        let base = base.into();
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        LmStudio::new(
            HttpClient::new_default().unwrap(),
            server_base,
            SecretString::new(crate::config::DEFAULT_API_KEY.into()),
        )
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key.expose_secret()),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    /// Start a streamed completion. Transport and status failures surface here,
    /// before any frame is read.
    pub async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        preset: DecodingPreset,
    ) -> CoreResult<FrameStream> {
        let payload = LmsChatReq {
            model,
            messages,
            preset,
            stream: true,
        };
        let owned_headers = self.headers();
        let hdrs: Vec<(&str, &str)> = owned_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let url = format!("{}/v1/chat/completions", self.base);
        debug!(
            url = %url,
            model,
            thinking = preset.thinking.is_some(),
            "opening completion stream"
        );
        self.http.post_event_stream(&url, &payload, &hdrs).await
    }

    pub async fn list_models(&self) -> CoreResult<ModelList> {
        let owned_headers = self.headers();
        let hdrs: Vec<(&str, &str)> = owned_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let url = format!("{}/v1/models", self.base);
        self.http.get_json::<ModelList>(&url, &hdrs).await
    }

    /// The model currently loaded on the server, if any.
    pub async fn active_model(&self) -> CoreResult<Option<ModelInfo>> {
        let list = self.list_models().await?;
        Ok(list.active().cloned())
    }
}
