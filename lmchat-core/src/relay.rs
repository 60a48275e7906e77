//! One chat turn end to end: validate, open the upstream stream, then decode
//! it on a spawned task while the caller reads events.

use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, Instrument};

use crate::config::Config;
use crate::error::{CoreResult, RelayError};
use crate::frame::FrameStream;
use crate::http_client::HttpClient;
use crate::model::RelayRequest;
use crate::normalizer::normalize_request;
use crate::providers::{DecodingPreset, LmStudio};
use crate::session::{drive, DecodeSession, SessionEmitter, SessionEvent};
use crate::stats::SessionStats;
use crate::telemetry::{self, SessionLog};

#[derive(Debug, Clone)]
pub struct ChatRelay {
    http: HttpClient,
    api_key: SecretString,
    channel_capacity: usize,
}

/// A running decode session. `events` ends after the completion event;
/// `handle` resolves to the final stats even if `events` was dropped early.
#[derive(Debug)]
pub struct RelaySession {
    pub events: mpsc::Receiver<SessionEvent>,
    pub handle: JoinHandle<SessionStats>,
}

impl ChatRelay {
    pub fn new(http: HttpClient, api_key: SecretString, channel_capacity: usize) -> Self {
        Self {
            http,
            api_key,
            channel_capacity,
        }
    }

    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        let http = HttpClient::from_config(&cfg.http)?;
        Ok(Self::new(
            http,
            SecretString::new(cfg.server.api_key().into()),
            cfg.session.channel_capacity,
        ))
    }

    /// Client for the inference server at `server_url`.
    pub fn upstream(&self, server_url: &str) -> LmStudio {
        LmStudio::new(self.http.clone(), server_url, self.api_key.clone())
    }

    /// Start a turn. Transport and status failures are returned here and no
    /// session is spawned; anything later is reported through the events.
    pub async fn open(&self, req: RelayRequest) -> CoreResult<RelaySession> {
        let req = normalize_request(req);
        validate(&req)?;

        let upstream = self.upstream(&req.server_url);
        let frames = upstream
            .stream_chat(
                &req.selected_model,
                &req.messages,
                DecodingPreset::for_thinking(req.enable_thinking),
            )
            .await?;

        Ok(self.spawn_session(
            frames,
            req.selected_model,
            req.server_url,
            req.enable_thinking,
        ))
    }

    /// Decode `frames` on a spawned task. One telemetry record is emitted when
    /// the session ends, whether the stream finished or broke off.
    fn spawn_session(
        &self,
        frames: FrameStream,
        model: String,
        server_url: String,
        reasoning_visible: bool,
    ) -> RelaySession {
        let (emitter, events) = SessionEmitter::channel(self.channel_capacity, reasoning_visible);
        let span = info_span!(
            "decode_session",
            model = %model,
            reasoning_visible = reasoning_visible
        );

        let handle = tokio::spawn(
            async move {
                info!(server = %server_url, "session started");
                let (stats, failure) = drive(frames, DecodeSession::new(emitter)).await;
                info!(
                    tokens = stats.total_token_count,
                    reasoning_tokens = stats.reasoning_token_count,
                    answer_tokens = stats.answer_token_count,
                    duration_ms = stats.total_duration_ms().unwrap_or(0),
                    terminal_reason = stats.terminal_reason.as_deref().unwrap_or("none"),
                    failed = failure.is_some(),
                    "session finished"
                );
                let message = failure.as_ref().map(|e| e.to_string());
                telemetry::emit_session(
                    SessionLog::new()
                        .model(&model)
                        .server_url(&server_url)
                        .reasoning_visible(reasoning_visible)
                        .stats(&stats)
                        .error_kind_opt(failure.as_ref().map(|e| e.kind()))
                        .error_message_opt(message.as_deref()),
                );
                stats
            }
            .instrument(span),
        );

        RelaySession { events, handle }
    }
}

fn validate(req: &RelayRequest) -> CoreResult<()> {
    if req.messages.is_empty() {
        return Err(RelayError::Validation("at least one message is required".into()));
    }
    if req.selected_model.is_empty() {
        return Err(RelayError::Validation("selectedModel must not be empty".into()));
    }
    if req.server_url.is_empty() {
        return Err(RelayError::Validation("serverUrl must not be empty".into()));
    }
    Ok(())
}
