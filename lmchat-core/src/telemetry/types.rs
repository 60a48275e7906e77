use serde::Serialize;

use crate::stats::SessionStats;

/// Structured record of one finished relay session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionLog {
    pub model: Option<String>,
    pub server_url: Option<String>,
    pub reasoning_visible: bool,

    pub started_at_ms: Option<u64>,
    pub total_duration_ms: Option<u64>,
    pub time_to_first_token_ms: Option<u64>,
    pub time_to_first_answer_token_ms: Option<u64>,
    pub reasoning_duration_ms: Option<u64>,

    pub tokens_total: u32,
    pub tokens_reasoning: u32,
    pub tokens_answer: u32,

    pub terminal_reason: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl SessionLog {
    pub fn new() -> Self { Self::default() }
    pub fn model(mut self, v: &str) -> Self { self.model = Some(v.to_string()); self }
    pub fn server_url(mut self, v: &str) -> Self { self.server_url = Some(v.to_string()); self }
    pub fn reasoning_visible(mut self, v: bool) -> Self { self.reasoning_visible = v; self }
    pub fn error_kind_opt(mut self, v: Option<&str>) -> Self {
        self.error_kind = v.map(|s| s.to_string());
        self
    }
    pub fn error_message_opt(mut self, v: Option<&str>) -> Self {
        self.error_message = v.map(|s| s.to_string());
        self
    }

    /// Copy timing and counts from finalized stats.
    pub fn stats(mut self, s: &SessionStats) -> Self {
        self.started_at_ms = (s.start_time != 0).then_some(s.start_time);
        self.total_duration_ms = s.total_duration_ms();
        self.time_to_first_token_ms = s.time_to_first_token_ms();
        self.time_to_first_answer_token_ms = s.time_to_first_answer_token_ms();
        self.reasoning_duration_ms = s.reasoning_duration_ms();
        self.tokens_total = s.total_token_count;
        self.tokens_reasoning = s.reasoning_token_count;
        self.tokens_answer = s.answer_token_count;
        self.terminal_reason = s.terminal_reason.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_log_serializes_from_stats() {
        let stats = SessionStats {
            start_time: 1_000,
            first_token_time: 1_050,
            first_answer_token_time: 1_400,
            end_time: 2_000,
            reasoning_start_time: 1_050,
            reasoning_end_time: 1_390,
            total_token_count: 12,
            reasoning_token_count: 4,
            answer_token_count: 8,
            terminal_reason: Some("stop".into()),
        };
        let log = SessionLog::new()
            .model("qwen3-8b")
            .server_url("http://localhost:1234")
            .reasoning_visible(true)
            .stats(&stats);

        let v = serde_json::to_value(&log).unwrap();
        assert_eq!(v["model"], json!("qwen3-8b"));
        assert_eq!(v["total_duration_ms"], json!(1000));
        assert_eq!(v["time_to_first_token_ms"], json!(50));
        assert_eq!(v["time_to_first_answer_token_ms"], json!(400));
        assert_eq!(v["reasoning_duration_ms"], json!(340));
        assert_eq!(v["tokens_total"], json!(12));
        assert_eq!(v["terminal_reason"], json!("stop"));
        assert_eq!(v["error_kind"], json!(null));
    }
}
