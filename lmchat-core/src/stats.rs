use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifiedDelta, SegmentTransition};

/// Timing and counting state for one response. Times are epoch
/// milliseconds; 0 means "not yet observed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub start_time: u64,
    pub first_token_time: u64,
    pub first_answer_token_time: u64,
    pub end_time: u64,
    pub reasoning_start_time: u64,
    pub reasoning_end_time: u64,
    pub total_token_count: u32,
    pub reasoning_token_count: u32,
    pub answer_token_count: u32,
    pub terminal_reason: Option<String>,
}

fn since(later: u64, earlier: u64) -> Option<u64> {
    (later != 0 && earlier != 0).then(|| later.saturating_sub(earlier))
}

impl SessionStats {
    pub fn time_to_first_token_ms(&self) -> Option<u64> {
        since(self.first_token_time, self.start_time)
    }

    pub fn time_to_first_answer_token_ms(&self) -> Option<u64> {
        since(self.first_answer_token_time, self.start_time)
    }

    pub fn reasoning_duration_ms(&self) -> Option<u64> {
        since(self.reasoning_end_time, self.reasoning_start_time)
    }

    pub fn total_duration_ms(&self) -> Option<u64> {
        since(self.end_time, self.start_time)
    }

    /// Answer deltas per second, measured from the first answer token to the end.
    pub fn answer_tokens_per_second(&self) -> Option<f64> {
        let window = since(self.end_time, self.first_answer_token_time)?;
        if window == 0 || self.answer_token_count == 0 {
            return None;
        }
        Some(self.answer_token_count as f64 * 1000.0 / window as f64)
    }
}

/// Updates [`SessionStats`] per classified delta. Timestamps derive from a
/// monotonic clock anchored at `start_time`, so they never run backwards
/// even if the wall clock does.
#[derive(Debug)]
pub struct StatsAccumulator {
    stats: SessionStats,
    origin: Instant,
    in_reasoning: bool,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAccumulator {
    pub fn new() -> Self {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            stats: SessionStats {
                start_time,
                ..Default::default()
            },
            origin: Instant::now(),
            in_reasoning: false,
        }
    }

    fn now_ms(&self) -> u64 {
        self.stats.start_time + self.origin.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self) -> SessionStats {
        self.stats.clone()
    }

    /// Fold one delta into the stats. Deltas whose stripped text is empty
    /// (marker-only or finish-only) move segment times and the terminal
    /// reason but count no token.
    pub fn record(
        &mut self,
        delta: &ClassifiedDelta,
        transition: SegmentTransition,
        terminal_reason: Option<&str>,
    ) {
        let now = self.now_ms();

        if transition.opened && !self.in_reasoning {
            self.stats.reasoning_start_time = now;
            self.in_reasoning = true;
        }

        if !delta.text.is_empty() {
            if self.stats.first_token_time == 0 {
                self.stats.first_token_time = now;
            }
            self.stats.total_token_count += 1;
            if delta.is_reasoning {
                self.stats.reasoning_token_count += 1;
            } else {
                self.stats.answer_token_count += 1;
                if self.stats.first_answer_token_time == 0 {
                    self.stats.first_answer_token_time = now;
                }
            }
        }

        if transition.closed {
            self.stats.reasoning_end_time = now;
            self.in_reasoning = false;
        }

        if let Some(reason) = terminal_reason {
            self.stats.terminal_reason = Some(reason.to_string());
        }
    }

    /// Stamp `end_time` and hand the stats over. A reasoning segment still
    /// open at this point is closed at `end_time`.
    pub fn finish(mut self) -> SessionStats {
        let now = self.now_ms();
        self.stats.end_time = now;
        if self.in_reasoning {
            self.stats.reasoning_end_time = now;
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SegmentClassifier;

    fn feed(acc: &mut StatsAccumulator, c: &mut SegmentClassifier, raw: &str) {
        let (d, t) = c.classify(raw);
        acc.record(&d, t, None);
        let s = acc.snapshot();
        assert_eq!(s.total_token_count, s.reasoning_token_count + s.answer_token_count);
    }

    #[test]
    fn counts_split_between_reasoning_and_answer() {
        let mut acc = StatsAccumulator::new();
        let mut c = SegmentClassifier::new();
        for raw in ["Hello ", "<think>", "pondering", "</think>", " world"] {
            feed(&mut acc, &mut c, raw);
        }
        let s = acc.finish();
        assert_eq!(s.reasoning_token_count, 1);
        assert_eq!(s.answer_token_count, 2);
        assert_eq!(s.total_token_count, 3);
        assert!(s.reasoning_start_time > 0);
        assert!(s.reasoning_end_time >= s.reasoning_start_time);
    }

    #[test]
    fn timestamps_are_monotonic() {
        let mut acc = StatsAccumulator::new();
        let mut c = SegmentClassifier::new();
        for raw in ["<think>plan", "more", "</think>", "answer"] {
            feed(&mut acc, &mut c, raw);
        }
        let s = acc.finish();
        assert!(s.start_time <= s.first_token_time);
        assert!(s.first_token_time <= s.first_answer_token_time);
        assert!(s.first_answer_token_time <= s.end_time);
    }

    #[test]
    fn first_answer_time_waits_for_answer_content() {
        let mut acc = StatsAccumulator::new();
        let mut c = SegmentClassifier::new();
        feed(&mut acc, &mut c, "<think>only thoughts");
        let s = acc.snapshot();
        assert!(s.first_token_time > 0);
        assert_eq!(s.first_answer_token_time, 0);
        assert_eq!(s.time_to_first_answer_token_ms(), None);
    }

    #[test]
    fn empty_text_counts_nothing_but_keeps_reason() {
        let mut acc = StatsAccumulator::new();
        let d = ClassifiedDelta {
            text: String::new(),
            is_reasoning: false,
        };
        acc.record(&d, SegmentTransition::default(), Some("length"));
        let s = acc.snapshot();
        assert_eq!(s.total_token_count, 0);
        assert_eq!(s.first_token_time, 0);
        assert_eq!(s.terminal_reason.as_deref(), Some("length"));
    }

    #[test]
    fn unclosed_segment_is_closed_at_end() {
        let mut acc = StatsAccumulator::new();
        let mut c = SegmentClassifier::new();
        feed(&mut acc, &mut c, "<think>never closes");
        let s = acc.finish();
        assert!(s.reasoning_start_time > 0);
        assert_eq!(s.reasoning_end_time, s.end_time);
        assert!(s.reasoning_duration_ms().is_some());
    }

    #[test]
    fn serializes_camel_case_for_consumers() {
        let s = SessionStats {
            start_time: 1,
            total_token_count: 2,
            terminal_reason: Some("stop".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["startTime"], 1);
        assert_eq!(v["totalTokenCount"], 2);
        assert_eq!(v["firstAnswerTokenTime"], 0);
        assert_eq!(v["terminalReason"], "stop");
    }

    #[test]
    fn derived_rates() {
        let s = SessionStats {
            start_time: 1_000,
            first_token_time: 1_100,
            first_answer_token_time: 1_500,
            end_time: 3_500,
            answer_token_count: 40,
            ..Default::default()
        };
        assert_eq!(s.time_to_first_token_ms(), Some(100));
        assert_eq!(s.time_to_first_answer_token_ms(), Some(500));
        assert_eq!(s.total_duration_ms(), Some(2_500));
        assert_eq!(s.answer_tokens_per_second(), Some(20.0));
        assert_eq!(s.reasoning_duration_ms(), None);
    }
}
