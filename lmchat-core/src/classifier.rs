//! Reasoning/answer segmentation.
//!
//! Detection is delta-local: a marker is recognized only when it appears
//! whole inside one delta. A marker split across two deltas passes through
//! unrecognized (and unstripped).

use once_cell::sync::Lazy;
use regex::Regex;

pub const REASONING_OPEN: &str = "<think>";
pub const REASONING_CLOSE: &str = "</think>";

static MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "{}|{}",
        regex::escape(REASONING_OPEN),
        regex::escape(REASONING_CLOSE)
    ))
    .expect("marker pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentState {
    #[default]
    Answering,
    Reasoning,
}

/// Segment boundaries crossed while classifying one delta. Both may be set
/// when a delta opens and closes a segment at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentTransition {
    pub opened: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedDelta {
    pub text: String,
    pub is_reasoning: bool,
}

/// Remove every open/close marker in one left-to-right pass.
pub fn strip_markers(text: &str) -> String {
    MARKERS.replace_all(text, "").into_owned()
}

/// Per-session classifier. Owns the only copy of the reasoning flag.
#[derive(Debug, Default)]
pub struct SegmentClassifier {
    state: SegmentState,
}

impl SegmentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn classify(&mut self, raw: &str) -> (ClassifiedDelta, SegmentTransition) {
        let mut transition = SegmentTransition::default();
        let mut is_reasoning = self.state == SegmentState::Reasoning;

        // The marker's presence, not its position, decides the whole delta.
        if raw.contains(REASONING_OPEN) {
            if self.state == SegmentState::Answering {
                transition.opened = true;
            }
            self.state = SegmentState::Reasoning;
            is_reasoning = true;
        }

        if raw.contains(REASONING_CLOSE) && self.state == SegmentState::Reasoning {
            transition.closed = true;
            self.state = SegmentState::Answering;
        }

        let delta = ClassifiedDelta {
            text: strip_markers(raw),
            is_reasoning,
        };
        (delta, transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(deltas: &[&str]) -> (Vec<ClassifiedDelta>, SegmentClassifier) {
        let mut c = SegmentClassifier::new();
        let out = deltas.iter().map(|d| c.classify(d).0).collect();
        (out, c)
    }

    #[test]
    fn open_close_sequence_labels_reasoning() {
        let (out, c) = run(&["Hello ", "<think>", "pondering", "</think>", " world"]);
        let labels: Vec<(&str, bool)> = out
            .iter()
            .map(|d| (d.text.as_str(), d.is_reasoning))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Hello ", false),
                ("", true),
                ("pondering", true),
                ("", true),
                (" world", false)
            ]
        );
        assert_eq!(c.state(), SegmentState::Answering);
    }

    #[test]
    fn markers_glued_to_content_are_stripped() {
        let mut c = SegmentClassifier::new();
        let (d1, t1) = c.classify("<think>partial");
        assert_eq!(d1.text, "partial");
        assert!(d1.is_reasoning);
        assert!(t1.opened && !t1.closed);

        let (d2, t2) = c.classify("more</think>done");
        assert_eq!(d2.text, "moredone");
        assert!(d2.is_reasoning);
        assert!(t2.closed && !t2.opened);
        assert_eq!(c.state(), SegmentState::Answering);
    }

    #[test]
    fn both_markers_in_one_delta() {
        let mut c = SegmentClassifier::new();
        let (d, t) = c.classify("a<think>b</think>c");
        assert_eq!(d.text, "abc");
        assert!(d.is_reasoning);
        assert!(t.opened && t.closed);
        assert_eq!(c.state(), SegmentState::Answering);
    }

    #[test]
    fn stray_close_while_answering_is_stripped_without_transition() {
        let mut c = SegmentClassifier::new();
        let (d, t) = c.classify("x</think>y");
        assert_eq!(d.text, "xy");
        assert!(!d.is_reasoning);
        assert_eq!(t, SegmentTransition::default());
    }

    #[test]
    fn repeated_open_inside_segment_does_not_reopen() {
        let mut c = SegmentClassifier::new();
        let (_, t1) = c.classify("<think>");
        let (d2, t2) = c.classify("again<think>");
        assert!(t1.opened);
        assert!(!t2.opened);
        assert!(d2.is_reasoning);
        assert_eq!(d2.text, "again");
    }

    #[test]
    fn unclosed_segment_stays_reasoning() {
        let (out, c) = run(&["<think>", "a", "b", "c"]);
        assert!(out.iter().all(|d| d.is_reasoning));
        assert_eq!(c.state(), SegmentState::Reasoning);
    }

    #[test]
    fn split_marker_is_not_detected() {
        let (out, c) = run(&["<thi", "nk>inner"]);
        assert_eq!(out[0].text, "<thi");
        assert_eq!(out[1].text, "nk>inner");
        assert!(out.iter().all(|d| !d.is_reasoning));
        assert_eq!(c.state(), SegmentState::Answering);
    }

    #[test]
    fn stripping_is_single_pass() {
        // removing the inner open marker must not re-create a removable close marker
        assert_eq!(strip_markers("</<think>think>"), "</think>");
        assert_eq!(strip_markers("<think><think></think>"), "");
    }

    #[test]
    fn concatenation_matches_global_strip() {
        let deltas = [
            "Intro ",
            "<think>why",
            " because",
            "</think>",
            "So",
            " <think>x</think> done",
        ];
        let (out, _) = run(&deltas);
        let joined: String = out.iter().map(|d| d.text.as_str()).collect();
        let expected: String = deltas.iter().map(|d| strip_markers(d)).collect();
        assert_eq!(joined, expected);
        assert_eq!(joined, "Intro why becauseSo x done");
    }
}
