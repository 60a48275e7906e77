//! Decode pipeline for one response and the events it sends outward.
//!
//! Contract:
//! - 0..n content events in frame arrival order, then exactly one event with
//!   `completed = true`. Nothing follows the completion event.
//! - When reasoning is hidden, reasoning deltas still feed the stats but never
//!   produce an event.
//! - A consumer that goes away stops emission only. Decoding continues to the
//!   end of the upstream stream so the final stats cover the whole response.

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::classifier::{ClassifiedDelta, SegmentClassifier, SegmentState};
use crate::delta::{extract_delta, ContentDelta};
use crate::error::{CoreResult, RelayError};
use crate::frame::StreamFrame;
use crate::stats::{SessionStats, StatsAccumulator};

/// One newline-delimited JSON record sent to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub content: String,
    pub is_thinking: bool,
    pub stats: SessionStats,
    pub completed: bool,
}

impl SessionEvent {
    pub fn completion(stats: SessionStats) -> Self {
        Self {
            content: String::new(),
            is_thinking: false,
            stats,
            completed: true,
        }
    }

    /// Serialize as one NDJSON line, trailing newline included.
    pub fn to_ndjson(&self) -> CoreResult<String> {
        let mut line = serde_json::to_string(self).map_err(|e| RelayError::Other(e.into()))?;
        line.push('\n');
        Ok(line)
    }
}

/// Sends events to one consumer. Once a send fails the emitter stays closed
/// and drops everything else silently.
#[derive(Debug)]
pub struct SessionEmitter {
    tx: mpsc::Sender<SessionEvent>,
    show_reasoning: bool,
    closed: bool,
    completed: bool,
}

impl SessionEmitter {
    pub fn new(tx: mpsc::Sender<SessionEvent>, show_reasoning: bool) -> Self {
        Self {
            tx,
            show_reasoning,
            closed: false,
            completed: false,
        }
    }

    /// Bounded channel plus emitter, the usual way to start a session.
    pub fn channel(capacity: usize, show_reasoning: bool) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, show_reasoning), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.tx.is_closed()
    }

    async fn send(&mut self, event: SessionEvent) {
        if self.is_closed() {
            self.closed = true;
            return;
        }
        if self.tx.send(event).await.is_err() {
            debug!("consumer closed; suppressing further events");
            self.closed = true;
        }
    }

    pub async fn emit_delta(&mut self, delta: ClassifiedDelta, stats: SessionStats) {
        if self.completed || (delta.is_reasoning && !self.show_reasoning) {
            return;
        }
        self.send(SessionEvent {
            content: delta.text,
            is_thinking: delta.is_reasoning,
            stats,
            completed: false,
        })
        .await;
    }

    /// Emit the terminal event. Later calls are no-ops.
    pub async fn complete(&mut self, stats: SessionStats) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.send(SessionEvent::completion(stats)).await;
    }
}

/// Per-response pipeline state: classifier, stats and emitter threaded
/// through every delta.
#[derive(Debug)]
pub struct DecodeSession {
    classifier: SegmentClassifier,
    stats: StatsAccumulator,
    emitter: SessionEmitter,
}

impl DecodeSession {
    pub fn new(emitter: SessionEmitter) -> Self {
        Self {
            classifier: SegmentClassifier::new(),
            stats: StatsAccumulator::new(),
            emitter,
        }
    }

    pub fn segment_state(&self) -> SegmentState {
        self.classifier.state()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.snapshot()
    }

    pub fn consumer_gone(&self) -> bool {
        self.emitter.is_closed()
    }

    pub async fn on_frame(&mut self, frame: &StreamFrame) {
        if let Some(delta) = extract_delta(frame) {
            self.on_delta(delta).await;
        }
    }

    pub async fn on_delta(&mut self, delta: ContentDelta) {
        let (classified, transition) = self.classifier.classify(&delta.text);
        self.stats
            .record(&classified, transition, delta.terminal_reason.as_deref());
        if classified.text.is_empty() {
            return;
        }
        let snapshot = self.stats.snapshot();
        self.emitter.emit_delta(classified, snapshot).await;
    }

    /// Finalize stats, send the completion event and return the stats.
    pub async fn finish(self) -> SessionStats {
        let Self { stats, mut emitter, .. } = self;
        let stats = stats.finish();
        emitter.complete(stats.clone()).await;
        stats
    }
}

/// Run a session to completion over a frame stream. The stream is owned here
/// and dropped on every exit path, releasing the upstream connection.
///
/// A closed consumer does not end the loop: frames keep flowing through the
/// classifier and stats, only the sends are skipped. A read failure mid-stream
/// still finalizes the session (completion event included); the error comes
/// back next to the final stats.
pub async fn drive<S>(frames: S, mut session: DecodeSession) -> (SessionStats, Option<RelayError>)
where
    S: Stream<Item = CoreResult<StreamFrame>> + Send,
{
    let mut frames = Box::pin(frames);
    let mut failure = None;
    let mut announced_gone = false;

    loop {
        if !announced_gone && session.consumer_gone() {
            debug!("consumer gone; decoding continues without emission");
            announced_gone = true;
        }
        match frames.next().await {
            Some(Ok(frame)) => session.on_frame(&frame).await,
            Some(Err(e)) => {
                error!(error = %e, "upstream stream broke off");
                failure = Some(e);
                break;
            }
            None => break,
        }
    }

    drop(frames);
    (session.finish().await, failure)
}
