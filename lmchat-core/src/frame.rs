//! Frame reader: byte fragments in, `data:` records out.
//!
//! Fragment boundaries are arbitrary. A partial trailing line stays buffered as
//! raw bytes until its newline arrives, so multi-byte UTF-8 sequences split
//! across fragments are decoded intact.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;
use tracing::debug;

use crate::error::{CoreResult, RelayError};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One `data:` record with the prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub payload: String,
}

/// Boxed stream of frames, as returned by the upstream client.
pub type FrameStream = Pin<Box<dyn Stream<Item = CoreResult<StreamFrame>> + Send>>;

/// Classify one complete line. Returns `None` for anything that is not a
/// forwardable data record (blank lines, comments, other SSE fields, `[DONE]`).
pub fn parse_line(line: &str) -> Option<StreamFrame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return None;
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest);
    if payload == DONE_SENTINEL {
        debug!("end-of-stream sentinel dropped");
        return None;
    }
    Some(StreamFrame {
        payload: payload.to_string(),
    })
}

/// Push-based line splitter. Feed fragments with [`FrameReader::push`], pull
/// frames with [`FrameReader::next_frame`], and call [`FrameReader::finish`]
/// once the input is exhausted.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
    // bytes of `buf` already known to hold no newline
    scanned: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &[u8]) {
        self.buf.extend_from_slice(fragment);
    }

    /// Next complete data record, skipping lines that carry none.
    pub fn next_frame(&mut self) -> Option<StreamFrame> {
        while let Some(pos) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let idx = self.scanned + pos;
            let raw: Vec<u8> = self.buf.drain(..=idx).collect();
            self.scanned = 0;
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            if let Some(frame) = parse_line(&line) {
                return Some(frame);
            }
        }
        self.scanned = self.buf.len();
        None
    }

    /// Flush an unterminated final line. Only meaningful after the input ends.
    pub fn finish(&mut self) -> Option<StreamFrame> {
        if self.buf.is_empty() {
            return None;
        }
        self.scanned = 0;
        let raw = std::mem::take(&mut self.buf);
        parse_line(&String::from_utf8_lossy(&raw))
    }

    /// Convenience for already-buffered input: split every fragment and
    /// return the frames in order, tail included.
    pub fn read_all<I, B>(fragments: I) -> Vec<StreamFrame>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut reader = Self::new();
        let mut out = Vec::new();
        for fragment in fragments {
            reader.push(fragment.as_ref());
            while let Some(frame) = reader.next_frame() {
                out.push(frame);
            }
        }
        out.extend(reader.finish());
        out
    }
}

type ByteStream<E> = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, E>> + Send>>;

/// Adapts a byte stream (e.g. `reqwest::Response::bytes_stream`) into a lazy
/// stream of [`StreamFrame`]s. A transport error is yielded once, after which
/// the stream ends and the inner reader is dropped.
pub struct FrameDecoder<E> {
    inner: Option<ByteStream<E>>,
    reader: FrameReader,
}

impl<E> FrameDecoder<E> {
    pub fn new(inner: ByteStream<E>) -> Self {
        Self {
            inner: Some(inner),
            reader: FrameReader::new(),
        }
    }
}

impl<E: std::fmt::Display> Stream for FrameDecoder<E> {
    type Item = CoreResult<StreamFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(frame) = self.reader.next_frame() {
                return Poll::Ready(Some(Ok(frame)));
            }

            let Some(inner) = self.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.reader.push(&chunk);
                    continue;
                }
                Poll::Ready(Some(Err(e))) => {
                    self.inner = None;
                    return Poll::Ready(Some(Err(RelayError::StreamRead(e.to_string()))));
                }
                Poll::Ready(None) => {
                    self.inner = None;
                    return Poll::Ready(self.reader.finish().map(Ok));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
