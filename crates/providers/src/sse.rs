//! Line-oriented decoding of streamed HTTP bodies.
//!
//! Network chunks split the body at arbitrary byte offsets, including in the
//! middle of a multi-byte UTF-8 character. [`SseLineDecoder`] buffers raw
//! bytes and only decodes complete lines, so characters are never mangled.

use futures::{Stream, StreamExt};
use kubrick_core::error::ProviderError;
use kubrick_core::provider::{ChunkReceiver, StreamChunk};
use tokio::sync::mpsc;

/// Splits a byte stream into UTF-8 lines.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk; returns every line it completed.
    ///
    /// A `\n` byte never occurs inside a multi-byte sequence, so splitting on
    /// it before decoding is always safe.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Flush a trailing line that had no terminating newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// The payload of an SSE `data:` line.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// What a provider makes of one decoded line.
#[derive(Debug)]
pub enum LineEvent {
    Skip,
    Text(String),
    Done,
    Fail(ProviderError),
}

/// Drive a byte stream on a background task, turning lines into chunks.
///
/// The receiver always ends with a `done` chunk or an error.
pub fn spawn_line_stream<S, B, E, F>(body: S, mut on_line: F) -> ChunkReceiver
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
    F: FnMut(&str) -> LineEvent + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut body = body;
        let mut decoder = SseLineDecoder::new();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                    return;
                }
            };
            for line in decoder.push(bytes.as_ref()) {
                if !forward(&tx, on_line(&line)).await {
                    return;
                }
            }
        }

        if let Some(line) = decoder.finish()
            && !forward(&tx, on_line(&line)).await
        {
            return;
        }
        let _ = tx.send(Ok(StreamChunk::done())).await;
    });

    rx
}

/// Returns false once the stream is finished or the receiver is gone.
async fn forward(
    tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    event: LineEvent,
) -> bool {
    match event {
        LineEvent::Skip => true,
        LineEvent::Text(text) if text.is_empty() => true,
        LineEvent::Text(text) => tx.send(Ok(StreamChunk::text(text))).await.is_ok(),
        LineEvent::Done => {
            let _ = tx.send(Ok(StreamChunk::done())).await;
            false
        }
        LineEvent::Fail(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}
