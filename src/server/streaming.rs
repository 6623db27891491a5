//! SSE (Server-Sent Events) streaming emulation.
//!
//! The backend answers in one piece, so the reply text is cut into word
//! groups and re-emitted as OpenAI `chat.completion.chunk` frames with a
//! short pause between them. A normal stream ends with a `finish_reason:
//! "stop"` chunk and the `[DONE]` sentinel; a failed backend call ends it
//! after a single in-band error frame instead.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::Stream;
use serde::Serialize;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::StreamingConfig;
use crate::error::GatewayError;
use crate::server::openai_api::ResponseMeta;

/// Payload of the terminal sentinel frame.
pub const DONE: &str = "[DONE]";

/// Streaming chat completion chunk (OpenAI-compatible).
#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk<'a> {
    pub id: &'a str,
    pub object: &'static str,
    pub created: u64,
    pub model: &'a str,
    pub choices: [ChunkChoice<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice<'a> {
    pub index: usize,
    pub delta: ChunkDelta<'a>,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ChunkDelta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<&'a str>,
}

/// In-band error payload for a stream that has already started.
#[derive(Debug, Serialize)]
pub struct StreamError<'a> {
    pub error: StreamErrorBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct StreamErrorBody<'a> {
    pub message: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

fn event<T: Serialize>(payload: &T) -> Event {
    let data = serde_json::to_string(payload).unwrap_or_default();
    Event::default().data(data)
}

fn chunk_frame(
    meta: &ResponseMeta,
    content: Option<&str>,
    finish_reason: Option<&'static str>,
) -> Event {
    event(&ChatCompletionChunk {
        id: &meta.id,
        object: "chat.completion.chunk",
        created: meta.created,
        model: &meta.model,
        choices: [ChunkChoice {
            index: 0,
            delta: ChunkDelta { content },
            finish_reason,
        }],
    })
}

fn error_frame(message: &str) -> Event {
    event(&StreamError {
        error: StreamErrorBody {
            message,
            kind: "server_error",
        },
    })
}

/// Split `text` into consecutive groups of up to `chunk_words` words.
///
/// Each group is a slice of `text` running up to the first word of the next
/// group, so the pieces concatenate back to the input exactly. Leading
/// whitespace rides on the first group, trailing whitespace on the last.
/// Text with no words yields no groups.
pub fn split_chunks(text: &str, chunk_words: usize) -> Vec<&str> {
    let chunk_words = chunk_words.max(1);

    let mut starts = Vec::new();
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            starts.push(i);
        }
    }
    if starts.is_empty() {
        return Vec::new();
    }

    let mut bounds: Vec<usize> = starts.iter().step_by(chunk_words).copied().collect();
    bounds[0] = 0;
    bounds.push(text.len());

    bounds.windows(2).map(|w| &text[w[0]..w[1]]).collect()
}

/// Paces frames with a ticker; `None` when pacing is disabled.
fn pacer(delay: Duration) -> Option<Interval> {
    if delay.is_zero() {
        return None;
    }
    let mut ticker = interval(delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn pace(ticker: &mut Option<Interval>) {
    if let Some(ticker) = ticker {
        ticker.tick().await;
    }
}

/// Turns canonical text into a paced stream of SSE frames.
#[derive(Debug, Clone)]
pub struct ChunkStreamer {
    chunk_words: usize,
    delay: Duration,
    chunks_emitted: prometheus::IntCounter,
}

impl ChunkStreamer {
    pub fn new(config: &StreamingConfig, chunks_emitted: prometheus::IntCounter) -> Self {
        Self {
            chunk_words: config.chunk_words.max(1),
            delay: config.chunk_delay(),
            chunks_emitted,
        }
    }

    /// Stream the text produced by `text` as framed completion chunks.
    ///
    /// `text` is only polled once the stream is, so the backend call runs
    /// after the response headers are committed. Dropping the stream stops
    /// emission at the next frame.
    pub fn stream<F>(
        &self,
        meta: ResponseMeta,
        text: F,
    ) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static
    where
        F: Future<Output = Result<String, GatewayError>> + Send + 'static,
    {
        let chunk_words = self.chunk_words;
        let delay = self.delay;
        let chunks_emitted = self.chunks_emitted.clone();

        async_stream::stream! {
            let text = match text.await {
                Ok(text) => text,
                Err(e) => {
                    warn!(request_id = %meta.id, error = %e, "Stream aborted");
                    yield Ok(error_frame(&e.to_string()));
                    return;
                }
            };

            let mut ticker = pacer(delay);
            let mut chunks = 0usize;
            for piece in split_chunks(&text, chunk_words) {
                pace(&mut ticker).await;
                chunks_emitted.inc();
                chunks += 1;
                yield Ok(chunk_frame(&meta, Some(piece), None));
            }

            pace(&mut ticker).await;
            yield Ok(chunk_frame(&meta, None, Some("stop")));
            yield Ok(Event::default().data(DONE));

            debug!(request_id = %meta.id, chunks, "Stream complete");
        }
    }
}
