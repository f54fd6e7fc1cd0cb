//! Decoding and pumping of the statuses/filter stream.
//!
//! The server sends one JSON message per `\r\n`-terminated line, plus blank
//! keep-alive lines during quiet periods. [`decode_events`] turns the raw body
//! into [`StreamEvent`]s and [`FilterStream::spawn`] moves them onto a bounded
//! channel from a background task until the body ends or the stream is stopped.
//! Nothing here reconnects: a closed connection ends the event sequence.
use crate::twitter::types::{Disconnect, StallWarning, Tweet};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Capacity of the channel between the pump and the consumer.
pub const EVENT_BUFFER: usize = 1024;

/// Top-level keys of the non-tweet messages the filter endpoint documents.
const KNOWN_KINDS: &[&str] = &[
    "delete",
    "scrub_geo",
    "limit",
    "status_withheld",
    "user_withheld",
    "warning",
    "friends",
    "friends_str",
    "event",
    "direct_message",
    "control",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    pub text: String,
    pub author: Option<String>,
}

impl From<Tweet> for Post {
    fn from(tweet: Tweet) -> Self {
        Self {
            id: tweet.id,
            text: tweet.body().to_string(),
            author: tweet.user.map(|u| u.screen_name),
        }
    }
}

/// One inbound item from the filtered stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Post(Post),
    /// Read failure, undecodable message, or a server error/disconnect notice.
    Error(String),
    /// Well-formed payload of a kind the monitor does not act on.
    Unrecognized(String),
}

/// Decode one stream line. Returns `None` for keep-alive blank lines.
pub fn decode_message(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        tracing::trace!("stream.keep_alive");
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Some(StreamEvent::Error(format!("undecodable stream message: {e}"))),
    };

    let is_tweet = value.get("id").is_some()
        && (value.get("text").is_some() || value.get("full_text").is_some());
    if is_tweet {
        return Some(match serde_json::from_value::<Tweet>(value) {
            Ok(tweet) => StreamEvent::Post(tweet.into()),
            Err(e) => StreamEvent::Error(format!("malformed tweet: {e}")),
        });
    }

    let Some(obj) = value.as_object() else {
        return Some(StreamEvent::Unrecognized(json_kind(&value).to_string()));
    };

    if let Some(raw) = obj.get("disconnect") {
        let d: Disconnect = serde_json::from_value(raw.clone()).unwrap_or_default();
        return Some(StreamEvent::Error(format!(
            "server disconnect (code {}): {}",
            d.code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            d.reason.unwrap_or_else(|| "no reason given".into())
        )));
    }

    if let Some(errors) = obj.get("errors") {
        let message = errors
            .get(0)
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown stream error");
        return Some(StreamEvent::Error(message.to_string()));
    }

    if let Some(raw) = obj.get("warning") {
        let w: StallWarning = serde_json::from_value(raw.clone()).unwrap_or_default();
        tracing::warn!(
            code = ?w.code,
            percent_full = ?w.percent_full,
            message = w.message.as_deref().unwrap_or("-"),
            "stream.stall_warning"
        );
    }

    let kind = KNOWN_KINDS
        .iter()
        .find(|k| obj.contains_key(**k))
        .map(|k| k.to_string())
        .or_else(|| obj.keys().next().cloned())
        .unwrap_or_else(|| "empty object".to_string());
    Some(StreamEvent::Unrecognized(kind))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Splits a chunked byte body into complete lines.
#[derive(Default)]
struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}

/// Turn a raw chunked body into decoded events.
///
/// A read error is reported as one final [`StreamEvent::Error`] and ends the
/// sequence.
pub fn decode_events<S, B, E>(body: S) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut body = Box::pin(body);
        let mut splitter = LineSplitter::default();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in splitter.push(bytes.as_ref()) {
                        if let Some(event) = decode_message(&line) {
                            yield event;
                        }
                    }
                }
                Err(e) => {
                    yield StreamEvent::Error(format!("stream read failed: {e}"));
                    return;
                }
            }
        }
        if let Some(event) = splitter.finish().as_deref().and_then(decode_message) {
            yield event;
        }
    }
}

/// An open filtered stream: the event receiver plus the means to stop it.
pub struct FilterStream {
    events: mpsc::Receiver<StreamEvent>,
    stopper: StreamStopper,
}

impl FilterStream {
    /// Start pumping `body` into a fresh channel on a background task.
    pub fn spawn<S, B, E>(body: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump(decode_events(body), tx, cancel.clone()));
        Self {
            events,
            stopper: StreamStopper { cancel, pump },
        }
    }

    pub fn into_parts(self) -> (mpsc::Receiver<StreamEvent>, StreamStopper) {
        (self.events, self.stopper)
    }
}

/// Stops the pump. Consumed by [`StreamStopper::stop`], so a stream can only
/// be stopped once and cannot be used afterwards.
pub struct StreamStopper {
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl StreamStopper {
    /// Cancel the pump and wait for it to release the connection. Once this
    /// returns the sender is dropped and the receiver sees the channel close
    /// after draining what was already buffered.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.pump.await {
            tracing::warn!(error = %e, "stream pump did not exit cleanly");
        }
        tracing::info!("stream.stopped");
    }

    /// Whether the pump already exited because the server closed the stream.
    pub fn is_finished(&self) -> bool {
        self.pump.is_finished()
    }
}

async fn pump<S>(events: S, tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken)
where
    S: Stream<Item = StreamEvent> + Send,
{
    let mut events = Box::pin(events);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = events.next() => next,
        };
        let Some(event) = next else {
            tracing::info!("stream.closed_by_server");
            return;
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = tx.send(event) => {
                if sent.is_err() {
                    tracing::debug!("stream consumer dropped; stopping pump");
                    return;
                }
            }
        }
    }
}
