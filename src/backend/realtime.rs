//! Realtime subscription over the backend's server-sent-events channel.
//!
//! Handshake: opening `/api/realtime` yields a `PB_CONNECT` frame announcing
//! a client id; posting the topic list against that id activates the
//! subscription on the open connection. Record changes then arrive as frames
//! named by topic.

use super::{Client, Error, Record, REQUEST_TIMEOUT};
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::pin::Pin;
use tracing::{debug, info_span, Instrument};

const REALTIME_PATH: &str = "/api/realtime";
const CONNECT_EVENT: &str = "PB_CONNECT";

/// One change on a subscribed collection.
#[derive(Clone, Debug, Deserialize)]
pub struct RealtimeEvent {
    /// `create`, `update` or `delete`.
    pub action: String,
    pub record: Record,
}

#[derive(Debug, Deserialize)]
struct ConnectPayload {
    #[serde(rename = "clientId")]
    client_id: String,
}

/// One server-sent-events frame: its event name and joined data lines.
#[derive(Debug, PartialEq)]
struct SseFrame {
    event: String,
    data: String,
}

// Incremental frame parser over a byte stream. Lines may split anywhere
// across chunks; `id:`, `retry:` and comment lines are ignored.
struct SseFrames<S> {
    inner: S,
    buffer: Vec<u8>,
    event: String,
    data: String,
}

impl<S, B> SseFrames<S>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            event: String::new(),
            data: String::new(),
        }
    }

    async fn next(&mut self) -> Option<Result<SseFrame, Error>> {
        loop {
            while let Some(line) = self.take_line() {
                if line.is_empty() {
                    if let Some(frame) = self.flush() {
                        return Some(Ok(frame));
                    }
                    continue;
                }
                self.field(&line);
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(error)) => return Some(Err(Error::Unreachable(error))),
                None => return None,
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|&byte| byte == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn field(&mut self, line: &str) {
        if let Some(value) = line.strip_prefix("event:") {
            self.event = value.strip_prefix(' ').unwrap_or(value).to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    fn flush(&mut self) -> Option<SseFrame> {
        if self.event.is_empty() && self.data.is_empty() {
            return None;
        }

        let event = if self.event.is_empty() {
            "message".to_string()
        } else {
            std::mem::take(&mut self.event)
        };

        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data),
        })
    }
}

/// A live subscription: decoded events for one topic.
pub struct Subscription {
    topic: String,
    frames: Pin<Box<dyn Stream<Item = Result<SseFrame, Error>> + Send>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    fn new<S, B>(topic: String, frames: SseFrames<S>) -> Self
    where
        S: Stream<Item = Result<B, reqwest::Error>> + Unpin + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
    {
        let raw = async_stream::stream! {
            let mut frames = frames;
            while let Some(frame) = frames.next().await {
                yield frame;
            }
        };

        Self {
            topic,
            frames: Box::pin(raw),
        }
    }

    /// Next decoded change on the subscribed topic.
    ///
    /// Frames for other topics and keep-alive noise are skipped. `None` means
    /// the backend closed the stream.
    pub async fn next_event(&mut self) -> Option<Result<RealtimeEvent, Error>> {
        while let Some(frame) = self.frames.next().await {
            match frame {
                Ok(frame) if frame.event == self.topic => {
                    match serde_json::from_str::<RealtimeEvent>(&frame.data) {
                        Ok(event) => return Some(Ok(event)),
                        Err(error) => {
                            debug!("Skipping undecodable realtime frame: {error}");
                        }
                    }
                }
                Ok(_) => {}
                Err(error) => return Some(Err(error)),
            }
        }

        None
    }
}

impl Client {
    /// Subscribe to every record change in `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be opened, the connect
    /// announcement never arrives, or the topic registration is rejected.
    pub async fn subscribe(&self, collection: &str) -> Result<Subscription, Error> {
        let url = self.endpoint(REALTIME_PATH);
        let span = info_span!("backend_subscribe", collection);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .instrument(span)
            .await
            .map_err(Error::Unreachable)?;

        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }

        let mut frames = SseFrames::new(response.bytes_stream());
        let client_id =
            match tokio::time::timeout(REQUEST_TIMEOUT, wait_for_connect(&mut frames)).await {
                Ok(client_id) => client_id?,
                Err(_) => return Err(Error::Timeout(REQUEST_TIMEOUT)),
            };

        let topic = format!("{collection}/*");
        let body = serde_json::json!({
            "clientId": client_id,
            "subscriptions": [topic],
        });

        let response = self.send(self.http.post(&url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }

        debug!(client_id, topic, "Realtime subscription active");
        Ok(Subscription::new(topic, frames))
    }
}

async fn wait_for_connect<S, B>(frames: &mut SseFrames<S>) -> Result<String, Error>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        if frame.event == CONNECT_EVENT {
            let payload: ConnectPayload = serde_json::from_str(&frame.data)
                .map_err(|error| Error::Protocol(format!("bad connect payload: {error}")))?;
            return Ok(payload.client_id);
        }
    }

    Err(Error::Protocol(
        "stream ended before connect announcement".to_string(),
    ))
}
