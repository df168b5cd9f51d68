//! Push channel (Server-Sent Events)
//!
//! One long-lived GET against the push endpoint. The byte stream is split
//! into frames by [`SseDecoder`] and forwarded, together with connection
//! status changes, over a tokio channel. The subscription does not
//! reconnect: when the stream ends it reports
//! [`SubscriptionStatus::Disconnected`] and the task exits.

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::config::Config;
use crate::client::sync::error::SyncError;
use crate::shared::messaging::EVENT_MESSAGE_NEW;

/// Capacity of the delivery channel
pub const PUSH_BUFFER: usize = 256;

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFrame {
    pub event: String,
    pub data: String,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Subscription status reported by the push task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Connecting,
    Connected,
    Error(String),
    Disconnected,
}

/// Item carried by the delivery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDelivery {
    Frame(PushFrame),
    Status(SubscriptionStatus),
}

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across chunks decode correctly. A bare JSON line
/// outside of any event is treated as a `message:new` frame.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the frames it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<PushFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..newline]);
            if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing event that was not terminated by a blank line
    pub fn finish(&mut self) -> Option<PushFrame> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).into_owned();
            if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<PushFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }
        if let Some(value) = field_value(line, "event") {
            self.event = Some(value.to_string());
            return None;
        }
        if let Some(value) = field_value(line, "data") {
            self.data.push(value.to_string());
            return None;
        }
        if line.starts_with('{') && self.event.is_none() && self.data.is_empty() {
            return Some(PushFrame::new(EVENT_MESSAGE_NEW, line));
        }
        // id:, retry: and unknown fields
        None
    }

    fn dispatch(&mut self) -> Option<PushFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(PushFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

/// Open the push subscription on a background task.
///
/// The client must not carry a total request timeout; the stream is
/// expected to stay open for the whole session.
pub fn spawn_sse_subscription(
    config: &Config,
) -> Result<(mpsc::Receiver<PushDelivery>, JoinHandle<()>), SyncError> {
    let url = config.push_url()?;
    let client = Client::builder()
        .connect_timeout(config.request_timeout())
        .build()
        .map_err(|e| SyncError::network("push-subscribe", e.to_string()))?;
    let (tx, rx) = mpsc::channel(PUSH_BUFFER);
    let handle = tokio::spawn(run_subscription(client, url, tx));
    Ok((rx, handle))
}

async fn run_subscription(client: Client, url: Url, tx: mpsc::Sender<PushDelivery>) {
    let report = |status| PushDelivery::Status(status);

    tracing::info!("[PUSH] Subscribing to {}", url);
    if tx.send(report(SubscriptionStatus::Connecting)).await.is_err() {
        return;
    }

    let response = match client
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("[PUSH] Subscription request failed: {}", e);
            let _ = tx.send(report(SubscriptionStatus::Error(format!("network: {}", e)))).await;
            let _ = tx.send(report(SubscriptionStatus::Disconnected)).await;
            return;
        }
    };

    if !response.status().is_success() {
        tracing::error!("[PUSH] Subscription rejected with status {}", response.status());
        let _ = tx
            .send(report(SubscriptionStatus::Error(format!("http: {}", response.status()))))
            .await;
        let _ = tx.send(report(SubscriptionStatus::Disconnected)).await;
        return;
    }

    tracing::info!("[PUSH] Subscription established");
    if tx.send(report(SubscriptionStatus::Connected)).await.is_err() {
        return;
    }

    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for frame in decoder.feed(&bytes) {
                    tracing::trace!(event = %frame.event, "[PUSH] Frame received");
                    if tx.send(PushDelivery::Frame(frame)).await.is_err() {
                        tracing::debug!("[PUSH] Receiver dropped, closing subscription");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::error!("[PUSH] Error reading stream: {}", e);
                let _ = tx.send(report(SubscriptionStatus::Error(format!("stream: {}", e)))).await;
                break;
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        let _ = tx.send(PushDelivery::Frame(frame)).await;
    }
    tracing::info!("[PUSH] Stream closed");
    let _ = tx.send(report(SubscriptionStatus::Disconnected)).await;
}
