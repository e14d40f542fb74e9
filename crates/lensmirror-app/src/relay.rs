//! Notification relay subscription
//!
//! The relay publishes notifications as server-sent events. Each event's
//! `data:` payload is a JSON [`Notification`]; the first one after
//! subscribing is a `{"type":"connected"}` handshake. Records are handed to
//! the engine as [`LocalAction::Notify`] so the notif app applies its
//! allow-list and stores them like any other notification.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use lensmirror_core::prelude::*;

use crate::action::LocalAction;
use crate::apps::notif::Notification;
use crate::config::ReconnectSettings;
use crate::message::Message;

const KIND_CONNECTED: &str = "connected";
const RELAY_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Incremental SSE parser. Feed it raw body chunks in arrival order; it
/// returns the data payload of every event completed by that chunk.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Comments (`:`) and `event:`/`id:`/`retry:` fields are ignored.
        }
        events
    }
}

/// Notification carried by one event payload. Handshakes and payloads that
/// are not notification records yield `None`.
pub fn parse_event(data: &str) -> Option<Notification> {
    match serde_json::from_str::<Notification>(data) {
        Ok(n) if n.kind.as_deref() == Some(KIND_CONNECTED) => {
            debug!("Notification relay handshake received");
            None
        }
        Ok(n) => Some(n),
        Err(e) => {
            debug!("Ignoring relay event {:?}: {}", data, e);
            None
        }
    }
}

/// Check that `raw` is an http(s) URL.
pub fn validate_relay_url(raw: &str) -> Result<url::Url> {
    let url = url::Url::parse(raw)
        .map_err(|e| Error::config(format!("invalid relay URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "unsupported relay scheme '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Subscribe to the relay until the engine goes away.
///
/// A dropped or refused subscription is retried after `[reconnect]
/// delay_ms`, and never more than once per `cooldown_ms`. With reconnects
/// disabled the task ends after the first subscription ends.
pub fn spawn_relay(
    url: url::Url,
    retry: &ReconnectSettings,
    tx: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    let enabled = retry.enabled;
    let delay = Duration::from_millis(retry.delay_ms);
    let cooldown = Duration::from_millis(retry.cooldown_ms);

    tokio::spawn(async move {
        let client = relay_client();
        loop {
            let started = Instant::now();
            match subscribe(&client, &url, &tx).await {
                Ok(()) => info!("Notification relay stream ended"),
                Err(e) => warn!("Notification relay unavailable: {}", e),
            }
            if tx.is_closed() || !enabled {
                break;
            }

            let wait = delay.max(cooldown.saturating_sub(started.elapsed()));
            debug!("Resubscribing to notification relay in {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        debug!("Notification relay task exiting");
    })
}

/// No overall timeout: the response body is open-ended.
fn relay_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(RELAY_CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build relay HTTP client: {}", e);
            reqwest::Client::new()
        })
}

async fn subscribe(
    client: &reqwest::Client,
    url: &url::Url,
    tx: &mpsc::Sender<Message>,
) -> Result<()> {
    let mut response = client
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| Error::request(e.to_string()))?;
    if !response.status().is_success() {
        return Err(Error::request(format!(
            "relay answered {}",
            response.status()
        )));
    }
    info!("Subscribed to notification relay at {}", url);

    let mut decoder = SseDecoder::default();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::request(e.to_string()))?
    {
        for data in decoder.feed(&chunk) {
            let Some(notification) = parse_event(&data) else {
                continue;
            };
            if tx
                .send(Message::Action(LocalAction::Notify(notification)))
                .await
                .is_err()
            {
                return Ok(());
            }
        }
    }
    Ok(())
}
