//! JSON-RPC wire format spoken with the display hub
//!
//! Requests carry the page container structures the device firmware expects
//! (`textObject` / `listObject` arrays with camelCase geometry). Device input
//! arrives as `evenHubEvent` notifications whose params are the raw event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::time::Instant;

use lensmirror_core::{Element, ElementId, PageDescription, RawDeviceEvent};

pub const METHOD_STARTUP_PAGE: &str = "createStartUpPageContainer";
pub const METHOD_REBUILD_PAGE: &str = "rebuildPageContainer";
pub const METHOD_TEXT_UPGRADE: &str = "textContainerUpgrade";
pub const NOTIFICATION_DEVICE_EVENT: &str = "evenHubEvent";

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    format!("lm-{}", REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HubRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl HubRequest {
    pub fn new(id: String, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubResponse {
    pub id: Option<String>,
    pub result: Option<Value>,
    pub error: Option<HubError>,
}

/// A message received from the hub, classified.
#[derive(Debug)]
pub enum HubMessage {
    Response(HubResponse),
    DeviceEvent(RawDeviceEvent),
    Unknown(String),
}

/// Classify a text frame from the hub.
///
/// Responses have an `id`; device events are `evenHubEvent` notifications.
/// Anything else (including malformed JSON) is `Unknown`.
pub fn parse_hub_message(text: &str) -> HubMessage {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return HubMessage::Unknown(text.to_string()),
    };

    if value.get("method").and_then(Value::as_str) == Some(NOTIFICATION_DEVICE_EVENT) {
        let params = value.get("params").cloned().unwrap_or(Value::Null);
        return HubMessage::DeviceEvent(RawDeviceEvent::new(params));
    }

    if value.get("id").is_some() {
        let id = match value.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        return HubMessage::Response(HubResponse {
            id,
            result: value.get("result").cloned(),
            error: value
                .get("error")
                .cloned()
                .and_then(|e| serde_json::from_value(e).ok()),
        });
    }

    HubMessage::Unknown(text.to_string())
}

// ---------------------------------------------------------------------------
// Page encoding
// ---------------------------------------------------------------------------

/// Encode a page into the container structure used by startup and rebuild.
pub fn page_params(page: &PageDescription) -> Value {
    let mut texts = Vec::new();
    let mut lists = Vec::new();

    for element in &page.elements {
        match element {
            Element::Text(t) => texts.push(json!({
                "containerID": t.id.id,
                "containerName": t.id.name,
                "content": t.content,
                "xPosition": t.rect.x,
                "yPosition": t.rect.y,
                "width": t.rect.width,
                "height": t.rect.height,
                "isEventCapture": u8::from(t.event_capture),
            })),
            Element::List(l) => lists.push(json!({
                "containerID": l.id.id,
                "containerName": l.id.name,
                "itemContainer": {
                    "itemCount": l.items.len(),
                    "itemWidth": l.item_width,
                    "isItemSelectBorderEn": u8::from(l.select_border),
                    "itemName": l.items,
                },
                "xPosition": l.rect.x,
                "yPosition": l.rect.y,
                "width": l.rect.width,
                "height": l.rect.height,
                "isEventCapture": u8::from(l.event_capture),
            })),
        }
    }

    json!({
        "containerTotalNum": page.elements.len(),
        "textObject": texts,
        "listObject": lists,
    })
}

/// Encode an in-place text replacement.
pub fn text_upgrade_params(element: &ElementId, content: &str) -> Value {
    json!({
        "containerID": element.id,
        "containerName": element.name,
        "contentOffset": 0,
        "contentLength": content.chars().count(),
        "content": content,
    })
}

// ---------------------------------------------------------------------------
// Request tracking
// ---------------------------------------------------------------------------

struct PendingRequest {
    response_tx: oneshot::Sender<HubResponse>,
    created_at: Instant,
}

/// Correlates request ids with the callers waiting on them.
#[derive(Default)]
pub struct RequestTracker {
    pending: HashMap<String, PendingRequest>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> (String, oneshot::Receiver<HubResponse>) {
        let id = next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id.clone(),
            PendingRequest {
                response_tx: tx,
                created_at: Instant::now(),
            },
        );
        (id, rx)
    }

    /// Route a response; `false` if nothing was waiting for `id`.
    pub fn complete(&mut self, id: &str, response: HubResponse) -> bool {
        match self.pending.remove(id) {
            Some(pending) => {
                let _ = pending.response_tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Drop requests older than `timeout`, returning their ids.
    pub fn cleanup_stale(&mut self, timeout: Duration) -> Vec<String> {
        let now = Instant::now();
        let stale: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, req)| now.duration_since(req.created_at) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.pending.remove(id);
        }
        stale
    }

    /// Fail every outstanding request (their receivers see a closed channel).
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
