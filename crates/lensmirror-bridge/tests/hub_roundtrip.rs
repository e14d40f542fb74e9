//! Hub transport against a local WebSocket hub
//!
//! Run with: cargo test -p lensmirror-bridge --test hub_roundtrip

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use lensmirror_bridge::{Connector, DisplayTransport, HubConnector};
use lensmirror_core::{
    lifecycle, normalize, CanonicalGesture, Element, ElementId, LifecycleSignal, PageDescription,
    Rect,
};

// ─────────────────────────────────────────────────────────
// Fake hub
// ─────────────────────────────────────────────────────────

struct FakeHub {
    url: String,
    requests: mpsc::UnboundedReceiver<Value>,
}

/// Accept one client. Sends `greeting` first (if any), answers each request
/// with `answer(method)`, and drops the socket after `close_after` requests.
async fn fake_hub(
    greeting: Option<Value>,
    answer: fn(&str) -> Value,
    close_after: Option<usize>,
) -> FakeHub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, requests) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        if let Some(greeting) = greeting {
            ws.send(WsMessage::Text(greeting.to_string().into()))
                .await
                .unwrap();
        }

        let mut handled = 0;
        while let Some(Ok(frame)) = ws.next().await {
            let WsMessage::Text(text) = frame else {
                continue;
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let method = request["method"].as_str().unwrap_or_default().to_string();
            let reply = json!({ "jsonrpc": "2.0", "id": request["id"], "result": answer(&method) });
            let _ = tx.send(request);
            ws.send(WsMessage::Text(reply.to_string().into()))
                .await
                .unwrap();

            handled += 1;
            if Some(handled) == close_after {
                break;
            }
        }
    });

    FakeHub {
        url: format!("ws://{}", addr),
        requests,
    }
}

fn accept_all(_method: &str) -> Value {
    json!(true)
}

fn reject_text_upgrades(method: &str) -> Value {
    if method == "textContainerUpgrade" {
        json!(false)
    } else {
        json!(0)
    }
}

fn title() -> ElementId {
    ElementId::new(1, "title")
}

fn page() -> PageDescription {
    PageDescription::new(vec![Element::text(
        title(),
        Rect::new(0, 0, 200, 40),
        "Hello",
    )
    .capturing()])
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_startup_render_and_text_upgrade() {
    let mut hub = fake_hub(None, accept_all, None).await;
    let link = HubConnector::new(hub.url.clone()).acquire().await.unwrap();

    link.transport.full_render(&page(), true).await.unwrap();
    assert!(link.transport.partial_update(&title(), "Hi").await.unwrap());
    link.transport.full_render(&page(), false).await.unwrap();

    let startup = hub.requests.recv().await.unwrap();
    assert_eq!(startup["method"], "createStartUpPageContainer");
    assert_eq!(startup["params"]["containerTotalNum"], 1);
    assert_eq!(startup["params"]["textObject"][0]["content"], "Hello");
    assert_eq!(startup["params"]["textObject"][0]["isEventCapture"], 1);

    let upgrade = hub.requests.recv().await.unwrap();
    assert_eq!(upgrade["method"], "textContainerUpgrade");
    assert_eq!(upgrade["params"]["content"], "Hi");
    assert_eq!(upgrade["params"]["contentLength"], 2);

    let rebuild = hub.requests.recv().await.unwrap();
    assert_eq!(rebuild["method"], "rebuildPageContainer");
}

#[tokio::test]
async fn test_rejected_text_upgrade_reports_false() {
    let hub = fake_hub(None, reject_text_upgrades, None).await;
    let link = HubConnector::new(hub.url.clone()).acquire().await.unwrap();

    link.transport.full_render(&page(), true).await.unwrap();
    assert!(!link.transport.partial_update(&title(), "Hi").await.unwrap());
}

#[tokio::test]
async fn test_device_events_are_forwarded() {
    let greeting = json!({
        "jsonrpc": "2.0",
        "method": "evenHubEvent",
        "params": { "listEvent": { "eventType": "SCROLL_BOTTOM_EVENT", "currentSelectItemIndex": 1 } }
    });
    let hub = fake_hub(Some(greeting), accept_all, None).await;
    let mut link = HubConnector::new(hub.url.clone()).acquire().await.unwrap();

    let raw = link.events.recv().await.unwrap();
    assert_eq!(normalize(&raw), CanonicalGesture::Next);
    assert!(raw.is_list_shaped());
}

#[tokio::test]
async fn test_lost_hub_emits_abnormal_exit() {
    let hub = fake_hub(None, accept_all, Some(1)).await;
    let mut link = HubConnector::new(hub.url.clone()).acquire().await.unwrap();

    link.transport.full_render(&page(), true).await.unwrap();

    let raw = link.events.recv().await.unwrap();
    assert_eq!(lifecycle(&raw), Some(LifecycleSignal::AbnormalExit));
    assert!(link.transport.partial_update(&title(), "x").await.is_err());
}

#[tokio::test]
async fn test_close_ends_link_without_abnormal_exit() {
    let hub = fake_hub(None, accept_all, None).await;
    let mut link = HubConnector::new(hub.url.clone()).acquire().await.unwrap();

    link.transport.full_render(&page(), true).await.unwrap();
    link.transport.close().await;

    assert!(link.events.recv().await.is_none());
    assert!(!link.transport.is_connected());
    assert!(link.transport.partial_update(&title(), "x").await.is_err());
}
