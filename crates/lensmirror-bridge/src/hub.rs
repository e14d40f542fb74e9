//! WebSocket client for the display hub.
//!
//! The [`HubConnector`] opens a WebSocket to the hub, spawns a background
//! task that owns the socket, and hands back a [`HubTransport`] for render
//! requests plus a receiver of device events.
//!
//! ```text
//!   HubTransport ──cmd chan──▶ background task ──▶ WebSocket
//!        ▲                       │   │
//!        └── oneshot responses ──┘   └─▶ device event chan ──▶ engine
//! ```
//!
//! The transport does not reconnect on its own. When the socket goes away
//! the task emits a synthetic `ABNORMAL_EXIT_EVENT` so the owning app can
//! schedule its own debounced reconnect.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use lensmirror_core::prelude::*;
use lensmirror_core::{ElementId, PageDescription, RawDeviceEvent};

use crate::protocol::{
    page_params, parse_hub_message, text_upgrade_params, HubMessage, HubRequest, HubResponse,
    RequestTracker, METHOD_REBUILD_PAGE, METHOD_STARTUP_PAGE, METHOD_TEXT_UPGRADE,
};
use crate::transport::{BridgeLink, Connector, DisplayTransport};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const CMD_CHANNEL_CAPACITY: usize = 32;

const EVENT_CHANNEL_CAPACITY: usize = 256;

const STALE_REQUEST_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const ABNORMAL_EXIT_EVENT: &str = "ABNORMAL_EXIT_EVENT";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

enum HubCommand {
    SendRequest {
        method: &'static str,
        params: Value,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    Disconnect,
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

// ---------------------------------------------------------------------------
// HubConnector
// ---------------------------------------------------------------------------

/// Acquires a [`HubTransport`] by connecting to a hub URL.
#[derive(Debug, Clone)]
pub struct HubConnector {
    url: String,
    request_timeout: Duration,
}

impl HubConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for HubConnector {
    type Transport = HubTransport;

    fn acquire(
        &self,
    ) -> impl std::future::Future<Output = Result<BridgeLink<HubTransport>>> + Send {
        let url = self.url.clone();
        let request_timeout = self.request_timeout;
        async move {
            info!("Connecting to display hub at {}", url);
            let ws_stream = connect_ws(&url).await?;

            let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
            let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let state = Arc::new(std::sync::RwLock::new(ConnectionState::Connected));

            tokio::spawn(run_hub_task(
                ws_stream,
                cmd_rx,
                event_tx,
                Arc::clone(&state),
            ));

            Ok(BridgeLink {
                transport: Arc::new(HubTransport {
                    cmd_tx,
                    state,
                    request_timeout,
                }),
                events: event_rx,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// HubTransport
// ---------------------------------------------------------------------------

/// Render requests over an established hub connection.
pub struct HubTransport {
    cmd_tx: mpsc::Sender<HubCommand>,
    state: Arc<std::sync::RwLock<ConnectionState>>,
    request_timeout: Duration,
}

impl std::fmt::Debug for HubTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubTransport")
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

impl HubTransport {
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    async fn request(&self, method: &'static str, params: Value) -> Result<Value> {
        let (response_tx, response_rx) = oneshot::channel();

        self.cmd_tx
            .send(HubCommand::SendRequest {
                method,
                params,
                response_tx,
            })
            .await
            .map_err(|_| Error::Disconnected)?;

        let millis = self.request_timeout.as_millis() as u64;
        tokio::time::timeout(self.request_timeout, response_rx)
            .await
            .map_err(|_| Error::timeout(method, millis))?
            .map_err(|_| Error::Disconnected)?
    }
}

impl DisplayTransport for HubTransport {
    async fn full_render(&self, page: &PageDescription, startup: bool) -> Result<()> {
        let method = if startup {
            METHOD_STARTUP_PAGE
        } else {
            METHOD_REBUILD_PAGE
        };
        let result = self.request(method, page_params(page)).await?;
        // Hubs answer either `true`, `0` (success code) or an object.
        match result {
            Value::Bool(false) => Err(Error::render(format!("{method} rejected by device"))),
            Value::Number(n) if n.as_i64().is_some_and(|c| c != 0) => {
                Err(Error::render(format!("{method} failed with code {n}")))
            }
            _ => Ok(()),
        }
    }

    async fn partial_update(&self, element: &ElementId, content: &str) -> Result<bool> {
        let result = self
            .request(METHOD_TEXT_UPGRADE, text_upgrade_params(element, content))
            .await?;
        Ok(match result {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_i64() == Some(0),
            Value::Null => false,
            _ => true,
        })
    }

    async fn close(&self) {
        let _ = self.cmd_tx.send(HubCommand::Disconnect).await;
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

async fn run_hub_task(
    ws_stream: WsStream,
    mut cmd_rx: mpsc::Receiver<HubCommand>,
    event_tx: mpsc::Sender<RawDeviceEvent>,
    state: Arc<std::sync::RwLock<ConnectionState>>,
) {
    let mut tracker = RequestTracker::new();
    let lost = run_io_loop(ws_stream, &mut cmd_rx, &event_tx, &mut tracker).await;

    {
        let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
        *guard = ConnectionState::Disconnected;
    }
    tracker.clear();

    if lost {
        warn!("Display hub: connection lost");
        let _ = event_tx
            .send(RawDeviceEvent::system(ABNORMAL_EXIT_EVENT))
            .await;
    }

    debug!("Display hub background task exiting");
}

/// Returns `true` when the connection was lost, `false` on clean shutdown.
async fn run_io_loop(
    ws_stream: WsStream,
    cmd_rx: &mut mpsc::Receiver<HubCommand>,
    event_tx: &mpsc::Sender<RawDeviceEvent>,
    tracker: &mut RequestTracker,
) -> bool {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let mut cleanup_interval = tokio::time::interval(STALE_REQUEST_CLEANUP_INTERVAL);
    cleanup_interval.tick().await;

    loop {
        tokio::select! {
            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_ws_text(text.as_str(), tracker, event_tx);
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("Display hub: received Close frame");
                        return true;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("Display hub: WebSocket read error: {}", err);
                        return true;
                    }
                    None => {
                        debug!("Display hub: WebSocket stream ended");
                        return true;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(HubCommand::SendRequest { method, params, response_tx }) => {
                        handle_send_request(method, params, response_tx, tracker, &mut ws_sink).await;
                    }
                    Some(HubCommand::Disconnect) | None => {
                        send_close(&mut ws_sink).await;
                        return false;
                    }
                }
            }

            _ = cleanup_interval.tick() => {
                let stale = tracker.cleanup_stale(STALE_REQUEST_CLEANUP_INTERVAL);
                if !stale.is_empty() {
                    debug!("Display hub: dropped {} stale request(s)", stale.len());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

async fn connect_ws(url: &str) -> Result<WsStream> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|err| Error::bridge_unavailable(format!("cannot reach hub at {url}: {err}")))?;
    Ok(ws_stream)
}

fn handle_ws_text(
    text: &str,
    tracker: &mut RequestTracker,
    event_tx: &mpsc::Sender<RawDeviceEvent>,
) {
    match parse_hub_message(text) {
        HubMessage::Response(mut response) => {
            if let Some(id) = response.id.take() {
                if !tracker.complete(&id, response) {
                    debug!("Display hub: response for unknown request id {}", id);
                }
            }
        }
        HubMessage::DeviceEvent(raw) => {
            if let Err(err) = event_tx.try_send(raw) {
                warn!("Display hub: event channel full or closed, dropping event: {}", err);
            }
        }
        HubMessage::Unknown(raw) => {
            debug!(
                "Display hub: ignoring unknown message: {}",
                raw.chars().take(120).collect::<String>()
            );
        }
    }
}

async fn handle_send_request(
    method: &'static str,
    params: Value,
    response_tx: oneshot::Sender<Result<Value>>,
    tracker: &mut RequestTracker,
    ws_sink: &mut SplitSink<WsStream, WsMessage>,
) {
    let (id, response_rx) = tracker.register();
    let request = HubRequest::new(id, method, Some(params));

    let json = match serde_json::to_string(&request) {
        Ok(j) => j,
        Err(err) => {
            let _ = response_tx.send(Err(Error::protocol(format!(
                "failed to serialize {method}: {err}"
            ))));
            return;
        }
    };

    if let Err(err) = ws_sink.send(WsMessage::Text(json.into())).await {
        let _ = response_tx.send(Err(Error::transport(format!(
            "failed to send {method}: {err}"
        ))));
        return;
    }

    tokio::spawn(async move {
        let result = match response_rx.await {
            Ok(response) => response_to_result(response),
            Err(_) => Err(Error::Disconnected),
        };
        let _ = response_tx.send(result);
    });
}

fn response_to_result(response: HubResponse) -> Result<Value> {
    if let Some(error) = response.error {
        Err(Error::protocol(format!(
            "hub error {}: {}",
            error.code, error.message
        )))
    } else {
        Ok(response.result.unwrap_or(Value::Null))
    }
}

async fn send_close(ws_sink: &mut SplitSink<WsStream, WsMessage>) {
    let _ = ws_sink.send(WsMessage::Close(None)).await;
    let _ = ws_sink.close().await;
}
