//! Test utilities for display transports
//!
//! Provides a scripted transport that records every call and a scripted
//! connector whose acquisition can succeed, fail, hang or arrive late.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use lensmirror_core::prelude::*;
use lensmirror_core::{ElementId, PageDescription, RawDeviceEvent};

use crate::transport::{BridgeLink, Connector, DisplayTransport};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Full {
        page: PageDescription,
        startup: bool,
    },
    Partial {
        element: ElementId,
        content: String,
    },
}

/// Scripted answer for the next partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReply {
    Accept,
    Reject,
    Fail,
}

/// Records calls; answers partial updates from a script (default: accept).
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    calls: Mutex<Vec<TransportCall>>,
    partial_replies: Mutex<VecDeque<PartialReply>>,
    fail_full: AtomicBool,
    closed: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        let transport = Self::default();
        *lock(&transport.delay) = Some(delay);
        transport
    }

    pub fn push_partial_reply(&self, reply: PartialReply) {
        lock(&self.partial_replies).push_back(reply);
    }

    pub fn set_fail_full(&self, fail: bool) {
        self.fail_full.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn full_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, TransportCall::Full { .. }))
            .count()
    }

    pub fn partial_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, TransportCall::Partial { .. }))
            .count()
    }

    /// The page sent by the most recent full render.
    pub fn last_page(&self) -> Option<PageDescription> {
        lock(&self.calls).iter().rev().find_map(|c| match c {
            TransportCall::Full { page, .. } => Some(page.clone()),
            TransportCall::Partial { .. } => None,
        })
    }

    fn current_delay(&self) -> Option<Duration> {
        *lock(&self.delay)
    }
}

impl DisplayTransport for ScriptedTransport {
    async fn full_render(&self, page: &PageDescription, startup: bool) -> Result<()> {
        if let Some(delay) = self.current_delay() {
            tokio::time::sleep(delay).await;
        }
        lock(&self.calls).push(TransportCall::Full {
            page: page.clone(),
            startup,
        });
        if self.fail_full.load(Ordering::SeqCst) {
            return Err(Error::render("scripted full render failure"));
        }
        Ok(())
    }

    async fn partial_update(&self, element: &ElementId, content: &str) -> Result<bool> {
        if let Some(delay) = self.current_delay() {
            tokio::time::sleep(delay).await;
        }
        lock(&self.calls).push(TransportCall::Partial {
            element: element.clone(),
            content: content.to_string(),
        });
        let reply = lock(&self.partial_replies)
            .pop_front()
            .unwrap_or(PartialReply::Accept);
        match reply {
            PartialReply::Accept => Ok(true),
            PartialReply::Reject => Ok(false),
            PartialReply::Fail => Err(Error::transport("scripted partial failure")),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// How [`ScriptedConnector::acquire`] behaves.
#[derive(Debug, Clone)]
pub enum ConnectorMode {
    Ready(Arc<ScriptedTransport>),
    Fail(String),
    Hang,
    Delayed(Duration, Arc<ScriptedTransport>),
}

#[derive(Debug)]
pub struct ScriptedConnector {
    mode: Mutex<ConnectorMode>,
    attempts: Arc<AtomicUsize>,
    events_tx: Arc<Mutex<Option<mpsc::Sender<RawDeviceEvent>>>>,
}

impl ScriptedConnector {
    pub fn new(mode: ConnectorMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            attempts: Arc::new(AtomicUsize::new(0)),
            events_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn ready(transport: Arc<ScriptedTransport>) -> Self {
        Self::new(ConnectorMode::Ready(transport))
    }

    pub fn set_mode(&self, mode: ConnectorMode) {
        *lock(&self.mode) = mode;
    }

    /// Shared attempt counter, usable after the connector has been moved.
    pub fn attempts_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }

    /// Shared slot holding the sender of the latest acquired link.
    pub fn events_handle(&self) -> DeviceEventInjector {
        DeviceEventInjector {
            slot: Arc::clone(&self.events_tx),
        }
    }

    fn link(&self, transport: Arc<ScriptedTransport>) -> BridgeLink<ScriptedTransport> {
        let (tx, rx) = mpsc::channel(64);
        *lock(&self.events_tx) = Some(tx);
        BridgeLink {
            transport,
            events: rx,
        }
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn acquire(
        &self,
    ) -> impl std::future::Future<Output = Result<BridgeLink<ScriptedTransport>>> + Send {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mode = lock(&self.mode).clone();
        let link = match &mode {
            ConnectorMode::Ready(t) | ConnectorMode::Delayed(_, t) => Some(self.link(Arc::clone(t))),
            _ => None,
        };

        async move {
            match (mode, link) {
                (ConnectorMode::Ready(_), Some(link)) => Ok(link),
                (ConnectorMode::Delayed(delay, _), Some(link)) => {
                    tokio::time::sleep(delay).await;
                    Ok(link)
                }
                (ConnectorMode::Fail(reason), _) => Err(Error::bridge_unavailable(reason)),
                _ => std::future::pending().await,
            }
        }
    }
}

/// Pushes device events into the most recently acquired link.
#[derive(Debug, Clone)]
pub struct DeviceEventInjector {
    slot: Arc<Mutex<Option<mpsc::Sender<RawDeviceEvent>>>>,
}

impl DeviceEventInjector {
    pub async fn send(&self, raw: RawDeviceEvent) -> bool {
        let tx = lock(&self.slot).clone();
        match tx {
            Some(tx) => tx.send(raw).await.is_ok(),
            None => false,
        }
    }

    /// Drop the sender, closing the event stream like a lost socket.
    pub fn close(&self) {
        lock(&self.slot).take();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_replies_follow_script() {
        let t = ScriptedTransport::new();
        t.push_partial_reply(PartialReply::Reject);
        t.push_partial_reply(PartialReply::Fail);
        let id = ElementId::new(1, "x");

        assert!(!t.partial_update(&id, "a").await.unwrap());
        assert!(t.partial_update(&id, "b").await.is_err());
        assert!(t.partial_update(&id, "c").await.unwrap());
        assert_eq!(t.partial_count(), 3);
    }

    #[tokio::test]
    async fn test_injector_reaches_link() {
        let connector = ScriptedConnector::ready(Arc::new(ScriptedTransport::new()));
        let injector = connector.events_handle();
        let mut link = connector.acquire().await.unwrap();

        assert!(injector.send(RawDeviceEvent::system("CLICK_EVENT")).await);
        assert!(link.events.recv().await.is_some());

        injector.close();
        assert!(link.events.recv().await.is_none());
    }
}
