//! Display clients: a real bridge or the always-succeeding mock

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lensmirror_core::prelude::*;
use lensmirror_core::{ElementId, PageDescription};

use crate::transport::DisplayTransport;

/// Which kind of client is currently bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Bridge,
    Mock,
}

impl DisplayMode {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayMode::Bridge => "bridge",
            DisplayMode::Mock => "mock",
        }
    }
}

/// Stand-in for the device when no bridge is available. Every operation
/// succeeds without I/O; calls are only counted and traced.
#[derive(Debug, Default)]
pub struct MockDisplay {
    renders: AtomicU64,
    updates: AtomicU64,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl DisplayTransport for MockDisplay {
    async fn full_render(&self, page: &PageDescription, startup: bool) -> Result<()> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        debug!(
            "mock display: {} with {} element(s)",
            if startup { "startup render" } else { "rebuild" },
            page.elements.len()
        );
        Ok(())
    }

    async fn partial_update(&self, element: &ElementId, content: &str) -> Result<bool> {
        self.updates.fetch_add(1, Ordering::Relaxed);
        trace!("mock display: update {} -> {:?}", element, content);
        Ok(true)
    }

    async fn close(&self) {}
}

/// Exactly one of these is bound to a session at a time.
pub enum DisplayClient<T> {
    Bridge(Arc<T>),
    Mock(Arc<MockDisplay>),
}

impl<T> DisplayClient<T> {
    pub fn mock() -> Self {
        DisplayClient::Mock(Arc::new(MockDisplay::new()))
    }

    pub fn mode(&self) -> DisplayMode {
        match self {
            DisplayClient::Bridge(_) => DisplayMode::Bridge,
            DisplayClient::Mock(_) => DisplayMode::Mock,
        }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, DisplayClient::Bridge(_))
    }
}

impl<T> Clone for DisplayClient<T> {
    fn clone(&self) -> Self {
        match self {
            DisplayClient::Bridge(t) => DisplayClient::Bridge(Arc::clone(t)),
            DisplayClient::Mock(m) => DisplayClient::Mock(Arc::clone(m)),
        }
    }
}

impl<T> std::fmt::Debug for DisplayClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DisplayClient").field(&self.mode()).finish()
    }
}

impl<T: DisplayTransport + Send + Sync> DisplayTransport for DisplayClient<T> {
    async fn full_render(&self, page: &PageDescription, startup: bool) -> Result<()> {
        match self {
            DisplayClient::Bridge(t) => t.full_render(page, startup).await,
            DisplayClient::Mock(m) => m.full_render(page, startup).await,
        }
    }

    async fn partial_update(&self, element: &ElementId, content: &str) -> Result<bool> {
        match self {
            DisplayClient::Bridge(t) => t.partial_update(element, content).await,
            DisplayClient::Mock(m) => m.partial_update(element, content).await,
        }
    }

    async fn close(&self) {
        match self {
            DisplayClient::Bridge(t) => t.close().await,
            DisplayClient::Mock(m) => m.close().await,
        }
    }
}
