//! Dual-target mirroring
//!
//! Every state change is written to the local surface synchronously and
//! published as the latest remote page; the remote side then catches up
//! through the render coalescer.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use lensmirror_bridge::DisplayTransport;
use lensmirror_core::PageDescription;

use crate::coalescer::{RenderCoalescer, RenderKind};
use crate::engine_event::EngineEvent;

/// One addressable text region of the local surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRegion {
    pub name: &'static str,
    pub content: String,
}

impl MirrorRegion {
    pub fn new(name: &'static str, content: impl Into<String>) -> Self {
        Self {
            name,
            content: content.into(),
        }
    }
}

/// The local surface. Writes cannot fail.
pub trait MirrorSurface: Send {
    fn write(&mut self, region: &str, content: &str);

    fn publish(&mut self, _event: &EngineEvent) {}
}

/// Keeps regions and events in memory; cloned handles see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryMirror {
    regions: Arc<Mutex<BTreeMap<String, String>>>,
    events: Arc<Mutex<Vec<EngineEvent>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self, name: &str) -> Option<String> {
        lock(&self.regions).get(name).cloned()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        lock(&self.events).clone()
    }

    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }

    /// Most recent status line published.
    pub fn last_status(&self) -> Option<String> {
        lock(&self.events).iter().rev().find_map(|e| match e {
            EngineEvent::Status { text } => Some(text.clone()),
            _ => None,
        })
    }

    pub fn logs(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Log { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MirrorSurface for MemoryMirror {
    fn write(&mut self, region: &str, content: &str) {
        lock(&self.regions).insert(region.to_string(), content.to_string());
        *lock(&self.writes) += 1;
    }

    fn publish(&mut self, event: &EngineEvent) {
        lock(&self.events).push(event.clone());
    }
}

/// Local surface plus the latest page for the remote side.
pub struct DualTargetMirror {
    surface: Box<dyn MirrorSurface>,
    written: HashMap<&'static str, String>,
    page: watch::Sender<PageDescription>,
}

impl std::fmt::Debug for DualTargetMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualTargetMirror")
            .field("regions", &self.written.len())
            .finish_non_exhaustive()
    }
}

impl DualTargetMirror {
    pub fn new(surface: Box<dyn MirrorSurface>) -> Self {
        let (page, _) = watch::channel(PageDescription::default());
        Self {
            surface,
            written: HashMap::new(),
            page,
        }
    }

    /// Receiver handed to each new coalescer.
    pub fn subscribe(&self) -> watch::Receiver<PageDescription> {
        self.page.subscribe()
    }

    pub fn current_page(&self) -> PageDescription {
        self.page.borrow().clone()
    }

    /// Write changed regions locally, publish `page`, then request a remote
    /// render if a coalescer is bound. The remote call never blocks.
    pub fn commit<T>(
        &mut self,
        regions: Vec<MirrorRegion>,
        page: PageDescription,
        remote: Option<(&RenderCoalescer<T>, RenderKind)>,
    ) where
        T: DisplayTransport + Send + Sync + 'static,
    {
        for region in regions {
            if self.written.get(region.name) == Some(&region.content) {
                continue;
            }
            self.surface.write(region.name, &region.content);
            self.written.insert(region.name, region.content);
        }

        self.page.send_replace(page);

        if let Some((coalescer, kind)) = remote {
            coalescer.request(kind);
        }
    }

    pub fn publish(&mut self, event: &EngineEvent) {
        self.surface.publish(event);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensmirror_bridge::test_utils::ScriptedTransport;
    use lensmirror_bridge::DisplayClient;
    use lensmirror_core::{Element, ElementId, Rect};
    use tokio::sync::mpsc;

    fn page(text: &str) -> PageDescription {
        PageDescription::new(vec![Element::text(
            ElementId::new(1, "t"),
            Rect::new(0, 0, 100, 30),
            text,
        )])
    }

    #[test]
    fn test_unchanged_regions_are_not_rewritten() {
        let surface = MemoryMirror::new();
        let mut mirror = DualTargetMirror::new(Box::new(surface.clone()));

        mirror.commit::<ScriptedTransport>(
            vec![MirrorRegion::new("a", "1"), MirrorRegion::new("b", "x")],
            page("1"),
            None,
        );
        mirror.commit::<ScriptedTransport>(
            vec![MirrorRegion::new("a", "2"), MirrorRegion::new("b", "x")],
            page("2"),
            None,
        );

        assert_eq!(surface.region("a").as_deref(), Some("2"));
        assert_eq!(surface.write_count(), 3);
        assert_eq!(mirror.current_page(), page("2"));
    }

    #[tokio::test]
    async fn test_local_write_precedes_remote_render() {
        let surface = MemoryMirror::new();
        let mut mirror = DualTargetMirror::new(Box::new(surface.clone()));
        let transport = Arc::new(ScriptedTransport::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let coalescer = RenderCoalescer::new(
            DisplayClient::Bridge(Arc::clone(&transport)),
            mirror.subscribe(),
            tx,
            1,
        );

        mirror.commit(
            vec![MirrorRegion::new("t", "hello")],
            page("hello"),
            Some((&coalescer, RenderKind::Full)),
        );
        // Local side is already current before the remote render runs
        assert_eq!(surface.region("t").as_deref(), Some("hello"));

        coalescer.wait_idle().await;
        assert_eq!(transport.last_page(), Some(page("hello")));
    }
}
