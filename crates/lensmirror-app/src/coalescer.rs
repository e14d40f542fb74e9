//! Single-flight render coalescing against one display client
//!
//! Callers request renders as often as they like. At most one render runs at
//! a time; requests arriving meanwhile collapse into one trailing render that
//! reads the page as it is when that render starts. Partial updates are only
//! attempted after a full render succeeded, and a rejected or failed partial
//! update is repaired with exactly one full rebuild.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use lensmirror_bridge::{DisplayClient, DisplayTransport};
use lensmirror_core::prelude::*;
use lensmirror_core::{ElementId, PageDescription};

/// What a render request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderKind {
    Full,
    /// Update the text of these elements in place
    Partial(BTreeSet<ElementId>),
}

impl RenderKind {
    pub fn partial(ids: impl IntoIterator<Item = ElementId>) -> Self {
        RenderKind::Partial(ids.into_iter().collect())
    }

    /// Combine two pending requests. Full absorbs everything.
    pub fn merge(self, other: RenderKind) -> RenderKind {
        match (self, other) {
            (RenderKind::Partial(mut a), RenderKind::Partial(b)) => {
                a.extend(b);
                RenderKind::Partial(a)
            }
            _ => RenderKind::Full,
        }
    }
}

/// Outcome of one render cycle, reported to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderReport {
    Rendered {
        generation: u64,
        full: bool,
        startup: bool,
    },
    /// A partial update was rejected; a full rebuild ran instead
    FellBack {
        generation: u64,
        element: ElementId,
        rebuilt: bool,
    },
    Failed {
        generation: u64,
        startup: bool,
        message: String,
    },
}

#[derive(Debug, Default)]
struct Flight {
    in_flight: bool,
    pending: Option<RenderKind>,
    rendered_once: bool,
}

struct Inner<T> {
    client: DisplayClient<T>,
    page: watch::Receiver<PageDescription>,
    flight: Mutex<Flight>,
    busy: watch::Sender<bool>,
    reports: mpsc::UnboundedSender<RenderReport>,
    generation: u64,
}

/// Coalescer bound to one display client for one connection generation.
pub struct RenderCoalescer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RenderCoalescer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for RenderCoalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flight = lock(&self.inner.flight);
        f.debug_struct("RenderCoalescer")
            .field("mode", &self.inner.client.mode())
            .field("generation", &self.inner.generation)
            .field("in_flight", &flight.in_flight)
            .field("rendered_once", &flight.rendered_once)
            .finish()
    }
}

impl<T> RenderCoalescer<T>
where
    T: DisplayTransport + Send + Sync + 'static,
{
    pub fn new(
        client: DisplayClient<T>,
        page: watch::Receiver<PageDescription>,
        reports: mpsc::UnboundedSender<RenderReport>,
        generation: u64,
    ) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                client,
                page,
                flight: Mutex::new(Flight::default()),
                busy,
                reports,
                generation,
            }),
        }
    }

    pub fn client(&self) -> &DisplayClient<T> {
        &self.inner.client
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn rendered_once(&self) -> bool {
        lock(&self.inner.flight).rendered_once
    }

    pub fn is_in_flight(&self) -> bool {
        lock(&self.inner.flight).in_flight
    }

    /// Ask for a render. Never blocks; the render runs in a spawned task.
    pub fn request(&self, kind: RenderKind) {
        {
            let mut flight = lock(&self.inner.flight);
            let kind = if flight.rendered_once {
                kind
            } else {
                RenderKind::Full
            };

            if flight.in_flight {
                flight.pending = Some(match flight.pending.take() {
                    Some(pending) => pending.merge(kind),
                    None => kind,
                });
                return;
            }
            flight.in_flight = true;
            self.inner.busy.send_replace(true);

            let inner = Arc::clone(&self.inner);
            tokio::spawn(run(inner, kind));
        }
    }

    /// Resolves once no render is in flight or pending.
    pub async fn wait_idle(&self) {
        let mut busy = self.inner.busy.subscribe();
        let _ = busy.wait_for(|b| !*b).await;
    }
}

async fn run<T>(inner: Arc<Inner<T>>, first: RenderKind)
where
    T: DisplayTransport + Send + Sync + 'static,
{
    let mut next = Some(first);
    while let Some(kind) = next {
        // Snapshot at start so a trailing render sees every earlier mutation
        let page = inner.page.borrow().clone();
        perform(&inner, kind, &page).await;

        let mut flight = lock(&inner.flight);
        next = flight.pending.take().map(|k| {
            if flight.rendered_once {
                k
            } else {
                RenderKind::Full
            }
        });
        if next.is_none() {
            flight.in_flight = false;
            inner.busy.send_replace(false);
        }
    }
}

async fn perform<T>(inner: &Inner<T>, kind: RenderKind, page: &PageDescription)
where
    T: DisplayTransport + Send + Sync + 'static,
{
    match kind {
        RenderKind::Full => {
            full(inner, page).await;
        }
        RenderKind::Partial(ids) => {
            for id in ids {
                let content = match page.element(&id).and_then(|e| e.content()) {
                    Some(content) => content,
                    None => {
                        debug!("{} is not a text element on the current page", id);
                        fall_back(inner, id, page).await;
                        return;
                    }
                };

                match inner.client.partial_update(&id, content).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("partial update of {} rejected", id);
                        fall_back(inner, id, page).await;
                        return;
                    }
                    Err(e) => {
                        warn!("partial update of {} failed: {}", id, e);
                        fall_back(inner, id, page).await;
                        return;
                    }
                }
            }
            report(
                inner,
                RenderReport::Rendered {
                    generation: inner.generation,
                    full: false,
                    startup: false,
                },
            );
        }
    }
}

async fn fall_back<T>(inner: &Inner<T>, element: ElementId, page: &PageDescription)
where
    T: DisplayTransport + Send + Sync + 'static,
{
    let rebuilt = full(inner, page).await;
    report(
        inner,
        RenderReport::FellBack {
            generation: inner.generation,
            element,
            rebuilt,
        },
    );
}

/// Full render; the first successful one on this coalescer is the startup render.
async fn full<T>(inner: &Inner<T>, page: &PageDescription) -> bool
where
    T: DisplayTransport + Send + Sync + 'static,
{
    let startup = !lock(&inner.flight).rendered_once;
    match inner.client.full_render(page, startup).await {
        Ok(()) => {
            lock(&inner.flight).rendered_once = true;
            report(
                inner,
                RenderReport::Rendered {
                    generation: inner.generation,
                    full: true,
                    startup,
                },
            );
            true
        }
        Err(e) => {
            warn!("full render failed (startup={}): {}", startup, e);
            report(
                inner,
                RenderReport::Failed {
                    generation: inner.generation,
                    startup,
                    message: e.to_string(),
                },
            );
            false
        }
    }
}

fn report<T>(inner: &Inner<T>, report: RenderReport) {
    // Receiver gone means the engine shut down
    let _ = inner.reports.send(report);
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lensmirror_bridge::test_utils::{PartialReply, ScriptedTransport, TransportCall};
    use lensmirror_core::{Element, Rect};

    fn title() -> ElementId {
        ElementId::new(1, "title")
    }

    fn page(text: &str) -> PageDescription {
        PageDescription::new(vec![
            Element::text(title(), Rect::new(0, 0, 300, 40), text),
            Element::list(
                ElementId::new(2, "list"),
                Rect::new(0, 40, 300, 200),
                vec!["a".into(), "b".into()],
                290,
            )
            .capturing(),
        ])
    }

    struct Harness {
        transport: Arc<ScriptedTransport>,
        page_tx: watch::Sender<PageDescription>,
        reports: mpsc::UnboundedReceiver<RenderReport>,
        coalescer: RenderCoalescer<ScriptedTransport>,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        let transport = Arc::new(transport);
        let (page_tx, page_rx) = watch::channel(page("v0"));
        let (tx, reports) = mpsc::unbounded_channel();
        let coalescer =
            RenderCoalescer::new(DisplayClient::Bridge(Arc::clone(&transport)), page_rx, tx, 1);
        Harness {
            transport,
            page_tx,
            reports,
            coalescer,
        }
    }

    #[tokio::test]
    async fn test_first_request_is_forced_to_startup_full_render() {
        let h = harness(ScriptedTransport::new());
        h.coalescer.request(RenderKind::partial([title()]));
        h.coalescer.wait_idle().await;

        assert_eq!(
            h.transport.calls(),
            vec![TransportCall::Full {
                page: page("v0"),
                startup: true
            }]
        );
        assert!(h.coalescer.rendered_once());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_during_flight_collapse_into_one_trailing_render() {
        let h = harness(ScriptedTransport::with_delay(Duration::from_millis(100)));
        h.coalescer.request(RenderKind::Full);
        tokio::task::yield_now().await;

        for i in 1..=5 {
            h.page_tx.send_replace(page(&format!("v{i}")));
            h.coalescer.request(RenderKind::partial([title()]));
        }
        h.coalescer.wait_idle().await;

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            TransportCall::Partial {
                element: title(),
                content: "v5".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_pending_while_in_flight() {
        let h = harness(ScriptedTransport::with_delay(Duration::from_millis(100)));
        h.coalescer.request(RenderKind::Full);

        let mut idle = tokio_test::task::spawn(h.coalescer.wait_idle());
        tokio_test::assert_pending!(idle.poll());
        assert!(h.coalescer.is_in_flight());

        h.coalescer.wait_idle().await;
        tokio_test::assert_ready!(idle.poll());
        assert!(!h.coalescer.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_full_absorbs_partials() {
        let h = harness(ScriptedTransport::with_delay(Duration::from_millis(100)));
        h.coalescer.request(RenderKind::Full);
        tokio::task::yield_now().await;

        h.coalescer.request(RenderKind::partial([title()]));
        h.coalescer.request(RenderKind::Full);
        h.coalescer.wait_idle().await;

        assert_eq!(h.transport.full_count(), 2);
        assert_eq!(h.transport.partial_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_partial_triggers_exactly_one_full_rebuild() {
        let mut h = harness(ScriptedTransport::new());
        h.coalescer.request(RenderKind::Full);
        h.coalescer.wait_idle().await;
        h.transport.clear_calls();
        let _ = h.reports.try_recv();

        h.transport.push_partial_reply(PartialReply::Reject);
        h.page_tx.send_replace(page("next"));
        h.coalescer.request(RenderKind::partial([title()]));
        h.coalescer.wait_idle().await;

        assert_eq!(h.transport.partial_count(), 1);
        assert_eq!(h.transport.full_count(), 1);
        assert_eq!(
            h.transport.calls()[1],
            TransportCall::Full {
                page: page("next"),
                startup: false
            }
        );
        assert!(h.coalescer.rendered_once());

        let mut saw_fallback = false;
        while let Ok(report) = h.reports.try_recv() {
            if let RenderReport::FellBack { rebuilt, .. } = report {
                assert!(rebuilt);
                saw_fallback = true;
            }
        }
        assert!(saw_fallback);
    }

    #[tokio::test]
    async fn test_failed_partial_also_falls_back() {
        let h = harness(ScriptedTransport::new());
        h.coalescer.request(RenderKind::Full);
        h.coalescer.wait_idle().await;

        h.transport.push_partial_reply(PartialReply::Fail);
        h.coalescer.request(RenderKind::partial([title()]));
        h.coalescer.wait_idle().await;

        assert_eq!(h.transport.full_count(), 2);
    }

    #[tokio::test]
    async fn test_partial_on_list_element_rebuilds() {
        let h = harness(ScriptedTransport::new());
        h.coalescer.request(RenderKind::Full);
        h.coalescer.wait_idle().await;

        h.coalescer
            .request(RenderKind::partial([ElementId::new(2, "list")]));
        h.coalescer.wait_idle().await;

        assert_eq!(h.transport.partial_count(), 0);
        assert_eq!(h.transport.full_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_startup_render_is_reported_and_retried_as_startup() {
        let mut h = harness(ScriptedTransport::new());
        h.transport.set_fail_full(true);
        h.coalescer.request(RenderKind::Full);
        h.coalescer.wait_idle().await;

        assert!(!h.coalescer.rendered_once());
        assert!(matches!(
            h.reports.try_recv(),
            Ok(RenderReport::Failed { startup: true, .. })
        ));

        h.transport.set_fail_full(false);
        h.coalescer.request(RenderKind::partial([title()]));
        h.coalescer.wait_idle().await;
        assert!(matches!(
            h.transport.calls().last(),
            Some(TransportCall::Full { startup: true, .. })
        ));
    }

    #[test]
    fn test_merge() {
        let a = RenderKind::partial([title()]);
        let b = RenderKind::partial([ElementId::new(2, "list")]);
        assert_eq!(
            a.clone().merge(b),
            RenderKind::partial([title(), ElementId::new(2, "list")])
        );
        assert_eq!(a.merge(RenderKind::Full), RenderKind::Full);
    }
}
