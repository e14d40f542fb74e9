//! Remote display transport abstraction

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use lensmirror_core::prelude::*;
use lensmirror_core::{ElementId, PageDescription, RawDeviceEvent};

/// Operations a remote display supports.
///
/// `full_render` replaces the whole page; the first call on a fresh
/// connection must pass `startup = true`. `partial_update` replaces the text
/// of one element in place and reports `false` when the device rejects it
/// (for example because the element does not exist on the current page).
/// `close` ends the connection; later calls fail.
#[trait_variant::make(DisplayTransport: Send)]
pub trait LocalDisplayTransport {
    async fn full_render(&self, page: &PageDescription, startup: bool) -> Result<()>;

    async fn partial_update(&self, element: &ElementId, content: &str) -> Result<bool>;

    async fn close(&self);
}

/// An acquired bridge: the transport plus its device event stream.
pub struct BridgeLink<T> {
    pub transport: Arc<T>,
    pub events: mpsc::Receiver<RawDeviceEvent>,
}

impl<T> std::fmt::Debug for BridgeLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeLink").finish_non_exhaustive()
    }
}

/// Something that can try to acquire a bridge.
///
/// Acquisition may hang indefinitely; callers bound it with a time budget.
pub trait Connector: Send + Sync + 'static {
    type Transport: DisplayTransport + Send + Sync + 'static;

    fn acquire(&self) -> impl Future<Output = Result<BridgeLink<Self::Transport>>> + Send;
}
