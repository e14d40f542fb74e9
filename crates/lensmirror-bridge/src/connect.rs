//! Bounded-time bridge acquisition with mock fallback

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use lensmirror_core::prelude::*;
use lensmirror_core::RawDeviceEvent;

use crate::client::{DisplayClient, DisplayMode};
use crate::transport::{BridgeLink, Connector, DisplayTransport};

/// Result of one connect attempt.
pub struct ConnectOutcome<T> {
    pub client: DisplayClient<T>,
    /// Device events; present only for a freshly acquired bridge.
    pub events: Option<mpsc::Receiver<RawDeviceEvent>>,
    /// Why the mock was chosen, when it was.
    pub fallback_reason: Option<String>,
    /// An already-active bridge client was reused.
    pub reused: bool,
}

impl<T> ConnectOutcome<T> {
    pub fn mode(&self) -> DisplayMode {
        self.client.mode()
    }

    fn mock(reason: String) -> Self {
        Self {
            client: DisplayClient::mock(),
            events: None,
            fallback_reason: Some(reason),
            reused: false,
        }
    }

    fn bridge(link: BridgeLink<T>) -> Self {
        Self {
            client: DisplayClient::Bridge(link.transport),
            events: Some(link.events),
            fallback_reason: None,
            reused: false,
        }
    }
}

impl<T> std::fmt::Debug for ConnectOutcome<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOutcome")
            .field("mode", &self.mode())
            .field("fallback_reason", &self.fallback_reason)
            .field("reused", &self.reused)
            .finish()
    }
}

/// Chooses between the bridge and the mock for each (re)connect.
///
/// An active bridge client is handed out again instead of re-acquiring.
/// After [`ConnectionSelector::revert_to_mock`] the next connect tries the
/// bridge again.
pub struct ConnectionSelector<C: Connector> {
    connector: Arc<C>,
    budget: Duration,
    active: Option<Arc<C::Transport>>,
}

impl<C: Connector> ConnectionSelector<C> {
    pub fn new(connector: C, budget: Duration) -> Self {
        Self {
            connector: Arc::new(connector),
            budget,
            active: None,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn has_active_bridge(&self) -> bool {
        self.active.is_some()
    }

    /// The active bridge client, if one is bound.
    pub fn reusable(&self) -> Option<ConnectOutcome<C::Transport>> {
        self.active.as_ref().map(|t| ConnectOutcome {
            client: DisplayClient::Bridge(Arc::clone(t)),
            events: None,
            fallback_reason: None,
            reused: true,
        })
    }

    /// Build a future that acquires within the budget.
    ///
    /// The acquisition runs in its own task. When the budget runs out the
    /// future resolves to a mock outcome; the acquisition keeps running and
    /// its late result is dropped.
    pub fn acquire(
        &self,
    ) -> impl std::future::Future<Output = ConnectOutcome<C::Transport>> + Send + 'static {
        let connector = Arc::clone(&self.connector);
        let budget = self.budget;

        async move {
            let handle = tokio::spawn(async move { connector.acquire().await });

            match tokio::time::timeout(budget, handle).await {
                Ok(Ok(Ok(link))) => {
                    info!("bridge acquired");
                    ConnectOutcome::bridge(link)
                }
                Ok(Ok(Err(e))) => {
                    if e.is_bridge_failure() {
                        warn!("bridge acquisition failed: {}", e);
                    } else {
                        error!("bridge acquisition failed on local error: {}", e);
                    }
                    ConnectOutcome::mock(e.to_string())
                }
                Ok(Err(join_err)) => {
                    error!("bridge acquisition task failed: {}", join_err);
                    ConnectOutcome::mock(format!("acquisition task failed: {join_err}"))
                }
                Err(_) => {
                    let err = Error::timeout("Bridge acquisition", budget.as_millis() as u64);
                    info!("{}, using mock display", err);
                    ConnectOutcome::mock(err.to_string())
                }
            }
        }
    }

    /// Record the outcome of an acquisition as the active client.
    pub fn adopt(&mut self, outcome: &ConnectOutcome<C::Transport>) {
        match &outcome.client {
            DisplayClient::Bridge(t) => self.active = Some(Arc::clone(t)),
            DisplayClient::Mock(_) => self.active = None,
        }
    }

    /// Reuse the active bridge, or acquire and adopt.
    pub async fn connect(&mut self) -> ConnectOutcome<C::Transport> {
        if let Some(outcome) = self.reusable() {
            debug!("reusing active bridge client");
            return outcome;
        }
        let outcome = self.acquire().await;
        self.adopt(&outcome);
        outcome
    }

    /// Forget the active bridge (abnormal disconnect).
    pub fn revert_to_mock(&mut self) {
        if self.active.take().is_some() {
            info!("bridge client dropped, reverting to mock");
        }
    }

    /// Close and forget the active bridge, if any.
    pub async fn close(&mut self) {
        if let Some(transport) = self.active.take() {
            debug!("closing bridge client");
            transport.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ConnectorMode, ScriptedConnector, ScriptedTransport};

    const BUDGET: Duration = Duration::from_millis(4000);

    #[tokio::test(start_paused = true)]
    async fn test_hanging_acquisition_falls_back_to_mock() {
        let connector = ScriptedConnector::new(ConnectorMode::Hang);
        let mut selector = ConnectionSelector::new(connector, BUDGET);

        let started = tokio::time::Instant::now();
        let outcome = selector.connect().await;

        assert_eq!(outcome.mode(), DisplayMode::Mock);
        assert!(outcome.fallback_reason.unwrap().contains("timed out"));
        assert!(started.elapsed() <= BUDGET + Duration::from_millis(50));
        assert!(!selector.has_active_bridge());
    }

    #[tokio::test]
    async fn test_failed_acquisition_falls_back_to_mock() {
        let connector = ScriptedConnector::new(ConnectorMode::Fail("no bridge host".into()));
        let mut selector = ConnectionSelector::new(connector, BUDGET);

        let outcome = selector.connect().await;
        assert_eq!(outcome.mode(), DisplayMode::Mock);
        assert!(outcome.fallback_reason.unwrap().contains("no bridge host"));
    }

    #[tokio::test]
    async fn test_active_bridge_is_reused() {
        let transport = Arc::new(ScriptedTransport::new());
        let connector = ScriptedConnector::ready(Arc::clone(&transport));
        let attempts = connector.attempts_handle();
        let mut selector = ConnectionSelector::new(connector, BUDGET);

        let first = selector.connect().await;
        assert_eq!(first.mode(), DisplayMode::Bridge);
        assert!(first.events.is_some());

        let second = selector.connect().await;
        assert_eq!(second.mode(), DisplayMode::Bridge);
        assert!(second.reused);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_revert_to_mock_forces_reacquire() {
        let transport = Arc::new(ScriptedTransport::new());
        let connector = ScriptedConnector::ready(Arc::clone(&transport));
        let attempts = connector.attempts_handle();
        let mut selector = ConnectionSelector::new(connector, BUDGET);

        selector.connect().await;
        selector.revert_to_mock();
        let again = selector.connect().await;

        assert!(!again.reused);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_acquisition_is_discarded() {
        let transport = Arc::new(ScriptedTransport::new());
        let connector = ScriptedConnector::new(ConnectorMode::Delayed(
            Duration::from_millis(6000),
            Arc::clone(&transport),
        ));
        let mut selector = ConnectionSelector::new(connector, BUDGET);

        let outcome = selector.connect().await;
        assert_eq!(outcome.mode(), DisplayMode::Mock);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(!selector.has_active_bridge());
    }
}
