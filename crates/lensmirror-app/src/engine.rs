//! Engine - the per-app event loop
//!
//! The Engine owns one app instance and everything it needs to reach both
//! targets: session state, the dual-target mirror, the connection selector,
//! the render coalescer for the current connection and the tick sources.
//! Every input (local control, device event, tick, render report, finished
//! job) arrives as a message and is processed to completion in arrival order.

use std::ops::ControlFlow;

use chrono::{DateTime, Local};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use lensmirror_bridge::{ConnectOutcome, ConnectionSelector, Connector, DisplayClient, DisplayMode};
use lensmirror_core::prelude::*;
use lensmirror_core::{lifecycle, LifecycleSignal, RawDeviceEvent};

use crate::action::LocalAction;
use crate::apps::{App, AppContext, AppKind, DeviceEvent, TickerCommand, Update};
use crate::coalescer::{RenderCoalescer, RenderKind, RenderReport};
use crate::config::Settings;
use crate::engine_event::EngineEvent;
use crate::jobs::{self, Job};
use crate::message::Message;
use crate::mirror::{DualTargetMirror, MirrorSurface};
use crate::prefs::Preferences;
use crate::reconnect::ReconnectGate;
use crate::relay;
use crate::session::{Phase, SessionState};
use crate::ticker::{TickKind, Ticker};

/// Capacity of the engine message channel.
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the EngineEvent broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Receivers drained by [`Engine::run`].
struct Inbox<T> {
    messages: mpsc::Receiver<Message>,
    reports: mpsc::UnboundedReceiver<RenderReport>,
    connects: mpsc::UnboundedReceiver<ConnectOutcome<T>>,
}

/// Runs one demo app against the local surface and the remote display.
///
/// Create it with [`Engine::new`], grab a [`Engine::msg_sender`] for local
/// controls, then drive it with [`Engine::run`].
pub struct Engine<C: Connector> {
    /// The app being run
    app: Box<dyn App>,

    /// Loaded settings
    pub settings: Settings,

    /// Persisted preferences handed to app handlers
    prefs: Preferences,

    /// Shared session state (mode, phase, status, log)
    session: SessionState,

    /// Bridge or mock, chosen per connect
    selector: ConnectionSelector<C>,

    /// Local surface plus the latest remote page
    mirror: DualTargetMirror,

    /// Render coalescer for the current connection generation
    coalescer: Option<RenderCoalescer<C::Transport>>,

    /// Bumped whenever the display client changes; stale device events and
    /// render reports carry an older value and are dropped
    generation: u64,

    countdown: Ticker,
    clock: Ticker,
    reconnect: ReconnectGate,
    http: reqwest::Client,

    /// Notification relay subscription (notif app with `[notif] relay_url`)
    relay: Option<JoinHandle<()>>,

    /// Wall clock seen by app handlers
    now: fn() -> DateTime<Local>,

    /// Message sender (cloned for tickers, event forwarders and jobs)
    msg_tx: mpsc::Sender<Message>,

    reports_tx: mpsc::UnboundedSender<RenderReport>,
    connect_tx: mpsc::UnboundedSender<ConnectOutcome<C::Transport>>,
    inbox: Option<Inbox<C::Transport>>,

    /// Broadcast sender for engine events
    event_tx: broadcast::Sender<EngineEvent>,
}

impl<C: Connector> Engine<C> {
    /// Create a new Engine for `kind`.
    ///
    /// Performs the shared initialization:
    /// 1. Builds the app, restoring its persisted preferences
    /// 2. Sizes the session log from `[ui] log_capacity`
    /// 3. Sets the connect budget for this app
    /// 4. Creates the message, report and connect channels
    /// 5. Creates the EngineEvent broadcast channel
    pub fn new(
        kind: AppKind,
        settings: Settings,
        prefs: Preferences,
        connector: C,
        surface: Box<dyn MirrorSurface>,
    ) -> Self {
        let app = kind.create(&prefs);
        let session = SessionState::new(settings.ui.log_capacity);
        let selector = ConnectionSelector::new(connector, settings.connect_timeout_for(kind));
        let reconnect = ReconnectGate::new(&settings.reconnect);
        let http = jobs::http_client(std::time::Duration::from_millis(
            settings.restapi.request_timeout_ms,
        ));

        let (msg_tx, messages) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let (reports_tx, reports) = mpsc::unbounded_channel();
        let (connect_tx, connects) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            "Engine created for {} (connect budget {:?})",
            kind,
            selector.budget()
        );

        Self {
            app,
            settings,
            prefs,
            session,
            selector,
            mirror: DualTargetMirror::new(surface),
            coalescer: None,
            generation: 0,
            countdown: Ticker::new(TickKind::Countdown),
            clock: Ticker::new(TickKind::Clock),
            reconnect,
            http,
            relay: None,
            now: Local::now,
            msg_tx,
            reports_tx,
            connect_tx,
            inbox: Some(Inbox {
                messages,
                reports,
                connects,
            }),
            event_tx,
        }
    }

    /// Replace the wall clock seen by app handlers.
    pub fn with_clock(mut self, now: fn() -> DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    /// Subscribe to engine events.
    ///
    /// Returns a broadcast receiver; every status, phase, log and mode change
    /// is sent to all subscribers. A receiver that lags loses the oldest
    /// events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Get a clone of the message sender for spawning input sources.
    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    pub fn kind(&self) -> AppKind {
        self.app.kind()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Run the event loop until a quit request.
    ///
    /// Writes the initial local mirror and starts the first connect before
    /// entering the loop.
    pub async fn run(mut self) -> Result<()> {
        let mut inbox = self
            .inbox
            .take()
            .ok_or_else(|| Error::channel_send("engine event loop already started"))?;

        self.apply(Update::none().phase(Phase::Idle));
        self.start_connect();
        self.start_relay();

        loop {
            tokio::select! {
                Some(msg) = inbox.messages.recv() => {
                    if self.process_message(msg).is_break() {
                        break;
                    }
                }
                Some(report) = inbox.reports.recv() => self.handle_render_report(report),
                Some(outcome) = inbox.connects.recv() => self.finish_connect(outcome),
                else => break,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Process a single message.
    pub fn process_message(&mut self, msg: Message) -> ControlFlow<()> {
        match msg {
            Message::Action(action) => return self.handle_action(action),
            Message::Device { generation, raw } => self.handle_device(generation, raw),
            Message::DeviceStreamClosed { generation } => {
                if generation == self.generation {
                    warn!("Bridge event stream closed");
                    self.handle_lifecycle(LifecycleSignal::AbnormalExit);
                }
            }
            Message::Tick { kind, epoch } => {
                if self.ticker(kind).is_current(epoch) {
                    self.dispatch(|app, cx| app.on_tick(kind, cx));
                } else {
                    trace!("Dropping stale {:?} tick (epoch {})", kind, epoch);
                }
            }
            Message::Reconnect => {
                info!("Reconnecting after bridge loss");
                self.start_connect();
            }
            Message::JobFinished(result) => {
                self.dispatch(|app, cx| app.on_job_finished(result, cx));
            }
            Message::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn handle_action(&mut self, action: LocalAction) -> ControlFlow<()> {
        debug!("Local action: {:?}", action);
        match action {
            LocalAction::Connect => self.start_connect(),
            LocalAction::ClearLog => {
                self.session.clear_log();
                self.emit(EngineEvent::LogCleared);
            }
            LocalAction::Gesture(raw) => self.handle_device(self.generation, raw),
            LocalAction::Render => {
                self.dispatch(|app, cx| {
                    let update = app.on_action(&LocalAction::Render, cx);
                    // Apps without their own render control get a plain resync
                    if update == Update::none() {
                        Update::full()
                    } else {
                        update
                    }
                });
            }
            LocalAction::Quit => return ControlFlow::Break(()),
            other => self.dispatch(|app, cx| app.on_action(&other, cx)),
        }
        ControlFlow::Continue(())
    }

    // ─────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────

    /// Reuse the active bridge, or start a bounded acquisition in the
    /// background. Ignored while another connect is in flight.
    fn start_connect(&mut self) {
        if self.session.connecting {
            debug!("Connect already in progress, ignoring request");
            return;
        }

        if let Some(outcome) = self.selector.reusable() {
            debug!("Reusing active bridge client");
            self.finish_connect(outcome);
            return;
        }

        self.session.connecting = true;
        let status = self.app.connecting_status();
        self.apply(Update::none().phase(Phase::Connecting).status(status));

        let acquire = self.selector.acquire();
        let tx = self.connect_tx.clone();
        tokio::spawn(async move {
            let outcome = acquire.await;
            // Receiver gone means the engine shut down
            let _ = tx.send(outcome);
        });
    }

    fn finish_connect(&mut self, outcome: ConnectOutcome<C::Transport>) {
        self.session.connecting = false;
        let mode = outcome.mode();

        if outcome.reused {
            let bound_to_bridge = self
                .coalescer
                .as_ref()
                .is_some_and(|c| c.client().is_bridge());
            if !bound_to_bridge {
                self.bind(outcome.client);
            }
        } else {
            self.selector.adopt(&outcome);
            self.generation += 1;
            let ConnectOutcome {
                client,
                events,
                fallback_reason,
                ..
            } = outcome;

            if let Some(reason) = &fallback_reason {
                info!("Using mock display: {}", reason);
            }
            if let Some(events) = events {
                self.forward_events(events);
            }
            self.bind(client);
            self.emit(EngineEvent::Mode {
                mode,
                reason: fallback_reason,
            });
        }

        self.session.mode = Some(mode);
        self.apply(Update::none().phase(Phase::for_mode(mode)));
        self.dispatch(|app, cx| app.on_connected(mode, cx).render(RenderKind::Full));
    }

    /// Bind a fresh coalescer for the current generation.
    fn bind(&mut self, client: DisplayClient<C::Transport>) {
        self.coalescer = Some(RenderCoalescer::new(
            client,
            self.mirror.subscribe(),
            self.reports_tx.clone(),
            self.generation,
        ));
    }

    /// Forward bridge events into the message channel, tagged with the
    /// generation they belong to.
    fn forward_events(&self, mut events: mpsc::Receiver<RawDeviceEvent>) {
        let tx = self.msg_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            while let Some(raw) = events.recv().await {
                if tx.send(Message::Device { generation, raw }).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(Message::DeviceStreamClosed { generation }).await;
        });
    }

    /// Drop the bridge client and keep running against the mock.
    fn revert_to_mock(&mut self, reason: &str) {
        warn!("Reverting to mock display: {}", reason);
        self.selector.revert_to_mock();
        self.generation += 1;
        self.bind(DisplayClient::mock());
        self.session.mode = Some(DisplayMode::Mock);
        self.emit(EngineEvent::Mode {
            mode: DisplayMode::Mock,
            reason: Some(reason.to_string()),
        });
    }

    fn schedule_reconnect(&mut self) -> Option<std::time::Duration> {
        let delay = self.reconnect.schedule(Instant::now())?;
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(Message::Reconnect).await;
        });
        Some(delay)
    }

    // ─────────────────────────────────────────────────────────
    // Device events
    // ─────────────────────────────────────────────────────────

    fn handle_device(&mut self, generation: u64, raw: RawDeviceEvent) {
        if generation != self.generation {
            trace!(
                "Dropping device event from generation {} (current {})",
                generation,
                self.generation
            );
            return;
        }

        if let Some(signal) = lifecycle(&raw) {
            self.handle_lifecycle(signal);
            return;
        }

        let event = DeviceEvent::ingest(raw);
        debug!("Device gesture {:?}", event.gesture);
        self.dispatch(|app, cx| app.on_device(&event, cx));
    }

    fn handle_lifecycle(&mut self, signal: LifecycleSignal) {
        info!("Lifecycle signal {:?}", signal);
        if signal != LifecycleSignal::AbnormalExit {
            self.dispatch(|app, cx| app.on_lifecycle(signal, cx));
            return;
        }

        if self.session.mode != Some(DisplayMode::Bridge) {
            debug!("Abnormal exit without an active bridge, ignoring");
            return;
        }

        self.revert_to_mock("bridge exited abnormally");
        let status = match self.schedule_reconnect() {
            Some(delay) => format!(
                "Bridge disconnected. Reconnecting in {}s...",
                delay.as_secs()
            ),
            None => "Bridge disconnected. Running mock mode.".to_string(),
        };
        self.apply(Update::none().phase(Phase::Mock).status(status));
        self.dispatch(|app, cx| app.on_lifecycle(signal, cx));
    }

    // ─────────────────────────────────────────────────────────
    // Render reports
    // ─────────────────────────────────────────────────────────

    fn handle_render_report(&mut self, report: RenderReport) {
        match report {
            RenderReport::Rendered {
                generation,
                full,
                startup,
            } => {
                trace!(
                    "Rendered (generation={}, full={}, startup={})",
                    generation,
                    full,
                    startup
                );
            }
            RenderReport::FellBack {
                element, rebuilt, ..
            } => {
                debug!(
                    "Partial update of {} fell back to a full rebuild (ok={})",
                    element, rebuilt
                );
            }
            RenderReport::Failed {
                generation,
                startup,
                message,
            } => {
                if generation != self.generation {
                    debug!("Ignoring render failure from generation {}", generation);
                    return;
                }
                self.emit(EngineEvent::RenderFailed {
                    startup,
                    message: message.clone(),
                });

                if startup && self.session.mode == Some(DisplayMode::Bridge) {
                    self.revert_to_mock(&message);
                    self.apply(
                        Update::full()
                            .phase(Phase::Mock)
                            .status(format!(
                                "Startup render failed ({}). Running mock mode.",
                                message
                            ))
                            .log("Startup render failed, switched to mock"),
                    );
                } else {
                    self.apply(Update::none().status(format!("Render failed: {}", message)));
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Applying updates
    // ─────────────────────────────────────────────────────────

    /// Run one app handler with a fresh context, then apply its update.
    fn dispatch(&mut self, handler: impl FnOnce(&mut dyn App, &AppContext<'_>) -> Update) {
        let cx = AppContext {
            prefs: &self.prefs,
            now: (self.now)(),
            mode: self.session.mode,
        };
        let update = handler(self.app.as_mut(), &cx);
        self.apply(update);
    }

    /// Apply an update: session state, tickers and jobs first, then the
    /// local mirror, then the (fire-and-forget) remote render request.
    fn apply(&mut self, update: Update) {
        let now = (self.now)();

        for text in update.logs {
            self.session.push_log(now, text.clone());
            self.emit(EngineEvent::Log { text });
        }

        if let Some(text) = update.status {
            self.session.status = text.clone();
            self.emit(EngineEvent::Status { text });
        }

        if let Some(phase) = update.phase {
            if phase != self.session.phase {
                self.session.phase = phase;
                self.emit(EngineEvent::Phase { phase });
            }
        }

        for command in update.tickers {
            match command {
                TickerCommand::Start(kind) => {
                    let tx = self.msg_tx.clone();
                    self.ticker_mut(kind).start(tx);
                }
                TickerCommand::Stop(kind) => self.ticker_mut(kind).stop(),
            }
        }

        if let Some(job) = update.job {
            self.spawn_job(job);
        }

        let cx = AppContext {
            prefs: &self.prefs,
            now,
            mode: self.session.mode,
        };
        let regions = self.app.mirror(&cx);
        let page = self.app.page(&cx);
        let remote = match (&self.coalescer, update.render) {
            (Some(coalescer), Some(kind)) => Some((coalescer, kind)),
            _ => None,
        };
        self.mirror.commit(regions, page, remote);
    }

    fn spawn_job(&self, job: Job) {
        debug!("Starting job {:?}", job);
        let client = self.http.clone();
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let result = jobs::run_job(&client, job).await;
            let _ = tx.send(Message::JobFinished(result)).await;
        });
    }

    fn ticker(&self, kind: TickKind) -> &Ticker {
        match kind {
            TickKind::Countdown => &self.countdown,
            TickKind::Clock => &self.clock,
        }
    }

    fn ticker_mut(&mut self, kind: TickKind) -> &mut Ticker {
        match kind {
            TickKind::Countdown => &mut self.countdown,
            TickKind::Clock => &mut self.clock,
        }
    }

    /// Emit a single EngineEvent to the local surface and all subscribers.
    ///
    /// send() returns Err only if there are no receivers, which is fine.
    fn emit(&mut self, event: EngineEvent) {
        self.mirror.publish(&event);
        let _ = self.event_tx.send(event);
    }

    fn start_relay(&mut self) {
        if self.app.kind() != AppKind::Notif {
            return;
        }
        let Some(raw) = self.settings.notif.relay_url.clone() else {
            return;
        };
        match relay::validate_relay_url(&raw) {
            Ok(url) => {
                self.relay = Some(relay::spawn_relay(
                    url,
                    &self.settings.reconnect,
                    self.msg_tx.clone(),
                ));
                self.apply(Update::none().log(format!("Notif: subscribed to relay {}", raw)));
            }
            Err(e) => {
                warn!("Notification relay disabled: {}", e);
                self.apply(Update::none().log(format!("Notif: relay disabled ({})", e)));
            }
        }
    }

    async fn shutdown(&mut self) {
        self.countdown.stop();
        self.clock.stop();
        if let Some(relay) = self.relay.take() {
            relay.abort();
        }
        self.selector.close().await;
        info!("Engine for {} stopped", self.app.kind());
    }
}
