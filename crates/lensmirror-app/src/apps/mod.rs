//! Demo apps
//!
//! Each app is a small state machine behind the [`App`] trait. Handlers
//! mutate the app's own state and return an [`Update`] describing what the
//! engine should do next (render, status, tickers, background jobs). Apps
//! never talk to the display directly.

pub mod base;
pub mod clock;
pub mod notif;
pub mod quicktest;
pub mod restapi;
pub mod timer;

use std::str::FromStr;

use chrono::{DateTime, Local};

use lensmirror_bridge::DisplayMode;
use lensmirror_core::prelude::*;
use lensmirror_core::{
    normalize, CanonicalGesture, ElementId, LifecycleSignal, PageDescription, RawDeviceEvent,
    SelectionHint,
};

use crate::action::LocalAction;
use crate::coalescer::RenderKind;
use crate::jobs::{Job, JobResult};
use crate::mirror::MirrorRegion;
use crate::prefs::Preferences;
use crate::session::Phase;
use crate::ticker::TickKind;

/// Which demo to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppKind {
    Base,
    Clock,
    Timer,
    Notif,
    Restapi,
    Quicktest,
}

impl AppKind {
    pub const ALL: [AppKind; 6] = [
        AppKind::Base,
        AppKind::Clock,
        AppKind::Timer,
        AppKind::Notif,
        AppKind::Restapi,
        AppKind::Quicktest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AppKind::Base => "base",
            AppKind::Clock => "clock",
            AppKind::Timer => "timer",
            AppKind::Notif => "notif",
            AppKind::Restapi => "restapi",
            AppKind::Quicktest => "quicktest",
        }
    }

    /// Acquisition budget when the config does not override it.
    pub fn default_connect_timeout_ms(&self) -> Option<u64> {
        match self {
            AppKind::Timer => Some(6000),
            AppKind::Quicktest => Some(10_000),
            _ => None,
        }
    }

    /// Build the app, restoring persisted preferences.
    pub fn create(&self, prefs: &Preferences) -> Box<dyn App> {
        match self {
            AppKind::Base => Box::new(base::BaseApp::new()),
            AppKind::Clock => Box::new(clock::ClockApp::new(prefs)),
            AppKind::Timer => Box::new(timer::TimerApp::new(prefs)),
            AppKind::Notif => Box::new(notif::NotifApp::new(prefs)),
            AppKind::Restapi => Box::new(restapi::RestApiApp::new(prefs)),
            AppKind::Quicktest => Box::new(quicktest::QuicktestApp::new()),
        }
    }
}

impl FromStr for AppKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        AppKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| Error::unknown_app(s))
    }
}

impl std::fmt::Display for AppKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only context handed to every handler.
pub struct AppContext<'a> {
    pub prefs: &'a Preferences,
    pub now: DateTime<Local>,
    /// `None` until the first connect resolves
    pub mode: Option<DisplayMode>,
}

impl AppContext<'_> {
    pub fn is_connected(&self) -> bool {
        self.mode.is_some()
    }
}

/// A device event after the boundary: gesture and shape are decided once.
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub raw: RawDeviceEvent,
    pub gesture: CanonicalGesture,
    pub list_shaped: bool,
}

impl DeviceEvent {
    pub fn ingest(raw: RawDeviceEvent) -> Self {
        Self {
            gesture: normalize(&raw),
            list_shaped: raw.is_list_shaped(),
            raw,
        }
    }

    /// Selection hint matched against the given labels.
    pub fn hint<S: AsRef<str>>(&self, labels: &[S]) -> SelectionHint {
        SelectionHint::extract(&self.raw, labels)
    }

    /// Name of the element that emitted the event, if reported.
    pub fn container_name(&self) -> Option<&str> {
        ["listEvent", "textEvent"]
            .into_iter()
            .filter_map(|k| self.raw.as_value().get(k))
            .filter_map(|obj| obj.get("containerName"))
            .find_map(|v| v.as_str())
    }

    /// Reported selected item name (list events only).
    pub fn selected_name(&self) -> Option<&str> {
        self.raw
            .list_event()
            .and_then(|l| l.get("currentSelectItemName"))
            .and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerCommand {
    Start(TickKind),
    Stop(TickKind),
}

/// What the engine should do after a handler ran.
///
/// The local mirror is always rewritten after a handler; `render` only
/// decides whether and how the remote display is asked to follow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub render: Option<RenderKind>,
    pub status: Option<String>,
    pub phase: Option<Phase>,
    pub logs: Vec<String>,
    pub tickers: Vec<TickerCommand>,
    pub job: Option<Job>,
}

impl Update {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self::none().render(RenderKind::Full)
    }

    pub fn partial(ids: impl IntoIterator<Item = ElementId>) -> Self {
        Self::none().render(RenderKind::partial(ids))
    }

    pub fn render(mut self, kind: RenderKind) -> Self {
        self.render = Some(match self.render.take() {
            Some(existing) => existing.merge(kind),
            None => kind,
        });
        self
    }

    pub fn status(mut self, text: impl Into<String>) -> Self {
        self.status = Some(text.into());
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn log(mut self, text: impl Into<String>) -> Self {
        self.logs.push(text.into());
        self
    }

    pub fn start_ticker(mut self, kind: TickKind) -> Self {
        self.tickers.push(TickerCommand::Start(kind));
        self
    }

    pub fn stop_ticker(mut self, kind: TickKind) -> Self {
        self.tickers.push(TickerCommand::Stop(kind));
        self
    }

    pub fn job(mut self, job: Job) -> Self {
        self.job = Some(job);
        self
    }
}

/// One demo app.
pub trait App: Send {
    fn kind(&self) -> AppKind;

    /// Remote page for the current state.
    fn page(&self, cx: &AppContext<'_>) -> PageDescription;

    /// Local surface regions for the current state.
    fn mirror(&self, cx: &AppContext<'_>) -> Vec<MirrorRegion>;

    /// Status shown while a connect is in flight.
    fn connecting_status(&self) -> String;

    /// A connect resolved. The engine follows up with a full render.
    fn on_connected(&mut self, mode: DisplayMode, cx: &AppContext<'_>) -> Update;

    fn on_device(&mut self, event: &DeviceEvent, cx: &AppContext<'_>) -> Update;

    fn on_action(&mut self, _action: &LocalAction, _cx: &AppContext<'_>) -> Update {
        Update::none()
    }

    fn on_tick(&mut self, _kind: TickKind, _cx: &AppContext<'_>) -> Update {
        Update::none()
    }

    fn on_lifecycle(&mut self, _signal: LifecycleSignal, _cx: &AppContext<'_>) -> Update {
        Update::none()
    }

    fn on_job_finished(&mut self, _result: JobResult, _cx: &AppContext<'_>) -> Update {
        Update::none()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_app_kind_from_str() {
        assert_eq!("Timer".parse::<AppKind>().unwrap(), AppKind::Timer);
        assert!(matches!(
            "radio".parse::<AppKind>(),
            Err(Error::UnknownApp { .. })
        ));
    }

    #[test]
    fn test_every_app_builds_a_valid_page() {
        let prefs = Preferences::in_memory();
        for kind in AppKind::ALL {
            let app = kind.create(&prefs);
            let cx = testing::cx(&prefs, Some(DisplayMode::Mock));
            app.page(&cx)
                .validate()
                .unwrap_or_else(|e| panic!("{} page invalid: {}", kind, e));
            assert_eq!(app.kind(), kind);
        }
    }

    #[test]
    fn test_device_event_accessors() {
        let event = DeviceEvent::ingest(RawDeviceEvent::new(json!({
            "listEvent": {
                "eventType": "SCROLL_BOTTOM_EVENT",
                "containerName": "timer-list",
                "currentSelectItemName": "05:00"
            }
        })));
        assert_eq!(event.gesture, CanonicalGesture::Next);
        assert!(event.list_shaped);
        assert_eq!(event.container_name(), Some("timer-list"));
        assert_eq!(event.selected_name(), Some("05:00"));
    }

    #[test]
    fn test_update_render_merges() {
        let a = ElementId::new(1, "a");
        let update = Update::partial([a]).render(RenderKind::Full);
        assert_eq!(update.render, Some(RenderKind::Full));
    }
}
