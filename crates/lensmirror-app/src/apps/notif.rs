//! Phone notification viewer
//!
//! Incoming notifications are stored silently; the display stays blank until
//! a double-tap shows the pending one. While shown, a date-time header ticks
//! every second.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use lensmirror_bridge::DisplayMode;
use lensmirror_core::{
    CanonicalGesture, Element, ElementId, LifecycleSignal, PageDescription, Rect,
};

use super::{App, AppContext, AppKind, DeviceEvent, Update};
use crate::action::LocalAction;
use crate::coalescer::RenderKind;
use crate::mirror::MirrorRegion;
use crate::prefs::{Preferences, KEY_NOTIF_ALLOWED_APPS};
use crate::ticker::TickKind;

/// Relay handshake records carry this kind and are not notifications.
const KIND_CONNECTED: &str = "connected";

/// A record from the notification relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    pub app: String,
    pub title: String,
    pub text: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Notification {
    /// `[app]`, title and text on separate lines, empty parts skipped.
    pub fn glass_text(&self) -> String {
        let mut lines = Vec::new();
        if !self.app.is_empty() {
            lines.push(format!("[{}]", self.app));
        }
        if !self.title.is_empty() {
            lines.push(self.title.clone());
        }
        if !self.text.is_empty() {
            lines.push(self.text.clone());
        }
        lines.join("\n")
    }
}

/// `"Mon Jan 5 2026  3:04 PM"`
pub fn format_header(now: DateTime<Local>) -> String {
    now.format("%a %b %-d %Y  %-I:%M %p").to_string()
}

fn clock_id() -> ElementId {
    ElementId::new(1, "notif-clock")
}

fn body_id() -> ElementId {
    ElementId::new(2, "notif-body")
}

/// Case-insensitive allow-list. Empty allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    apps: Vec<String>,
}

impl AllowList {
    pub fn new(apps: Vec<String>) -> Self {
        Self { apps }
    }

    pub fn apps(&self) -> &[String] {
        &self.apps
    }

    pub fn allows(&self, app: &str) -> bool {
        self.apps.is_empty() || self.apps.iter().any(|a| a.eq_ignore_ascii_case(app))
    }

    /// Returns false when the name is blank or already present.
    pub fn add(&mut self, app: &str) -> bool {
        let app = app.trim();
        if app.is_empty() || self.apps.iter().any(|a| a == app) {
            return false;
        }
        self.apps.push(app.to_string());
        true
    }

    pub fn remove(&mut self, app: &str) -> bool {
        let before = self.apps.len();
        self.apps.retain(|a| a != app.trim());
        self.apps.len() != before
    }

    pub fn clear(&mut self) {
        self.apps.clear();
    }
}

#[derive(Debug)]
pub struct NotifApp {
    allowed: AllowList,
    pending: Option<Notification>,
    displaying: bool,
}

impl NotifApp {
    pub fn new(prefs: &Preferences) -> Self {
        let allowed = prefs
            .load::<Vec<String>>(KEY_NOTIF_ALLOWED_APPS)
            .unwrap_or_default();
        Self {
            allowed: AllowList::new(allowed),
            pending: None,
            displaying: false,
        }
    }

    pub fn allowed(&self) -> &AllowList {
        &self.allowed
    }

    pub fn pending(&self) -> Option<&Notification> {
        self.pending.as_ref()
    }

    pub fn is_displaying(&self) -> bool {
        self.displaying
    }

    fn header_text(&self, now: DateTime<Local>) -> String {
        if self.displaying {
            format_header(now)
        } else {
            " ".to_string()
        }
    }

    fn body_text(&self) -> String {
        match (&self.pending, self.displaying) {
            (Some(n), true) => {
                let text = n.glass_text();
                if text.is_empty() {
                    " ".to_string()
                } else {
                    text
                }
            }
            _ => " ".to_string(),
        }
    }

    fn show() -> Update {
        Update::partial([body_id(), clock_id()]).start_ticker(TickKind::Clock)
    }

    fn receive(&mut self, notification: &Notification) -> Update {
        if notification.kind.as_deref() == Some(KIND_CONNECTED) {
            return Update::none();
        }
        if !self.allowed.allows(&notification.app) {
            return Update::none().log(format!("Notif: filtered [{}]", notification.app));
        }

        self.pending = Some(notification.clone());
        let update = Update::none()
            .log(format!(
                "Notif: stored [{}] {}",
                notification.app, notification.title
            ))
            .status(format!(
                "Notif: new notification from {}, double-tap to view",
                notification.app
            ));
        // Refresh in place when something is already on screen
        if self.displaying {
            update.render(RenderKind::partial([body_id()]))
        } else {
            update
        }
    }

    fn toggle(&mut self) -> Update {
        if self.displaying {
            self.displaying = false;
            Update::partial([body_id(), clock_id()])
                .stop_ticker(TickKind::Clock)
                .log("Notif: display blank")
        } else if self.pending.is_some() {
            self.displaying = true;
            Self::show().log("Notif: showing notification")
        } else {
            Update::none()
        }
    }

    fn test_notification(&mut self, cx: &AppContext<'_>) -> Update {
        if cx.mode != Some(DisplayMode::Bridge) {
            return Update::none().status("Notif: not connected");
        }
        let test = Notification {
            app: "Test".to_string(),
            title: "Test Notification".to_string(),
            text: cx.now.format("%-I:%M:%S %p").to_string(),
            kind: None,
        };
        let sent = format!("Notif: test sent at {}", test.text);
        self.pending = Some(test);
        self.displaying = true;
        Self::show()
            .status("Notif: showing test notification...")
            .log(sent)
    }

    fn save_allowed(&self, cx: &AppContext<'_>) {
        cx.prefs.save(KEY_NOTIF_ALLOWED_APPS, &self.allowed.apps);
    }
}

impl App for NotifApp {
    fn kind(&self) -> AppKind {
        AppKind::Notif
    }

    fn page(&self, cx: &AppContext<'_>) -> PageDescription {
        PageDescription::new(vec![
            Element::text(clock_id(), Rect::new(0, 0, 576, 40), self.header_text(cx.now)),
            Element::text(body_id(), Rect::new(0, 40, 288, 248), self.body_text()).capturing(),
        ])
    }

    fn mirror(&self, cx: &AppContext<'_>) -> Vec<MirrorRegion> {
        let allowed = if self.allowed.apps.is_empty() {
            "(all apps allowed)".to_string()
        } else {
            self.allowed.apps.join(", ")
        };
        let pending = self
            .pending
            .as_ref()
            .map(Notification::glass_text)
            .unwrap_or_default();
        vec![
            MirrorRegion::new("header", self.header_text(cx.now)),
            MirrorRegion::new("notification", pending),
            MirrorRegion::new("displaying", self.displaying.to_string()),
            MirrorRegion::new("allowed", allowed),
        ]
    }

    fn connecting_status(&self) -> String {
        "Notif: connecting to Even bridge...".to_string()
    }

    fn on_connected(&mut self, mode: DisplayMode, _cx: &AppContext<'_>) -> Update {
        match mode {
            DisplayMode::Bridge => {
                let update = Update::none()
                    .status("Notif: connected. Double-tap glasses to view notifications.")
                    .log("Notif: bridge connected");
                if self.displaying {
                    update.start_ticker(TickKind::Clock)
                } else {
                    update
                }
            }
            DisplayMode::Mock => {
                self.displaying = false;
                Update::none()
                    .status("Notif: error, Even bridge not found. Open this app via the Even App.")
                    .log("Notif: bridge not found")
                    .stop_ticker(TickKind::Clock)
            }
        }
    }

    fn on_device(&mut self, event: &DeviceEvent, _cx: &AppContext<'_>) -> Update {
        match event.gesture {
            CanonicalGesture::SecondaryToggle => self.toggle(),
            _ => Update::none(),
        }
    }

    fn on_action(&mut self, action: &LocalAction, cx: &AppContext<'_>) -> Update {
        match action {
            LocalAction::Notify(notification) => self.receive(notification),
            LocalAction::TestNotification | LocalAction::Run => self.test_notification(cx),
            LocalAction::AllowAdd(app) => {
                if !self.allowed.add(app) {
                    return Update::none();
                }
                self.save_allowed(cx);
                Update::none().log(format!("Notif: added filter [{}]", app.trim()))
            }
            LocalAction::AllowRemove(app) => {
                if !self.allowed.remove(app) {
                    return Update::none();
                }
                self.save_allowed(cx);
                Update::none().log(format!("Notif: removed filter [{}]", app.trim()))
            }
            LocalAction::AllowClear => {
                self.allowed.clear();
                self.save_allowed(cx);
                Update::none().log("Notif: cleared all app filters")
            }
            _ => Update::none(),
        }
    }

    fn on_tick(&mut self, kind: TickKind, _cx: &AppContext<'_>) -> Update {
        match kind {
            TickKind::Clock if self.displaying => Update::partial([clock_id()]),
            _ => Update::none(),
        }
    }

    fn on_lifecycle(&mut self, signal: LifecycleSignal, _cx: &AppContext<'_>) -> Update {
        match signal {
            LifecycleSignal::ForegroundExit => Update::none().stop_ticker(TickKind::Clock),
            LifecycleSignal::ForegroundEnter => {
                let update = Update::full();
                if self.displaying {
                    update.start_ticker(TickKind::Clock)
                } else {
                    update
                }
            }
            LifecycleSignal::AbnormalExit => {
                self.displaying = false;
                Update::none()
                    .stop_ticker(TickKind::Clock)
                    .log("Notif: bridge disconnected, reconnecting in 3s...")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::testing::{at, cx, text_event};
    use serde_json::json;

    fn notification(app: &str, title: &str, text: &str) -> Notification {
        Notification {
            app: app.into(),
            title: title.into(),
            text: text.into(),
            kind: None,
        }
    }

    #[test]
    fn test_header_format() {
        assert_eq!(format_header(at(15, 4, 5)), "Mon Jan 5 2026  3:04 PM");
        assert_eq!(format_header(at(0, 7, 0)), "Mon Jan 5 2026  12:07 AM");
    }

    #[test]
    fn test_glass_text_skips_empty_parts() {
        assert_eq!(
            notification("Slack", "", "hello").glass_text(),
            "[Slack]\nhello"
        );
        assert_eq!(notification("", "", "").glass_text(), "");
    }

    #[test]
    fn test_notification_deserializes_relay_record() {
        let n: Notification =
            serde_json::from_value(json!({"app": "Mail", "title": "Hi", "type": "connected"}))
                .unwrap();
        assert_eq!(n.text, "");
        assert_eq!(n.kind.as_deref(), Some("connected"));
    }

    #[test]
    fn test_stored_silently_then_shown_on_double_tap() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = NotifApp::new(&prefs);

        let update = app.on_action(
            &LocalAction::Notify(notification("WhatsApp", "John", "Hey!")),
            &cx,
        );
        assert_eq!(update.render, None);
        assert_eq!(update.logs, vec!["Notif: stored [WhatsApp] John"]);
        assert_eq!(
            update.status.as_deref(),
            Some("Notif: new notification from WhatsApp, double-tap to view")
        );
        assert_eq!(app.page(&cx).elements[1].content(), Some(" "));

        let update = app.on_device(&text_event(json!("DOUBLE_CLICK_EVENT")), &cx);
        assert!(app.is_displaying());
        assert_eq!(
            update.render,
            Some(RenderKind::partial([body_id(), clock_id()]))
        );
        assert!(update
            .tickers
            .contains(&crate::apps::TickerCommand::Start(TickKind::Clock)));

        let page = app.page(&cx);
        assert_eq!(page.elements[1].content(), Some("[WhatsApp]\nJohn\nHey!"));
        assert_eq!(page.elements[0].content(), Some("Mon Jan 5 2026  3:04 PM"));

        app.on_device(&text_event(json!(3)), &cx);
        assert!(!app.is_displaying());
        assert_eq!(app.page(&cx).elements[0].content(), Some(" "));
    }

    #[test]
    fn test_double_tap_without_pending_does_nothing() {
        let prefs = Preferences::in_memory();
        let mut app = NotifApp::new(&prefs);
        let update = app.on_device(
            &text_event(json!(3)),
            &cx(&prefs, Some(DisplayMode::Bridge)),
        );
        assert_eq!(update, Update::none());
        assert!(!app.is_displaying());
    }

    #[test]
    fn test_allow_list_filters_case_insensitively_and_persists() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = NotifApp::new(&prefs);

        let update = app.on_action(&LocalAction::AllowAdd("WhatsApp".into()), &cx);
        assert_eq!(update.logs, vec!["Notif: added filter [WhatsApp]"]);
        assert_eq!(
            prefs.load::<Vec<String>>(KEY_NOTIF_ALLOWED_APPS),
            Some(vec!["WhatsApp".to_string()])
        );

        let update = app.on_action(&LocalAction::Notify(notification("Mail", "x", "")), &cx);
        assert_eq!(update.logs, vec!["Notif: filtered [Mail]"]);
        assert!(app.pending().is_none());

        app.on_action(
            &LocalAction::Notify(notification("whatsapp", "y", "")),
            &cx,
        );
        assert_eq!(app.pending().map(|n| n.title.as_str()), Some("y"));

        assert_eq!(NotifApp::new(&prefs).allowed().apps(), &["WhatsApp"]);
        app.on_action(&LocalAction::AllowClear, &cx);
        assert!(app.allowed().allows("anything"));
    }

    #[test]
    fn test_connected_handshake_is_ignored() {
        let prefs = Preferences::in_memory();
        let mut app = NotifApp::new(&prefs);
        let mut handshake = notification("", "", "");
        handshake.kind = Some("connected".into());
        let update = app.on_action(&LocalAction::Notify(handshake), &cx(&prefs, None));
        assert_eq!(update, Update::none());
        assert!(app.pending().is_none());
    }

    #[test]
    fn test_test_notification_requires_bridge() {
        let prefs = Preferences::in_memory();
        let mut app = NotifApp::new(&prefs);

        let update = app.on_action(&LocalAction::TestNotification, &cx(&prefs, Some(DisplayMode::Mock)));
        assert_eq!(update.status.as_deref(), Some("Notif: not connected"));

        let update = app.on_action(
            &LocalAction::TestNotification,
            &cx(&prefs, Some(DisplayMode::Bridge)),
        );
        assert!(app.is_displaying());
        assert_eq!(update.logs, vec!["Notif: test sent at 3:04:05 PM"]);
        assert_eq!(app.pending().map(|n| n.app.as_str()), Some("Test"));
    }

    #[test]
    fn test_clock_ticks_only_while_displaying() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = NotifApp::new(&prefs);
        assert_eq!(app.on_tick(TickKind::Clock, &cx), Update::none());

        app.on_action(&LocalAction::TestNotification, &cx);
        assert_eq!(
            app.on_tick(TickKind::Clock, &cx).render,
            Some(RenderKind::partial([clock_id()]))
        );
    }

    #[test]
    fn test_lifecycle_signals() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = NotifApp::new(&prefs);
        app.on_action(&LocalAction::TestNotification, &cx);

        let exit = app.on_lifecycle(LifecycleSignal::ForegroundExit, &cx);
        assert_eq!(
            exit.tickers,
            vec![crate::apps::TickerCommand::Stop(TickKind::Clock)]
        );

        let enter = app.on_lifecycle(LifecycleSignal::ForegroundEnter, &cx);
        assert_eq!(enter.render, Some(RenderKind::Full));
        assert!(enter
            .tickers
            .contains(&crate::apps::TickerCommand::Start(TickKind::Clock)));

        let lost = app.on_lifecycle(LifecycleSignal::AbnormalExit, &cx);
        assert!(!app.is_displaying());
        assert_eq!(
            lost.logs,
            vec!["Notif: bridge disconnected, reconnecting in 3s..."]
        );
    }
}
