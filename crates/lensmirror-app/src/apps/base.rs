//! Base template: counter, active flag and a theme list

use lensmirror_bridge::DisplayMode;
use lensmirror_core::{CanonicalGesture, Element, ElementId, PageDescription, Rect};

use super::{App, AppContext, AppKind, DeviceEvent, Update};
use crate::action::LocalAction;
use crate::mirror::MirrorRegion;
use crate::session::ListSelection;

const THEMES: [&str; 3] = ["Blue", "Green", "Orange"];

fn state_id() -> ElementId {
    ElementId::new(1, "base-state")
}

fn counter_id() -> ElementId {
    ElementId::new(2, "base-counter")
}

fn themes_id() -> ElementId {
    ElementId::new(3, "base-themes")
}

#[derive(Debug)]
pub struct BaseApp {
    counter: u64,
    active: bool,
    theme: ListSelection,
    last_event: String,
}

impl Default for BaseApp {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseApp {
    pub fn new() -> Self {
        Self {
            counter: 0,
            active: false,
            theme: ListSelection::new(THEMES.iter().map(|t| t.to_string()).collect()),
            last_event: "none".to_string(),
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn theme(&self) -> &str {
        self.theme.selected_label().unwrap_or(THEMES[0])
    }

    fn state_text(&self) -> String {
        format!(
            "Base Template | State: {} | Theme: {}",
            self.state_label(),
            self.theme()
        )
    }

    fn counter_text(&self) -> String {
        format!("Counter: {} | Last: {}", self.counter, self.last_event)
    }

    fn state_label(&self) -> &'static str {
        if self.active {
            "active"
        } else {
            "idle"
        }
    }

    fn sync_texts() -> Update {
        Update::partial([state_id(), counter_id()])
    }

    /// Local controls only reach the display once connected; state still
    /// changes so the next sync picks it up.
    fn local(&self, cx: &AppContext<'_>, status: &str, log: &str) -> Update {
        if !cx.is_connected() {
            return Update::none()
                .status("Base template: not connected")
                .log("Base template: action blocked (not connected)");
        }
        Self::sync_texts()
            .status(status)
            .log(format!("Base template: {}", log))
    }
}

impl App for BaseApp {
    fn kind(&self) -> AppKind {
        AppKind::Base
    }

    fn page(&self, _cx: &AppContext<'_>) -> PageDescription {
        PageDescription::new(vec![
            Element::text(state_id(), Rect::new(8, 10, 560, 52), self.state_text()),
            Element::text(counter_id(), Rect::new(8, 64, 560, 62), self.counter_text()),
            Element::list(
                themes_id(),
                Rect::new(4, 132, 572, 156),
                self.theme.options().to_vec(),
                566,
            )
            .capturing(),
        ])
    }

    fn mirror(&self, _cx: &AppContext<'_>) -> Vec<MirrorRegion> {
        vec![
            MirrorRegion::new("counter", self.counter.to_string()),
            MirrorRegion::new("state", self.state_label()),
            MirrorRegion::new("theme", self.theme()),
            MirrorRegion::new("last_event", self.last_event.clone()),
        ]
    }

    fn connecting_status(&self) -> String {
        "Base template: connecting to Even bridge...".to_string()
    }

    fn on_connected(&mut self, mode: DisplayMode, _cx: &AppContext<'_>) -> Update {
        match mode {
            DisplayMode::Bridge => Update::none()
                .status("Base template: connected. Web panel + glasses view are synchronized.")
                .log("Base template: bridge connected"),
            DisplayMode::Mock => Update::none()
                .status("Base template: bridge unavailable. Running browser-only mock mode.")
                .log("Base template: mock mode"),
        }
    }

    fn on_device(&mut self, event: &DeviceEvent, _cx: &AppContext<'_>) -> Update {
        let hint = event.hint(self.theme.options());
        self.theme.apply(event.gesture, hint, event.list_shaped);

        match event.gesture {
            CanonicalGesture::Primary => self.active = !self.active,
            CanonicalGesture::SecondaryToggle => {
                self.counter = 0;
                self.active = false;
            }
            _ => {}
        }

        // Firmware workaround: an unclassified list event without a hint is a
        // click on the first row.
        self.last_event = if event.gesture == CanonicalGesture::Unknown
            && event.list_shaped
            && !hint.has_explicit_index()
        {
            format!("glasses: list-fallback -> {}", self.theme())
        } else {
            format!("glasses: {}", event.gesture.label())
        };

        Self::sync_texts().log(format!(
            "Base template: {}, theme={}, counter={}",
            self.last_event,
            self.theme(),
            self.counter
        ))
    }

    fn on_action(&mut self, action: &LocalAction, cx: &AppContext<'_>) -> Update {
        match action {
            LocalAction::Increment | LocalAction::Run => {
                self.counter += 1;
                self.last_event = "web: main action button".to_string();
                self.local(
                    cx,
                    "Base template: counter incremented and synced.",
                    "web: main action button",
                )
            }
            LocalAction::Decrement => {
                self.counter = self.counter.saturating_sub(1);
                self.last_event = "web: counter -1".to_string();
                self.local(
                    cx,
                    "Base template: counter decremented and synced.",
                    "web: counter -1",
                )
            }
            LocalAction::Reset => {
                self.counter = 0;
                self.active = false;
                self.last_event = "web: reset".to_string();
                self.local(cx, "Base template: reset and synced.", "web: reset")
            }
            LocalAction::Sync => {
                self.last_event = "web: manual sync".to_string();
                self.local(cx, "Base template: synced to glasses.", "web: manual sync")
            }
            _ => Update::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::testing::{cx, list_event};
    use crate::coalescer::RenderKind;
    use crate::prefs::Preferences;
    use serde_json::{json, Value};

    #[test]
    fn test_click_toggles_active_and_selects_row() {
        let prefs = Preferences::in_memory();
        let mut app = BaseApp::new();
        let update = app.on_device(&list_event(json!(0), Some(2)), &cx(&prefs, None));

        assert!(app.is_active());
        assert_eq!(app.theme(), "Orange");
        assert_eq!(
            update.render,
            Some(RenderKind::partial([state_id(), counter_id()]))
        );
        assert_eq!(
            app.page(&cx(&prefs, None)).elements[0].content(),
            Some("Base Template | State: active | Theme: Orange")
        );
    }

    #[test]
    fn test_double_click_resets_counter() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Mock));
        let mut app = BaseApp::new();
        app.on_action(&LocalAction::Increment, &cx);
        app.on_action(&LocalAction::Increment, &cx);
        app.on_device(&list_event(json!(0), None), &cx);
        assert_eq!(app.counter(), 2);

        app.on_device(&list_event(json!("DOUBLE_CLICK_EVENT"), None), &cx);
        assert_eq!(app.counter(), 0);
        assert!(!app.is_active());
        assert_eq!(app.last_event, "glasses: double-click");
    }

    #[test]
    fn test_scroll_moves_theme_without_wrap() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, None);
        let mut app = BaseApp::new();
        for _ in 0..4 {
            app.on_device(&list_event(json!("SCROLL_BOTTOM_EVENT"), None), &cx);
        }
        assert_eq!(app.theme(), "Orange");
        app.on_device(&list_event(json!(1), None), &cx);
        assert_eq!(app.theme(), "Green");
    }

    #[test]
    fn test_unknown_list_event_falls_back_to_first_row() {
        let prefs = Preferences::in_memory();
        let mut app = BaseApp::new();
        app.theme.select(2);
        app.on_device(&list_event(Value::Null, None), &cx(&prefs, None));

        assert_eq!(app.theme(), "Blue");
        assert_eq!(app.last_event, "glasses: list-fallback -> Blue");
    }

    #[test]
    fn test_local_actions_blocked_until_connected() {
        let prefs = Preferences::in_memory();
        let mut app = BaseApp::new();
        let update = app.on_action(&LocalAction::Increment, &cx(&prefs, None));

        assert_eq!(update.render, None);
        assert_eq!(update.status.as_deref(), Some("Base template: not connected"));
        // State still moved
        assert_eq!(app.counter(), 1);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let prefs = Preferences::in_memory();
        let mut app = BaseApp::new();
        let update = app.on_action(&LocalAction::Decrement, &cx(&prefs, Some(DisplayMode::Bridge)));
        assert_eq!(app.counter(), 0);
        assert_eq!(
            update.status.as_deref(),
            Some("Base template: counter decremented and synced.")
        );
        assert_eq!(app.counter_text(), "Counter: 0 | Last: web: counter -1");
    }
}
