//! Layout playground
//!
//! Renders a declarative page (JSON or TOML) loaded from a file and logs
//! every device event it receives.

use std::path::{Path, PathBuf};

use lensmirror_bridge::DisplayMode;
use lensmirror_core::prelude::*;
use lensmirror_core::{CanonicalGesture, Element, ElementId, PageDescription, Rect};

use super::{App, AppContext, AppKind, DeviceEvent, Update};
use crate::action::LocalAction;
use crate::mirror::MirrorRegion;

fn default_page() -> PageDescription {
    PageDescription::new(vec![
        Element::text(
            ElementId::new(1, "quicktest-title"),
            Rect::new(8, 8, 560, 48),
            "Quicktest: load a layout file",
        ),
        Element::list(
            ElementId::new(2, "quicktest-list"),
            Rect::new(8, 64, 560, 216),
            vec!["Item 1".into(), "Item 2".into(), "Item 3".into()],
            550,
        )
        .capturing(),
    ])
}

fn gesture_label(gesture: CanonicalGesture) -> &'static str {
    match gesture {
        CanonicalGesture::Primary => "CLICK",
        CanonicalGesture::Previous => "UP",
        CanonicalGesture::Next => "DOWN",
        CanonicalGesture::SecondaryToggle => "DOUBLE_CLICK",
        CanonicalGesture::Unknown => "UNKNOWN",
    }
}

pub fn load_layout(path: &Path) -> Result<PageDescription> {
    let source = std::fs::read_to_string(path)?;
    PageDescription::from_source(&source)
}

#[derive(Debug)]
pub struct QuicktestApp {
    page: PageDescription,
    source: Option<PathBuf>,
    rendered: bool,
}

impl Default for QuicktestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl QuicktestApp {
    pub fn new() -> Self {
        Self {
            page: default_page(),
            source: None,
            rendered: false,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn render_status(&mut self) -> Update {
        if self.rendered {
            Update::full()
                .status("Quicktest: page rebuilt from source input")
                .log("Quicktest: page rebuilt")
        } else {
            self.rendered = true;
            Update::full()
                .status("Quicktest: startup UI rendered from source input")
                .log("Quicktest: startup UI created")
        }
    }

    fn failed(error: &Error) -> Update {
        Update::none()
            .status(format!(
                "Quicktest: failed to render source input ({})",
                error
            ))
            .log("Quicktest: render failed")
    }

    fn load(&mut self, path: &Path, cx: &AppContext<'_>) -> Update {
        match load_layout(path) {
            Ok(page) => {
                info!("Loaded layout from {}", path.display());
                self.page = page;
                self.source = Some(path.to_path_buf());
                if cx.is_connected() {
                    self.render_status()
                } else {
                    Update::none()
                        .status(format!("Quicktest: source loaded from {}", path.display()))
                        .log("Quicktest: source loaded")
                }
            }
            Err(e) => {
                warn!("Layout {} rejected: {}", path.display(), e);
                Self::failed(&e)
            }
        }
    }
}

impl App for QuicktestApp {
    fn kind(&self) -> AppKind {
        AppKind::Quicktest
    }

    fn page(&self, _cx: &AppContext<'_>) -> PageDescription {
        self.page.clone()
    }

    fn mirror(&self, _cx: &AppContext<'_>) -> Vec<MirrorRegion> {
        let elements = self
            .page
            .elements
            .iter()
            .map(|e| {
                let kind = match e {
                    Element::Text(_) => "text",
                    Element::List(_) => "list",
                };
                let capture = if e.is_event_capture() { " capture" } else { "" };
                format!("{} {}{}", kind, e.id(), capture)
            })
            .collect::<Vec<_>>()
            .join("\n");

        vec![
            MirrorRegion::new(
                "source",
                self.source
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(built-in)".to_string()),
            ),
            MirrorRegion::new("elements", elements),
        ]
    }

    fn connecting_status(&self) -> String {
        "Quicktest: connecting to bridge...".to_string()
    }

    fn on_connected(&mut self, mode: DisplayMode, _cx: &AppContext<'_>) -> Update {
        let update = match mode {
            DisplayMode::Bridge => Update::none().log("Quicktest: bridge connected"),
            DisplayMode::Mock => Update::none().log("Quicktest: bridge connect failed"),
        };
        let rendered = self.render_status();
        Update {
            logs: [update.logs, rendered.logs].concat(),
            ..rendered
        }
    }

    fn on_device(&mut self, event: &DeviceEvent, _cx: &AppContext<'_>) -> Update {
        let selected = event
            .selected_name()
            .map(str::to_string)
            .or_else(|| {
                event
                    .raw
                    .list_event()
                    .and_then(|l| l.get("currentSelectItemIndex"))
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string())
            })
            .unwrap_or_else(|| "-".to_string());

        Update::none().log(format!(
            "Quicktest glass: {} | container={} | selected={}",
            gesture_label(event.gesture),
            event.container_name().unwrap_or("-"),
            selected
        ))
    }

    fn on_action(&mut self, action: &LocalAction, cx: &AppContext<'_>) -> Update {
        match action {
            LocalAction::Layout(path) => self.load(path, cx),
            LocalAction::Render => match self.source.clone() {
                Some(path) => self.load(&path, cx),
                None => self.render_status(),
            },
            LocalAction::Reset => {
                self.page = default_page();
                self.source = None;
                Update::none()
                    .status("Quicktest: source reset to the built-in page")
                    .log("Quicktest: source reset")
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
    use lensmirror_core::RawDeviceEvent;
    use serde_json::json;
    use std::io::Write;

    const LAYOUT: &str = r#"
[[elements]]
kind = "text"
id = 1
name = "hello"
x = 0
y = 0
width = 200
height = 40
content = "Hello"
event_capture = true
"#;

    fn layout_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_connect_renders_startup_then_rebuilds() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = QuicktestApp::new();

        let update = app.on_connected(DisplayMode::Bridge, &cx);
        assert_eq!(
            update.status.as_deref(),
            Some("Quicktest: startup UI rendered from source input")
        );
        assert_eq!(
            update.logs,
            vec!["Quicktest: bridge connected", "Quicktest: startup UI created"]
        );

        let update = app.on_action(&LocalAction::Render, &cx);
        assert_eq!(update.render, Some(RenderKind::Full));
        assert_eq!(
            update.status.as_deref(),
            Some("Quicktest: page rebuilt from source input")
        );
    }

    #[test]
    fn test_layout_file_loaded_and_rendered() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = QuicktestApp::new();
        app.on_connected(DisplayMode::Bridge, &cx);

        let file = layout_file(LAYOUT);
        let update = app.on_action(&LocalAction::Layout(file.path().to_path_buf()), &cx);
        assert_eq!(update.render, Some(RenderKind::Full));

        let page = app.page(&cx);
        assert_eq!(page.elements.len(), 1);
        assert_eq!(page.elements[0].content(), Some("Hello"));
        assert_eq!(app.source(), Some(file.path()));
    }

    #[test]
    fn test_invalid_layout_keeps_previous_page() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = QuicktestApp::new();

        let file = layout_file(r#"{"elements": []}"#);
        let update = app.on_action(&LocalAction::Layout(file.path().to_path_buf()), &cx);
        assert_eq!(update.render, None);
        assert!(update
            .status
            .as_deref()
            .unwrap()
            .starts_with("Quicktest: failed to render source input ("));
        assert_eq!(update.logs, vec!["Quicktest: render failed"]);
        assert_eq!(app.page(&cx), default_page());
    }

    #[test]
    fn test_missing_file_reported() {
        let prefs = Preferences::in_memory();
        let mut app = QuicktestApp::new();
        let update = app.on_action(
            &LocalAction::Layout(PathBuf::from("/nonexistent/layout.toml")),
            &cx(&prefs, None),
        );
        assert_eq!(update.logs, vec!["Quicktest: render failed"]);
    }

    #[test]
    fn test_device_events_are_logged_only() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = QuicktestApp::new();

        let update = app.on_device(&list_event(json!("SCROLL_TOP_EVENT"), Some(2)), &cx);
        assert_eq!(update.render, None);
        assert_eq!(
            update.logs,
            vec!["Quicktest glass: UP | container=- | selected=2"]
        );

        let event = DeviceEvent::ingest(RawDeviceEvent::new(json!({
            "listEvent": {
                "eventType": 0,
                "containerName": "quicktest-list",
                "currentSelectItemName": "Item 2"
            }
        })));
        assert_eq!(
            app.on_device(&event, &cx).logs,
            vec!["Quicktest glass: CLICK | container=quicktest-list | selected=Item 2"]
        );
    }

    #[test]
    fn test_reset_restores_default_page() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, None);
        let mut app = QuicktestApp::new();
        let file = layout_file(LAYOUT);
        app.on_action(&LocalAction::Layout(file.path().to_path_buf()), &cx);
        assert!(app.source().is_some());

        app.on_action(&LocalAction::Reset, &cx);
        assert_eq!(app.source(), None);
        assert_eq!(app.page(&cx), default_page());
    }
}
