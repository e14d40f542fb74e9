//! REST command launcher
//!
//! The device shows the commands matching the active tag filter. Click runs
//! the selected one as an HTTP GET, double-click cycles the filter. One
//! request may be in flight at a time; its summary lands on the device
//! status line.

pub mod body;
pub mod store;

use lensmirror_bridge::DisplayMode;
use lensmirror_core::{CanonicalGesture, Element, ElementId, PageDescription, Rect};

use super::{App, AppContext, AppKind, DeviceEvent, Update};
use crate::action::LocalAction;
use crate::jobs::{Job, JobResult};
use crate::mirror::MirrorRegion;
use crate::prefs::{Preferences, KEY_RESTAPI_COMMANDS};
use crate::session::ListSelection;

pub use body::format_response_body;
pub use store::{tag_filter_label, CommandStore, RestCommand, Upserted, TAG_ALL};

const TITLE: &str = "REST API (Click run, Dbl tag)";
const INITIAL_DEVICE_STATUS: &str = "Select command and click";
const EMPTY_PLACEHOLDER: &str = "No command configured";

fn title_id() -> ElementId {
    ElementId::new(1, "restapi-title")
}

fn status_id() -> ElementId {
    ElementId::new(2, "restapi-status")
}

fn list_id() -> ElementId {
    ElementId::new(3, "restapi-command-list")
}

#[derive(Debug)]
pub struct RestApiApp {
    store: CommandStore,
    filter: String,
    /// Rows of the filtered list, as device labels
    selection: ListSelection,
    device_status: String,
    response: String,
    in_flight: Option<RestCommand>,
}

impl RestApiApp {
    pub fn new(prefs: &Preferences) -> Self {
        let store = prefs
            .load::<Vec<RestCommand>>(KEY_RESTAPI_COMMANDS)
            .map(CommandStore::from_saved)
            .unwrap_or_default();
        let mut app = Self {
            store,
            filter: TAG_ALL.to_string(),
            selection: ListSelection::default(),
            device_status: INITIAL_DEVICE_STATUS.to_string(),
            response: String::new(),
            in_flight: None,
        };
        app.refresh_rows(None);
        app
    }

    pub fn store(&self) -> &CommandStore {
        &self.store
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn device_status(&self) -> &str {
        &self.device_status
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    fn filtered(&self) -> Vec<&RestCommand> {
        self.store.filtered(&self.filter)
    }

    pub fn selected_command(&self) -> Option<&RestCommand> {
        self.filtered().get(self.selection.selected()).copied()
    }

    /// Rebuild the device rows; select `preferred` when it is visible.
    fn refresh_rows(&mut self, preferred: Option<u32>) {
        let filtered = self.filtered();
        let labels = filtered.iter().map(|c| c.glass_label()).collect();
        let preferred_index =
            preferred.map(|id| filtered.iter().position(|c| c.id == id).unwrap_or(0));

        self.selection.set_options(labels);
        if let Some(index) = preferred_index {
            self.selection.select(index);
        }
    }

    fn filter_status(&self) -> String {
        format!(
            "Filter: {} | {} cmd(s)",
            tag_filter_label(&self.filter),
            self.filtered().len()
        )
    }

    fn save_commands(&self, cx: &AppContext<'_>) {
        cx.prefs.save(KEY_RESTAPI_COMMANDS, &self.store.list());
    }

    /// Re-render the list after a store or filter change.
    fn list_changed(&mut self) -> Update {
        self.device_status = self.filter_status();
        Update::full()
    }

    fn run(&mut self, command: RestCommand) -> Update {
        if self.in_flight.is_some() {
            return Update::none()
                .status("Request already in progress")
                .log("REST API: request ignored (already in progress)");
        }

        self.device_status = format!("Loading {}...", command.display_name());
        let update = Update::partial([status_id()])
            .status(format!("Fetching {} ...", command.url))
            .log(format!(
                "REST API: GET {} ({})",
                command.url,
                command.display_name()
            ))
            .job(Job::HttpGet {
                url: command.url.clone(),
            });
        self.in_flight = Some(command);
        update
    }

    fn set_filter(&mut self, raw: &str) -> Update {
        let wanted = raw.trim().to_lowercase();
        let filter = if wanted == "all" || wanted == TAG_ALL {
            TAG_ALL.to_string()
        } else if self.store.available_tags().contains(&wanted) {
            wanted
        } else {
            return Update::none().status(format!("Unknown tag: {}", raw.trim()));
        };

        self.filter = filter;
        self.refresh_rows(None);
        self.selection.select(0);
        self.list_changed().log(format!(
            "REST API: tag filter set to {}",
            tag_filter_label(&self.filter)
        ))
    }

    fn add_command(&mut self, url: &str, name: &str, tags: &[String], cx: &AppContext<'_>) -> Update {
        if url.trim().is_empty() {
            return Update::none().status("Enter a URL before adding");
        }
        let Upserted { command, created } = self.store.upsert(url, name, tags);
        self.save_commands(cx);
        self.refresh_rows(Some(command.id));

        let (status, log) = if created {
            (
                format!("Added command: {}", command.display_name()),
                format!("REST API: added command {}", command.url),
            )
        } else {
            (
                format!("Updated command: {}", command.display_name()),
                format!("REST API: updated command {}", command.url),
            )
        };
        self.list_changed().status(status).log(log)
    }

    fn remove_command(&mut self, id: u32, cx: &AppContext<'_>) -> Update {
        let Some(removed) = self.store.remove(id) else {
            return Update::none().status("No command selected");
        };
        self.save_commands(cx);
        self.refresh_rows(None);
        // Filter may have lost its last tag
        if self.filter != TAG_ALL && self.filtered().is_empty() {
            self.filter = TAG_ALL.to_string();
            self.refresh_rows(None);
        }

        self.list_changed()
            .status(format!("Removed command: {}", removed.display_name()))
            .log(format!("REST API: removed command {}", removed.url))
    }

    fn finish(&mut self, result: JobResult) -> Update {
        let Some(command) = self.in_flight.take() else {
            return Update::none();
        };

        match result.outcome {
            Ok(reply) => {
                let status_line = reply.status_line();
                let formatted = format_response_body(&reply.body, &reply.content_type);
                let preview = body::preview(&formatted);
                self.device_status = format!(
                    "{} {}\n{}",
                    command.display_name(),
                    status_line,
                    body::compact(&preview)
                );
                self.response = formatted;

                Update::partial([status_id()])
                    .status(format!("GET complete: {}", status_line))
                    .log(format!("REST API: {}", status_line))
                    .log(format!(
                        "REST API response preview: {}",
                        preview.replace('\n', " ")
                    ))
            }
            Err(message) => {
                self.device_status = format!(
                    "GET failed: {}",
                    body::truncate_chars(&message, 80, "")
                );
                self.response = format!("Request failed:\n{}", message);

                Update::partial([status_id()])
                    .status("GET failed")
                    .log(format!("REST API: request failed ({})", message))
            }
        }
    }
}

impl App for RestApiApp {
    fn kind(&self) -> AppKind {
        AppKind::Restapi
    }

    fn page(&self, _cx: &AppContext<'_>) -> PageDescription {
        let rows = if self.selection.is_empty() {
            vec![EMPTY_PLACEHOLDER.to_string()]
        } else {
            self.selection.options().to_vec()
        };
        PageDescription::new(vec![
            Element::text(title_id(), Rect::new(8, 0, 560, 34), TITLE),
            Element::text(status_id(), Rect::new(8, 36, 560, 62), self.device_status.clone()),
            Element::list(list_id(), Rect::new(4, 102, 572, 186), rows, 566).capturing(),
        ])
    }

    fn mirror(&self, _cx: &AppContext<'_>) -> Vec<MirrorRegion> {
        let selected_id = self.selected_command().map(|c| c.id);
        let commands = self
            .store
            .list()
            .iter()
            .map(|c| {
                let marker = if Some(c.id) == selected_id { '>' } else { ' ' };
                format!("{}{}: {}", marker, c.id, c.local_label())
            })
            .collect::<Vec<_>>()
            .join("\n");

        vec![
            MirrorRegion::new("commands", commands),
            MirrorRegion::new(
                "selected",
                self.selected_command()
                    .map(|c| c.display_name().to_string())
                    .unwrap_or_default(),
            ),
            MirrorRegion::new("filter", tag_filter_label(&self.filter)),
            MirrorRegion::new("device_status", self.device_status.clone()),
            MirrorRegion::new("response", self.response.clone()),
        ]
    }

    fn connecting_status(&self) -> String {
        "REST API: connecting to Even bridge...".to_string()
    }

    fn on_connected(&mut self, mode: DisplayMode, _cx: &AppContext<'_>) -> Update {
        let preferred = self.selected_command().map(|c| c.id);
        self.refresh_rows(preferred);

        match mode {
            DisplayMode::Bridge => {
                self.device_status = self.filter_status();
                Update::none()
                    .status("REST API ready. Up/Down select, Click run, Double-click switches tag filter.")
                    .log("REST API: controls initialized (bridge mode)")
            }
            DisplayMode::Mock => {
                self.device_status = INITIAL_DEVICE_STATUS.to_string();
                Update::none()
                    .status("REST API controls ready. Bridge not found, browser mode active.")
                    .log("REST API: controls initialized (mock mode)")
            }
        }
    }

    fn on_device(&mut self, event: &DeviceEvent, _cx: &AppContext<'_>) -> Update {
        if self.selection.is_empty() {
            return Update::none();
        }
        let hint = event.hint(self.selection.options());

        match event.gesture {
            CanonicalGesture::SecondaryToggle => {
                self.filter = self.store.next_tag_filter(&self.filter);
                self.refresh_rows(None);
                self.selection.select(0);
                self.list_changed().log(format!(
                    "REST API glass: switched filter to {}",
                    tag_filter_label(&self.filter)
                ))
            }
            CanonicalGesture::Previous | CanonicalGesture::Next => {
                self.selection.apply(event.gesture, hint, event.list_shaped);
                let direction = if event.gesture == CanonicalGesture::Next {
                    "down"
                } else {
                    "up"
                };
                let name = self
                    .selected_command()
                    .map(|c| c.display_name().to_string())
                    .unwrap_or_default();
                Update::none().log(format!("REST API glass: {} -> {}", direction, name))
            }
            CanonicalGesture::Primary | CanonicalGesture::Unknown if event.list_shaped => {
                self.selection.apply(event.gesture, hint, true);
                let Some(command) = self.selected_command().cloned() else {
                    return Update::none();
                };
                let mut update = self.run(command.clone());
                update
                    .logs
                    .insert(0, format!("REST API glass: run {}", command.display_name()));
                update
            }
            _ => Update::none(),
        }
    }

    fn on_action(&mut self, action: &LocalAction, cx: &AppContext<'_>) -> Update {
        match action {
            LocalAction::CommandAdd { url, name, tags } => self.add_command(url, name, tags, cx),
            LocalAction::CommandRemove(id) => self.remove_command(*id, cx),
            LocalAction::CommandSelect(id) => {
                if self.store.find(*id).is_none() {
                    return Update::none().status("No command selected");
                }
                self.refresh_rows(Some(*id));
                self.list_changed()
            }
            LocalAction::Filter(tag) => self.set_filter(tag),
            LocalAction::Run => {
                if !cx.is_connected() {
                    return Update::none()
                        .status("Run setup first")
                        .log("REST API: request blocked (setup not run)");
                }
                match self.selected_command().cloned() {
                    Some(command) => self.run(command),
                    None => Update::none()
                        .status("No command selected")
                        .log("REST API: request blocked (no command selected)"),
                }
            }
            _ => Update::none(),
        }
    }

    fn on_job_finished(&mut self, result: JobResult, _cx: &AppContext<'_>) -> Update {
        self.finish(result)
    }
}
