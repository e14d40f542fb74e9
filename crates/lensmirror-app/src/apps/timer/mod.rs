//! Countdown timer with editable presets
//!
//! The preset list is the event receiver while idle. Starting a countdown
//! swaps it for a 1×1 hidden capture list so the device shows only the
//! remaining time; the list comes back when the countdown stops or ends.

pub mod countdown;

use lensmirror_bridge::DisplayMode;
use lensmirror_core::{
    format_duration_clock, parse_duration_label, parse_minute_second, CanonicalGesture, Element,
    ElementId, ListElement, PageDescription, Rect, SelectionHint,
};

use super::{App, AppContext, AppKind, DeviceEvent, Update};
use crate::action::LocalAction;
use crate::coalescer::RenderKind;
use crate::mirror::MirrorRegion;
use crate::prefs::{Preferences, KEY_TIMER_PRESETS};
use crate::session::{ListSelection, Phase};
use crate::ticker::TickKind;

pub use countdown::{Countdown, CountdownState, TickOutcome};

pub const DEFAULT_PRESETS: [u64; 5] = [60, 300, 900, 3600, 7200];

fn title_id() -> ElementId {
    ElementId::new(1, "timer-title")
}

fn list_id() -> ElementId {
    ElementId::new(2, "timer-list")
}

fn hidden_capture_id() -> ElementId {
    ElementId::new(2, "timer-hidden-capture")
}

fn now_id() -> ElementId {
    ElementId::new(3, "timer-now")
}

/// Positive, unique, ascending; falls back to the defaults when empty.
pub fn sanitize_presets(values: &[i64]) -> Vec<u64> {
    let mut presets: Vec<u64> = values
        .iter()
        .filter(|v| **v > 0)
        .map(|v| *v as u64)
        .collect();
    presets.sort_unstable();
    presets.dedup();
    if presets.is_empty() {
        DEFAULT_PRESETS.to_vec()
    } else {
        presets
    }
}

#[derive(Debug)]
pub struct TimerApp {
    presets: Vec<u64>,
    selection: ListSelection,
    countdown: Countdown,
    clock_label: String,
}

impl TimerApp {
    pub fn new(prefs: &Preferences) -> Self {
        let stored = prefs.load::<Vec<i64>>(KEY_TIMER_PRESETS).unwrap_or_default();
        let presets = sanitize_presets(&stored);
        let mut app = Self {
            presets: Vec::new(),
            selection: ListSelection::default(),
            countdown: Countdown::new(DEFAULT_PRESETS[0]),
            clock_label: String::new(),
        };
        app.apply_presets(presets);
        app
    }

    pub fn presets(&self) -> &[u64] {
        &self.presets
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn selected_seconds(&self) -> u64 {
        self.presets
            .get(self.selection.selected())
            .copied()
            .unwrap_or(DEFAULT_PRESETS[0])
    }

    fn apply_presets(&mut self, presets: Vec<u64>) {
        self.selection
            .set_options(presets.iter().map(|s| format_duration_clock(*s)).collect());
        self.presets = presets;
        self.countdown.set_idle_remaining(self.selected_seconds());
    }

    fn title_text(&self) -> String {
        match self.countdown.state() {
            CountdownState::Running => {
                format!("{} | Dbl Stop", format_duration_clock(self.countdown.remaining()))
            }
            CountdownState::Done => "*** TIME UP *** | Click Start".to_string(),
            CountdownState::Idle => {
                format!("{} | Click Start", format_duration_clock(self.countdown.remaining()))
            }
        }
    }

    fn hint(&self, event: &DeviceEvent) -> SelectionHint {
        SelectionHint::extract_with(&event.raw, self.presets.len(), |name| {
            parse_duration_label(name).and_then(|secs| self.presets.iter().position(|p| *p == secs))
        })
    }

    fn settled_phase(cx: &AppContext<'_>) -> Phase {
        cx.mode.map(Phase::for_mode).unwrap_or(Phase::Idle)
    }

    fn start(&mut self, cx: &AppContext<'_>) -> Update {
        if !cx.is_connected() {
            return Update::none()
                .phase(Phase::Error)
                .status("Timer: not connected")
                .log("Timer: start blocked (not connected)");
        }
        let seconds = self.selected_seconds();
        self.countdown.start(seconds);
        let label = format_duration_clock(seconds);

        Update::full()
            .phase(Phase::Running)
            .status(format!("Timer: started {} countdown", label))
            .log(format!("Timer: started {}", label))
            .stop_ticker(TickKind::Clock)
            .start_ticker(TickKind::Countdown)
    }

    fn stop(&mut self, cx: &AppContext<'_>) -> Update {
        self.countdown.cancel();
        self.countdown.set_idle_remaining(self.selected_seconds());

        let update = Update::none()
            .phase(Self::settled_phase(cx))
            .status("Timer: stopped")
            .log("Timer: stopped")
            .stop_ticker(TickKind::Countdown);
        if cx.is_connected() {
            update.render(RenderKind::Full).start_ticker(TickKind::Clock)
        } else {
            update
        }
    }

    fn set_presets(&mut self, presets: Vec<u64>, cx: &AppContext<'_>) -> Update {
        self.apply_presets(presets);
        cx.prefs.save(KEY_TIMER_PRESETS, &self.presets);

        let labels = self.selection.options().join(", ");
        let update = Update::none().log(format!("Timer: presets updated ({})", labels));
        if cx.is_connected() {
            update.render(RenderKind::Full)
        } else {
            update
        }
    }

    fn add_preset(&mut self, input: &str, cx: &AppContext<'_>) -> Update {
        // Presets are stored as TOML integers, which are signed 64-bit.
        let parsed = parse_minute_second(input).filter(|s| i64::try_from(*s).is_ok());
        let Some(seconds) = parsed else {
            return Update::none()
                .status("Preset format invalid. Use mm:ss (for example 02:30).")
                .log("Preset format invalid. Use mm:ss (for example 02:30).");
        };
        let mut next = self.presets.clone();
        next.push(seconds);
        next.sort_unstable();
        next.dedup();

        let message = format!("Preset added: {}", format_duration_clock(seconds));
        self.set_presets(next, cx).status(message.clone()).log(message)
    }

    fn remove_preset(&mut self, position: usize, cx: &AppContext<'_>) -> Update {
        if self.presets.len() <= 1 {
            return Update::none()
                .status("At least one preset is required.")
                .log("At least one preset is required.");
        }
        let Some(index) = position.checked_sub(1).filter(|i| *i < self.presets.len()) else {
            return Update::none().status(format!("No preset at position {}", position));
        };

        let mut next = self.presets.clone();
        let removed = next.remove(index);
        let message = format!("Preset removed: {}", format_duration_clock(removed));
        self.set_presets(next, cx).status(message.clone()).log(message)
    }
}

impl App for TimerApp {
    fn kind(&self) -> AppKind {
        AppKind::Timer
    }

    fn page(&self, cx: &AppContext<'_>) -> PageDescription {
        let title = Element::text(title_id(), Rect::new(8, 0, 300, 32), self.title_text());
        let now = Element::text(
            now_id(),
            Rect::new(500, 0, 72, 32),
            cx.now.format("%H:%M").to_string(),
        );
        let list = if self.countdown.is_running() {
            Element::List(ListElement {
                id: hidden_capture_id(),
                rect: Rect::new(0, 0, 1, 1),
                items: vec![" ".to_string()],
                item_width: 1,
                select_border: false,
                event_capture: true,
            })
        } else {
            Element::list(
                list_id(),
                Rect::new(8, 40, 146, 248),
                self.selection.options().to_vec(),
                140,
            )
            .capturing()
        };
        PageDescription::new(vec![title, list, now])
    }

    fn mirror(&self, cx: &AppContext<'_>) -> Vec<MirrorRegion> {
        let presets = self
            .selection
            .options()
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let marker = if i == self.selection.selected() { '>' } else { ' ' };
                format!("{}{}) {}", marker, i + 1, label)
            })
            .collect::<Vec<_>>()
            .join("\n");

        vec![
            MirrorRegion::new("timer", self.title_text()),
            MirrorRegion::new("now", cx.now.format("%H:%M").to_string()),
            MirrorRegion::new("presets", presets),
        ]
    }

    fn connecting_status(&self) -> String {
        "Timer: connecting to Even bridge...".to_string()
    }

    fn on_connected(&mut self, mode: DisplayMode, cx: &AppContext<'_>) -> Update {
        self.countdown.cancel();
        self.countdown.set_idle_remaining(self.selected_seconds());
        self.clock_label = cx.now.format("%H:%M").to_string();

        let update = Update::none()
            .phase(Phase::for_mode(mode))
            .stop_ticker(TickKind::Countdown)
            .start_ticker(TickKind::Clock);
        match mode {
            DisplayMode::Bridge => update
                .status("Timer: connected. Up/Down select, Click start, DoubleClick stop.")
                .log("Timer: connected to bridge"),
            DisplayMode::Mock => update
                .status("Timer: bridge not found. Running mock mode.")
                .log("Timer: running in mock mode (bridge unavailable)"),
        }
    }

    fn on_device(&mut self, event: &DeviceEvent, cx: &AppContext<'_>) -> Update {
        if event.gesture == CanonicalGesture::SecondaryToggle {
            return self.stop(cx);
        }
        // Only the capture list (preset list or hidden list) drives the timer
        if !event.list_shaped || self.countdown.is_running() {
            return Update::none();
        }

        let hint = self.hint(event);
        let before = self.selection.selected();
        self.selection.apply(event.gesture, hint, true);
        self.countdown.set_idle_remaining(self.selected_seconds());

        match event.gesture {
            CanonicalGesture::Previous | CanonicalGesture::Next => {
                if self.selection.selected() == before {
                    return Update::none();
                }
                Update::partial([title_id()]).log(format!(
                    "Timer: selected {}",
                    format_duration_clock(self.selected_seconds())
                ))
            }
            _ => self.start(cx),
        }
    }

    fn on_action(&mut self, action: &LocalAction, cx: &AppContext<'_>) -> Update {
        match action {
            LocalAction::Start | LocalAction::Run => self.start(cx),
            LocalAction::Stop => self.stop(cx),
            LocalAction::PresetAdd(input) => self.add_preset(input, cx),
            LocalAction::PresetRemove(position) => self.remove_preset(*position, cx),
            _ => Update::none(),
        }
    }

    fn on_tick(&mut self, kind: TickKind, cx: &AppContext<'_>) -> Update {
        match kind {
            TickKind::Countdown => match self.countdown.tick() {
                TickOutcome::Continue(_) => Update::partial([title_id()]),
                TickOutcome::Finished => {
                    self.clock_label = cx.now.format("%H:%M").to_string();
                    Update::full()
                        .phase(Self::settled_phase(cx))
                        .status("Timer: completed")
                        .log("Timer: completed")
                        .stop_ticker(TickKind::Countdown)
                        .start_ticker(TickKind::Clock)
                }
                TickOutcome::Ignored => Update::none(),
            },
            TickKind::Clock => {
                // Paused while counting down so the two never contend
                if self.countdown.is_running() {
                    return Update::none();
                }
                let label = cx.now.format("%H:%M").to_string();
                if label == self.clock_label {
                    return Update::none();
                }
                self.clock_label = label;
                Update::partial([now_id()])
            }
        }
    }
}
