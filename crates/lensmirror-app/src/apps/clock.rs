//! Wall clock pushed to the display every second

use lensmirror_bridge::DisplayMode;
use lensmirror_core::{Element, ElementId, PageDescription, Rect, DISPLAY_WIDTH};

use super::{App, AppContext, AppKind, DeviceEvent, Update};
use crate::action::LocalAction;
use crate::mirror::MirrorRegion;
use crate::prefs::{Preferences, KEY_CLOCK_TIME_X};
use crate::ticker::TickKind;

const TIME_Y: u32 = 8;
const TIME_WIDTH: u32 = 220;
const TIME_HEIGHT: u32 = 44;
const DEFAULT_X: u32 = 8;
const MAX_X: u32 = DISPLAY_WIDTH - TIME_WIDTH;
const STEP: i64 = 16;

fn time_id() -> ElementId {
    ElementId::new(1, "clock-time")
}

#[derive(Debug)]
pub struct ClockApp {
    time_x: u32,
}

impl ClockApp {
    pub fn new(prefs: &Preferences) -> Self {
        let time_x = prefs
            .load::<i64>(KEY_CLOCK_TIME_X)
            .map(clamp_x)
            .unwrap_or(DEFAULT_X);
        Self { time_x }
    }

    pub fn time_x(&self) -> u32 {
        self.time_x
    }

    fn move_by(&mut self, delta: i64, direction: &str, cx: &AppContext<'_>) -> Update {
        if !cx.is_connected() {
            return Update::none()
                .status("Clock: not connected")
                .log("Clock: move blocked (not connected)");
        }
        self.time_x = clamp_x(i64::from(self.time_x) + delta);
        cx.prefs.save(KEY_CLOCK_TIME_X, &self.time_x);

        let message = format!("Clock: moved {} (x={})", direction, self.time_x);
        // Position changes need a rebuild; partial updates only touch text
        Update::full().status(message.clone()).log(message)
    }
}

fn clamp_x(x: i64) -> u32 {
    x.clamp(0, i64::from(MAX_X)) as u32
}

impl App for ClockApp {
    fn kind(&self) -> AppKind {
        AppKind::Clock
    }

    fn page(&self, cx: &AppContext<'_>) -> PageDescription {
        PageDescription::new(vec![Element::text(
            time_id(),
            Rect::new(self.time_x, TIME_Y, TIME_WIDTH, TIME_HEIGHT),
            cx.now.format("%H:%M:%S").to_string(),
        )])
    }

    fn mirror(&self, cx: &AppContext<'_>) -> Vec<MirrorRegion> {
        vec![
            MirrorRegion::new("time", cx.now.format("%H:%M:%S").to_string()),
            MirrorRegion::new("x", self.time_x.to_string()),
        ]
    }

    fn connecting_status(&self) -> String {
        "Clock: connecting to Even bridge...".to_string()
    }

    fn on_connected(&mut self, mode: DisplayMode, _cx: &AppContext<'_>) -> Update {
        let update = Update::none().start_ticker(TickKind::Clock);
        match mode {
            DisplayMode::Bridge => update
                .status("Clock: connected and ticking in simulator.")
                .log("Clock: connected to bridge"),
            DisplayMode::Mock => update
                .status("Clock: bridge not found. Running mock mode.")
                .log("Clock: running in mock mode (bridge unavailable)"),
        }
    }

    fn on_device(&mut self, _event: &DeviceEvent, _cx: &AppContext<'_>) -> Update {
        Update::none()
    }

    fn on_action(&mut self, action: &LocalAction, cx: &AppContext<'_>) -> Update {
        match action {
            LocalAction::MoveLeft => self.move_by(-STEP, "left", cx),
            LocalAction::MoveRight => self.move_by(STEP, "right", cx),
            _ => Update::none(),
        }
    }

    fn on_tick(&mut self, kind: TickKind, _cx: &AppContext<'_>) -> Update {
        match kind {
            TickKind::Clock => Update::partial([time_id()]),
            TickKind::Countdown => Update::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::testing::cx;
    use crate::coalescer::RenderKind;

    #[test]
    fn test_page_shows_hh_mm_ss() {
        let prefs = Preferences::in_memory();
        let app = ClockApp::new(&prefs);
        let page = app.page(&cx(&prefs, None));
        assert_eq!(page.elements[0].content(), Some("15:04:05"));
        assert_eq!(page.elements[0].rect(), Rect::new(8, 8, 220, 44));
    }

    #[test]
    fn test_move_is_clamped_persisted_and_full_render() {
        let prefs = Preferences::in_memory();
        let cx = cx(&prefs, Some(DisplayMode::Bridge));
        let mut app = ClockApp::new(&prefs);

        let update = app.on_action(&LocalAction::MoveLeft, &cx);
        assert_eq!(app.time_x(), 0);
        assert_eq!(update.render, Some(RenderKind::Full));
        assert_eq!(update.status.as_deref(), Some("Clock: moved left (x=0)"));

        for _ in 0..40 {
            app.on_action(&LocalAction::MoveRight, &cx);
        }
        assert_eq!(app.time_x(), 356);
        assert_eq!(prefs.load::<u32>(KEY_CLOCK_TIME_X), Some(356));
        assert_eq!(ClockApp::new(&prefs).time_x(), 356);
    }

    #[test]
    fn test_move_blocked_when_not_connected() {
        let prefs = Preferences::in_memory();
        let mut app = ClockApp::new(&prefs);
        let update = app.on_action(&LocalAction::MoveRight, &cx(&prefs, None));
        assert_eq!(app.time_x(), 8);
        assert_eq!(update.render, None);
        assert_eq!(update.logs, vec!["Clock: move blocked (not connected)"]);
    }

    #[test]
    fn test_out_of_range_preference_is_clamped() {
        let prefs = Preferences::in_memory();
        prefs.save(KEY_CLOCK_TIME_X, &900i64);
        assert_eq!(ClockApp::new(&prefs).time_x(), 356);
        prefs.save(KEY_CLOCK_TIME_X, &-5i64);
        assert_eq!(ClockApp::new(&prefs).time_x(), 0);
    }

    #[test]
    fn test_tick_is_partial_update() {
        let prefs = Preferences::in_memory();
        let mut app = ClockApp::new(&prefs);
        let update = app.on_tick(TickKind::Clock, &cx(&prefs, None));
        assert_eq!(update.render, Some(RenderKind::partial([time_id()])));
    }
}
