//! Debounce for reconnects after an abnormal bridge exit

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ReconnectSettings;

/// Allows at most one scheduled reconnect per cooldown window.
#[derive(Debug, Clone)]
pub struct ReconnectGate {
    enabled: bool,
    cooldown: Duration,
    delay: Duration,
    last: Option<Instant>,
}

impl ReconnectGate {
    pub fn new(settings: &ReconnectSettings) -> Self {
        Self {
            enabled: settings.enabled,
            cooldown: Duration::from_millis(settings.cooldown_ms),
            delay: Duration::from_millis(settings.delay_ms),
            last: None,
        }
    }

    /// Delay to wait before reconnecting, or `None` when disabled or a
    /// reconnect was already scheduled inside the current window.
    pub fn schedule(&mut self, now: Instant) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.cooldown {
                return None;
            }
        }
        self.last = Some(now);
        Some(self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ReconnectGate {
        ReconnectGate::new(&ReconnectSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_reconnect_per_window() {
        let mut gate = gate();
        let t0 = Instant::now();

        assert_eq!(gate.schedule(t0), Some(Duration::from_millis(3000)));
        assert_eq!(gate.schedule(t0 + Duration::from_millis(100)), None);
        assert_eq!(gate.schedule(t0 + Duration::from_millis(4999)), None);
        assert!(gate.schedule(t0 + Duration::from_millis(5000)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_schedules() {
        let mut gate = ReconnectGate::new(&ReconnectSettings {
            enabled: false,
            ..ReconnectSettings::default()
        });
        assert_eq!(gate.schedule(Instant::now()), None);
    }
}
