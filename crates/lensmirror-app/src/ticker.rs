//! Periodic tick sources feeding the engine loop

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::message::Message;

/// Which ticker fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickKind {
    /// One-second countdown decrement
    Countdown,
    /// Wall-clock readout refresh
    Clock,
}

impl TickKind {
    pub fn period(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// A restartable interval task. Each start gets a new epoch so ticks that
/// were already queued by a previous run can be told apart and dropped.
#[derive(Debug)]
pub struct Ticker {
    kind: TickKind,
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(kind: TickKind) -> Self {
        Self {
            kind,
            epoch: 0,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether a tick carrying `epoch` belongs to the current run.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.is_running() && self.epoch == epoch
    }

    /// (Re)start; the first tick fires one period from now.
    pub fn start(&mut self, tx: mpsc::Sender<Message>) {
        self.stop();
        self.epoch += 1;

        let kind = self.kind;
        let epoch = self.epoch;
        let period = kind.period();
        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Message::Tick { kind, epoch }).await.is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
