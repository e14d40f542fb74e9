//! Countdown sub-machine: `Idle -> Running -> {Done | Idle}`

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountdownState {
    #[default]
    Idle,
    Running,
    /// Reached zero; stays here until the next start
    Done,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still running with this many seconds left
    Continue(u64),
    /// Just reached zero
    Finished,
    /// Not running; tick ignored
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Countdown {
    state: CountdownState,
    remaining: u64,
}

impl Countdown {
    pub fn new(remaining: u64) -> Self {
        Self {
            state: CountdownState::Idle,
            remaining,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    pub fn is_done(&self) -> bool {
        self.state == CountdownState::Done
    }

    /// Enter `Running` from any state.
    pub fn start(&mut self, seconds: u64) {
        self.remaining = seconds;
        self.state = CountdownState::Running;
    }

    /// Back to `Idle` without reaching `Done`. Returns whether it was running.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.is_running();
        self.state = CountdownState::Idle;
        was_running
    }

    /// Preview a duration while not running.
    pub fn set_idle_remaining(&mut self, seconds: u64) {
        if !self.is_running() {
            self.remaining = seconds;
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Ignored;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = CountdownState::Done;
            TickOutcome::Finished
        } else {
            TickOutcome::Continue(self.remaining)
        }
    }
}
