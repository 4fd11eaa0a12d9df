//! Session lifetime clock.
//!
//! Pure countdown logic with no I/O or timers of its own; the one-second
//! cadence is driven by the session service. The clock raises at most one
//! [`Warning`](ClockEvent::Warning) per approach-to-zero cycle and exactly
//! one [`Expired`](ClockEvent::Expired) per countdown.

/// Events raised by [`SessionClock::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Remaining time first dropped below the warning threshold.
    Warning,
    /// Remaining time reached zero; the session is over.
    Expired,
}

#[derive(Debug, Clone)]
pub struct SessionClock {
    remaining_secs: u32,
    warning_threshold_secs: u32,
    warned: bool,
    running: bool,
}

impl SessionClock {
    /// A stopped clock holding a full countdown.
    pub fn new(initial_secs: u32, warning_threshold_secs: u32) -> Self {
        Self {
            remaining_secs: initial_secs,
            warning_threshold_secs,
            warned: false,
            running: false,
        }
    }

    /// Begins a fresh countdown, replacing any previous one.
    pub fn start(&mut self, initial_secs: u32) {
        self.remaining_secs = initial_secs;
        self.warned = false;
        self.running = true;
    }

    /// Advances the countdown by one second.
    ///
    /// Remaining time never goes negative; once `Expired` fires the clock
    /// stops itself so the event cannot repeat.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        if !self.running {
            return None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);

        if self.remaining_secs == 0 {
            self.running = false;
            return Some(ClockEvent::Expired);
        }
        if !self.warned && self.remaining_secs < self.warning_threshold_secs {
            self.warned = true;
            return Some(ClockEvent::Warning);
        }
        None
    }

    /// Resets remaining time and re-arms the warning.
    pub fn renew(&mut self, new_secs: u32) {
        self.remaining_secs = new_secs;
        self.warned = false;
        self.running = true;
    }

    /// Cancels the countdown without touching remaining time.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Returns the clock to a full, idle countdown (used on logout so a
    /// subsequent login starts clean).
    pub fn reset(&mut self, full_secs: u32) {
        self.remaining_secs = full_secs;
        self.warned = false;
        self.running = false;
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn has_warned(&self) -> bool {
        self.warned
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
