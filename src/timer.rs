//! Countdown timer for the chat window.
//!
//! [`CountdownTimer`] is a pure logical clock: it holds the remaining
//! seconds and a running flag, and is advanced by an external 1 Hz tick
//! source (the client loop's `tokio::time::interval`). Keeping the clock
//! free of I/O makes every timing property testable without a runtime.
//!
//! Invariants:
//! - `remaining` is non-increasing while running and never wraps below 0.
//! - Reaching 0 stops the timer exactly once; further ticks are no-ops.
//! - At most one countdown is live: [`start`](CountdownTimer::start) while
//!   running replaces the old countdown before beginning the new one.

/// A one-shot, restartable countdown clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    remaining: u32,
    running: bool,
}

impl CountdownTimer {
    /// Create a stopped timer showing the full duration.
    pub fn new(duration: u32) -> Self {
        Self {
            remaining: duration,
            running: false,
        }
    }

    /// Reset to `duration` seconds and begin counting down.
    ///
    /// Any countdown already in progress is discarded first, so two rapid
    /// consecutive matches can never double-decrement.
    pub fn start(&mut self, duration: u32) {
        self.stop();
        self.remaining = duration;
        self.running = true;
    }

    /// Halt the countdown. Idempotent; the remaining seconds are kept.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Stop and reset the display to the full duration.
    pub fn reset(&mut self, duration: u32) {
        self.running = false;
        self.remaining = duration;
    }

    /// Advance the clock by one second.
    ///
    /// Returns `true` if the tick changed the remaining time (i.e. the
    /// timer was running). Reaching zero auto-stops the clock.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
        }
        true
    }

    /// Seconds left on the clock.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether the clock is currently counting down.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn new_timer_is_stopped_at_full_duration() {
        let timer = CountdownTimer::new(90);
        assert_eq!(timer.remaining(), 90);
        assert!(!timer.is_running());
    }

    #[test]
    fn tick_is_noop_while_stopped() {
        let mut timer = CountdownTimer::new(90);
        assert!(!timer.tick());
        assert_eq!(timer.remaining(), 90);
    }

    #[test]
    fn remaining_decreases_by_one_per_tick() {
        let mut timer = CountdownTimer::new(90);
        timer.start(90);
        for t in 1..=90u32 {
            assert!(timer.tick());
            assert_eq!(timer.remaining(), 90 - t);
        }
    }

    #[test]
    fn reaching_zero_stops_exactly_once() {
        let mut timer = CountdownTimer::new(3);
        timer.start(3);
        assert!(timer.tick());
        assert!(timer.tick());
        assert!(timer.tick());
        assert_eq!(timer.remaining(), 0);
        assert!(!timer.is_running());

        // Further ticks change nothing and never go negative.
        assert!(!timer.tick());
        assert_eq!(timer.remaining(), 0);
    }

    #[test]
    fn stop_is_idempotent_and_keeps_remaining() {
        let mut timer = CountdownTimer::new(90);
        timer.start(90);
        timer.tick();
        timer.stop();
        timer.stop();
        assert_eq!(timer.remaining(), 89);
        assert!(!timer.is_running());
    }

    #[test]
    fn restart_replaces_a_running_countdown() {
        let mut timer = CountdownTimer::new(90);
        timer.start(90);
        timer.tick();
        timer.tick();
        assert_eq!(timer.remaining(), 88);

        // A second match restarts the clock from the full duration.
        timer.start(90);
        assert!(timer.is_running());
        assert_eq!(timer.remaining(), 90);
        timer.tick();
        assert_eq!(timer.remaining(), 89);
    }

    #[test]
    fn reset_stops_and_restores_full_duration() {
        let mut timer = CountdownTimer::new(90);
        timer.start(90);
        timer.tick();
        timer.reset(90);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining(), 90);
    }

    #[test]
    fn zero_duration_start_stops_on_first_tick() {
        let mut timer = CountdownTimer::new(0);
        timer.start(0);
        assert!(timer.is_running());
        assert!(timer.tick());
        assert_eq!(timer.remaining(), 0);
        assert!(!timer.is_running());
    }
}
