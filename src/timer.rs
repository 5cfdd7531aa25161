//! Deadline-based timers for the single-threaded event loop.
//!
//! Nothing here sleeps or spawns. Callers pass the current time in
//! milliseconds and the timer answers whether it is armed or due. Stopping a
//! timer that is not armed is always a no-op, so cancellation never needs to
//! know the timer's state.
//!
//! ```rust
//! use train_station::timer::{OneShotTimer, PeriodicTimer};
//!
//! let mut debounce = OneShotTimer::new(100);
//! debounce.start(0);
//! assert!(debounce.is_active(50));
//! assert!(!debounce.is_active(100));
//!
//! let mut sweep = PeriodicTimer::new(3000);
//! assert!(!sweep.poll(0)); // first poll arms it
//! assert!(!sweep.poll(2999));
//! assert!(sweep.poll(3000));
//! ```

/// Single-shot timer: armed by [`start`](Self::start), elapses once.
#[derive(Clone, Debug)]
pub struct OneShotTimer {
    interval_ms: u64,
    deadline_ms: Option<u64>,
}

impl OneShotTimer {
    /// Create a stopped timer with the given interval.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            deadline_ms: None,
        }
    }

    /// Arm (or re-arm) the timer from `now_ms`.
    pub fn start(&mut self, now_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(self.interval_ms));
    }

    /// Disarm the timer.
    pub fn stop(&mut self) {
        self.deadline_ms = None;
    }

    /// Whether the timer is armed and has not yet elapsed at `now_ms`.
    pub fn is_active(&self, now_ms: u64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if now_ms < deadline)
    }

    /// Time left before the timer elapses, if armed.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.deadline_ms
            .filter(|&deadline| now_ms < deadline)
            .map(|deadline| deadline - now_ms)
    }

    /// Configured interval.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}

/// Fixed-interval timer that fires once per elapsed period.
///
/// The first [`poll`](Self::poll) arms the timer without firing. If polls are
/// late by more than one period, the timer fires once and re-anchors on the
/// poll time rather than firing a burst.
#[derive(Clone, Debug)]
pub struct PeriodicTimer {
    interval_ms: u64,
    next_due_ms: Option<u64>,
}

impl PeriodicTimer {
    /// Create a timer that is armed on first poll.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next_due_ms: None,
        }
    }

    /// Returns true when a period has elapsed at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.next_due_ms {
            None => {
                self.next_due_ms = Some(now_ms.saturating_add(self.interval_ms));
                false
            }
            Some(due) if now_ms >= due => {
                let next = due.saturating_add(self.interval_ms);
                self.next_due_ms = Some(if next <= now_ms {
                    now_ms.saturating_add(self.interval_ms)
                } else {
                    next
                });
                true
            }
            Some(_) => false,
        }
    }

    /// Disarm; the next poll re-arms from its own time.
    pub fn reset(&mut self) {
        self.next_due_ms = None;
    }

    /// Configured period.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // OneShotTimer
    // =========================================================================

    #[test]
    fn one_shot_starts_stopped() {
        let timer = OneShotTimer::new(100);
        assert!(!timer.is_active(0));
        assert_eq!(timer.remaining_ms(0), None);
    }

    #[test]
    fn one_shot_elapses_at_deadline() {
        let mut timer = OneShotTimer::new(100);
        timer.start(1000);
        assert!(timer.is_active(1000));
        assert!(timer.is_active(1099));
        assert_eq!(timer.remaining_ms(1040), Some(60));
        assert!(!timer.is_active(1100));
    }

    #[test]
    fn one_shot_stop_is_idempotent() {
        let mut timer = OneShotTimer::new(100);
        timer.stop();
        timer.start(0);
        timer.stop();
        timer.stop();
        assert!(!timer.is_active(10));
    }

    #[test]
    fn one_shot_restart_moves_deadline() {
        let mut timer = OneShotTimer::new(100);
        timer.start(0);
        timer.start(80);
        assert!(timer.is_active(150));
        assert!(!timer.is_active(180));
    }

    // =========================================================================
    // PeriodicTimer
    // =========================================================================

    #[test]
    fn periodic_fires_once_per_period() {
        let mut timer = PeriodicTimer::new(3000);
        assert!(!timer.poll(0));
        assert!(!timer.poll(1500));
        assert!(timer.poll(3000));
        assert!(!timer.poll(3001));
        assert!(timer.poll(6000));
    }

    #[test]
    fn periodic_late_poll_does_not_burst() {
        let mut timer = PeriodicTimer::new(100);
        timer.poll(0);
        assert!(timer.poll(550));
        assert!(!timer.poll(600));
        assert!(timer.poll(650));
    }

    #[test]
    fn periodic_reset_rearms() {
        let mut timer = PeriodicTimer::new(100);
        timer.poll(0);
        timer.reset();
        assert!(!timer.poll(120));
        assert!(timer.poll(220));
    }
}
