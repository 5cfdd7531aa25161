//! Time source abstraction.

/// Monotonic time source in milliseconds.
///
/// All timers in this crate are driven by explicit `now_ms` values. A
/// `Clock` is what the event loop reads them from: an `Instant` on desktop,
/// a [`MockClock`](crate::hal::MockClock) in tests.
///
/// # Example
///
/// ```rust
/// use train_station::traits::Clock;
/// use train_station::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Must never go backwards.
    fn now_ms(&self) -> u64;
}
