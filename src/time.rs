//! Time source abstraction for testable timing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;

/// Source of monotonic nanosecond readings and wall-clock instants.
///
/// All engine timing goes through a `Clock` so tests can substitute a
/// [`MockClock`] with controlled progression. There is no global clock;
/// the instance is passed in.
pub trait Clock: Send + Sync {
    /// Current monotonic reading in nanoseconds.
    fn nanos(&self) -> u64;

    /// Current wall-clock instant.
    fn wall_now(&self) -> SystemTime;

    /// Duration between two monotonic samples.
    fn elapsed(&self, start_nanos: u64, end_nanos: u64) -> Duration {
        Duration::from_nanos(end_nanos.saturating_sub(start_nanos))
    }
}

/// Clock backed by the OS monotonic and wall clocks.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn wall_now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock with test-controlled progression.
pub struct MockClock {
    nanos: AtomicU64,
    wall: Mutex<SystemTime>,
}

impl MockClock {
    pub fn new(initial_nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(initial_nanos),
            wall: Mutex::new(SystemTime::UNIX_EPOCH),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
        let mut wall = self.wall.lock();
        *wall += by;
    }

    pub fn set_nanos(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn set_wall(&self, instant: SystemTime) {
        *self.wall.lock() = instant;
    }
}

impl Clock for MockClock {
    fn nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn wall_now(&self) -> SystemTime {
        *self.wall.lock()
    }
}

/// In-flight measurement started from a clock.
///
/// The first `stop` latches the elapsed duration; later calls return the
/// latched value even if the clock has advanced.
pub struct TimingContext<'a> {
    clock: &'a dyn Clock,
    start_nanos: u64,
    stopped: OnceLock<Duration>,
}

impl<'a> TimingContext<'a> {
    pub fn start(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            start_nanos: clock.nanos(),
            stopped: OnceLock::new(),
        }
    }

    /// Stops the measurement, or returns the already-latched duration.
    pub fn stop(&self) -> Duration {
        *self
            .stopped
            .get_or_init(|| self.clock.elapsed(self.start_nanos, self.clock.nanos()))
    }

    /// Elapsed time without stopping.
    pub fn elapsed_so_far(&self) -> Duration {
        match self.stopped.get() {
            Some(d) => *d,
            None => self.clock.elapsed(self.start_nanos, self.clock.nanos()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances() {
        let clock = MockClock::new(100);
        assert_eq!(clock.nanos(), 100);
        clock.advance(Duration::from_nanos(50));
        assert_eq!(clock.nanos(), 150);
    }

    #[test]
    fn timing_context_measures_elapsed() {
        let clock = MockClock::new(0);
        let ctx = TimingContext::start(&clock);
        clock.advance(Duration::from_micros(5));
        assert_eq!(ctx.stop(), Duration::from_micros(5));
    }

    #[test]
    fn stop_is_idempotent() {
        let clock = MockClock::new(0);
        let ctx = TimingContext::start(&clock);
        clock.advance(Duration::from_micros(3));
        let first = ctx.stop();
        clock.advance(Duration::from_micros(40));
        assert_eq!(ctx.stop(), first);
    }

    #[test]
    fn elapsed_so_far_peeks_without_stopping() {
        let clock = MockClock::new(0);
        let ctx = TimingContext::start(&clock);
        clock.advance(Duration::from_nanos(10));
        assert_eq!(ctx.elapsed_so_far(), Duration::from_nanos(10));
        clock.advance(Duration::from_nanos(10));
        assert_eq!(ctx.elapsed_so_far(), Duration::from_nanos(20));
        let stopped = ctx.stop();
        clock.advance(Duration::from_nanos(10));
        assert_eq!(ctx.elapsed_so_far(), stopped);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.nanos();
        let b = clock.nanos();
        assert!(b >= a);
    }
}
