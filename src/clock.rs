//! Monotonic microsecond clock used to time trials.
//!
//! Tick counters on small targets are narrow and wrap, so elapsed time is
//! always computed with [`ticks_diff`] instead of plain subtraction.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// A monotonic microsecond tick source.
pub trait Clock {
    /// Current tick count in microseconds. Wraps at `u32::MAX`.
    fn ticks_us(&self) -> u32;

    /// Block for `duration`. Never called inside a timed window.
    fn sleep(&self, duration: Duration);
}

/// Elapsed time from `start` to `end`, tolerant of one counter rollover.
#[inline]
pub fn ticks_diff(end: u32, start: u32) -> Duration {
    Duration::from_micros(u64::from(end.wrapping_sub(start)))
}

/// Host clock backed by [`Instant`], exposed as a wrapping `u32` counter.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn ticks_us(&self) -> u32 {
        // Truncation is the wrap.
        self.origin.elapsed().as_micros() as u32
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Manually driven clock for deterministic tests.
///
/// Time only moves through [`SimClock::advance`] or [`Clock::sleep`], which
/// lets a test operation "take" an exact number of microseconds.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<u32>,
    slept: Cell<Duration>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start the counter at `tick`; handy for exercising rollover.
    pub fn starting_at(tick: u32) -> Self {
        Self {
            now: Cell::new(tick),
            slept: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let micros = by.as_micros() as u32;
        self.now.set(self.now.get().wrapping_add(micros));
    }

    /// Total time spent in [`Clock::sleep`].
    pub fn slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for SimClock {
    fn ticks_us(&self) -> u32 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.slept.set(self.slept.get() + duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn ticks_us(&self) -> u32 {
        (**self).ticks_us()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
