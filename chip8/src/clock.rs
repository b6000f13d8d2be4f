//! Frame clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::constants::*;

/// Frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Timer to synchronize the host loop with the 60Hz frame rate of the VM.
///
/// It is designed to work with the yielding cooperative pattern
/// of the interpreter loop. When the VM yields control back to the
/// caller, time elapses until it is resumed. Once the interpreter
/// is resumed, the elapsed time is taken into account when determining
/// the next cycle.
pub struct Clock {
    start: Instant,
    period: Duration,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(freq: Hz) -> Self {
        Self {
            start: Instant::now(),
            period: freq.into(),
        }
    }

    /// Clock ticking at the standard delay timer frequency.
    pub fn frame_rate() -> Self {
        Self::new(Hz(DELAY_FREQUENCY))
    }

    /// Length of one cycle.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.start = Instant::now()
    }

    /// Checks whether a full cycle has elapsed, and starts the next one if so.
    pub fn tick(&mut self) -> bool {
        if self.start.elapsed() >= self.period {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        loop {
            if self.start.elapsed() < self.period {
                // Sleep does not have enough resolution, and causes
                // the clock to run at 30 FPS.
                //
                // Spinning a loop causes high CPU usage and fan madness.
                //
                // Yielding in a loop is the best alternative.
                thread::yield_now();
            } else {
                // Reset back to zero, rather than trying to catch up.
                //
                // If the VM was paused for debugging, and a large
                // amount of time has elapsed until it is resumed,
                // it should simply continue at the next cycle running
                // at its usual speed.
                self.reset();
                return;
            }
        }
    }
}
