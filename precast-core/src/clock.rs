//! A monotonic time source.
//!
//! All timestamps the engine stamps events with come from a monotonic
//! source rather than wall-clock time, since a wall-clock jump would poison
//! cooldown and jitter math. Every component that stamps an event takes a
//! `&dyn Clock` instead of calling `SystemTime::now()` directly, so tests
//! can drive the whole engine with a fake clock instead of sleeping real
//! wall time.

/// Milliseconds since some unspecified, monotonically increasing origin.
///
/// Only differences between two `now_ms()` calls are meaningful; the
/// absolute value has no defined relationship to wall-clock time.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Production clock, backed by [`std::time::Instant`].
#[derive(Debug)]
pub struct SystemClock {
    origin: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock a test can move forward by hand.
#[cfg(test)]
pub struct ManualClock {
    now: std::cell::Cell<u64>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: u64) -> Self {
        ManualClock {
            now: std::cell::Cell::new(start),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}
