use core::sync::atomic::{AtomicI32, Ordering};

/// Source of modification timestamps, in seconds.
///
/// Zero is reserved for "untracked"; a clock should never report it.
pub trait Clock: Send + Sync {
    fn now(&self) -> i32;
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(AtomicI32);

impl ManualClock {
    #[must_use]
    pub const fn new(start: i32) -> Self {
        Self(AtomicI32::new(start))
    }

    pub fn set(&self, now: i32) {
        self.0.store(now, Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: i32) {
        self.0.fetch_add(seconds, Ordering::Relaxed);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }
}
