//! Time sources
//!
//! The engine never reads the wall clock directly. Every component that needs a
//! timestamp receives a [`Clock`], so captures can be replayed deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Milliseconds on a monotonic time base
pub type Millis = u64;

/// A monotonic millisecond clock
pub trait Clock {
    /// Current time in milliseconds. Must never go backwards.
    fn now_ms(&self) -> Millis;
}

/// Clock backed by [`std::time::Instant`], counting from construction
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Manually driven clock for replays and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward by `delta_ms`
    pub fn advance(&self, delta_ms: Millis) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Jump to `ms`. Earlier values are ignored to keep the clock monotonic.
    pub fn set(&self, ms: Millis) {
        self.now.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(100);
        clock.advance(50);
        assert_eq!(clock.now_ms(), 150);

        clock.set(120);
        assert_eq!(clock.now_ms(), 150);

        clock.set(400);
        assert_eq!(clock.now_ms(), 400);
    }

    #[test]
    fn test_monotonic_clock_never_decreases() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
