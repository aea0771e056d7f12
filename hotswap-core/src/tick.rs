//! Tick source abstraction.
//!
//! The tracker never reads wall-clock time. Everything is measured in host
//! ticks: `global` drives debounce math and event timestamps, `frame` is the
//! host's per-frame counter. Both are reset to [`TICK_SENTINEL`] when the
//! process reaches ready, which starts a new epoch.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::types::{Tick, TICK_SENTINEL};

/// Read-side of the host's tick counters.
pub trait TickSource: Send + Sync {
    fn global(&self) -> Tick;

    fn frame(&self) -> Tick;

    /// Reset both counters to [`TICK_SENTINEL`].
    fn reset(&self);
}

/// Atomic tick counters, advanced by the daemon's clock task.
#[derive(Debug)]
pub struct FrameClock {
    global: AtomicI64,
    frame: AtomicI64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(tick: Tick) -> Self {
        Self {
            global: AtomicI64::new(tick),
            frame: AtomicI64::new(tick),
        }
    }

    /// Advance both counters by one and return the new global tick.
    pub fn advance(&self) -> Tick {
        self.frame.fetch_add(1, Ordering::SeqCst);
        self.global.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Pin the global counter to `tick`. Test and replay helper.
    pub fn set(&self, tick: Tick) {
        self.global.store(tick, Ordering::SeqCst);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for FrameClock {
    fn global(&self) -> Tick {
        self.global.load(Ordering::SeqCst)
    }

    fn frame(&self) -> Tick {
        self.frame.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.global.store(TICK_SENTINEL, Ordering::SeqCst);
        self.frame.store(TICK_SENTINEL, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_both_counters() {
        let clock = FrameClock::new();
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.global(), 2);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn reset_returns_to_sentinel() {
        let clock = FrameClock::starting_at(500);
        clock.reset();
        assert_eq!(clock.global(), TICK_SENTINEL);
        assert_eq!(clock.frame(), TICK_SENTINEL);
        assert_eq!(clock.advance(), 0);
    }
}
