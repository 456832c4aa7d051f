//! Rate limiting of status changes.
//!
//! Each relay carries a rolling window. The window opens on the first
//! change request and collects requests until it expires; once the count
//! reaches the threshold, further changes are held back until the window
//! closes.

use core::time::Duration;

use crate::time::RelayInstant;

/// Default width of the rolling window.
pub const DEFAULT_FLOOD_WINDOW: Duration = Duration::from_secs(3);

/// Default number of changes tolerated inside one window.
pub const DEFAULT_FLOOD_CHANGES: u8 = 5;

/// Per-relay window bookkeeping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FloodState<I> {
    window_start: Option<I>,
    count: u8,
}

impl<I: RelayInstant> FloodState<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window_start: None,
            count: 0,
        }
    }

    /// Start of the current window, if one has been opened.
    pub fn window_start(&self) -> Option<I> {
        self.window_start
    }

    /// Changes counted in the current window.
    pub fn count(&self) -> u8 {
        self.count
    }

    fn reset(&mut self, now: I) {
        self.window_start = Some(now);
        self.count = 1;
    }
}

impl<I: RelayInstant> Default for FloodState<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// When a requested change may be applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Schedule<I> {
    pub change_time: I,
    /// The change was pushed back to the end of the flood window.
    pub deferred: bool,
}

/// Window width and threshold shared by every relay.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FloodGuard {
    pub window: Duration,
    /// Changes tolerated per window; zero disables the guard.
    pub threshold: u8,
}

impl FloodGuard {
    pub const DEFAULT: Self = Self {
        window: DEFAULT_FLOOD_WINDOW,
        threshold: DEFAULT_FLOOD_CHANGES,
    };

    #[must_use]
    pub const fn new(window: Duration, threshold: u8) -> Self {
        Self { window, threshold }
    }

    /// Counts a change requested at `now` and decides when it applies.
    ///
    /// A clock that moved backwards is treated like an expired window.
    pub fn schedule<I: RelayInstant>(
        &self,
        state: &mut FloodState<I>,
        now: I,
        delay: Duration,
    ) -> Schedule<I> {
        let mut change_time = now + delay;
        let mut deferred = false;
        state.count = state.count.saturating_add(1);

        match state.window_start {
            Some(start) if now >= start && now < start + self.window => {
                let window_end = start + self.window;
                if self.threshold > 0 && state.count >= self.threshold && change_time < window_end
                {
                    change_time = window_end;
                    deferred = true;
                }
            }
            _ => state.reset(now),
        }

        Schedule {
            change_time,
            deferred,
        }
    }
}

impl Default for FloodGuard {
    fn default() -> Self {
        Self::DEFAULT
    }
}
