//! Monotonic time abstractions shared by firmware and host targets.
//!
//! The relay core never reads a clock itself. Every entry point that needs
//! the current time takes it as an argument, which keeps the scheduler
//! deterministic under test and lets each target bring its own timer.

use core::{fmt, ops::Add, time::Duration};

/// Monotonic timestamp used to schedule relay transitions.
pub trait RelayInstant: Copy + Ord + Add<Duration, Output = Self> {}

impl<T> RelayInstant for T where T: Copy + Ord + Add<Duration, Output = T> {}

/// Milliseconds since boot, used by the emulator and host tests.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Millis(pub u64);

impl Millis {
    /// Timestamp at boot.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from raw milliseconds.
    #[must_use]
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond count.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the time elapsed since `earlier`, or zero when `earlier` is later.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
