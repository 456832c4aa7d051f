//! Pulse (auto-return) timing for relays.
//!
//! A pulsing relay flips back to its resting level a fixed time after it
//! leaves it. Each relay owns a [`OneShotTimer`]; the controller services
//! the timers at the top of every tick instead of from an interrupt, so an
//! expiry only ever runs the same toggle path external callers use.

use core::time::Duration;

use crate::time::RelayInstant;

/// Default pulse length when a pulse mode is set without a duration.
pub const DEFAULT_PULSE_DURATION: Duration = Duration::from_secs(1);

/// Which level a pulsing relay returns to.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PulseMode {
    #[default]
    None,
    /// Relay returns to OFF after being switched ON.
    ReturnOff,
    /// Relay returns to ON after being switched OFF.
    ReturnOn,
}

impl PulseMode {
    /// Decodes the persisted setting value; unknown codes disable pulsing.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => PulseMode::ReturnOff,
            2 => PulseMode::ReturnOn,
            _ => PulseMode::None,
        }
    }

    /// Encodes the mode for persistence.
    #[must_use]
    pub const fn as_code(self) -> u32 {
        match self {
            PulseMode::None => 0,
            PulseMode::ReturnOff => 1,
            PulseMode::ReturnOn => 2,
        }
    }

    /// Level the relay returns to when the pulse expires.
    #[must_use]
    pub const fn resting_level(self) -> Option<bool> {
        match self {
            PulseMode::None => None,
            PulseMode::ReturnOff => Some(false),
            PulseMode::ReturnOn => Some(true),
        }
    }

    /// Mode that brings a relay back to `status` after a pulse.
    #[must_use]
    pub const fn returning_to(status: bool) -> Self {
        if status {
            PulseMode::ReturnOn
        } else {
            PulseMode::ReturnOff
        }
    }
}

/// Pulse behavior for one relay.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PulseSettings {
    pub mode: PulseMode,
    pub duration: Duration,
}

/// What the pulse manager should do with a relay's timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PulseAction {
    /// Pulsing is disabled; leave the timer alone.
    Ignore,
    /// Relay sits at its resting level; nothing should fire.
    Disarm,
    /// Relay left its resting level; fire after the duration.
    Arm(Duration),
}

impl PulseSettings {
    /// Pulsing disabled.
    pub const NONE: Self = Self {
        mode: PulseMode::None,
        duration: Duration::ZERO,
    };

    #[must_use]
    pub const fn new(mode: PulseMode, duration: Duration) -> Self {
        Self { mode, duration }
    }

    /// Returns `true` when a pulse can ever fire with these settings.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.mode, PulseMode::None) && !self.duration.is_zero()
    }

    /// Decides the timer action for a relay whose applied status is `current`.
    #[must_use]
    pub fn action_for(&self, current: bool) -> PulseAction {
        if !self.is_active() {
            return PulseAction::Ignore;
        }

        match self.mode.resting_level() {
            Some(rest) if rest != current => PulseAction::Arm(self.duration),
            Some(_) => PulseAction::Disarm,
            None => PulseAction::Ignore,
        }
    }
}

/// Deadline-based one-shot timer.
///
/// Re-arming replaces the pending deadline, so at most one expiry is ever
/// outstanding per timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OneShotTimer<I> {
    deadline: Option<I>,
}

impl<I: RelayInstant> OneShotTimer<I> {
    /// Creates a disarmed timer.
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arms the timer to expire `duration` after `now`.
    pub fn arm_once(&mut self, now: I, duration: Duration) {
        self.deadline = Some(now + duration);
    }

    /// Disarms the timer, returning `true` when an expiry was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Returns `true` while an expiry is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending expiry time, if armed.
    #[must_use]
    pub fn deadline(&self) -> Option<I> {
        self.deadline
    }

    /// Consumes the expiry once `now` reaches the deadline.
    pub fn fire(&mut self, now: I) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl<I: RelayInstant> Default for OneShotTimer<I> {
    fn default() -> Self {
        Self::new()
    }
}
