#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Push-button gesture decoding.
//!
//! The button task samples the pin at a fixed period and feeds every sample
//! to [`PressTracker`], which turns the level history into relay actions.

use crate::relays::RelayAction;

/// Samples a press must be held to count as a long press.
pub const LONG_PRESS_SAMPLES: u16 = 50;

/// Turns sampled button levels into relay actions.
///
/// A press released before [`LONG_PRESS_SAMPLES`] toggles the relay; holding
/// it that long switches the relay off once, and the release is swallowed.
#[derive(Debug, Default)]
pub struct PressTracker {
    held: u16,
    long_fired: bool,
}

impl PressTracker {
    pub const fn new() -> Self {
        Self {
            held: 0,
            long_fired: false,
        }
    }

    /// Feeds one sample, returning the action it completes.
    pub fn sample(&mut self, pressed: bool) -> Option<RelayAction> {
        if pressed {
            self.held = self.held.saturating_add(1);
            if !self.long_fired && self.held >= LONG_PRESS_SAMPLES {
                self.long_fired = true;
                return Some(RelayAction::Off);
            }
            return None;
        }

        let action = (self.held > 0 && !self.long_fired).then_some(RelayAction::Toggle);
        self.held = 0;
        self.long_fired = false;
        action
    }
}
