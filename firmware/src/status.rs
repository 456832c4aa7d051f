#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared relay status for the firmware target.
//!
//! The relay task publishes its masks after every command and tick; other
//! tasks read them without touching the controller.

use portable_atomic::{AtomicU8, Ordering};

/// Status masks published by the relay task.
pub static RELAY_STATUS: StatusCell = StatusCell::new();

/// Pair of relay masks, one bit per relay.
pub struct StatusCell {
    /// Applied status (1 == ON).
    current: AtomicU8,
    /// Status the scheduler is converging to.
    target: AtomicU8,
}

impl StatusCell {
    pub const fn new() -> Self {
        Self {
            current: AtomicU8::new(0),
            target: AtomicU8::new(0),
        }
    }

    /// Stores the latest masks.
    pub fn publish(&self, current: u8, target: u8) {
        self.current.store(current, Ordering::Relaxed);
        self.target.store(target, Ordering::Relaxed);
    }

    pub fn current_mask(&self) -> u8 {
        self.current.load(Ordering::Relaxed)
    }

    pub fn target_mask(&self) -> u8 {
        self.target.load(Ordering::Relaxed)
    }

    /// Returns `true` when relay `id` is applied ON.
    pub fn is_on(&self, id: usize) -> bool {
        id < 8 && self.current_mask() & (1 << id) != 0
    }

    /// Returns `true` while any relay still has a change pending.
    pub fn is_settling(&self) -> bool {
        self.current_mask() != self.target_mask()
    }
}
