//! Boot-time recovery of relay outputs and the persisted status mask.
//!
//! One byte of persistent storage holds the last applied status of every
//! relay: bit `i` is relay `i`, least significant bit first. The byte is
//! opaque state, carrying no version or checksum.

use core::fmt;

use crate::relays::RelayId;

/// Storage slot holding the relay status mask.
pub const RELAY_STATUS_SLOT: usize = 0;

/// Number of relays a single mask byte can describe.
pub const MASK_BITS: usize = 8;

/// How a relay's target is chosen at boot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BootMode {
    #[default]
    Off,
    On,
    /// Restore the persisted status.
    Same,
    /// Invert the persisted status.
    Toggle,
}

impl BootMode {
    /// Decodes the persisted setting value; unknown codes fall back to `Off`.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => BootMode::On,
            2 => BootMode::Same,
            3 => BootMode::Toggle,
            _ => BootMode::Off,
        }
    }

    #[must_use]
    pub const fn as_code(self) -> u32 {
        match self {
            BootMode::Off => 0,
            BootMode::On => 1,
            BootMode::Same => 2,
            BootMode::Toggle => 3,
        }
    }

    /// Resolves the boot target from the persisted bit.
    ///
    /// Returns the target and whether the persisted bit must be flipped.
    #[must_use]
    pub const fn resolve(self, persisted: bool) -> (bool, bool) {
        match self {
            BootMode::Off => (false, false),
            BootMode::On => (true, false),
            BootMode::Same => (persisted, false),
            BootMode::Toggle => (!persisted, true),
        }
    }
}

/// Bit representing `id` in the status mask, if the relay fits in it.
#[must_use]
pub const fn mask_bit(id: RelayId) -> Option<u8> {
    if id < MASK_BITS {
        Some(1 << id)
    } else {
        None
    }
}

/// Reads the status of `id` from a mask.
#[must_use]
pub const fn mask_status(mask: u8, id: RelayId) -> bool {
    match mask_bit(id) {
        Some(bit) => mask & bit != 0,
        None => false,
    }
}

/// Byte-addressed persistent storage used for the status mask.
pub trait PersistentStore {
    /// Store-specific failure.
    type Error;

    /// Reads the byte held in `slot`.
    fn read_byte(&mut self, slot: usize) -> u8;

    /// Stages a byte for `slot`; durable only after [`commit`](Self::commit).
    fn write_byte(&mut self, slot: usize, value: u8) -> Result<(), Self::Error>;

    /// Flushes staged writes to the backing medium.
    fn commit(&mut self) -> Result<(), Self::Error>;
}

/// Failure reported by [`MemoryStore`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryStoreError {
    SlotOutOfRange(usize),
}

impl fmt::Display for MemoryStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryStoreError::SlotOutOfRange(slot) => write!(f, "slot {slot} out of range"),
        }
    }
}

/// RAM-backed store that separates staged from committed bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryStore<const SLOTS: usize = 4> {
    staged: [u8; SLOTS],
    committed: [u8; SLOTS],
    commits: usize,
}

impl<const SLOTS: usize> MemoryStore<SLOTS> {
    /// Creates a zeroed store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            staged: [0; SLOTS],
            committed: [0; SLOTS],
            commits: 0,
        }
    }

    /// Creates a store whose status slot already holds `mask`.
    #[must_use]
    pub fn with_mask(mask: u8) -> Self {
        let mut store = Self::new();
        if RELAY_STATUS_SLOT < SLOTS {
            store.staged[RELAY_STATUS_SLOT] = mask;
            store.committed[RELAY_STATUS_SLOT] = mask;
        }
        store
    }

    /// Committed value of `slot`, as it would survive a power loss.
    #[must_use]
    pub fn committed(&self, slot: usize) -> Option<u8> {
        self.committed.get(slot).copied()
    }

    /// Number of successful commits.
    #[must_use]
    pub const fn commit_count(&self) -> usize {
        self.commits
    }

    /// Discards staged writes, emulating a power loss before commit.
    pub fn power_cycle(&mut self) {
        self.staged = self.committed;
    }
}

impl<const SLOTS: usize> Default for MemoryStore<SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SLOTS: usize> PersistentStore for MemoryStore<SLOTS> {
    type Error = MemoryStoreError;

    fn read_byte(&mut self, slot: usize) -> u8 {
        self.staged.get(slot).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, slot: usize, value: u8) -> Result<(), Self::Error> {
        let cell = self
            .staged
            .get_mut(slot)
            .ok_or(MemoryStoreError::SlotOutOfRange(slot))?;
        *cell = value;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.committed = self.staged;
        self.commits += 1;
        Ok(())
    }
}
