//! Board adapters: GPIO bank and flash-backed status storage.

#![cfg(target_os = "none")]

use embassy_stm32::flash::{Blocking, Error as FlashError, FLASH_SIZE, Flash, WRITE_SIZE};
use embassy_stm32::gpio::{Flex, Level, Speed};
use embedded_hal::digital::PinState;
use heapless::Vec;
use relay_core::boot::PersistentStore;
use relay_core::provider::PinBank;
use relay_core::relays::PinId;

/// Maximum number of pins the board exposes to relays.
pub const MAX_BOARD_PINS: usize = 8;

/// Relay-facing GPIO bank addressed by board pin number.
pub struct BoardPins {
    pins: Vec<(PinId, Flex<'static>), MAX_BOARD_PINS>,
}

impl BoardPins {
    pub const fn new() -> Self {
        Self { pins: Vec::new() }
    }

    /// Registers `flex` under board pin number `id`.
    pub fn with(mut self, id: PinId, flex: Flex<'static>) -> Self {
        if self.pins.push((id, flex)).is_err() {
            defmt::warn!("pin {} dropped, bank full", id);
        }
        self
    }

    fn pin_mut(&mut self, id: PinId) -> Option<&mut Flex<'static>> {
        self.pins
            .iter_mut()
            .find(|(pin, _)| *pin == id)
            .map(|(_, flex)| flex)
    }
}

impl PinBank for BoardPins {
    fn set_output(&mut self, pin: PinId) {
        match self.pin_mut(pin) {
            Some(flex) => flex.set_as_output(Speed::Low),
            None => defmt::warn!("pin {} not wired", pin),
        }
    }

    fn set_level(&mut self, pin: PinId, level: PinState) {
        if let Some(flex) = self.pin_mut(pin) {
            flex.set_level(match level {
                PinState::Low => Level::Low,
                PinState::High => Level::High,
            });
        }
    }
}

/// Erase granularity of the STM32G0B1 flash.
const PAGE_SIZE: u32 = 2048;

/// Number of status bytes kept; one flash write unit.
const SLOTS: usize = WRITE_SIZE;

/// Status bytes kept in the last flash page.
///
/// Writes are staged in RAM; `commit` erases the page and programs one
/// write unit.
pub struct FlashStore {
    flash: Flash<'static, Blocking>,
    cache: [u8; SLOTS],
    dirty: bool,
}

impl FlashStore {
    const OFFSET: u32 = FLASH_SIZE as u32 - PAGE_SIZE;

    /// Loads the stored bytes; erased flash reads back as `0xFF`.
    pub fn new(mut flash: Flash<'static, Blocking>) -> Self {
        let mut cache = [0u8; SLOTS];
        if flash.blocking_read(Self::OFFSET, &mut cache).is_err() {
            defmt::warn!("status page unreadable");
            cache = [0; SLOTS];
        }
        Self {
            flash,
            cache,
            dirty: false,
        }
    }
}

impl PersistentStore for FlashStore {
    type Error = FlashError;

    fn read_byte(&mut self, slot: usize) -> u8 {
        self.cache.get(slot).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, slot: usize, value: u8) -> Result<(), Self::Error> {
        let cell = self.cache.get_mut(slot).ok_or(FlashError::Size)?;
        if *cell != value {
            *cell = value;
            self.dirty = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        if !self.dirty {
            return Ok(());
        }
        self.flash
            .blocking_erase(Self::OFFSET, Self::OFFSET + PAGE_SIZE)?;
        self.flash.blocking_write(Self::OFFSET, &self.cache)?;
        self.dirty = false;
        Ok(())
    }
}
