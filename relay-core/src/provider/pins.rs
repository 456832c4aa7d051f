//! Direct pin provider for normal, inverse and latched relays.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

use super::{OutputRequest, RelayDriver};
use crate::relays::{PinId, RelayConfig, RelayId, RelayKind};

/// Default width of a latching drive pulse.
pub const DEFAULT_LATCH_PULSE: Duration = Duration::from_millis(10);

/// Board pins addressed by number.
pub trait PinBank {
    /// Switches `pin` into push-pull output mode.
    fn set_output(&mut self, pin: PinId);

    /// Drives `pin` to `level`.
    fn set_level(&mut self, pin: PinId, level: PinState);
}

/// Level that energizes a latched relay's coil.
const fn latch_active(kind: RelayKind) -> PinState {
    match kind {
        RelayKind::LatchedInverse => PinState::Low,
        _ => PinState::High,
    }
}

const fn invert(level: PinState) -> PinState {
    match level {
        PinState::Low => PinState::High,
        PinState::High => PinState::Low,
    }
}

/// Provider driving one pin per relay, two for latched relays with a
/// reset coil.
#[derive(Debug)]
pub struct PinDriver<B, D> {
    bank: B,
    delay: D,
    latch_pulse: Duration,
}

impl<B: PinBank, D: DelayNs> PinDriver<B, D> {
    pub fn new(bank: B, delay: D) -> Self {
        Self::with_latch_pulse(bank, delay, DEFAULT_LATCH_PULSE)
    }

    pub fn with_latch_pulse(bank: B, delay: D, latch_pulse: Duration) -> Self {
        Self {
            bank,
            delay,
            latch_pulse,
        }
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn into_parts(self) -> (B, D) {
        (self.bank, self.delay)
    }

    fn latch(&mut self, config: &RelayConfig, pin: PinId, status: bool) {
        let active = latch_active(config.kind);
        let inactive = invert(active);

        self.bank.set_level(pin, inactive);
        if let Some(reset) = config.reset_pin {
            self.bank.set_level(reset, inactive);
        }

        let coil = match config.reset_pin {
            Some(reset) if !status => reset,
            _ => pin,
        };
        self.bank.set_level(coil, active);

        let hold = u32::try_from(self.latch_pulse.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(hold);

        self.bank.set_level(pin, inactive);
        if let Some(reset) = config.reset_pin {
            self.bank.set_level(reset, inactive);
        }
    }
}

impl<B: PinBank, D: DelayNs> RelayDriver for PinDriver<B, D> {
    fn prepare(&mut self, _: RelayId, config: &RelayConfig) {
        let Some(pin) = config.pin else {
            return;
        };

        self.bank.set_output(pin);
        match config.kind {
            RelayKind::Normal => {}
            RelayKind::Inverse => self.bank.set_level(pin, PinState::High),
            RelayKind::Latched | RelayKind::LatchedInverse => {
                let inactive = invert(latch_active(config.kind));
                self.bank.set_level(pin, inactive);
                if let Some(reset) = config.reset_pin {
                    self.bank.set_output(reset);
                    self.bank.set_level(reset, inactive);
                }
            }
        }
    }

    fn apply(&mut self, request: &OutputRequest<'_>) {
        let config = request.config;
        let Some(pin) = config.pin else {
            return;
        };

        match config.kind {
            RelayKind::Normal => self.bank.set_level(pin, PinState::from(request.status)),
            RelayKind::Inverse => self.bank.set_level(pin, PinState::from(!request.status)),
            RelayKind::Latched | RelayKind::LatchedInverse => {
                self.latch(config, pin, request.status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum PinEvent {
        Output(PinId),
        Level(PinId, PinState),
    }

    #[derive(Default)]
    struct RecordingBank {
        events: Vec<PinEvent, 32>,
    }

    impl PinBank for RecordingBank {
        fn set_output(&mut self, pin: PinId) {
            self.events.push(PinEvent::Output(pin)).unwrap();
        }

        fn set_level(&mut self, pin: PinId, level: PinState) {
            self.events.push(PinEvent::Level(pin, level)).unwrap();
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        waited_us: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.waited_us += u64::from(ns) / 1_000;
        }

        fn delay_us(&mut self, us: u32) {
            self.waited_us += u64::from(us);
        }
    }

    fn request(config: &RelayConfig, status: bool) -> OutputRequest<'_> {
        OutputRequest {
            id: 0,
            status,
            config,
            relay_count: 1,
            status_mask: u8::from(status),
        }
    }

    fn driver() -> PinDriver<RecordingBank, CountingDelay> {
        PinDriver::new(RecordingBank::default(), CountingDelay::default())
    }

    #[test]
    fn inverse_relay_starts_high_and_inverts() {
        let config = RelayConfig::gpio(4, RelayKind::Inverse);
        let mut driver = driver();
        driver.prepare(0, &config);
        driver.apply(&request(&config, true));
        assert_eq!(
            driver.bank().events.as_slice(),
            &[
                PinEvent::Output(4),
                PinEvent::Level(4, PinState::High),
                PinEvent::Level(4, PinState::Low),
            ]
        );
    }

    #[test]
    fn latched_off_pulses_reset_coil() {
        let config = RelayConfig::gpio(4, RelayKind::Latched).with_reset_pin(5);
        let mut driver = driver();
        driver.apply(&request(&config, false));
        assert_eq!(
            driver.bank().events.as_slice(),
            &[
                PinEvent::Level(4, PinState::Low),
                PinEvent::Level(5, PinState::Low),
                PinEvent::Level(5, PinState::High),
                PinEvent::Level(4, PinState::Low),
                PinEvent::Level(5, PinState::Low),
            ]
        );
        let (_, delay) = driver.into_parts();
        assert_eq!(delay.waited_us, 10_000);
    }

    #[test]
    fn latched_inverse_ends_high() {
        let config = RelayConfig::gpio(7, RelayKind::LatchedInverse);
        let mut driver = driver();
        driver.apply(&request(&config, true));
        assert_eq!(
            driver.bank().events.as_slice(),
            &[
                PinEvent::Level(7, PinState::High),
                PinEvent::Level(7, PinState::Low),
                PinEvent::Level(7, PinState::High),
            ]
        );
    }

    #[test]
    fn virtual_relay_touches_nothing() {
        let config = RelayConfig::dummy();
        let mut driver = driver();
        driver.prepare(0, &config);
        driver.apply(&request(&config, true));
        assert!(driver.bank().events.is_empty());
    }
}
