#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Relay control surface bridging firmware tasks with `relay-core`.
//!
//! Other tasks never touch the controller; they post [`RelayCommand`]s into
//! [`CommandQueue`] and the relay task applies them between scheduler ticks.

use core::ops::Add;
use core::time::Duration;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::Instant;
use relay_core::boot::{BootMode, PersistentStore};
use relay_core::provider::RelayDriver;
use relay_core::relays::{DisconnectReaction, RelayId};
use relay_core::settings::{MemorySettings, SettingKey};
use relay_core::telemetry::EventId;
use relay_core::{ControllerConfig, RelayController, RelayError, RelayKind, ReportFlags};

use crate::status;
use crate::telemetry::{LogSink, log_configure_overflow, log_event, log_rejected};

/// Depth of the command queue shared between producers and the relay task.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Scheduler tick period.
pub const TICK_PERIOD: embassy_time::Duration = embassy_time::Duration::from_millis(10);

#[cfg(target_os = "none")]
type RelayMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type RelayMutex = NoopRawMutex;

/// Monotonic instant handed to the core.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        let delta = embassy_time::Duration::from_micros(micros);
        Self(self.0.checked_add(delta).unwrap_or(Instant::MAX))
    }
}

/// Action requested for a relay.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RelayAction {
    Off,
    Toggle,
}

/// Request posted to the relay task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RelayCommand {
    pub id: RelayId,
    pub action: RelayAction,
}

impl RelayCommand {
    pub const fn new(id: RelayId, action: RelayAction) -> Self {
        Self { id, action }
    }
}

/// Queue used to hand relay commands to the relay task.
pub type CommandQueue = Channel<RelayMutex, RelayCommand, COMMAND_QUEUE_DEPTH>;

/// Convenience sender type alias for the relay command queue.
pub type CommandSender<'a> = Sender<'a, RelayMutex, RelayCommand, COMMAND_QUEUE_DEPTH>;

/// Convenience receiver type alias for the relay command queue.
pub type CommandReceiver<'a> = Receiver<'a, RelayMutex, RelayCommand, COMMAND_QUEUE_DEPTH>;

/// Relay outputs on PA4..PA7; the last one drives a latching relay.
///
/// Pins are numbered port-major: PA0..PA15 are 0..15, PB0 is 16.
pub const BOARD_RELAY_PINS: [u8; 4] = [4, 5, 6, 7];

/// Reset coil of the latching relay (PB0).
pub const BOARD_RESET_PIN: u8 = 16;

/// Settings profile baked into the firmware image.
pub fn board_settings() -> MemorySettings {
    let mut settings = MemorySettings::new();
    for (index, pin) in (0u8..).zip(BOARD_RELAY_PINS) {
        settings = settings
            .with(SettingKey::RelayPin, index, u32::from(pin))
            .with(SettingKey::BootMode, index, BootMode::Same.as_code());
    }

    settings
        .with(SettingKey::RelayKind, 3, RelayKind::Latched.as_code())
        .with(SettingKey::ResetPin, 3, u32::from(BOARD_RESET_PIN))
        .with(
            SettingKey::DisconnectReaction,
            0,
            DisconnectReaction::TurnOff.as_code(),
        )
}

/// Controller plus the bookkeeping the relay task needs around it.
pub struct RelayService<D, S>
where
    D: RelayDriver,
    S: PersistentStore,
{
    controller: RelayController<FirmwareInstant, D, S>,
    sink: LogSink,
    logged_through: EventId,
}

impl<D, S> RelayService<D, S>
where
    D: RelayDriver,
    S: PersistentStore,
{
    /// Configures relays from `settings` and seeds them from the store.
    ///
    /// Relays beyond capacity are dropped with a log line; the rest run.
    pub fn start(driver: D, store: S, settings: &MemorySettings, now: FirmwareInstant) -> Self {
        let mut controller = RelayController::new(driver, store, ControllerConfig::load(settings));
        if let Err(error) = controller.configure_from(settings, now) {
            log_configure_overflow(error);
        }

        let mut service = Self {
            controller,
            sink: LogSink::new(),
            logged_through: 0,
        };
        service.controller.boot(now);
        service.flush_events();
        service.publish();
        service
    }

    pub fn controller(&self) -> &RelayController<FirmwareInstant, D, S> {
        &self.controller
    }

    /// Applies one queued command.
    pub fn handle(&mut self, command: RelayCommand, now: FirmwareInstant) {
        let result = match command.action {
            RelayAction::Off => {
                self.controller
                    .request_status(command.id, false, ReportFlags::ALL, now)
            }
            RelayAction::Toggle => self.controller.toggle(command.id, ReportFlags::ALL, now),
        };

        if let Err(error) = result {
            report_rejection(command, error);
        }
        self.flush_events();
        self.publish();
    }

    /// Runs one scheduler pass and publishes the resulting status.
    pub fn tick(&mut self, now: FirmwareInstant) -> usize {
        let applied = self.controller.tick(now, &mut self.sink);
        self.flush_events();
        self.publish();
        applied
    }

    fn publish(&self) {
        status::RELAY_STATUS.publish(self.controller.status_mask(), self.controller.target_mask());
    }

    fn flush_events(&mut self) {
        let from = self.logged_through;
        for event in self
            .controller
            .events()
            .oldest_first()
            .filter(|event| event.id >= from)
        {
            log_event(event.kind);
        }
        self.logged_through = self.controller.events().next_id();
    }
}

fn report_rejection(command: RelayCommand, error: RelayError) {
    let code = match error {
        RelayError::InvalidIndex { .. } => 1,
        RelayError::InvalidPayload => 2,
    };
    log_rejected(command.id, code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::MemoryStore;
    use relay_core::provider::NoopRelayDriver;

    fn at(ms: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_millis(ms))
    }

    fn service() -> RelayService<NoopRelayDriver, MemoryStore> {
        RelayService::start(
            NoopRelayDriver::new(),
            MemoryStore::with_mask(0b0010),
            &board_settings(),
            at(0),
        )
    }

    #[test]
    fn instants_add_core_durations() {
        assert_eq!(at(5) + Duration::from_millis(20), at(25));
        assert_eq!(
            FirmwareInstant::from(Instant::MAX) + Duration::from_secs(1),
            FirmwareInstant::from(Instant::MAX)
        );
    }

    #[test]
    fn board_profile_restores_persisted_mask() {
        let mut service = service();
        assert_eq!(service.controller().count(), BOARD_RELAY_PINS.len());
        service.tick(at(0));
        assert_eq!(service.controller().status_mask(), 0b0010);
    }

    #[test]
    fn commands_flow_through_scheduler() {
        let mut service = service();
        service.tick(at(0));
        service.handle(RelayCommand::new(0, RelayAction::Toggle), at(10));
        service.handle(RelayCommand::new(9, RelayAction::Toggle), at(10));
        assert_eq!(service.controller().target_mask(), 0b0011);
        service.tick(at(10));
        assert_eq!(service.controller().status_mask(), 0b0011);

        service.handle(RelayCommand::new(1, RelayAction::Off), at(20));
        service.tick(at(20));
        assert_eq!(service.controller().status_mask(), 0b0001);
    }
}
