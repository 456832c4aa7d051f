#![allow(dead_code)]

use relay_core::boot::{MemoryStore, PersistentStore};
use relay_core::provider::{BootStagger, OutputRequest, RelayDriver};
use relay_core::telemetry::{NotificationSink, RelayNotice};
use relay_core::{ControllerConfig, Millis, RelayConfig, RelayController};

/// Driver call captured by [`RecordingDriver`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriverCall {
    Apply { id: usize, status: bool, mask: u8 },
    Reassert { id: usize, status: bool },
}

#[derive(Debug, Default)]
pub struct RecordingDriver {
    pub calls: Vec<DriverCall>,
    pub stagger: Option<BootStagger>,
}

impl RecordingDriver {
    pub fn applied(&self) -> Vec<(usize, bool)> {
        self.calls
            .iter()
            .filter_map(|call| match *call {
                DriverCall::Apply { id, status, .. } => Some((id, status)),
                DriverCall::Reassert { .. } => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl RelayDriver for RecordingDriver {
    fn apply(&mut self, request: &OutputRequest<'_>) {
        self.calls.push(DriverCall::Apply {
            id: request.id,
            status: request.status,
            mask: request.status_mask,
        });
    }

    fn reassert(&mut self, request: &OutputRequest<'_>) {
        self.calls.push(DriverCall::Reassert {
            id: request.id,
            status: request.status,
        });
    }

    fn boot_stagger(&self) -> Option<BootStagger> {
        self.stagger
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub notices: Vec<RelayNotice>,
}

impl NotificationSink for RecordingSink {
    fn relay_applied(&mut self, notice: RelayNotice) {
        self.notices.push(notice);
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub struct BrokenStore {
    pub mask: u8,
}

impl PersistentStore for BrokenStore {
    type Error = ();

    fn read_byte(&mut self, _: usize) -> u8 {
        self.mask
    }

    fn write_byte(&mut self, _: usize, _: u8) -> Result<(), Self::Error> {
        Err(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        Err(())
    }
}

pub type TestController = RelayController<Millis, RecordingDriver, MemoryStore>;

/// Configures, boots and settles a controller at t = 0 with all relays OFF.
pub fn settled(configs: &[RelayConfig], config: ControllerConfig) -> TestController {
    let mut controller = RelayController::new(RecordingDriver::default(), MemoryStore::new(), config);
    controller
        .configure(configs.iter().cloned(), Millis::ZERO)
        .expect("relays fit");
    controller.boot(Millis::ZERO);
    controller.tick(Millis::ZERO, &mut RecordingSink::default());
    controller.driver_mut().clear();
    controller
}

pub fn ms(value: u64) -> Millis {
    Millis::new(value)
}
