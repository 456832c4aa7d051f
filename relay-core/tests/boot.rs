mod common;

use core::time::Duration;

use common::{BrokenStore, RecordingDriver, RecordingSink, ms};
use relay_core::boot::{MemoryStore, RELAY_STATUS_SLOT};
use relay_core::provider::BootStagger;
use relay_core::telemetry::RelayEventKind;
use relay_core::{BootMode, ControllerConfig, Millis, RelayConfig, RelayController, ReportFlags};

type MemoryController = RelayController<Millis, RecordingDriver, MemoryStore>;

fn booted(mask: u8, modes: &[BootMode]) -> MemoryController {
    let mut controller = MemoryController::new(
        RecordingDriver::default(),
        MemoryStore::with_mask(mask),
        ControllerConfig::DEFAULT,
    );
    controller
        .configure(
            modes.iter().map(|mode| RelayConfig::dummy().with_boot(*mode)),
            ms(0),
        )
        .unwrap();
    controller.boot(ms(0));
    controller
}

#[test]
fn toggle_boot_flips_and_saves_immediately() {
    let controller = booted(0b01, &[BootMode::Toggle, BootMode::Same]);

    assert!(!controller.target(0).unwrap());
    assert_eq!(controller.persisted_mask(), 0b00);
    assert_eq!(controller.store().committed(RELAY_STATUS_SLOT), Some(0b00));
    assert_eq!(controller.store().commit_count(), 1);
}

#[test]
fn same_boot_round_trips_the_mask() {
    let modes = [BootMode::Same; 4];
    let mut controller = booted(0, &modes);
    let mut sink = RecordingSink::default();
    controller.tick(ms(0), &mut sink);

    controller
        .request_status(0, true, ReportFlags::ALL, ms(100))
        .unwrap();
    controller
        .request_status(2, true, ReportFlags::ALL, ms(100))
        .unwrap();
    controller.tick(ms(100), &mut sink);
    controller.tick(ms(1_100), &mut sink);
    assert_eq!(controller.persisted_mask(), 0b0101);

    let mut store = controller.store().clone();
    store.power_cycle();
    let mut rebooted = MemoryController::new(
        RecordingDriver::default(),
        store,
        ControllerConfig::DEFAULT,
    );
    rebooted
        .configure(modes.iter().map(|mode| RelayConfig::dummy().with_boot(*mode)), ms(0))
        .unwrap();
    rebooted.boot(ms(0));
    assert_eq!(rebooted.target_mask(), 0b0101);
}

#[test]
fn first_tick_actuates_every_relay() {
    let mut controller = booted(0b10, &[BootMode::Off, BootMode::Same, BootMode::On]);
    controller.tick(ms(0), &mut RecordingSink::default());

    assert_eq!(
        controller.driver().applied(),
        vec![(0, false), (1, true), (2, true)]
    );
}

#[test]
fn stagger_spaces_boot_actuation() {
    let driver = RecordingDriver {
        stagger: Some(BootStagger {
            initial: Duration::from_secs(3),
            per_relay: Duration::from_secs(1),
        }),
        ..RecordingDriver::default()
    };
    let mut controller = MemoryController::new(driver, MemoryStore::new(), ControllerConfig::DEFAULT);
    controller
        .configure([RelayConfig::dummy(), RelayConfig::dummy()], ms(0))
        .unwrap();
    controller.boot(ms(0));
    let mut sink = RecordingSink::default();

    assert_eq!(controller.tick(ms(2_999), &mut sink), 0);
    assert_eq!(controller.tick(ms(3_000), &mut sink), 1);
    assert_eq!(controller.tick(ms(4_000), &mut sink), 1);
}

#[test]
fn save_failures_do_not_stop_relays() {
    let mut controller: RelayController<Millis, RecordingDriver, BrokenStore> = RelayController::new(
        RecordingDriver::default(),
        BrokenStore { mask: 0b1 },
        ControllerConfig::DEFAULT,
    );
    controller
        .configure([RelayConfig::dummy().with_boot(BootMode::Toggle)], ms(0))
        .unwrap();
    controller.boot(ms(0));

    assert_eq!(
        controller.events().latest().map(|event| event.kind),
        Some(RelayEventKind::SaveFailed { mask: 0 })
    );

    let mut sink = RecordingSink::default();
    controller.tick(ms(0), &mut sink);
    controller
        .request_status(0, true, ReportFlags::ALL, ms(10))
        .unwrap();
    controller.tick(ms(10), &mut sink);
    controller.tick(ms(1_010), &mut sink);
    assert!(controller.status(0).unwrap());
    assert_eq!(sink.notices.len(), 2);
}
