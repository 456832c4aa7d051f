mod common;

use core::time::Duration;

use common::{RecordingSink, ms, settled};
use relay_core::pulse::PulseMode;
use relay_core::telemetry::RelayEventKind;
use relay_core::{ControllerConfig, RelayConfig, ReportFlags, RequestOutcome};

fn pulsed(mode: PulseMode) -> RelayConfig {
    RelayConfig::dummy().with_pulse(mode, Duration::from_millis(500))
}

#[test]
fn return_off_pulse_switches_back() {
    let mut controller = settled(&[pulsed(PulseMode::ReturnOff)], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();

    controller
        .request_status(0, true, ReportFlags::ALL, ms(100))
        .unwrap();
    controller.tick(ms(100), &mut sink);
    assert_eq!(controller.get(0).unwrap().pulse_deadline(), Some(ms(600)));

    controller.tick(ms(599), &mut sink);
    assert!(controller.status(0).unwrap());
    controller.tick(ms(600), &mut sink);
    assert!(!controller.status(0).unwrap());
    assert!(controller.get(0).unwrap().pulse_deadline().is_none());
    assert!(
        controller
            .events()
            .oldest_first()
            .any(|event| event.kind == RelayEventKind::PulseExpired { id: 0 })
    );
}

#[test]
fn manual_return_to_rest_cancels_pulse() {
    let mut controller = settled(&[pulsed(PulseMode::ReturnOff)], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();

    controller
        .request_status(0, true, ReportFlags::ALL, ms(100))
        .unwrap();
    controller.tick(ms(100), &mut sink);
    controller
        .request_status(0, false, ReportFlags::ALL, ms(200))
        .unwrap();
    controller.tick(ms(200), &mut sink);

    assert!(controller.get(0).unwrap().pulse_deadline().is_none());
    controller.tick(ms(1_000), &mut sink);
    assert!(!controller.status(0).unwrap());
}

#[test]
fn repeated_on_extends_pulse() {
    let mut controller = settled(&[pulsed(PulseMode::ReturnOff)], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();

    controller
        .request_status(0, true, ReportFlags::ALL, ms(100))
        .unwrap();
    controller.tick(ms(100), &mut sink);
    let outcome = controller
        .request_status(0, true, ReportFlags::ALL, ms(400))
        .unwrap();

    assert_eq!(outcome, RequestOutcome::Unchanged);
    assert_eq!(controller.get(0).unwrap().pulse_deadline(), Some(ms(900)));
}

#[test]
fn return_on_pulse_applies_when_off() {
    let mut controller = settled(&[pulsed(PulseMode::ReturnOn)], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();

    // Boot left the relay OFF, away from its resting level.
    assert_eq!(controller.get(0).unwrap().pulse_deadline(), Some(ms(500)));
    controller.tick(ms(500), &mut sink);
    assert!(controller.status(0).unwrap());
}

#[test]
fn one_shot_override_reverts_to_configured_pulse() {
    let mut controller = settled(&[RelayConfig::dummy()], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();

    controller
        .request_pulse(0, Duration::from_millis(250), ms(100))
        .unwrap();
    controller.tick(ms(100), &mut sink);
    assert!(controller.status(0).unwrap());
    assert_eq!(controller.get(0).unwrap().pulse().mode, PulseMode::None);

    controller.tick(ms(350), &mut sink);
    assert!(!controller.status(0).unwrap());

    controller
        .request_status(0, true, ReportFlags::ALL, ms(400))
        .unwrap();
    controller.tick(ms(400), &mut sink);
    assert!(controller.get(0).unwrap().pulse_deadline().is_none());
}

#[test]
fn zero_length_pulse_is_ignored() {
    let mut controller = settled(&[RelayConfig::dummy()], ControllerConfig::DEFAULT);
    assert_eq!(
        controller.request_pulse(0, Duration::ZERO, ms(10)),
        Ok(RequestOutcome::Unchanged)
    );
    assert!(controller.get(0).unwrap().is_settled());
}

#[test]
fn manual_off_cancels_one_shot_pulse() {
    let mut controller = settled(&[RelayConfig::dummy()], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();

    controller
        .request_pulse(0, Duration::from_millis(1_000), ms(100))
        .unwrap();
    controller.tick(ms(100), &mut sink);
    assert!(controller.status(0).unwrap());
    assert_eq!(controller.get(0).unwrap().pulse_deadline(), Some(ms(1_100)));

    controller
        .request_status(0, false, ReportFlags::ALL, ms(200))
        .unwrap();
    controller.tick(ms(200), &mut sink);
    assert!(!controller.status(0).unwrap());
    assert!(controller.get(0).unwrap().pulse_deadline().is_none());

    controller.tick(ms(1_100), &mut sink);
    controller.tick(ms(1_110), &mut sink);
    assert!(!controller.status(0).unwrap());
}
