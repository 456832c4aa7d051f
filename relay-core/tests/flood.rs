mod common;

use core::time::Duration;

use common::{RecordingSink, ms, settled};
use relay_core::telemetry::RelayEventKind;
use relay_core::{ControllerConfig, RelayConfig, ReportFlags, RequestOutcome};

#[test]
fn sixth_toggle_waits_for_window_end() {
    let mut controller = settled(&[RelayConfig::dummy()], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();
    let mut outcomes = Vec::new();

    for step in 0..6 {
        let now = ms(1_000 + step * 100);
        outcomes.push(controller.toggle(0, ReportFlags::ALL, now).unwrap());
        controller.tick(now, &mut sink);
    }

    let window_start = controller.get(0).unwrap().flood().window_start().unwrap();
    assert_eq!(window_start, ms(1_000));
    assert_eq!(
        outcomes[5],
        RequestOutcome::Scheduled {
            change_time: ms(4_000),
            deferred: true,
        }
    );
    // Four changes went through, the fifth is still held back.
    assert_eq!(sink.notices.len(), 4);
    assert_eq!(controller.get(0).unwrap().change_time(), Some(ms(4_000)));

    controller.tick(ms(3_999), &mut sink);
    assert_eq!(sink.notices.len(), 4);
    controller.tick(ms(4_000), &mut sink);
    assert_eq!(sink.notices.len(), 5);
}

#[test]
fn deferrals_are_logged() {
    let config = ControllerConfig::DEFAULT.with_flood(Duration::from_secs(1), 2);
    let mut controller = settled(&[RelayConfig::dummy()], config);
    let mut sink = RecordingSink::default();

    controller.toggle(0, ReportFlags::ALL, ms(5_000)).unwrap();
    controller.tick(ms(5_000), &mut sink);
    let outcome = controller.toggle(0, ReportFlags::ALL, ms(5_100)).unwrap();

    assert_eq!(
        outcome,
        RequestOutcome::Scheduled {
            change_time: ms(6_000),
            deferred: true,
        }
    );
    assert_eq!(
        controller.events().latest().map(|event| event.kind),
        Some(RelayEventKind::Deferred { id: 0 })
    );
}

#[test]
fn quiet_period_restores_full_rate() {
    let mut controller = settled(&[RelayConfig::dummy()], ControllerConfig::DEFAULT);
    let mut sink = RecordingSink::default();

    for step in 0..5 {
        controller.toggle(0, ReportFlags::ALL, ms(step * 10)).unwrap();
        controller.tick(ms(step * 10), &mut sink);
    }
    controller.tick(ms(3_000), &mut sink);

    let outcome = controller.toggle(0, ReportFlags::ALL, ms(10_000)).unwrap();
    assert_eq!(
        outcome,
        RequestOutcome::Scheduled {
            change_time: ms(10_000),
            deferred: false,
        }
    );
}
