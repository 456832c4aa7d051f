//! Relay controller: request intake, the apply scheduler, pulse timers and
//! status persistence.
//!
//! All mutation funnels through [`RelayController`]. Requests only move a
//! relay's target; [`RelayController::tick`] is the sole place that
//! actuates hardware, so a relay is re-evaluated every tick until settled.
//! Pulse expiries are deadlines serviced at the start of each tick rather
//! than callbacks, which keeps every field mutation on the caller's
//! context.

pub mod config;

use core::time::Duration;

pub use config::{ControllerConfig, DEFAULT_SAVE_DELAY};

use crate::boot::{PersistentStore, RELAY_STATUS_SLOT, mask_bit, mask_status};
use crate::error::{ConfigureError, RelayError};
use crate::payload::RelayPayload;
use crate::provider::{OutputRequest, RelayDriver};
use crate::pulse::{OneShotTimer, PulseAction, PulseMode, PulseSettings};
use crate::relays::{MAX_RELAYS, RelayConfig, RelayId, RelayRecord, RelaySet, configs_from_settings};
use crate::settings::SettingsProvider;
use crate::sync::SyncGuard;
use crate::telemetry::{NotificationSink, RelayEventKind, RelayEventRecorder, RelayNotice};
use crate::time::RelayInstant;

/// Reporting carried by a request until its change applies.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReportFlags {
    pub report: bool,
    pub group_report: bool,
}

impl ReportFlags {
    pub const ALL: Self = Self {
        report: true,
        group_report: true,
    };

    pub const NONE: Self = Self {
        report: false,
        group_report: false,
    };

    /// Report to the link but not back to the relay's group.
    pub const LOCAL: Self = Self {
        report: true,
        group_report: false,
    };
}

impl Default for ReportFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// What a status request did to the relay.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequestOutcome<I> {
    /// A change is pending until `change_time`.
    Scheduled { change_time: I, deferred: bool },
    /// A pending change was withdrawn.
    Cancelled,
    /// The relay already had the requested status.
    Unchanged,
}

impl<I> RequestOutcome<I> {
    /// Returns `true` when the request altered pending work.
    pub const fn changed(&self) -> bool {
        !matches!(self, RequestOutcome::Unchanged)
    }
}

/// Owns the relay records and drives them through a [`RelayDriver`].
pub struct RelayController<I, D, S, const N: usize = MAX_RELAYS>
where
    I: RelayInstant,
{
    relays: RelaySet<I, N>,
    driver: D,
    store: S,
    config: ControllerConfig,
    sync: SyncGuard,
    save_timer: OneShotTimer<I>,
    persisted_mask: u8,
    events: RelayEventRecorder<I>,
}

impl<I, D, S, const N: usize> RelayController<I, D, S, N>
where
    I: RelayInstant,
    D: RelayDriver,
    S: PersistentStore,
{
    /// Creates a controller with no relays configured.
    pub fn new(driver: D, store: S, config: ControllerConfig) -> Self {
        Self {
            relays: RelaySet::new(),
            driver,
            store,
            config,
            sync: SyncGuard::new(),
            save_timer: OneShotTimer::new(),
            persisted_mask: 0,
            events: RelayEventRecorder::new(),
        }
    }

    /// Replaces the relay set and prepares each output.
    ///
    /// Timers owned by the previous records are released first. On
    /// overflow the relays that fit stay configured.
    pub fn configure<C>(&mut self, configs: C, now: I) -> Result<usize, ConfigureError>
    where
        C: IntoIterator<Item = RelayConfig>,
    {
        self.save_timer.cancel();
        let result = self.relays.configure(configs);

        for id in 0..self.relays.count() {
            self.driver.prepare(id, self.relays[id].config());
        }

        self.events.record(
            RelayEventKind::Configured {
                count: self.relays.count(),
            },
            now,
        );
        result
    }

    /// Reloads controller tunables and relays from `settings`.
    pub fn configure_from<P>(&mut self, settings: &P, now: I) -> Result<usize, ConfigureError>
    where
        P: SettingsProvider + ?Sized,
    {
        self.config = ControllerConfig::load(settings);
        let (configs, overflow) = configs_from_settings::<P, N>(settings);
        let count = self.configure(configs, now)?;
        match overflow {
            Some(error) => Err(error),
            None => Ok(count),
        }
    }

    /// Seeds every relay from the persisted mask and its boot mode.
    ///
    /// Each relay starts unsettled so the first tick performs a real
    /// actuation through the driver.
    pub fn boot(&mut self, now: I) {
        let mut mask = self.store.read_byte(RELAY_STATUS_SLOT);
        let stagger = self.driver.boot_stagger();
        let mut flipped = false;

        for (id, record) in self.relays.iter_mut().enumerate() {
            let (target, flip) = record.config().boot.resolve(mask_status(mask, id));
            if flip && let Some(bit) = mask_bit(id) {
                mask ^= bit;
                flipped = true;
            }

            record.target_status = target;
            record.current_status = !target;
            record.change_time = Some(stagger.map_or(now, |stagger| now + stagger.offset(id)));
            record.clear_reports();
            record.release_timers();
            record.reload_pulse();
        }

        self.persisted_mask = mask;
        self.events.record(RelayEventKind::Booted { mask }, now);
        if flipped {
            self.save_mask(mask, now);
        }
    }

    /// Requests `status` for relay `id`.
    pub fn request_status(
        &mut self,
        id: RelayId,
        status: bool,
        flags: ReportFlags,
        now: I,
    ) -> Result<RequestOutcome<I>, RelayError> {
        self.relays.check(id)?;
        Ok(self.request(id, status, flags, now))
    }

    /// Requests the opposite of the applied status.
    pub fn toggle(
        &mut self,
        id: RelayId,
        flags: ReportFlags,
        now: I,
    ) -> Result<RequestOutcome<I>, RelayError> {
        self.relays.check(id)?;
        let status = !self.relays[id].current();
        Ok(self.request(id, status, flags, now))
    }

    /// Parses an external payload and dispatches it.
    pub fn request_payload(
        &mut self,
        id: RelayId,
        payload: &str,
        flags: ReportFlags,
        now: I,
    ) -> Result<RequestOutcome<I>, RelayError> {
        self.relays.check(id)?;
        let payload = RelayPayload::parse(payload)?;
        self.dispatch(id, payload, flags, now)
    }

    /// Flips relay `id` now and back again after `duration`.
    ///
    /// The override only lasts for one pulse; configured pulse settings
    /// are back in force once the timer is armed.
    pub fn request_pulse(
        &mut self,
        id: RelayId,
        duration: Duration,
        now: I,
    ) -> Result<RequestOutcome<I>, RelayError> {
        self.relays.check(id)?;
        if duration.is_zero() {
            return Ok(RequestOutcome::Unchanged);
        }

        let record = &mut self.relays[id];
        record.pulse = PulseSettings::new(PulseMode::returning_to(record.current()), duration);
        self.toggle(id, ReportFlags::LOCAL, now)
    }

    /// Applies `payload` to every relay bound to group `name`, returning how
    /// many relays matched.
    pub fn apply_group(&mut self, name: &str, payload: &str, now: I) -> Result<usize, RelayError> {
        let payload = RelayPayload::parse(payload)?;
        let mut matched = 0;

        for id in 0..self.relays.count() {
            let Some(group) = self.relays[id].config().group.as_ref() else {
                continue;
            };
            if group.name.as_str() != name {
                continue;
            }

            let effective = if group.inverted {
                payload.inverted()
            } else {
                payload
            };
            self.dispatch(id, effective, ReportFlags::LOCAL, now)?;
            matched += 1;
        }

        Ok(matched)
    }

    /// Applies each relay's disconnect reaction.
    pub fn link_lost(&mut self, now: I) {
        for id in 0..self.relays.count() {
            if let Some(status) = self.relays[id].config().on_disconnect.status() {
                self.request(id, status, ReportFlags::ALL, now);
            }
        }
    }

    /// Runs one scheduler pass, returning the number of applied changes.
    ///
    /// Expired pulses are turned into toggle requests first. Due changes
    /// are then applied OFF before ON, in index order, and finally a
    /// pending mask save is written once its debounce has elapsed.
    pub fn tick<K: NotificationSink + ?Sized>(&mut self, now: I, sink: &mut K) -> usize {
        self.service_pulses(now);

        let mut applied = 0;
        for mode in [false, true] {
            for id in 0..self.relays.count() {
                let record = &self.relays[id];
                if record.is_settled() || record.target() != mode {
                    continue;
                }
                if record.change_time.is_some_and(|due| now < due) {
                    continue;
                }
                self.apply(id, now, sink);
                applied += 1;
            }
        }

        if self.save_timer.fire(now) {
            self.save_mask(self.status_mask(), now);
        }

        applied
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<I> {
        let relays = self.relays.iter().flat_map(|record| {
            let change = if record.is_settled() {
                None
            } else {
                record.change_time
            };
            change.into_iter().chain(record.pulse_deadline())
        });
        relays.chain(self.save_timer.deadline()).min()
    }

    pub fn count(&self) -> usize {
        self.relays.count()
    }

    pub fn get(&self, id: RelayId) -> Option<&RelayRecord<I>> {
        self.relays.get(id)
    }

    pub fn relays(&self) -> &RelaySet<I, N> {
        &self.relays
    }

    /// Applied status of relay `id`.
    pub fn status(&self, id: RelayId) -> Result<bool, RelayError> {
        self.relays.check(id)?;
        Ok(self.relays[id].current())
    }

    /// Pending status of relay `id`.
    pub fn target(&self, id: RelayId) -> Result<bool, RelayError> {
        self.relays.check(id)?;
        Ok(self.relays[id].target())
    }

    /// Applied statuses, one bit per relay.
    pub fn status_mask(&self) -> u8 {
        self.mask_of(RelayRecord::current)
    }

    /// Target statuses, one bit per relay.
    pub fn target_mask(&self) -> u8 {
        self.mask_of(RelayRecord::target)
    }

    /// Mask as last written to (or read from) the store.
    pub fn persisted_mask(&self) -> u8 {
        self.persisted_mask
    }

    /// Returns `true` while a mask save is waiting on its debounce.
    pub fn save_pending(&self) -> bool {
        self.save_timer.is_armed()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn events(&self) -> &RelayEventRecorder<I> {
        &self.events
    }

    /// Nested synchronization passes that were suppressed.
    pub fn sync_suppressed(&self) -> u32 {
        self.sync.suppressed()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn mask_of(&self, status: fn(&RelayRecord<I>) -> bool) -> u8 {
        self.relays
            .iter()
            .enumerate()
            .filter(|(_, record)| status(record))
            .filter_map(|(id, _)| mask_bit(id))
            .fold(0, |mask, bit| mask | bit)
    }

    fn dispatch(
        &mut self,
        id: RelayId,
        payload: RelayPayload,
        flags: ReportFlags,
        now: I,
    ) -> Result<RequestOutcome<I>, RelayError> {
        match payload.status() {
            Some(status) => self.request_status(id, status, flags, now),
            None => self.toggle(id, flags, now),
        }
    }

    /// Flood-guarded request path shared by callers and propagation; `id`
    /// must already be validated.
    fn request(&mut self, id: RelayId, status: bool, flags: ReportFlags, now: I) -> RequestOutcome<I> {
        let guard = self.config.flood_guard();
        let relay_count = self.relays.count();
        let status_mask = self.status_mask();
        let record = &mut self.relays[id];

        if record.current() == status {
            let outcome = if record.target() == status {
                RequestOutcome::Unchanged
            } else {
                record.target_status = status;
                record.change_time = None;
                record.clear_reports();
                RequestOutcome::Cancelled
            };

            self.driver.reassert(&OutputRequest {
                id,
                status,
                config: record.config(),
                relay_count,
                status_mask,
            });
            if outcome == RequestOutcome::Cancelled {
                self.events.record(RelayEventKind::Cancelled { id }, now);
            }
            self.refresh_pulse(id, now);
            return outcome;
        }

        let delay = record.config().delay_for(status);
        let schedule = guard.schedule(&mut record.flood, now, delay);
        record.target_status = status;
        record.change_time = Some(schedule.change_time);
        record.pending_report |= flags.report;
        record.pending_group_report |= flags.group_report;

        if schedule.deferred {
            self.events.record(RelayEventKind::Deferred { id }, now);
        }

        self.synchronize(id, status, flags, now);

        RequestOutcome::Scheduled {
            change_time: schedule.change_time,
            deferred: schedule.deferred,
        }
    }

    fn synchronize(&mut self, trigger: RelayId, status: bool, flags: ReportFlags, now: I) {
        if !self.sync.enter() {
            return;
        }

        let plan = self.config.sync.plan(trigger, status, self.relays.count());
        for (id, target) in plan {
            self.request(id, target, flags, now);
        }

        self.sync.exit();
    }

    fn apply<K: NotificationSink + ?Sized>(&mut self, id: RelayId, now: I, sink: &mut K) {
        let relay_count = self.relays.count();
        let record = &mut self.relays[id];
        let status = record.target();
        record.current_status = status;
        let notice = RelayNotice {
            id,
            status,
            report: record.pending_report(),
            group_report: record.pending_group_report(),
        };

        let status_mask = self.status_mask();
        let record = &self.relays[id];
        self.driver.apply(&OutputRequest {
            id,
            status,
            config: record.config(),
            relay_count,
            status_mask,
        });

        sink.relay_applied(notice);
        self.events.record(RelayEventKind::Applied { id, status }, now);

        if !self.sync.is_active() {
            self.refresh_pulse(id, now);
            self.save_timer.arm_once(now, self.config.save_delay);
        }

        self.relays[id].clear_reports();
    }

    fn refresh_pulse(&mut self, id: RelayId, now: I) {
        let record = &mut self.relays[id];
        match record.pulse().action_for(record.current()) {
            PulseAction::Ignore => {
                record.pulse_timer.cancel();
            }
            PulseAction::Disarm => {
                record.pulse_timer.cancel();
                record.reload_pulse();
            }
            PulseAction::Arm(duration) => {
                record.pulse_timer.arm_once(now, duration);
                record.reload_pulse();
                self.events.record(RelayEventKind::PulseArmed { id }, now);
            }
        }
    }

    fn service_pulses(&mut self, now: I) {
        for id in 0..self.relays.count() {
            if self.relays[id].pulse_timer.fire(now) {
                self.events.record(RelayEventKind::PulseExpired { id }, now);
                let status = !self.relays[id].current();
                self.request(id, status, ReportFlags::LOCAL, now);
            }
        }
    }

    fn save_mask(&mut self, mask: u8, now: I) {
        let saved = self
            .store
            .write_byte(RELAY_STATUS_SLOT, mask)
            .and_then(|()| self.store.commit());

        let event = match saved {
            Ok(()) => {
                self.persisted_mask = mask;
                RelayEventKind::MaskSaved { mask }
            }
            Err(_) => RelayEventKind::SaveFailed { mask },
        };
        self.events.record(event, now);
    }
}

impl<I, D, S, const N: usize> core::fmt::Debug for RelayController<I, D, S, N>
where
    I: RelayInstant + core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelayController")
            .field("relays", &self.relays)
            .field("config", &self.config)
            .field("persisted_mask", &self.persisted_mask)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::{BootMode, MemoryStore};
    use crate::provider::NoopRelayDriver;
    use crate::relays::RelayKind;
    use crate::telemetry::NoopSink;
    use crate::time::Millis;

    type Controller = RelayController<Millis, NoopRelayDriver, MemoryStore>;

    fn controller(configs: &[RelayConfig]) -> Controller {
        let mut controller = Controller::new(
            NoopRelayDriver::new(),
            MemoryStore::new(),
            ControllerConfig::DEFAULT,
        );
        controller
            .configure(configs.iter().cloned(), Millis::ZERO)
            .unwrap();
        controller.boot(Millis::ZERO);
        controller.tick(Millis::ZERO, &mut NoopSink);
        controller
    }

    #[test]
    fn request_then_tick_applies() {
        let mut controller = controller(&[RelayConfig::gpio(1, RelayKind::Normal)]);
        let outcome = controller
            .request_status(0, true, ReportFlags::ALL, Millis(10))
            .unwrap();
        assert!(outcome.changed());
        assert!(!controller.status(0).unwrap());
        assert_eq!(controller.tick(Millis(10), &mut NoopSink), 1);
        assert!(controller.status(0).unwrap());
    }

    #[test]
    fn repeating_current_status_cancels_pending_change() {
        let config = RelayConfig::dummy().with_delays(Duration::from_secs(5), Duration::ZERO);
        let mut controller = controller(&[config]);
        controller
            .request_status(0, true, ReportFlags::ALL, Millis(0))
            .unwrap();
        assert!(controller.get(0).unwrap().pending_report());

        let outcome = controller
            .request_status(0, false, ReportFlags::ALL, Millis(100))
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Cancelled);
        let record = controller.get(0).unwrap();
        assert!(record.is_settled());
        assert!(!record.pending_report());
        assert_eq!(
            controller.request_status(0, false, ReportFlags::ALL, Millis(200)),
            Ok(RequestOutcome::Unchanged)
        );
    }

    #[test]
    fn delay_holds_change_until_due() {
        let config = RelayConfig::dummy().with_delays(Duration::from_millis(500), Duration::ZERO);
        let mut controller = controller(&[config]);
        controller.tick(Millis(1_000), &mut NoopSink);
        assert!(!controller.save_pending());
        controller
            .request_status(0, true, ReportFlags::NONE, Millis(1_000))
            .unwrap();
        assert_eq!(controller.next_deadline(), Some(Millis(1_500)));
        assert_eq!(controller.tick(Millis(1_499), &mut NoopSink), 0);
        assert_eq!(controller.tick(Millis(1_500), &mut NoopSink), 1);
    }

    #[test]
    fn invalid_index_mutates_nothing() {
        let mut controller = controller(&[RelayConfig::dummy()]);
        let before = controller.target_mask();
        assert_eq!(
            controller.request_status(4, true, ReportFlags::ALL, Millis(0)),
            Err(RelayError::InvalidIndex { id: 4, count: 1 })
        );
        assert_eq!(
            controller.request_payload(0, "maybe", ReportFlags::ALL, Millis(0)),
            Err(RelayError::InvalidPayload)
        );
        assert_eq!(controller.target_mask(), before);
    }

    #[test]
    fn save_is_debounced_after_last_settle() {
        let mut controller = controller(&[RelayConfig::dummy(), RelayConfig::dummy()]);
        let commits = controller.store().commit_count();
        controller
            .request_status(0, true, ReportFlags::ALL, Millis(2_000))
            .unwrap();
        controller.tick(Millis(2_000), &mut NoopSink);
        controller
            .request_status(1, true, ReportFlags::ALL, Millis(2_500))
            .unwrap();
        controller.tick(Millis(2_500), &mut NoopSink);
        controller.tick(Millis(3_000), &mut NoopSink);
        assert_eq!(controller.store().commit_count(), commits);

        controller.tick(Millis(3_500), &mut NoopSink);
        assert_eq!(controller.store().commit_count(), commits + 1);
        assert_eq!(controller.persisted_mask(), 0b11);
        assert_eq!(controller.store().committed(RELAY_STATUS_SLOT), Some(0b11));
    }

    #[test]
    fn boot_seeds_unsettled_records() {
        let mut controller = Controller::new(
            NoopRelayDriver::new(),
            MemoryStore::with_mask(0b01),
            ControllerConfig::DEFAULT,
        );
        controller
            .configure(
                [
                    RelayConfig::dummy().with_boot(BootMode::Same),
                    RelayConfig::dummy().with_boot(BootMode::Off),
                ],
                Millis(0),
            )
            .unwrap();
        controller.boot(Millis(0));
        assert_eq!(controller.target_mask(), 0b01);
        assert_eq!(controller.status_mask(), 0b10);
        assert_eq!(controller.tick(Millis(0), &mut NoopSink), 2);
        assert_eq!(controller.status_mask(), 0b01);
    }
}
