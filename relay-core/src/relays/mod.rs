//! Relay records: per-relay configuration plus live status.
//!
//! Relays are addressed by plain indices into a fixed-capacity arena that is
//! rebuilt wholesale on reconfiguration. Nothing outside the arena holds a
//! reference to a record, so a reconfiguration can never leave a dangling
//! handle behind; it only has to disarm the timers the records own.

use core::ops::{Index, IndexMut};
use core::time::Duration;

use heapless::Vec;

use crate::boot::{BootMode, MASK_BITS};
use crate::error::{ConfigureError, RelayError};
use crate::flood::FloodState;
use crate::pulse::{DEFAULT_PULSE_DURATION, OneShotTimer, PulseMode, PulseSettings};
use crate::settings::{GroupName, SettingKey, SettingsProvider};
use crate::time::RelayInstant;

/// Index of a relay in configuration order.
pub type RelayId = usize;

/// Board-level pin number.
pub type PinId = u8;

/// Upper bound on configured relays; one persisted mask bit each.
pub const MAX_RELAYS: usize = MASK_BITS;

/// Sentinel stored in settings for "no pin".
pub const PIN_NONE: u32 = 0xFF;

/// Electrical behavior of a relay output.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RelayKind {
    #[default]
    Normal,
    Inverse,
    /// Bistable relay driven by a set pulse (and a reset pulse when wired).
    Latched,
    /// Bistable relay whose drive pulses are active low.
    LatchedInverse,
}

impl RelayKind {
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => RelayKind::Inverse,
            2 => RelayKind::Latched,
            3 => RelayKind::LatchedInverse,
            _ => RelayKind::Normal,
        }
    }

    #[must_use]
    pub const fn as_code(self) -> u32 {
        match self {
            RelayKind::Normal => 0,
            RelayKind::Inverse => 1,
            RelayKind::Latched => 2,
            RelayKind::LatchedInverse => 3,
        }
    }

    #[must_use]
    pub const fn is_latched(self) -> bool {
        matches!(self, RelayKind::Latched | RelayKind::LatchedInverse)
    }
}

/// Reaction applied when the controlling link drops.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DisconnectReaction {
    #[default]
    None,
    TurnOn,
    TurnOff,
}

impl DisconnectReaction {
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => DisconnectReaction::TurnOn,
            2 => DisconnectReaction::TurnOff,
            _ => DisconnectReaction::None,
        }
    }

    #[must_use]
    pub const fn as_code(self) -> u32 {
        match self {
            DisconnectReaction::None => 0,
            DisconnectReaction::TurnOn => 1,
            DisconnectReaction::TurnOff => 2,
        }
    }

    /// Status to request on disconnect, if any.
    #[must_use]
    pub const fn status(self) -> Option<bool> {
        match self {
            DisconnectReaction::None => None,
            DisconnectReaction::TurnOn => Some(true),
            DisconnectReaction::TurnOff => Some(false),
        }
    }
}

/// Group label a relay answers to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupBinding {
    pub name: GroupName,
    /// Group payloads are applied inverted.
    pub inverted: bool,
}

/// Static configuration of a single relay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayConfig {
    /// Output pin; `None` for virtual relays driven by an aggregate provider.
    pub pin: Option<PinId>,
    pub kind: RelayKind,
    /// Reset coil pin for latched relays.
    pub reset_pin: Option<PinId>,
    pub delay_on: Duration,
    pub delay_off: Duration,
    pub pulse: PulseSettings,
    pub boot: BootMode,
    pub group: Option<GroupBinding>,
    pub on_disconnect: DisconnectReaction,
}

impl RelayConfig {
    /// Relay driven through `pin` with default timing.
    #[must_use]
    pub const fn gpio(pin: PinId, kind: RelayKind) -> Self {
        Self {
            pin: Some(pin),
            kind,
            reset_pin: None,
            delay_on: Duration::ZERO,
            delay_off: Duration::ZERO,
            pulse: PulseSettings::NONE,
            boot: BootMode::Off,
            group: None,
            on_disconnect: DisconnectReaction::None,
        }
    }

    /// Virtual relay with no pin of its own.
    #[must_use]
    pub const fn dummy() -> Self {
        Self {
            pin: None,
            kind: RelayKind::Normal,
            reset_pin: None,
            delay_on: Duration::ZERO,
            delay_off: Duration::ZERO,
            pulse: PulseSettings::NONE,
            boot: BootMode::Off,
            group: None,
            on_disconnect: DisconnectReaction::None,
        }
    }

    #[must_use]
    pub const fn with_reset_pin(mut self, pin: PinId) -> Self {
        self.reset_pin = Some(pin);
        self
    }

    #[must_use]
    pub const fn with_delays(mut self, delay_on: Duration, delay_off: Duration) -> Self {
        self.delay_on = delay_on;
        self.delay_off = delay_off;
        self
    }

    #[must_use]
    pub const fn with_pulse(mut self, mode: PulseMode, duration: Duration) -> Self {
        self.pulse = PulseSettings::new(mode, duration);
        self
    }

    #[must_use]
    pub const fn with_boot(mut self, boot: BootMode) -> Self {
        self.boot = boot;
        self
    }

    #[must_use]
    pub const fn with_disconnect(mut self, reaction: DisconnectReaction) -> Self {
        self.on_disconnect = reaction;
        self
    }

    #[must_use]
    pub fn with_group(mut self, name: &str, inverted: bool) -> Self {
        let mut label = GroupName::new();
        if label.push_str(name).is_ok() {
            self.group = Some(GroupBinding {
                name: label,
                inverted,
            });
        }
        self
    }

    /// Delay applied before a request for `status` takes effect.
    #[must_use]
    pub const fn delay_for(&self, status: bool) -> Duration {
        if status { self.delay_on } else { self.delay_off }
    }

    /// Reads the configuration of relay `index`, or `None` when its pin
    /// slot is unconfigured.
    pub fn load<S: SettingsProvider + ?Sized>(settings: &S, index: u8) -> Option<Self> {
        let pin = settings.get_u32(SettingKey::RelayPin, index)?;
        let pin = pin_from_setting(pin)?;
        let mut config = Self::load_common(settings, index);
        config.pin = Some(pin);
        config.kind = RelayKind::from_code(settings.u32_or(SettingKey::RelayKind, index, 0));
        config.reset_pin = settings
            .get_u32(SettingKey::ResetPin, index)
            .and_then(pin_from_setting);
        Some(config)
    }

    /// Reads the per-relay behavior of virtual relay `index`.
    pub fn load_dummy<S: SettingsProvider + ?Sized>(settings: &S, index: u8) -> Self {
        Self::load_common(settings, index)
    }

    fn load_common<S: SettingsProvider + ?Sized>(settings: &S, index: u8) -> Self {
        let pulse_mode = PulseMode::from_code(settings.u32_or(SettingKey::PulseMode, index, 0));
        let pulse_ms = settings.get_u32(SettingKey::PulseDuration, index);
        let pulse_duration = match pulse_ms {
            Some(ms) => Duration::from_millis(u64::from(ms)),
            None if pulse_mode == PulseMode::None => Duration::ZERO,
            None => DEFAULT_PULSE_DURATION,
        };

        let group = settings
            .get_text(SettingKey::GroupName, index)
            .filter(|name| !name.is_empty())
            .map(|name| GroupBinding {
                name,
                inverted: settings.flag_or(SettingKey::GroupInverted, index, false),
            });

        Self {
            pin: None,
            kind: RelayKind::Normal,
            reset_pin: None,
            delay_on: millis_setting(settings, SettingKey::DelayOn, index),
            delay_off: millis_setting(settings, SettingKey::DelayOff, index),
            pulse: PulseSettings::new(pulse_mode, pulse_duration),
            boot: BootMode::from_code(settings.u32_or(SettingKey::BootMode, index, 0)),
            group,
            on_disconnect: DisconnectReaction::from_code(
                settings.u32_or(SettingKey::DisconnectReaction, index, 0),
            ),
        }
    }
}

fn pin_from_setting(raw: u32) -> Option<PinId> {
    if raw == PIN_NONE {
        None
    } else {
        PinId::try_from(raw).ok()
    }
}

fn millis_setting<S: SettingsProvider + ?Sized>(settings: &S, key: SettingKey, index: u8) -> Duration {
    Duration::from_millis(u64::from(settings.u32_or(key, index, 0)))
}

/// Relay configurations gathered from settings.
///
/// A non-zero dummy count yields that many virtual relays; otherwise per
/// index entries are scanned until the first unconfigured pin slot.
pub fn configs_from_settings<S: SettingsProvider + ?Sized, const N: usize>(
    settings: &S,
) -> (Vec<RelayConfig, N>, Option<ConfigureError>) {
    let mut configs = Vec::new();
    let dummies = settings.u32_or(SettingKey::DummyRelays, 0, 0);

    if dummies > 0 {
        for index in 0..dummies.min(u32::from(u8::MAX)) {
            let Ok(index) = u8::try_from(index) else {
                break;
            };
            if configs.push(RelayConfig::load_dummy(settings, index)).is_err() {
                let configured = configs.len();
                return (configs, Some(ConfigureError::TooManyRelays { configured }));
            }
        }
        return (configs, None);
    }

    for index in 0..=u8::MAX {
        let Some(config) = RelayConfig::load(settings, index) else {
            break;
        };
        if configs.push(config).is_err() {
            let configured = configs.len();
            return (configs, Some(ConfigureError::TooManyRelays { configured }));
        }
    }

    (configs, None)
}

/// Live record for one relay.
#[derive(Clone, Debug)]
pub struct RelayRecord<I> {
    config: RelayConfig,
    pub(crate) current_status: bool,
    pub(crate) target_status: bool,
    pub(crate) change_time: Option<I>,
    pub(crate) flood: FloodState<I>,
    pub(crate) pending_report: bool,
    pub(crate) pending_group_report: bool,
    /// Pulse settings in force; may hold a one-shot override.
    pub(crate) pulse: PulseSettings,
    pub(crate) pulse_timer: OneShotTimer<I>,
}

impl<I: RelayInstant> RelayRecord<I> {
    /// Creates a settled, OFF record.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let pulse = config.pulse;
        Self {
            config,
            current_status: false,
            target_status: false,
            change_time: None,
            flood: FloodState::new(),
            pending_report: false,
            pending_group_report: false,
            pulse,
            pulse_timer: OneShotTimer::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Status last applied to hardware.
    pub fn current(&self) -> bool {
        self.current_status
    }

    /// Status the scheduler is converging to.
    pub fn target(&self) -> bool {
        self.target_status
    }

    /// `true` when no scheduler work is pending.
    pub fn is_settled(&self) -> bool {
        self.current_status == self.target_status
    }

    /// Time the pending change becomes due; `None` once settled.
    pub fn change_time(&self) -> Option<I> {
        if self.is_settled() {
            None
        } else {
            self.change_time
        }
    }

    pub fn flood(&self) -> &FloodState<I> {
        &self.flood
    }

    pub fn pending_report(&self) -> bool {
        self.pending_report
    }

    pub fn pending_group_report(&self) -> bool {
        self.pending_group_report
    }

    /// Pulse settings currently in force.
    pub fn pulse(&self) -> PulseSettings {
        self.pulse
    }

    /// Expiry of the pulse timer, if armed.
    pub fn pulse_deadline(&self) -> Option<I> {
        self.pulse_timer.deadline()
    }

    /// Restores pulse settings from configuration, dropping any override.
    pub(crate) fn reload_pulse(&mut self) {
        self.pulse = self.config.pulse;
    }

    pub(crate) fn clear_reports(&mut self) {
        self.pending_report = false;
        self.pending_group_report = false;
    }

    /// Disarms the timers owned by this record.
    pub(crate) fn release_timers(&mut self) -> bool {
        self.pulse_timer.cancel()
    }
}

/// Ordered, index-addressed collection of relay records.
#[derive(Clone, Debug)]
pub struct RelaySet<I, const N: usize = MAX_RELAYS> {
    records: Vec<RelayRecord<I>, N>,
}

impl<I: RelayInstant, const N: usize> RelaySet<I, N> {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Number of configured relays.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no relay is configured.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RelayId) -> Option<&RelayRecord<I>> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: RelayId) -> Option<&mut RelayRecord<I>> {
        self.records.get_mut(id)
    }

    /// Validates `id`, returning the error every entry point reports.
    pub fn check(&self, id: RelayId) -> Result<(), RelayError> {
        if id < self.records.len() {
            Ok(())
        } else {
            Err(RelayError::InvalidIndex {
                id,
                count: self.records.len(),
            })
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, RelayRecord<I>> {
        self.records.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> core::slice::IterMut<'_, RelayRecord<I>> {
        self.records.iter_mut()
    }

    /// Disarms every record's timers, returning how many were pending.
    pub fn release_timers(&mut self) -> usize {
        self.records
            .iter_mut()
            .filter_map(|record| record.release_timers().then_some(()))
            .count()
    }

    /// Replaces the collection; live timers are released before any record
    /// is dropped.
    ///
    /// Surplus configurations beyond capacity are discarded and reported.
    pub fn configure<C>(&mut self, configs: C) -> Result<usize, ConfigureError>
    where
        C: IntoIterator<Item = RelayConfig>,
    {
        self.release_timers();
        self.records.clear();

        for config in configs {
            if self.records.push(RelayRecord::new(config)).is_err() {
                return Err(ConfigureError::TooManyRelays {
                    configured: self.records.len(),
                });
            }
        }

        Ok(self.records.len())
    }
}

impl<I: RelayInstant, const N: usize> Default for RelaySet<I, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, const N: usize> Index<RelayId> for RelaySet<I, N> {
    type Output = RelayRecord<I>;

    fn index(&self, id: RelayId) -> &Self::Output {
        &self.records[id]
    }
}

impl<I, const N: usize> IndexMut<RelayId> for RelaySet<I, N> {
    fn index_mut(&mut self, id: RelayId) -> &mut Self::Output {
        &mut self.records[id]
    }
}
