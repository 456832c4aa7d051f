//! Key/value configuration boundary.
//!
//! The persistent settings store lives outside the core. The relay core only
//! sees it through [`SettingsProvider`], reads every key once while
//! configuring, and applies its own typed defaults when a key is absent.

use core::fmt;

use heapless::String;
use heapless::index_map::FnvIndexMap;

/// Longest group label a relay may be bound to.
pub const MAX_GROUP_NAME: usize = 32;

/// Fixed-capacity group label.
pub type GroupName = String<MAX_GROUP_NAME>;

/// Number of entries held by [`MemorySettings`].
pub const MEMORY_SETTINGS_CAPACITY: usize = 128;

/// Settings consulted by the relay core.
///
/// Per-relay keys are indexed by relay id; process-wide keys use index `0`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SettingKey {
    RelayPin,
    RelayKind,
    ResetPin,
    DelayOn,
    DelayOff,
    PulseMode,
    PulseDuration,
    BootMode,
    GroupName,
    GroupInverted,
    DisconnectReaction,
    SyncPolicy,
    DummyRelays,
    FloodWindow,
    FloodChanges,
    SaveDelay,
    LatchPulse,
    Provider,
}

impl SettingKey {
    /// Stable key name used by stores that persist settings as text.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SettingKey::RelayPin => "relayPin",
            SettingKey::RelayKind => "relayKind",
            SettingKey::ResetPin => "relayResetPin",
            SettingKey::DelayOn => "relayDelayOn",
            SettingKey::DelayOff => "relayDelayOff",
            SettingKey::PulseMode => "relayPulse",
            SettingKey::PulseDuration => "relayPulseMs",
            SettingKey::BootMode => "relayBoot",
            SettingKey::GroupName => "relayGroup",
            SettingKey::GroupInverted => "relayGroupInv",
            SettingKey::DisconnectReaction => "relayOnDisc",
            SettingKey::SyncPolicy => "relaySync",
            SettingKey::DummyRelays => "relayDummy",
            SettingKey::FloodWindow => "relayFloodMs",
            SettingKey::FloodChanges => "relayFloodChanges",
            SettingKey::SaveDelay => "relaySaveMs",
            SettingKey::LatchPulse => "relayLatchMs",
            SettingKey::Provider => "relayProvider",
        }
    }

    /// Returns `true` for keys that hold text rather than numbers.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, SettingKey::GroupName)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors reported when writing settings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingsError {
    /// The store has no room for another key.
    Full,
    /// A text value exceeded [`MAX_GROUP_NAME`].
    TooLong,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Full => f.write_str("settings store full"),
            SettingsError::TooLong => f.write_str("setting value too long"),
        }
    }
}

/// Read/write access to the persistent settings store.
pub trait SettingsProvider {
    /// Returns the numeric value stored under `key`/`index`.
    fn get_u32(&self, key: SettingKey, index: u8) -> Option<u32>;

    /// Returns the text value stored under `key`/`index`.
    fn get_text(&self, key: SettingKey, index: u8) -> Option<GroupName>;

    /// Stores a numeric value.
    fn set_u32(&mut self, key: SettingKey, index: u8, value: u32) -> Result<(), SettingsError>;

    /// Stores a text value.
    fn set_text(&mut self, key: SettingKey, index: u8, value: &str) -> Result<(), SettingsError>;

    /// Numeric lookup with a typed default.
    fn u32_or(&self, key: SettingKey, index: u8, default: u32) -> u32 {
        self.get_u32(key, index).unwrap_or(default)
    }

    /// Boolean lookup; any non-zero value reads as `true`.
    fn flag_or(&self, key: SettingKey, index: u8, default: bool) -> bool {
        self.get_u32(key, index).map_or(default, |value| value != 0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum SettingValue {
    Number(u32),
    Text(GroupName),
}

/// In-memory settings store backed by a fixed-capacity index map.
#[derive(Clone, Debug, Default)]
pub struct MemorySettings {
    entries: FnvIndexMap<(SettingKey, u8), SettingValue, MEMORY_SETTINGS_CAPACITY>,
}

impl MemorySettings {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    /// Builder-style numeric insert, handy for board profiles and tests.
    #[must_use]
    pub fn with(mut self, key: SettingKey, index: u8, value: u32) -> Self {
        let _ = self.set_u32(key, index, value);
        self
    }

    /// Builder-style text insert.
    #[must_use]
    pub fn with_text(mut self, key: SettingKey, index: u8, value: &str) -> Self {
        let _ = self.set_text(key, index, value);
        self
    }

    /// Removes a key, returning `true` when it was present.
    pub fn remove(&mut self, key: SettingKey, index: u8) -> bool {
        self.entries.remove(&(key, index)).is_some()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: SettingKey, index: u8, value: SettingValue) -> Result<(), SettingsError> {
        self.entries
            .insert((key, index), value)
            .map(|_| ())
            .map_err(|_| SettingsError::Full)
    }
}

impl SettingsProvider for MemorySettings {
    fn get_u32(&self, key: SettingKey, index: u8) -> Option<u32> {
        match self.entries.get(&(key, index)) {
            Some(SettingValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    fn get_text(&self, key: SettingKey, index: u8) -> Option<GroupName> {
        match self.entries.get(&(key, index)) {
            Some(SettingValue::Text(value)) => Some(value.clone()),
            _ => None,
        }
    }

    fn set_u32(&mut self, key: SettingKey, index: u8, value: u32) -> Result<(), SettingsError> {
        self.insert(key, index, SettingValue::Number(value))
    }

    fn set_text(&mut self, key: SettingKey, index: u8, value: &str) -> Result<(), SettingsError> {
        let mut text = GroupName::new();
        text.push_str(value).map_err(|_| SettingsError::TooLong)?;
        self.insert(key, index, SettingValue::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_defaults_apply_when_missing() {
        let settings = MemorySettings::new().with(SettingKey::DelayOn, 1, 250);
        assert_eq!(settings.u32_or(SettingKey::DelayOn, 1, 0), 250);
        assert_eq!(settings.u32_or(SettingKey::DelayOn, 0, 7), 7);
        assert!(!settings.flag_or(SettingKey::GroupInverted, 0, false));
    }

    #[test]
    fn text_and_numbers_do_not_alias() {
        let settings = MemorySettings::new()
            .with_text(SettingKey::GroupName, 0, "lights")
            .with(SettingKey::GroupInverted, 0, 1);

        assert_eq!(settings.get_u32(SettingKey::GroupName, 0), None);
        assert_eq!(
            settings.get_text(SettingKey::GroupName, 0).as_deref(),
            Some("lights")
        );
        assert!(settings.flag_or(SettingKey::GroupInverted, 0, false));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let mut settings = MemorySettings::new();
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(
            settings.set_text(SettingKey::GroupName, 0, long),
            Err(SettingsError::TooLong)
        );
        assert!(settings.is_empty());
    }

    #[test]
    fn key_names_are_stable() {
        assert_eq!(SettingKey::PulseDuration.name(), "relayPulseMs");
        assert!(SettingKey::GroupName.is_text());
        assert!(!SettingKey::BootMode.is_text());
    }
}
