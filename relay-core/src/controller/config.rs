//! Controller-wide tunables.

use core::time::Duration;

use crate::flood::{DEFAULT_FLOOD_CHANGES, DEFAULT_FLOOD_WINDOW, FloodGuard};
use crate::provider::ProviderKind;
use crate::provider::pins::DEFAULT_LATCH_PULSE;
use crate::settings::{SettingKey, SettingsProvider};
use crate::sync::SyncPolicy;

/// Debounce between the last applied change and the status mask save.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_secs(1);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub flood_window: Duration,
    pub flood_changes: u8,
    pub save_delay: Duration,
    /// Width of latched relay drive pulses.
    pub latch_pulse: Duration,
    pub sync: SyncPolicy,
    pub provider: ProviderKind,
}

impl ControllerConfig {
    pub const DEFAULT: Self = Self {
        flood_window: DEFAULT_FLOOD_WINDOW,
        flood_changes: DEFAULT_FLOOD_CHANGES,
        save_delay: DEFAULT_SAVE_DELAY,
        latch_pulse: DEFAULT_LATCH_PULSE,
        sync: SyncPolicy::Independent,
        provider: ProviderKind::Pins,
    };

    /// Reads controller settings, keeping defaults for absent keys.
    pub fn load<S: SettingsProvider + ?Sized>(settings: &S) -> Self {
        let millis = |key, default: Duration| {
            settings
                .get_u32(key, 0)
                .map_or(default, |ms| Duration::from_millis(u64::from(ms)))
        };

        Self {
            flood_window: millis(SettingKey::FloodWindow, DEFAULT_FLOOD_WINDOW),
            flood_changes: settings
                .get_u32(SettingKey::FloodChanges, 0)
                .map_or(DEFAULT_FLOOD_CHANGES, |changes| {
                    u8::try_from(changes).unwrap_or(u8::MAX)
                }),
            save_delay: millis(SettingKey::SaveDelay, DEFAULT_SAVE_DELAY),
            latch_pulse: millis(SettingKey::LatchPulse, DEFAULT_LATCH_PULSE),
            sync: SyncPolicy::from_code(settings.u32_or(SettingKey::SyncPolicy, 0, 0)),
            provider: ProviderKind::from_code(settings.u32_or(SettingKey::Provider, 0, 0)),
        }
    }

    #[must_use]
    pub const fn with_sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }

    #[must_use]
    pub const fn with_flood(mut self, window: Duration, changes: u8) -> Self {
        self.flood_window = window;
        self.flood_changes = changes;
        self
    }

    #[must_use]
    pub const fn flood_guard(&self) -> FloodGuard {
        FloodGuard::new(self.flood_window, self.flood_changes)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn absent_settings_keep_defaults() {
        assert_eq!(
            ControllerConfig::load(&MemorySettings::new()),
            ControllerConfig::DEFAULT
        );
    }

    #[test]
    fn settings_override_defaults() {
        let settings = MemorySettings::new()
            .with(SettingKey::FloodWindow, 0, 1_000)
            .with(SettingKey::FloodChanges, 0, 900)
            .with(SettingKey::SyncPolicy, 0, 3)
            .with(SettingKey::Provider, 0, 2);
        let config = ControllerConfig::load(&settings);
        assert_eq!(config.flood_window, Duration::from_secs(1));
        assert_eq!(config.flood_changes, u8::MAX);
        assert_eq!(config.sync, SyncPolicy::AllSame);
        assert_eq!(config.provider, ProviderKind::SerialFrame);
        assert_eq!(config.save_delay, DEFAULT_SAVE_DELAY);
    }
}
