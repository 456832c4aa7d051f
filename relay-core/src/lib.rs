#![no_std]

// Relay control logic shared by the MCU firmware and host tooling.
//
// This crate stays portable by avoiding the Rust standard library; hardware,
// storage and settings are reached through the traits in `provider`, `boot`
// and `settings`.

pub mod boot;
pub mod controller;
pub mod error;
pub mod flood;
pub mod payload;
pub mod provider;
pub mod pulse;
pub mod relays;
pub mod settings;
pub mod sync;
pub mod telemetry;
pub mod time;

pub use boot::{BootMode, MemoryStore, PersistentStore};
pub use controller::{ControllerConfig, RelayController, ReportFlags, RequestOutcome};
pub use error::{ConfigureError, RelayError};
pub use payload::RelayPayload;
pub use provider::{OutputRequest, Provider, ProviderKind, RelayDriver};
pub use relays::{MAX_RELAYS, RelayConfig, RelayId, RelayKind};
pub use settings::{MemorySettings, SettingKey, SettingsProvider};
pub use sync::SyncPolicy;
pub use telemetry::{NotificationSink, RelayNotice};
pub use time::{Millis, RelayInstant};
