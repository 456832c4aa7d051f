//! Output providers that translate relay status changes into hardware
//! actions.
//!
//! The controller talks to a single [`RelayDriver`]; which concrete
//! provider sits behind it is decided once at startup, usually from the
//! `relayProvider` setting via [`Provider`].

pub mod channels;
pub mod pins;
pub mod serial;

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::relays::{RelayConfig, RelayId};

pub use channels::{ChannelDriver, ChannelMapping, ChannelOutput};
pub use pins::{PinBank, PinDriver};
pub use serial::{SerialFrameDriver, SerialMaskDriver, mask_frame, relay_frame};

/// One status change handed to a provider.
#[derive(Copy, Clone, Debug)]
pub struct OutputRequest<'a> {
    pub id: RelayId,
    pub status: bool,
    pub config: &'a RelayConfig,
    pub relay_count: usize,
    /// Applied status of every relay, this one included, one bit per id.
    pub status_mask: u8,
}

/// Delay applied to the first scheduled change of each relay after boot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootStagger {
    pub initial: Duration,
    pub per_relay: Duration,
}

impl BootStagger {
    /// Offset for relay `id`.
    #[must_use]
    pub fn offset(&self, id: RelayId) -> Duration {
        let steps = u32::try_from(id).unwrap_or(u32::MAX);
        self.initial.saturating_add(self.per_relay.saturating_mul(steps))
    }
}

/// Hardware-facing side of the relay controller.
pub trait RelayDriver {
    /// Prepares the output of relay `id` after (re)configuration.
    fn prepare(&mut self, id: RelayId, config: &RelayConfig) {
        let _ = (id, config);
    }

    /// Drives the output to `request.status`.
    fn apply(&mut self, request: &OutputRequest<'_>);

    /// Invoked for requests that match the applied status.
    fn reassert(&mut self, request: &OutputRequest<'_>) {
        let _ = request;
    }

    /// Boot-time spacing of initial changes, for providers that need it.
    fn boot_stagger(&self) -> Option<BootStagger> {
        None
    }
}

/// Driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRelayDriver;

impl NoopRelayDriver {
    /// Creates a new no-op relay driver.
    pub const fn new() -> Self {
        Self
    }
}

impl RelayDriver for NoopRelayDriver {
    fn apply(&mut self, _: &OutputRequest<'_>) {}
}

/// Provider selection stored in settings.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ProviderKind {
    #[default]
    Pins,
    SerialMask,
    SerialFrame,
    Channels,
}

impl ProviderKind {
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => ProviderKind::SerialMask,
            2 => ProviderKind::SerialFrame,
            3 => ProviderKind::Channels,
            _ => ProviderKind::Pins,
        }
    }

    #[must_use]
    pub const fn as_code(self) -> u32 {
        match self {
            ProviderKind::Pins => 0,
            ProviderKind::SerialMask => 1,
            ProviderKind::SerialFrame => 2,
            ProviderKind::Channels => 3,
        }
    }
}

/// Runtime-selected provider.
#[derive(Debug)]
pub enum Provider<B, D, W, L> {
    Pins(PinDriver<B, D>),
    SerialMask(SerialMaskDriver<W>),
    SerialFrame(SerialFrameDriver<W>),
    Channels(ChannelDriver<L>),
}

impl<B, D, W, L> Provider<B, D, W, L> {
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Provider::Pins(_) => ProviderKind::Pins,
            Provider::SerialMask(_) => ProviderKind::SerialMask,
            Provider::SerialFrame(_) => ProviderKind::SerialFrame,
            Provider::Channels(_) => ProviderKind::Channels,
        }
    }
}

impl<B, D, W, L> RelayDriver for Provider<B, D, W, L>
where
    B: PinBank,
    D: DelayNs,
    W: embedded_io::Write,
    L: ChannelOutput,
{
    fn prepare(&mut self, id: RelayId, config: &RelayConfig) {
        match self {
            Provider::Pins(driver) => driver.prepare(id, config),
            Provider::SerialMask(driver) => driver.prepare(id, config),
            Provider::SerialFrame(driver) => driver.prepare(id, config),
            Provider::Channels(driver) => driver.prepare(id, config),
        }
    }

    fn apply(&mut self, request: &OutputRequest<'_>) {
        match self {
            Provider::Pins(driver) => driver.apply(request),
            Provider::SerialMask(driver) => driver.apply(request),
            Provider::SerialFrame(driver) => driver.apply(request),
            Provider::Channels(driver) => driver.apply(request),
        }
    }

    fn reassert(&mut self, request: &OutputRequest<'_>) {
        match self {
            Provider::Pins(driver) => driver.reassert(request),
            Provider::SerialMask(driver) => driver.reassert(request),
            Provider::SerialFrame(driver) => driver.reassert(request),
            Provider::Channels(driver) => driver.reassert(request),
        }
    }

    fn boot_stagger(&self) -> Option<BootStagger> {
        match self {
            Provider::Pins(driver) => driver.boot_stagger(),
            Provider::SerialMask(driver) => driver.boot_stagger(),
            Provider::SerialFrame(driver) => driver.boot_stagger(),
            Provider::Channels(driver) => driver.boot_stagger(),
        }
    }
}
