//! Serial providers for relay boards driven by a companion MCU.
//!
//! Both boards take fixed four byte frames starting with `0xA0`. Writes are
//! fire and forget: the port is flushed before and after each frame and
//! failures are only counted.

use core::time::Duration;

use embedded_io::Write;

use super::{BootStagger, OutputRequest, RelayDriver};

const FRAME_START: u8 = 0xA0;
const FRAME_END: u8 = 0xA1;
const MASK_COMMAND: u8 = 0x04;

/// Spacing the per-relay board needs between boot-time commands.
pub const FRAME_BOOT_STAGGER: BootStagger = BootStagger {
    initial: Duration::from_secs(3),
    per_relay: Duration::from_secs(1),
};

/// Frame carrying the status of every relay at once.
#[must_use]
pub const fn mask_frame(mask: u8) -> [u8; 4] {
    [FRAME_START, MASK_COMMAND, mask, FRAME_END]
}

/// Frame switching a single relay; the last byte is an additive checksum.
#[must_use]
pub const fn relay_frame(id: u8, status: bool) -> [u8; 4] {
    let status = status as u8;
    let channel = id.wrapping_add(1);
    [
        FRAME_START,
        channel,
        status,
        FRAME_END.wrapping_add(status).wrapping_add(id),
    ]
}

fn send<W: Write>(port: &mut W, frame: &[u8]) -> bool {
    let flushed = port.flush().is_ok();
    let written = port.write_all(frame).is_ok();
    let drained = port.flush().is_ok();
    flushed && written && drained
}

/// Provider for boards that take the whole relay mask in one frame.
#[derive(Debug)]
pub struct SerialMaskDriver<W> {
    port: W,
    failures: u32,
}

impl<W: Write> SerialMaskDriver<W> {
    pub const fn new(port: W) -> Self {
        Self { port, failures: 0 }
    }

    pub fn port(&self) -> &W {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut W {
        &mut self.port
    }

    /// Frames that could not be written completely.
    pub const fn failures(&self) -> u32 {
        self.failures
    }
}

impl<W: Write> RelayDriver for SerialMaskDriver<W> {
    fn apply(&mut self, request: &OutputRequest<'_>) {
        if !send(&mut self.port, &mask_frame(request.status_mask)) {
            self.failures = self.failures.saturating_add(1);
        }
    }
}

/// Provider for boards addressed one relay per frame.
///
/// These boards occasionally miss a command, so requests that match the
/// applied status are sent again.
#[derive(Debug)]
pub struct SerialFrameDriver<W> {
    port: W,
    failures: u32,
}

impl<W: Write> SerialFrameDriver<W> {
    pub const fn new(port: W) -> Self {
        Self { port, failures: 0 }
    }

    pub fn port(&self) -> &W {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut W {
        &mut self.port
    }

    pub const fn failures(&self) -> u32 {
        self.failures
    }

    fn send_status(&mut self, request: &OutputRequest<'_>) {
        let Ok(id) = u8::try_from(request.id) else {
            return;
        };
        if !send(&mut self.port, &relay_frame(id, request.status)) {
            self.failures = self.failures.saturating_add(1);
        }
    }
}

impl<W: Write> RelayDriver for SerialFrameDriver<W> {
    fn apply(&mut self, request: &OutputRequest<'_>) {
        self.send_status(request);
    }

    fn reassert(&mut self, request: &OutputRequest<'_>) {
        self.send_status(request);
    }

    fn boot_stagger(&self) -> Option<BootStagger> {
        Some(FRAME_BOOT_STAGGER)
    }
}
