//! Logging helpers for relay activity.
//!
//! Applied transitions, controller events and rejected commands are mirrored
//! to defmt on the MCU and to stdout on host builds.

#![allow(dead_code)]

use relay_core::ConfigureError;
use relay_core::telemetry::{NotificationSink, RelayEventKind, RelayNotice};

/// Sink that logs every applied transition.
#[derive(Debug, Default)]
pub struct LogSink {
    applied: u32,
}

impl LogSink {
    pub const fn new() -> Self {
        Self { applied: 0 }
    }

    /// Transitions logged since boot.
    pub const fn applied(&self) -> u32 {
        self.applied
    }
}

impl NotificationSink for LogSink {
    fn relay_applied(&mut self, notice: RelayNotice) {
        self.applied = self.applied.wrapping_add(1);
        emit_applied(notice.id, notice.status, notice.report);
    }
}

/// Logs controller events worth surfacing; applied transitions are left to
/// [`LogSink`].
pub fn log_event(kind: RelayEventKind) {
    match kind {
        RelayEventKind::Deferred { id } => emit_relay("deferred", id),
        RelayEventKind::Cancelled { id } => emit_relay("cancelled", id),
        RelayEventKind::PulseExpired { id } => emit_relay("pulse-expired", id),
        RelayEventKind::SaveFailed { mask } => emit_mask("save-failed", mask),
        RelayEventKind::MaskSaved { mask } => emit_mask("saved", mask),
        RelayEventKind::Booted { mask } => emit_mask("boot", mask),
        RelayEventKind::Applied { .. }
        | RelayEventKind::PulseArmed { .. }
        | RelayEventKind::Configured { .. } => {}
    }
}

/// Logs a command the controller refused.
pub fn log_rejected(id: usize, code: u8) {
    emit_relay(if code == 1 { "rejected-index" } else { "rejected-payload" }, id);
}

/// Logs relays dropped for lack of capacity.
pub fn log_configure_overflow(error: ConfigureError) {
    let ConfigureError::TooManyRelays { configured } = error;
    emit_relay("capacity-exceeded", configured);
}

#[cfg(target_os = "none")]
fn emit_applied(id: usize, status: bool, report: bool) {
    defmt::info!("relay:{} {} report={}", id, if status { "on" } else { "off" }, report);
}

#[cfg(not(target_os = "none"))]
fn emit_applied(id: usize, status: bool, report: bool) {
    println!("relay:{} {} report={}", id, if status { "on" } else { "off" }, report);
}

#[cfg(target_os = "none")]
fn emit_relay(label: &'static str, id: usize) {
    defmt::warn!("relay:{} {}", id, label);
}

#[cfg(not(target_os = "none"))]
fn emit_relay(label: &'static str, id: usize) {
    println!("relay:{id} {label}");
}

#[cfg(target_os = "none")]
fn emit_mask(label: &'static str, mask: u8) {
    defmt::info!("relay:mask {} {=u8:#x}", label, mask);
}

#[cfg(not(target_os = "none"))]
fn emit_mask(label: &'static str, mask: u8) {
    println!("relay:mask {label} {mask:#04x}");
}
