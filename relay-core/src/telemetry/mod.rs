//! Relay event log and notification hooks shared by firmware and host
//! targets.
//!
//! Events carry compact numeric codes so they can be forwarded over
//! diagnostics channels without formatting on the device.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::relays::RelayId;

/// Monotonic identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of events retained in memory.
pub const EVENT_RING_CAPACITY: usize = 64;

/// Things the controller did, in the order it did them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RelayEventKind {
    /// Status reached the hardware.
    Applied { id: RelayId, status: bool },
    /// A pending change was withdrawn before it applied.
    Cancelled { id: RelayId },
    /// A change was pushed back by the flood guard.
    Deferred { id: RelayId },
    PulseArmed { id: RelayId },
    PulseExpired { id: RelayId },
    MaskSaved { mask: u8 },
    SaveFailed { mask: u8 },
    Booted { mask: u8 },
    Configured { count: usize },
}

impl RelayEventKind {
    /// Encodes the event kind into a transport discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            RelayEventKind::Applied { status: false, .. } => 0x0001,
            RelayEventKind::Applied { status: true, .. } => 0x0002,
            RelayEventKind::Cancelled { .. } => 0x0003,
            RelayEventKind::Deferred { .. } => 0x0004,
            RelayEventKind::PulseArmed { .. } => 0x0010,
            RelayEventKind::PulseExpired { .. } => 0x0011,
            RelayEventKind::MaskSaved { .. } => 0x0020,
            RelayEventKind::SaveFailed { .. } => 0x0021,
            RelayEventKind::Booted { .. } => 0x0030,
            RelayEventKind::Configured { .. } => 0x0031,
        }
    }

    /// Relay the event concerns, if it concerns a single one.
    #[must_use]
    pub const fn relay(self) -> Option<RelayId> {
        match self {
            RelayEventKind::Applied { id, .. }
            | RelayEventKind::Cancelled { id }
            | RelayEventKind::Deferred { id }
            | RelayEventKind::PulseArmed { id }
            | RelayEventKind::PulseExpired { id } => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for RelayEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEventKind::Applied { id, status } => {
                write!(f, "relay {id} {}", if *status { "on" } else { "off" })
            }
            RelayEventKind::Cancelled { id } => write!(f, "relay {id} change cancelled"),
            RelayEventKind::Deferred { id } => write!(f, "relay {id} change deferred (flood)"),
            RelayEventKind::PulseArmed { id } => write!(f, "relay {id} pulse armed"),
            RelayEventKind::PulseExpired { id } => write!(f, "relay {id} pulse expired"),
            RelayEventKind::MaskSaved { mask } => write!(f, "status mask {mask:#04x} saved"),
            RelayEventKind::SaveFailed { mask } => {
                write!(f, "status mask {mask:#04x} not saved")
            }
            RelayEventKind::Booted { mask } => write!(f, "boot from mask {mask:#04x}"),
            RelayEventKind::Configured { count } => write!(f, "{count} relays configured"),
        }
    }
}

/// Event stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RelayEvent<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub kind: RelayEventKind,
}

/// Records relay events into a fixed-size ring buffer.
pub struct RelayEventRecorder<TInstant, const CAPACITY: usize = EVENT_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: HistoryBuf<RelayEvent<TInstant>, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> RelayEventRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded events in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, RelayEvent<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent event, if available.
    pub fn latest(&self) -> Option<&RelayEvent<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier the next recorded event will receive.
    pub fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Appends an event, evicting the oldest once full.
    pub fn record(&mut self, kind: RelayEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(RelayEvent {
            id,
            timestamp,
            kind,
        });
        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for RelayEventRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CAPACITY: usize> fmt::Debug for RelayEventRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayEventRecorder")
            .field("len", &self.ring.len())
            .field("next_event_id", &self.next_event_id)
            .finish()
    }
}

/// Status change announced to the outside world once applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RelayNotice {
    pub id: RelayId,
    pub status: bool,
    /// Publish to the controlling link.
    pub report: bool,
    /// Publish to the relay's group.
    pub group_report: bool,
}

/// Receiver for applied status changes (broker, web UI, local display).
pub trait NotificationSink {
    fn relay_applied(&mut self, notice: RelayNotice);
}

/// Sink that drops every notice.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn relay_applied(&mut self, _: RelayNotice) {}
}

impl<const N: usize> NotificationSink for heapless::Vec<RelayNotice, N> {
    /// Keeps notices until full, then drops new ones.
    fn relay_applied(&mut self, notice: RelayNotice) {
        let _ = self.push(notice);
    }
}
