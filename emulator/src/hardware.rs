//! Simulated outputs that narrate every hardware access.

use std::convert::Infallible;
use std::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;
use relay_core::provider::{ChannelOutput, PinBank};
use relay_core::relays::PinId;

fn level_label(level: PinState) -> &'static str {
    match level {
        PinState::Low => "low",
        PinState::High => "high",
    }
}

/// Pin bank that logs each mode change and level write.
#[derive(Debug, Default)]
pub struct LogPins {
    log: Vec<String>,
}

impl LogPins {
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }
}

impl PinBank for LogPins {
    fn set_output(&mut self, pin: PinId) {
        self.log.push(format!("gpio {pin}: output"));
    }

    fn set_level(&mut self, pin: PinId, level: PinState) {
        self.log.push(format!("gpio {pin}: {}", level_label(level)));
    }
}

/// Delay that returns immediately but remembers how long it was asked to wait.
#[derive(Debug, Default)]
pub struct SimDelay {
    pub waited_ns: u64,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waited_ns += u64::from(ns);
    }
}

/// Serial port that logs every flushed frame as hex.
#[derive(Debug, Default)]
pub struct LogSerial {
    pending: Vec<u8>,
    log: Vec<String>,
}

impl LogSerial {
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }
}

impl embedded_io::ErrorType for LogSerial {
    type Error = Infallible;
}

impl embedded_io::Write for LogSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut line = String::from("serial:");
        for byte in self.pending.drain(..) {
            let _ = write!(line, " {byte:02X}");
        }
        self.log.push(line);
        Ok(())
    }
}

/// Light with a fixed number of channels and a master switch.
#[derive(Debug)]
pub struct LogChannels {
    channels: Vec<bool>,
    master: bool,
    log: Vec<String>,
}

impl LogChannels {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: vec![false; channels],
            master: false,
            log: Vec::new(),
        }
    }

    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }
}

impl ChannelOutput for LogChannels {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn set_channel(&mut self, channel: usize, on: bool) {
        if let Some(slot) = self.channels.get_mut(channel) {
            *slot = on;
        }
    }

    fn set_master(&mut self, on: bool) {
        self.master = on;
    }

    fn commit(&mut self) {
        let channels: String = self
            .channels
            .iter()
            .map(|on| if *on { '1' } else { '0' })
            .collect();
        let master = if self.master { "on" } else { "off" };
        self.log
            .push(format!("light: channels={channels} master={master}"));
    }
}
