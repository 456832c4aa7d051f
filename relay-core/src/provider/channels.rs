//! Provider that maps relays onto dimmable light channels.

use super::{OutputRequest, RelayDriver};

/// Light output with individually switchable channels and a master switch.
pub trait ChannelOutput {
    /// Number of channels exposed.
    fn channel_count(&self) -> usize;

    fn set_channel(&mut self, channel: usize, on: bool);

    fn set_master(&mut self, on: bool);

    /// Pushes the staged channel state to the output.
    fn commit(&mut self);
}

/// How relay ids line up with channels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelMapping {
    /// One relay per channel; every change switches the master on.
    PerChannel,
    /// Relay 0 is the master, relay `n` drives channel `n - 1`.
    ChannelsWithMaster,
    /// Every relay drives the master switch.
    MasterOnly,
}

impl ChannelMapping {
    #[must_use]
    pub const fn select(relays: usize, channels: usize) -> Self {
        if relays == channels {
            ChannelMapping::PerChannel
        } else if relays == channels + 1 {
            ChannelMapping::ChannelsWithMaster
        } else {
            ChannelMapping::MasterOnly
        }
    }
}

#[derive(Debug)]
pub struct ChannelDriver<L> {
    output: L,
}

impl<L: ChannelOutput> ChannelDriver<L> {
    pub const fn new(output: L) -> Self {
        Self { output }
    }

    pub fn output(&self) -> &L {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut L {
        &mut self.output
    }
}

impl<L: ChannelOutput> RelayDriver for ChannelDriver<L> {
    fn apply(&mut self, request: &OutputRequest<'_>) {
        let channels = self.output.channel_count();
        match ChannelMapping::select(request.relay_count, channels) {
            ChannelMapping::PerChannel => {
                self.output.set_channel(request.id, request.status);
                self.output.set_master(true);
            }
            ChannelMapping::ChannelsWithMaster if request.id == 0 => {
                self.output.set_master(request.status);
            }
            ChannelMapping::ChannelsWithMaster => {
                self.output.set_channel(request.id - 1, request.status);
            }
            ChannelMapping::MasterOnly => self.output.set_master(request.status),
        }
        self.output.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relays::RelayConfig;

    #[derive(Default)]
    struct Rgb {
        channels: [bool; 3],
        master: bool,
        commits: usize,
    }

    impl ChannelOutput for Rgb {
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
            self.commits += 1;
        }
    }

    fn apply(driver: &mut ChannelDriver<Rgb>, id: usize, status: bool, relay_count: usize) {
        let config = RelayConfig::dummy();
        driver.apply(&OutputRequest {
            id,
            status,
            config: &config,
            relay_count,
            status_mask: 0,
        });
    }

    #[test]
    fn mapping_follows_relay_count() {
        assert_eq!(ChannelMapping::select(3, 3), ChannelMapping::PerChannel);
        assert_eq!(ChannelMapping::select(4, 3), ChannelMapping::ChannelsWithMaster);
        assert_eq!(ChannelMapping::select(1, 3), ChannelMapping::MasterOnly);
    }

    #[test]
    fn per_channel_turns_master_on() {
        let mut driver = ChannelDriver::new(Rgb::default());
        apply(&mut driver, 1, true, 3);
        assert_eq!(driver.output().channels, [false, true, false]);
        assert!(driver.output().master);
        assert_eq!(driver.output().commits, 1);
    }

    #[test]
    fn per_channel_off_keeps_master_on() {
        let mut driver = ChannelDriver::new(Rgb::default());
        apply(&mut driver, 2, false, 3);
        assert_eq!(driver.output().channels, [false, false, false]);
        assert!(driver.output().master);
    }

    #[test]
    fn first_relay_is_master() {
        let mut driver = ChannelDriver::new(Rgb::default());
        apply(&mut driver, 3, true, 4);
        assert!(!driver.output().master);
        assert_eq!(driver.output().channels, [false, false, true]);
        apply(&mut driver, 0, true, 4);
        assert!(driver.output().master);
        apply(&mut driver, 1, true, 4);
        assert_eq!(driver.output().channels, [true, false, true]);
    }
}
