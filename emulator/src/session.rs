use std::time::Duration;

use relay_core::boot::MemoryStore;
use relay_core::provider::{
    ChannelDriver, PinDriver, Provider, ProviderKind, SerialFrameDriver, SerialMaskDriver,
};
use relay_core::pulse::PulseMode;
use relay_core::relays::{DisconnectReaction, RelayId};
use relay_core::settings::{MemorySettings, SettingKey};
use relay_core::telemetry::{NotificationSink, RelayNotice};
use relay_core::{
    BootMode, ControllerConfig, Millis, RelayController, RelayError, RelayKind, ReportFlags,
    RequestOutcome, SyncPolicy,
};

use crate::hardware::{LogChannels, LogPins, LogSerial, SimDelay};

/// Scheduler period of the simulated main loop.
const TICK: Duration = Duration::from_millis(10);

/// Channels exposed by the simulated light.
const LIGHT_CHANNELS: usize = 3;

/// Relays behind the serial and light providers.
const VIRTUAL_RELAYS: u32 = 4;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("on", "on <id>                 - switch a relay on"),
    ("off", "off <id>                - switch a relay off"),
    ("toggle", "toggle <id>             - flip a relay"),
    ("set", "set <id> <payload>      - apply 0/1/2, on/off/toggle, true/false"),
    ("pulse", "pulse <id> <ms>         - flip a relay and flip it back after <ms>"),
    ("group", "group <name> <payload>  - apply a payload to every relay in a group"),
    ("disconnect", "disconnect              - simulate loss of the control link"),
    ("advance", "advance <ms>            - run the scheduler forward in time"),
    ("status", "status                  - show relay state and masks"),
    ("reboot", "reboot                  - power cycle and boot from the stored mask"),
    ("help", "help [topic]            - show help for a command"),
];

type EmulatedProvider = Provider<LogPins, SimDelay, LogSerial, LogChannels>;
type EmulatedController = RelayController<Millis, EmulatedProvider, MemoryStore>;

/// Board layout and policies the emulator runs with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Profile {
    pub provider: ProviderKind,
    pub sync: SyncPolicy,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Pins,
            sync: SyncPolicy::Independent,
        }
    }
}

impl Profile {
    pub fn provider_from_tag(tag: &str) -> Result<ProviderKind, String> {
        match tag.to_ascii_lowercase().as_str() {
            "pins" | "gpio" => Ok(ProviderKind::Pins),
            "mask" => Ok(ProviderKind::SerialMask),
            "frame" => Ok(ProviderKind::SerialFrame),
            "light" | "channels" => Ok(ProviderKind::Channels),
            _ => Err(format!("Unknown provider `{tag}`")),
        }
    }

    pub fn sync_from_tag(tag: &str) -> Result<SyncPolicy, String> {
        match tag.to_ascii_lowercase().as_str() {
            "independent" | "none" => Ok(SyncPolicy::Independent),
            "none-or-one" => Ok(SyncPolicy::NoneOrOne),
            "exactly-one" | "one" => Ok(SyncPolicy::ExactlyOne),
            "all-same" | "all" => Ok(SyncPolicy::AllSame),
            _ => Err(format!("Unknown sync policy `{tag}`")),
        }
    }

    /// Settings for four relays; GPIO boards wire them to PA4..PA7 with the
    /// last one latched, other providers drive them as virtual relays.
    pub fn settings(self) -> MemorySettings {
        let mut settings = MemorySettings::new()
            .with(SettingKey::SyncPolicy, 0, self.sync.as_code())
            .with(SettingKey::Provider, 0, self.provider.as_code())
            .with(SettingKey::BootMode, 0, BootMode::Same.as_code())
            .with(SettingKey::BootMode, 1, BootMode::Same.as_code())
            .with(SettingKey::BootMode, 3, BootMode::Toggle.as_code())
            .with(SettingKey::PulseMode, 2, PulseMode::ReturnOff.as_code())
            .with(SettingKey::PulseDuration, 2, 2_000)
            .with(SettingKey::DelayOn, 1, 500)
            .with_text(SettingKey::GroupName, 0, "porch")
            .with_text(SettingKey::GroupName, 1, "porch")
            .with(SettingKey::GroupInverted, 1, 1)
            .with(
                SettingKey::DisconnectReaction,
                0,
                DisconnectReaction::TurnOff.as_code(),
            );

        if self.provider == ProviderKind::Pins {
            for (index, pin) in (0u8..).zip([4u32, 5, 6, 7]) {
                settings = settings.with(SettingKey::RelayPin, index, pin);
            }
            settings = settings
                .with(SettingKey::RelayKind, 1, RelayKind::Inverse.as_code())
                .with(SettingKey::RelayKind, 3, RelayKind::Latched.as_code())
                .with(SettingKey::ResetPin, 3, 16);
        } else {
            settings = settings.with(SettingKey::DummyRelays, 0, VIRTUAL_RELAYS);
        }

        settings
    }
}

/// Builds the simulated output selected by the loaded settings.
fn driver_for(config: &ControllerConfig) -> EmulatedProvider {
    match config.provider {
        ProviderKind::Pins => Provider::Pins(PinDriver::with_latch_pulse(
            LogPins::default(),
            SimDelay::default(),
            config.latch_pulse,
        )),
        ProviderKind::SerialMask => {
            Provider::SerialMask(SerialMaskDriver::new(LogSerial::default()))
        }
        ProviderKind::SerialFrame => {
            Provider::SerialFrame(SerialFrameDriver::new(LogSerial::default()))
        }
        ProviderKind::Channels => {
            Provider::Channels(ChannelDriver::new(LogChannels::new(LIGHT_CHANNELS)))
        }
    }
}

/// Collects applied transitions for narration.
#[derive(Debug, Default)]
struct Narrator {
    lines: Vec<String>,
}

impl NotificationSink for Narrator {
    fn relay_applied(&mut self, notice: RelayNotice) {
        let status = if notice.status { "on" } else { "off" };
        let mut line = format!("relay {} -> {status}", notice.id);
        if notice.report {
            line.push_str(" [report]");
        }
        if notice.group_report {
            line.push_str(" [group]");
        }
        self.lines.push(line);
    }
}

pub struct Session {
    profile: Profile,
    controller: EmulatedController,
    now: Millis,
    narrator: Narrator,
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        Self::boot(profile, MemoryStore::new(), Millis::ZERO)
    }

    fn boot(profile: Profile, store: MemoryStore, now: Millis) -> Self {
        let settings = profile.settings();
        let config = ControllerConfig::load(&settings);
        let mut controller = RelayController::new(driver_for(&config), store, config);
        if let Err(error) = controller.configure_from(&settings, now) {
            eprintln!("warning: {error}");
        }
        controller.boot(now);

        Self {
            profile,
            controller,
            now,
            narrator: Narrator::default(),
        }
    }

    #[cfg(test)]
    fn controller(&self) -> &EmulatedController {
        &self.controller
    }

    /// Boot-time output: pin preparation plus the first tick.
    pub fn start(&mut self) -> Vec<String> {
        let mut lines = vec![format!(
            "booted from mask {:#04x} with {} relays",
            self.controller.persisted_mask(),
            self.controller.count()
        )];
        lines.extend(self.run_tick());
        lines
    }

    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Vec::new();
        };
        let args: Vec<&str> = words.collect();

        let result = match command.to_ascii_lowercase().as_str() {
            "help" => Ok(help(args.first().copied())),
            "on" => self.relay_request(&args, |controller, id, now| {
                controller.request_status(id, true, ReportFlags::ALL, now)
            }),
            "off" => self.relay_request(&args, |controller, id, now| {
                controller.request_status(id, false, ReportFlags::ALL, now)
            }),
            "toggle" => self.relay_request(&args, |controller, id, now| {
                controller.toggle(id, ReportFlags::ALL, now)
            }),
            "set" => match args.as_slice() {
                [_, payload] => {
                    let payload = (*payload).to_string();
                    self.relay_request(&args[..1], move |controller, id, now| {
                        controller.request_payload(id, &payload, ReportFlags::ALL, now)
                    })
                }
                _ => Err("usage: set <id> <payload>".to_string()),
            },
            "pulse" => match args.as_slice() {
                [_, ms] => match ms.parse::<u64>() {
                    Ok(ms) => self.relay_request(&args[..1], move |controller, id, now| {
                        controller.request_pulse(id, Duration::from_millis(ms), now)
                    }),
                    Err(_) => Err(format!("invalid duration `{ms}`")),
                },
                _ => Err("usage: pulse <id> <ms>".to_string()),
            },
            "group" => match args.as_slice() {
                [name, payload] => self.group(name, payload),
                _ => Err("usage: group <name> <payload>".to_string()),
            },
            "disconnect" => {
                self.controller.link_lost(self.now);
                let mut lines = vec!["OK link lost".to_string()];
                lines.extend(self.run_tick());
                Ok(lines)
            }
            "advance" => match args.as_slice() {
                [ms] => match ms.parse::<u64>() {
                    Ok(ms) => Ok(self.advance(Duration::from_millis(ms))),
                    Err(_) => Err(format!("invalid duration `{ms}`")),
                },
                _ => Err("usage: advance <ms>".to_string()),
            },
            "status" => Ok(self.status()),
            "reboot" => Ok(self.reboot()),
            other => Err(format!("unknown command `{other}`; type `help`")),
        };

        result.unwrap_or_else(|message| vec![format!("ERR {message}")])
    }

    /// Runs the scheduler every [`TICK`] up to `now + span`.
    pub fn advance(&mut self, span: Duration) -> Vec<String> {
        let target = self.now + span;
        let mut lines = Vec::new();
        while self.now < target {
            let step = (self.now + TICK).min(target);
            self.now = step;
            lines.extend(self.run_tick());
        }
        lines.push(format!("t={}", self.now));
        lines
    }

    fn relay_request<F>(&mut self, args: &[&str], request: F) -> Result<Vec<String>, String>
    where
        F: FnOnce(&mut EmulatedController, RelayId, Millis) -> Result<RequestOutcome<Millis>, RelayError>,
    {
        let [id] = args else {
            return Err("expected a relay id".to_string());
        };
        let id: RelayId = id.parse().map_err(|_| format!("invalid relay id `{id}`"))?;
        let outcome = request(&mut self.controller, id, self.now).map_err(|error| error.to_string())?;

        let mut lines = vec![describe_outcome(id, outcome, self.now)];
        lines.extend(self.run_tick());
        Ok(lines)
    }

    fn group(&mut self, name: &str, payload: &str) -> Result<Vec<String>, String> {
        let matched = self
            .controller
            .apply_group(name, payload, self.now)
            .map_err(|error| error.to_string())?;
        let mut lines = vec![format!("OK group {name}: {matched} relays")];
        lines.extend(self.run_tick());
        Ok(lines)
    }

    fn status(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (id, record) in self.controller.relays().iter().enumerate() {
            let state = |on: bool| if on { "on" } else { "off" };
            let mut line = format!(
                "relay {id}: {} target={}",
                state(record.current()),
                state(record.target())
            );
            if let Some(due) = record.change_time() {
                line.push_str(&format!(" due={due}"));
            }
            if let Some(deadline) = record.pulse_deadline() {
                line.push_str(&format!(" pulse-until={deadline}"));
            }
            if let Some(group) = &record.config().group {
                line.push_str(&format!(" group={}", group.name));
            }
            lines.push(line);
        }
        lines.push(format!(
            "masks: current={:#04x} target={:#04x} persisted={:#04x} sync={} t={}",
            self.controller.status_mask(),
            self.controller.target_mask(),
            self.controller.persisted_mask(),
            self.controller.config().sync,
            self.now
        ));
        lines
    }

    fn reboot(&mut self) -> Vec<String> {
        let mut store = self.controller.store().clone();
        store.power_cycle();
        *self = Self::boot(self.profile, store, self.now);
        self.start()
    }

    fn run_tick(&mut self) -> Vec<String> {
        self.controller.tick(self.now, &mut self.narrator);
        let mut lines = self.drain_hardware();
        lines.append(&mut self.narrator.lines);
        lines
    }

    fn drain_hardware(&mut self) -> Vec<String> {
        match self.controller.driver_mut() {
            Provider::Pins(driver) => driver.bank_mut().drain(),
            Provider::SerialMask(driver) => driver.port_mut().drain(),
            Provider::SerialFrame(driver) => driver.port_mut().drain(),
            Provider::Channels(driver) => driver.output_mut().drain(),
        }
    }
}

fn describe_outcome(id: RelayId, outcome: RequestOutcome<Millis>, now: Millis) -> String {
    match outcome {
        RequestOutcome::Scheduled {
            change_time,
            deferred: true,
        } => format!("OK relay {id} deferred to {change_time} (flood)"),
        RequestOutcome::Scheduled { change_time, .. } if change_time > now => {
            format!("OK relay {id} scheduled for {change_time}")
        }
        RequestOutcome::Scheduled { .. } => format!("OK relay {id} scheduled"),
        RequestOutcome::Cancelled => format!("OK relay {id} pending change cancelled"),
        RequestOutcome::Unchanged => format!("OK relay {id} unchanged"),
    }
}

fn help(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => HELP_TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(target))
            .map_or_else(
                || {
                    vec![
                        format!("No help available for `{target}`."),
                        format!("Available topics: {}", help_topic_list()),
                    ]
                },
                |(_, detail)| vec![(*detail).to_string()],
            ),
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(HELP_TOPICS.iter().map(|(_, detail)| format!("  {detail}")));
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
