use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Flex, Input, Pull};
use embassy_sync::channel::Channel;
use embassy_time::Delay;
use relay_core::provider::PinDriver;

use crate::hw::{BoardPins, FlashStore};
use crate::relays::{self, BOARD_RESET_PIN, BOARD_RELAY_PINS, FirmwareInstant, RelayService};

mod button_task;
mod relay_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static COMMAND_QUEUE: relays::CommandQueue = Channel::new();

pub(super) type BoardService = RelayService<PinDriver<BoardPins, Delay>, FlashStore>;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA4,
        PA5,
        PA6,
        PA7,
        PB0,
        FLASH,
        ..
    } = hal::init(config);

    let [relay0, relay1, relay2, relay3] = BOARD_RELAY_PINS;
    let pins = BoardPins::new()
        .with(relay0, Flex::new(PA4))
        .with(relay1, Flex::new(PA5))
        .with(relay2, Flex::new(PA6))
        .with(relay3, Flex::new(PA7))
        .with(BOARD_RESET_PIN, Flex::new(PB0));

    let settings = relays::board_settings();
    let latch_pulse = relay_core::ControllerConfig::load(&settings).latch_pulse;
    let driver = PinDriver::with_latch_pulse(pins, Delay, latch_pulse);
    let store = FlashStore::new(Flash::new_blocking(FLASH));
    let service = RelayService::start(driver, store, &settings, FirmwareInstant::now());

    spawner
        .spawn(relay_task::run(service, COMMAND_QUEUE.receiver()))
        .expect("failed to spawn relay task");

    spawner
        .spawn(button_task::run(
            Input::new(PA0, Pull::Up),
            COMMAND_QUEUE.sender(),
        ))
        .expect("failed to spawn button task");

    core::future::pending::<()>().await;
}
