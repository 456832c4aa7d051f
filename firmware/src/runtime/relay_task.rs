use embassy_futures::select::{Either, select};
use embassy_time::{Instant, Timer};

use super::BoardService;
use crate::relays::{CommandReceiver, FirmwareInstant, TICK_PERIOD};

/// Owns the relay controller: drains queued commands and ticks the
/// scheduler every [`TICK_PERIOD`].
#[embassy_executor::task]
pub async fn run(mut service: BoardService, commands: CommandReceiver<'static>) -> ! {
    let mut next_tick = Instant::now();
    loop {
        match select(commands.receive(), Timer::at(next_tick)).await {
            Either::First(command) => service.handle(command, FirmwareInstant::now()),
            Either::Second(()) => {
                service.tick(FirmwareInstant::now());
                next_tick += TICK_PERIOD;
            }
        }
    }
}
