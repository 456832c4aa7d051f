use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Timer};

use crate::button::PressTracker;
use crate::relays::{CommandSender, RelayCommand};

const POLL_PERIOD: Duration = Duration::from_millis(20);

/// Relay bound to the user button.
const BUTTON_RELAY: usize = 0;

/// Decodes presses of the user button (active low) into relay commands.
#[embassy_executor::task]
pub async fn run(button: Input<'static>, commands: CommandSender<'static>) -> ! {
    let mut tracker = PressTracker::new();
    loop {
        Timer::after(POLL_PERIOD).await;
        if let Some(action) = tracker.sample(button.is_low()) {
            commands.send(RelayCommand::new(BUTTON_RELAY, action)).await;
        }
    }
}
