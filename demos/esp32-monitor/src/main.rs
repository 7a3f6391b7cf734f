mod monitor_screen;
mod monitor_state;

use std::thread;
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use log::{info, warn};

use loopback_core::LoopbackService;
use loopback_esp32::{board, EspI2sDriver};

use monitor_screen::MonitorScreen;
use monitor_state::MonitorState;

const TICK_MS: u64 = 50;

fn main() -> Result<()> {
    esp_idf_sys::link_patches();
    EspLogger::initialize_default();
    info!("esp32-monitor starting");

    let peripherals = Peripherals::take()?;
    let mut service = LoopbackService::new(EspI2sDriver::new(), board::board_configuration())?;
    let state = MonitorState::new();
    service.set_delegate(state.clone());

    // A failed bring-up is not fatal: the first start reinitializes.
    if let Err(e) = service.initialize() {
        warn!("Microphone initialization failed: {}", e);
    }

    let mut screen = MonitorScreen::new(service, state);
    screen.log_status();

    // BOOT button stands in for the on-screen toggle.
    let mut button = PinDriver::input(peripherals.pins.gpio0)?;
    button.set_pull(Pull::Up)?;
    let mut was_pressed = false;

    loop {
        let pressed = button.is_low();
        if pressed && !was_pressed {
            screen.toggle();
            screen.log_status();
        }
        was_pressed = pressed;
        screen.tick();
        thread::sleep(Duration::from_millis(TICK_MS));
    }
}
