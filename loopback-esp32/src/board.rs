//! Wiring of the demo board: INMP441 microphone on I2S0, MAX98357A
//! amplifier on I2S1.

use loopback_core::models::audio_models::PinAssignment;
use loopback_core::models::config::LoopbackConfiguration;

pub const MIC_PORT: u8 = 0;
pub const AMP_PORT: u8 = 1;

/// INMP441: SCK 38, WS 39, SD 37.
pub const MIC_PINS: PinAssignment = PinAssignment { bclk: 38, ws: 39, data: 37 };

/// MAX98357A: BCLK 40, LRC 41, DIN 42.
pub const AMP_PINS: PinAssignment = PinAssignment { bclk: 40, ws: 41, data: 42 };

/// 44.1 kHz keeps voice intelligible. The INMP441 delivers 24-bit samples,
/// received in 32-bit slots and passed through untouched.
pub const SAMPLE_RATE: u32 = 44100;
pub const BIT_WIDTH: u16 = 32;

/// Largest DMA transfer; smaller values produce audible crackle.
pub const DMA_FRAME_COUNT: u32 = 1023;

/// Loopback configuration for this board.
pub fn board_configuration() -> LoopbackConfiguration {
    LoopbackConfiguration {
        sample_rate: SAMPLE_RATE,
        bit_width: BIT_WIDTH,
        dma_frame_count: DMA_FRAME_COUNT,
        capture_port: MIC_PORT,
        capture_pins: MIC_PINS,
        playback_port: AMP_PORT,
        playback_pins: AMP_PINS,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_configuration_is_valid() {
        let config = board_configuration();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_buffer_len(), 4092);
    }

    #[test]
    fn mic_and_amp_use_distinct_pins() {
        let mic = [MIC_PINS.bclk, MIC_PINS.ws, MIC_PINS.data];
        let amp = [AMP_PINS.bclk, AMP_PINS.ws, AMP_PINS.data];
        assert!(mic.iter().all(|pin| !amp.contains(pin)));
    }
}
