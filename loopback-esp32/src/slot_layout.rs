//! Per-chip MSB slot layout, as `I2S_STD_MSB_SLOT_DEFAULT_CONFIG` sets it up.
//!
//! The classic ESP32 reads a mono stream from both half-slots and shifts
//! samples of 16 bits or less to the right half. Later chips pick the left
//! slot for mono and have no `msb_right` field.

use loopback_core::models::audio_models::SlotMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMask {
    Left,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsbSlotLayout {
    pub mask: SlotMask,
    /// Only read on the classic ESP32.
    pub msb_right: bool,
}

impl MsbSlotLayout {
    pub fn for_chip(classic_esp32: bool, slot_mode: SlotMode, bit_width: u16) -> Self {
        let mask = match slot_mode {
            SlotMode::Stereo => SlotMask::Both,
            SlotMode::Mono if classic_esp32 => SlotMask::Both,
            SlotMode::Mono => SlotMask::Left,
        };
        Self {
            mask,
            msb_right: bit_width <= 16,
        }
    }

    /// Layout for the chip this crate is built for.
    pub fn for_target(slot_mode: SlotMode, bit_width: u16) -> Self {
        Self::for_chip(cfg!(esp32), slot_mode, bit_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_esp32_mono_uses_both_slots() {
        let layout = MsbSlotLayout::for_chip(true, SlotMode::Mono, 32);
        assert_eq!(layout.mask, SlotMask::Both);
        assert!(!layout.msb_right);
    }

    #[test]
    fn classic_esp32_shifts_narrow_samples_right() {
        assert!(MsbSlotLayout::for_chip(true, SlotMode::Mono, 16).msb_right);
        assert!(MsbSlotLayout::for_chip(true, SlotMode::Stereo, 8).msb_right);
        assert!(!MsbSlotLayout::for_chip(true, SlotMode::Mono, 24).msb_right);
    }

    #[test]
    fn newer_chips_read_mono_from_left_slot() {
        assert_eq!(MsbSlotLayout::for_chip(false, SlotMode::Mono, 32).mask, SlotMask::Left);
        assert_eq!(MsbSlotLayout::for_chip(false, SlotMode::Stereo, 32).mask, SlotMask::Both);
    }
}
