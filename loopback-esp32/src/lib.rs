//! # loopback-esp32
//!
//! ESP-IDF backend for the hot-mic loopback.
//!
//! Provides:
//! - `EspI2sDriver` — opens I2S standard-mode channels (create, init std mode, enable)
//! - `I2sChannel` — blocking read/write with bounded wait; disabled and deleted on drop
//! - `board` — pin and clock constants for the INMP441 + MAX98357A wiring
//! - `slot_layout` — per-chip MSB slot mask and alignment
//!
//! ## Platform Requirements
//! - ESP-IDF v5.x (new I2S channel API)
//! - Two I2S controllers (ESP32, ESP32-S3)
//!
//! ## Usage
//! ```ignore
//! use loopback_core::LoopbackService;
//! use loopback_esp32::{board, EspI2sDriver};
//!
//! let mut service = LoopbackService::new(EspI2sDriver::new(), board::board_configuration())?;
//! service.initialize()?;
//! service.start_recording()?;
//! ```

pub mod board;
pub mod slot_layout;
#[cfg(target_os = "espidf")]
pub mod i2s_channel;

#[cfg(target_os = "espidf")]
pub use i2s_channel::{EspI2sDriver, I2sChannel};
