use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{ChannelRole, ChannelSpec, PinAssignment, SlotMode};
use super::error::LoopbackError;

/// Largest DMA frame count a single descriptor can carry.
pub const MAX_DMA_FRAME_COUNT: u32 = 1023;

/// Delays used by the service and its worker, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackTiming {
    /// Bounded wait for each read and write.
    pub transfer_timeout_ms: u32,
    /// Yield at the end of every loop iteration.
    pub loop_yield_ms: u64,
    /// Settle time before the worker's first read.
    pub worker_warmup_ms: u64,
    /// How long `stop_recording` waits after clearing the session flag.
    pub stop_grace_ms: u64,
    /// Pause after releasing both channels.
    pub release_settle_ms: u64,
    /// Pause between teardown and recreation during a reinitialize.
    pub reinit_settle_ms: u64,
}

impl LoopbackTiming {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms as u64)
    }

    /// No delays at all. Transfers still get a nominal timeout.
    pub fn immediate() -> Self {
        Self {
            transfer_timeout_ms: 10,
            loop_yield_ms: 0,
            worker_warmup_ms: 0,
            stop_grace_ms: 0,
            release_settle_ms: 0,
            reinit_settle_ms: 0,
        }
    }
}

impl Default for LoopbackTiming {
    fn default() -> Self {
        Self {
            transfer_timeout_ms: 1000,
            loop_yield_ms: 1,
            worker_warmup_ms: 100,
            stop_grace_ms: 200,
            release_settle_ms: 100,
            reinit_settle_ms: 100,
        }
    }
}

/// Loop task spawn parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub name: String,
    pub stack_size: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: "microphone_recording".into(),
            stack_size: 8192,
        }
    }
}

/// Configuration of the loopback service.
///
/// Defaults match an INMP441 microphone on I2S0 and a MAX98357A amplifier
/// on I2S1, both running 44.1 kHz, 32-bit, mono.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfiguration {
    pub sample_rate: u32,

    /// Bits per sample. Valid values: 8, 16, 24, 32.
    pub bit_width: u16,

    pub slot_mode: SlotMode,

    /// Frames per DMA transfer (1..=1023). Sizes the frame buffer.
    pub dma_frame_count: u32,

    pub dma_desc_count: u32,

    /// Let the playback DMA emit silence when it runs dry.
    pub auto_clear: bool,

    pub capture_port: u8,
    pub capture_pins: PinAssignment,

    pub playback_port: u8,
    pub playback_pins: PinAssignment,

    pub timing: LoopbackTiming,
    pub task: TaskConfig,

    /// Worker status line period, in loop iterations.
    pub status_log_every: u64,

    /// Signal detection and level update period, in loop iterations.
    pub signal_log_every: u64,
}

impl LoopbackConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![8, 16, 24, 32].contains(&self.bit_width) {
            return Err(format!("unsupported bit width: {}", self.bit_width));
        }
        if self.dma_frame_count == 0 || self.dma_frame_count > MAX_DMA_FRAME_COUNT {
            return Err(format!(
                "dma frame count must be within 1..={}, got {}",
                MAX_DMA_FRAME_COUNT, self.dma_frame_count
            ));
        }
        if self.dma_desc_count == 0 {
            return Err("dma descriptor count must be positive".into());
        }
        if self.capture_port == self.playback_port {
            return Err(format!(
                "capture and playback share I2S port {}",
                self.capture_port
            ));
        }
        if self.status_log_every == 0 || self.signal_log_every == 0 {
            return Err("log periods must be positive".into());
        }
        if self.task.name.is_empty() || self.task.name.contains('\0') {
            return Err(format!("invalid task name: {:?}", self.task.name));
        }
        Ok(())
    }

    /// Size of one frame buffer: frame count × channels × bit width / 8.
    pub fn frame_buffer_len(&self) -> usize {
        self.dma_frame_count as usize * self.slot_mode.channel_count() * self.bit_width as usize / 8
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bit_width as usize / 8
    }

    /// Hardware description of the channel for `role`.
    pub fn channel_spec(&self, role: ChannelRole) -> ChannelSpec {
        let (port, pins) = match role {
            ChannelRole::Capture => (self.capture_port, self.capture_pins),
            ChannelRole::Playback => (self.playback_port, self.playback_pins),
        };
        ChannelSpec {
            role,
            port,
            sample_rate: self.sample_rate,
            bit_width: self.bit_width,
            slot_mode: self.slot_mode,
            pins,
            dma_desc_count: self.dma_desc_count,
            dma_frame_count: self.dma_frame_count,
            auto_clear: self.auto_clear,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, LoopbackError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            LoopbackError::InvalidConfiguration(format!("failed to parse configuration: {}", e))
        })?;
        config.validate().map_err(LoopbackError::InvalidConfiguration)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, LoopbackError> {
        serde_json::to_string(self).map_err(|e| {
            LoopbackError::InvalidConfiguration(format!("failed to serialize configuration: {}", e))
        })
    }
}

impl Default for LoopbackConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bit_width: 32,
            slot_mode: SlotMode::Mono,
            dma_frame_count: MAX_DMA_FRAME_COUNT,
            dma_desc_count: 6,
            auto_clear: true,
            capture_port: 0,
            capture_pins: PinAssignment { bclk: 38, ws: 39, data: 37 },
            playback_port: 1,
            playback_pins: PinAssignment { bclk: 40, ws: 41, data: 42 },
            timing: LoopbackTiming::default(),
            task: TaskConfig::default(),
            status_log_every: 100,
            signal_log_every: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_buffer_is_one_dma_transfer() {
        let config = LoopbackConfiguration::default();
        assert_eq!(config.frame_buffer_len(), 1023 * 4);
        assert_eq!(
            config.channel_spec(ChannelRole::Capture).transfer_bytes(),
            config.frame_buffer_len()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn channel_spec_picks_pins_by_role() {
        let config = LoopbackConfiguration::default();
        let capture = config.channel_spec(ChannelRole::Capture);
        let playback = config.channel_spec(ChannelRole::Playback);

        assert_eq!(capture.port, 0);
        assert_eq!(capture.pins.data, 37);
        assert_eq!(playback.port, 1);
        assert_eq!(playback.pins, PinAssignment { bclk: 40, ws: 41, data: 42 });
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_width = LoopbackConfiguration { bit_width: 12, ..Default::default() };
        assert!(bad_width.validate().unwrap_err().contains("bit width"));

        let bad_frames = LoopbackConfiguration { dma_frame_count: 1024, ..Default::default() };
        assert!(bad_frames.validate().is_err());

        let shared_port = LoopbackConfiguration { playback_port: 0, ..Default::default() };
        assert!(shared_port.validate().unwrap_err().contains("share"));

        let no_rate = LoopbackConfiguration { sample_rate: 0, ..Default::default() };
        assert!(no_rate.validate().is_err());

        let unnamed = LoopbackConfiguration {
            task: TaskConfig { name: String::new(), ..Default::default() },
            ..Default::default()
        };
        assert!(unnamed.validate().unwrap_err().contains("task name"));

        let nul_name = LoopbackConfiguration {
            task: TaskConfig { name: "mic\0rec".into(), ..Default::default() },
            ..Default::default()
        };
        assert!(nul_name.validate().unwrap_err().contains("task name"));
    }

    #[test]
    fn stereo_16_bit_buffer_len() {
        let config = LoopbackConfiguration {
            bit_width: 16,
            slot_mode: SlotMode::Stereo,
            dma_frame_count: 240,
            ..Default::default()
        };
        assert_eq!(config.frame_buffer_len(), 240 * 2 * 2);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = LoopbackConfiguration::from_json(
            r#"{"sample_rate":16000,"bit_width":16,"timing":{"stop_grace_ms":50}}"#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.bit_width, 16);
        assert_eq!(config.timing.stop_grace_ms, 50);
        assert_eq!(config.timing.transfer_timeout_ms, 1000);
        assert_eq!(config.task.name, "microphone_recording");
    }

    #[test]
    fn json_with_invalid_values_is_rejected() {
        let err = LoopbackConfiguration::from_json(r#"{"bit_width":20}"#).unwrap_err();
        assert!(matches!(err, LoopbackError::InvalidConfiguration(_)));

        let err = LoopbackConfiguration::from_json(r#"{"task":{"name":"mic\u0000rec"}}"#).unwrap_err();
        assert!(matches!(err, LoopbackError::InvalidConfiguration(_)));

        let err = LoopbackConfiguration::from_json("not json").unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn stored_blob_loads_back() {
        let mut config = LoopbackConfiguration::default();
        config.capture_pins.data = 4;
        let json = config.to_json().unwrap();
        assert_eq!(LoopbackConfiguration::from_json(&json).unwrap(), config);
    }
}
