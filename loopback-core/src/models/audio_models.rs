use serde::{Deserialize, Serialize};

/// Direction of a hardware audio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    /// Receives samples from the microphone.
    Capture,
    /// Sends samples to the speaker amplifier.
    Playback,
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Playback => f.write_str("playback"),
        }
    }
}

/// Slot layout of a standard-mode channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotMode {
    Mono,
    Stereo,
}

impl SlotMode {
    pub fn channel_count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// GPIO numbers wired to one I2S peripheral.
///
/// `data` is DIN for a capture channel and DOUT for a playback channel;
/// the opposite data line and MCLK stay unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssignment {
    pub bclk: i32,
    pub ws: i32,
    pub data: i32,
}

/// Everything a driver needs to bring up one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub role: ChannelRole,
    pub port: u8,
    pub sample_rate: u32,
    pub bit_width: u16,
    pub slot_mode: SlotMode,
    pub pins: PinAssignment,
    pub dma_desc_count: u32,
    pub dma_frame_count: u32,
    pub auto_clear: bool,
}

impl ChannelSpec {
    /// Bytes moved by one DMA transfer on this channel.
    pub fn transfer_bytes(&self) -> usize {
        self.dma_frame_count as usize * self.slot_mode.channel_count() * self.bit_width as usize / 8
    }
}

/// Level metering of the most recent frame (peak and RMS, 0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AudioLevels {
    pub rms_level: f32,
    pub peak_level: f32,
}

/// Counters describing the current (or last) session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopbackDiagnostics {
    pub sessions_started: u64,
    pub loop_count: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub empty_reads: u64,
    pub frames_with_signal: u64,
}
