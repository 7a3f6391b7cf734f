//! Start/stop control for the monitor.
//!
//! Holds the caption of the toggle button and the status line, and keeps
//! them in step with the loopback service.

use std::sync::Arc;

use log::{debug, info, warn};

use loopback_core::{ChannelDriver, LoopbackService};

use crate::monitor_state::MonitorState;

const CAPTION_START: &str = "Start Recording";
const CAPTION_STOP: &str = "Stop Recording";

const STATUS_READY: &str = "Microphone Ready - Click Start";
const STATUS_ACTIVE: &str = "Recording Active - Speak now";
const STATUS_STOPPED: &str = "Recording Stopped";

/// Log the input level every this many ticks while recording.
const LEVEL_LOG_TICKS: u32 = 40;

pub struct MonitorScreen<D: ChannelDriver> {
    service: LoopbackService<D>,
    state: Arc<MonitorState>,
    caption: &'static str,
    status: String,
    ticks: u32,
}

impl<D: ChannelDriver> MonitorScreen<D> {
    pub fn new(service: LoopbackService<D>, state: Arc<MonitorState>) -> Self {
        let status = match state.take_error() {
            Some(message) => format!("Microphone error: {message}"),
            None => STATUS_READY.to_string(),
        };
        Self {
            service,
            state,
            caption: CAPTION_START,
            status,
            ticks: 0,
        }
    }

    /// Button handler: starts the loopback when idle, stops it otherwise.
    pub fn toggle(&mut self) {
        if self.service.is_recording() {
            self.service.stop_recording();
            self.caption = CAPTION_START;
            self.status = STATUS_STOPPED.to_string();
            return;
        }

        match self.service.start_recording() {
            Ok(()) => {
                self.caption = CAPTION_STOP;
                self.status = STATUS_ACTIVE.to_string();
            }
            Err(e) => {
                warn!("Start failed: {}", e);
                self.caption = CAPTION_START;
                self.status = format!("Microphone error: {e}");
            }
        }
    }

    /// Periodic refresh from the main loop.
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);

        if let Some(message) = self.state.take_error() {
            self.status = format!("Microphone error: {message}");
        }

        if self.service.is_recording() && self.ticks % LEVEL_LOG_TICKS == 0 {
            let levels = self.state.levels();
            let diagnostics = self.service.diagnostics();
            debug!(
                "level rms={:.3} peak={:.3} loops={} signal_frames={}",
                levels.rms_level,
                levels.peak_level,
                diagnostics.loop_count,
                diagnostics.frames_with_signal
            );
        }
    }

    pub fn log_status(&self) {
        info!(
            "[{}] {} ({})",
            self.caption,
            self.status,
            self.state.state().as_str()
        );
    }
}
