use std::sync::Arc;

use log::{error, info};
use parking_lot::Mutex;

use loopback_core::{AudioLevels, LoopbackDelegate, LoopbackError, LoopbackState};

/// Delegate that mirrors service events into state the screen can poll.
pub struct MonitorState {
    state: Mutex<LoopbackState>,
    levels: Mutex<AudioLevels>,
    last_error: Mutex<Option<String>>,
}

impl MonitorState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LoopbackState::Uninitialized),
            levels: Mutex::new(AudioLevels::default()),
            last_error: Mutex::new(None),
        })
    }

    pub fn state(&self) -> LoopbackState {
        *self.state.lock()
    }

    pub fn levels(&self) -> AudioLevels {
        *self.levels.lock()
    }

    /// Takes the most recent error, if one arrived since the last call.
    pub fn take_error(&self) -> Option<String> {
        self.last_error.lock().take()
    }
}

impl LoopbackDelegate for MonitorState {
    fn on_state_changed(&self, state: LoopbackState) {
        info!("monitor state: {}", state.as_str());
        *self.state.lock() = state;
    }

    fn on_levels_updated(&self, levels: &AudioLevels) {
        *self.levels.lock() = *levels;
    }

    fn on_error(&self, error: &LoopbackError) {
        error!("monitor error: {}", error);
        *self.last_error.lock() = Some(error.to_string());
    }
}
