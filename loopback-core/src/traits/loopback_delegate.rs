use crate::models::audio_models::AudioLevels;
use crate::models::error::LoopbackError;
use crate::models::state::LoopbackState;

/// Event delegate for loopback service notifications.
///
/// `on_state_changed` and `on_error` fire on the control thread that issued
/// the request; `on_levels_updated` fires on the loop thread. Implementations
/// should marshal to the UI thread if needed.
pub trait LoopbackDelegate: Send + Sync {
    /// Called when the service state changes.
    fn on_state_changed(&self, state: LoopbackState);

    /// Called periodically from the loop thread with the last frame's levels.
    fn on_levels_updated(&self, levels: &AudioLevels);

    /// Called when channel allocation or task spawn fails.
    /// Per-transfer errors are never reported here.
    fn on_error(&self, error: &LoopbackError);
}
