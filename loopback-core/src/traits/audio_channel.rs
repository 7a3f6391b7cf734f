use std::time::Duration;

use crate::models::audio_models::ChannelSpec;
use crate::models::error::LoopbackError;

/// An allocated and enabled hardware audio channel.
///
/// Implemented by:
/// - `I2sChannel` (ESP-IDF standard mode)
/// - `MockChannel` (host tests and bring-up)
///
/// Dropping the channel disables and deletes it. A live value is always
/// enabled; there is no allocated-but-disabled state.
pub trait AudioChannel: Send + Sync {
    /// Hardware description this channel was opened with.
    fn spec(&self) -> &ChannelSpec;

    /// Blocking read of up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns the number of bytes placed in `buf`, which may be zero.
    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, LoopbackError>;

    /// Blocking write of `buf`, waiting at most `timeout`.
    ///
    /// Returns the number of bytes accepted by the hardware.
    fn write(&self, buf: &[u8], timeout: Duration) -> Result<usize, LoopbackError>;
}

/// Creates hardware channels for the loopback service.
///
/// `open` performs the whole bring-up sequence (create, configure standard
/// mode, enable). If a later step fails, the partially created channel must
/// be released before the error is returned.
pub trait ChannelDriver: Send + Sync {
    type Channel: AudioChannel + 'static;

    fn open(&self, spec: &ChannelSpec) -> Result<Self::Channel, LoopbackError>;
}
