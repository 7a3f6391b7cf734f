//! # loopback-core
//!
//! Platform-agnostic hot-mic loopback core library.
//!
//! Provides channel lifecycle management, the capture → playback loop
//! thread, frame buffering, and level metering. Hardware backends
//! (ESP-IDF I2S, the in-memory mock) implement the `ChannelDriver` trait
//! and plug into the generic `LoopbackService`.
//!
//! ## Architecture
//!
//! ```text
//! loopback-core (this crate)
//! ├── traits/       ← AudioChannel, ChannelDriver, LoopbackDelegate
//! ├── models/       ← LoopbackError, LoopbackState, LoopbackConfiguration, ChannelSpec, etc.
//! ├── processing/   ← FrameBuffer, level metering
//! ├── session/      ← LoopbackService (generic orchestrator)
//! └── adapters/     ← MockChannelDriver
//! ```

pub mod adapters;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use adapters::mock_channel::MockChannelDriver;
pub use models::audio_models::{AudioLevels, ChannelRole, ChannelSpec, LoopbackDiagnostics, PinAssignment, SlotMode};
pub use models::config::{LoopbackConfiguration, LoopbackTiming, TaskConfig};
pub use models::error::{AllocationStage, LoopbackError, TransferKind};
pub use models::state::LoopbackState;
pub use processing::frame_buffer::FrameBuffer;
pub use session::loopback::LoopbackService;
pub use traits::audio_channel::{AudioChannel, ChannelDriver};
pub use traits::loopback_delegate::LoopbackDelegate;
