//! In-memory channel driver for host tests and bring-up without hardware.
//!
//! Every driver call is logged at DEBUG level under the `loopback::mock`
//! target so a test run with a logger installed shows exactly what the
//! service asked the hardware to do.
//!
//! The driver is cheap to clone; clones share the same script and
//! counters, so a test keeps one clone while the service owns another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{ChannelRole, ChannelSpec};
use crate::models::error::{AllocationStage, LoopbackError, TransferKind};
use crate::traits::audio_channel::{AudioChannel, ChannelDriver};

/// Driver error code reported for scripted transfer failures.
pub const MOCK_TRANSFER_ERROR: i32 = 0x107;

/// Playback bytes kept for inspection; later writes are accepted but not stored.
pub const MOCK_WRITTEN_CAPACITY: usize = 64 * 1024;

#[derive(Default)]
struct MockScript {
    open_failures: Vec<(ChannelRole, AllocationStage, i32)>,
    capture_frames: VecDeque<Vec<u8>>,
    pending_read_failures: u32,
    pending_write_failures: u32,
    opened: Vec<ChannelRole>,
    released: Vec<ChannelRole>,
    written: Vec<u8>,
}

struct MockShared {
    script: Mutex<MockScript>,
    live: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    read_pace: Mutex<Duration>,
}

#[derive(Clone)]
pub struct MockChannelDriver {
    shared: Arc<MockShared>,
}

impl Default for MockChannelDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannelDriver {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared {
                script: Mutex::new(MockScript::default()),
                live: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
                read_pace: Mutex::new(Duration::from_millis(1)),
            }),
        }
    }

    /// Make every `open` for `role` fail at `stage` until cleared.
    pub fn fail_open(&self, role: ChannelRole, stage: AllocationStage, code: i32) {
        self.shared.script.lock().open_failures.push((role, stage, code));
    }

    pub fn clear_open_failures(&self) {
        self.shared.script.lock().open_failures.clear();
    }

    /// Queue bytes returned by the next capture read.
    /// With nothing queued, reads fill the whole buffer with silence.
    pub fn push_capture_frame(&self, frame: Vec<u8>) {
        self.shared.script.lock().capture_frames.push_back(frame);
    }

    /// Fail the next `count` reads.
    pub fn fail_reads(&self, count: u32) {
        self.shared.script.lock().pending_read_failures += count;
    }

    /// Fail the next `count` writes.
    pub fn fail_writes(&self, count: u32) {
        self.shared.script.lock().pending_write_failures += count;
    }

    /// Simulated DMA time per read.
    pub fn set_read_pace(&self, pace: Duration) {
        *self.shared.read_pace.lock() = pace;
    }

    /// Channels currently allocated.
    pub fn live_channels(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Roles in the order they were successfully opened.
    pub fn open_log(&self) -> Vec<ChannelRole> {
        self.shared.script.lock().opened.clone()
    }

    /// Roles in the order they were released.
    pub fn release_log(&self) -> Vec<ChannelRole> {
        self.shared.script.lock().released.clone()
    }

    pub fn read_calls(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    /// The first `MOCK_WRITTEN_CAPACITY` bytes the playback channel accepted.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.shared.script.lock().written.clone()
    }
}

impl ChannelDriver for MockChannelDriver {
    type Channel = MockChannel;

    fn open(&self, spec: &ChannelSpec) -> Result<MockChannel, LoopbackError> {
        let mut script = self.shared.script.lock();
        let failure = script
            .open_failures
            .iter()
            .copied()
            .find(|(role, _, _)| *role == spec.role);
        if let Some((role, stage, code)) = failure {
            log::debug!(target: "loopback::mock", "open {} fails at {} ({})", role, stage, code);
            // A channel that got past creation is deleted again before failing.
            if stage != AllocationStage::Create {
                script.released.push(role);
            }
            return Err(LoopbackError::ChannelAllocation { role, stage, code });
        }

        script.opened.push(spec.role);
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            target: "loopback::mock",
            "open {} on port {} ({} Hz, {} bit)",
            spec.role, spec.port, spec.sample_rate, spec.bit_width
        );

        Ok(MockChannel {
            spec: spec.clone(),
            shared: Arc::clone(&self.shared),
        })
    }
}

pub struct MockChannel {
    spec: ChannelSpec,
    shared: Arc<MockShared>,
}

impl AudioChannel for MockChannel {
    fn spec(&self) -> &ChannelSpec {
        &self.spec
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, LoopbackError> {
        self.shared.reads.fetch_add(1, Ordering::SeqCst);
        let pace = (*self.shared.read_pace.lock()).min(timeout);
        if !pace.is_zero() {
            thread::sleep(pace);
        }

        let mut script = self.shared.script.lock();
        if script.pending_read_failures > 0 {
            script.pending_read_failures -= 1;
            return Err(LoopbackError::Transfer {
                role: self.spec.role,
                kind: TransferKind::Timeout,
                code: MOCK_TRANSFER_ERROR,
            });
        }

        match script.capture_frames.pop_front() {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            None => {
                buf.fill(0);
                Ok(buf.len())
            }
        }
    }

    fn write(&self, buf: &[u8], _timeout: Duration) -> Result<usize, LoopbackError> {
        self.shared.writes.fetch_add(1, Ordering::SeqCst);

        let mut script = self.shared.script.lock();
        if script.pending_write_failures > 0 {
            script.pending_write_failures -= 1;
            return Err(LoopbackError::Transfer {
                role: self.spec.role,
                kind: TransferKind::Io,
                code: MOCK_TRANSFER_ERROR,
            });
        }

        let room = MOCK_WRITTEN_CAPACITY.saturating_sub(script.written.len());
        script.written.extend_from_slice(&buf[..buf.len().min(room)]);
        Ok(buf.len())
    }
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
        self.shared.script.lock().released.push(self.spec.role);
        log::debug!(target: "loopback::mock", "release {}", self.spec.role);
    }
}
