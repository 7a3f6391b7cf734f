use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::models::audio_models::{AudioLevels, ChannelRole, LoopbackDiagnostics};
use crate::models::config::LoopbackConfiguration;
use crate::models::error::LoopbackError;
use crate::models::state::LoopbackState;
use crate::processing::frame_buffer::FrameBuffer;
use crate::traits::audio_channel::{AudioChannel, ChannelDriver};
use crate::traits::loopback_delegate::LoopbackDelegate;

const TARGET: &str = "loopback";
const WORKER_TARGET: &str = "loopback::worker";

/// Poll interval while waiting out the stop grace period.
const GRACE_POLL: Duration = Duration::from_millis(1);

/// Control block of one session's loop thread.
///
/// Each session gets fresh flags, so a thread from an earlier session can
/// never be revived by a later start.
struct Worker {
    running: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn join(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!(target: TARGET, "loop task panicked");
            }
        }
    }
}

/// Clears both session flags when the loop thread exits, including by
/// unwinding out of a delegate callback.
struct ExitGuard {
    running: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.alive.store(false, Ordering::Release);
    }
}

/// Everything the loop thread owns for the duration of a session.
struct WorkerContext<C: AudioChannel> {
    capture: Arc<C>,
    playback: Arc<C>,
    running: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    diagnostics: Arc<Mutex<LoopbackDiagnostics>>,
    levels: Arc<Mutex<AudioLevels>>,
    delegate: Option<Arc<dyn LoopbackDelegate>>,
    buffer_len: usize,
    bytes_per_sample: usize,
    transfer_timeout: Duration,
    loop_yield: Duration,
    warmup: Duration,
    status_log_every: u64,
    signal_log_every: u64,
}

/// Hot-mic loopback: reads frames from a capture channel and writes them
/// straight to a playback channel on a dedicated thread.
///
/// Generic over the hardware backend via `ChannelDriver`.
///
/// ```text
/// [Capture channel] → [FrameBuffer] → [Playback channel]
///        ↑ one DMA transfer per iteration, blocking, bounded wait ↑
/// ```
///
/// The service is owned by the application's composition root and handed
/// by reference to the UI handler. It assumes a single control-side caller
/// at a time.
pub struct LoopbackService<D: ChannelDriver> {
    driver: D,
    config: LoopbackConfiguration,
    capture: Option<Arc<D::Channel>>,
    playback: Option<Arc<D::Channel>>,
    worker: Option<Worker>,
    diagnostics: Arc<Mutex<LoopbackDiagnostics>>,
    levels: Arc<Mutex<AudioLevels>>,
    delegate: Option<Arc<dyn LoopbackDelegate>>,
    last_state: LoopbackState,
}

impl<D: ChannelDriver> LoopbackService<D> {
    pub fn new(driver: D, config: LoopbackConfiguration) -> Result<Self, LoopbackError> {
        config.validate().map_err(LoopbackError::InvalidConfiguration)?;
        Ok(Self {
            driver,
            config,
            capture: None,
            playback: None,
            worker: None,
            diagnostics: Arc::new(Mutex::new(LoopbackDiagnostics::default())),
            levels: Arc::new(Mutex::new(AudioLevels::default())),
            delegate: None,
            last_state: LoopbackState::Uninitialized,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn LoopbackDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &LoopbackConfiguration {
        &self.config
    }

    pub fn state(&self) -> LoopbackState {
        if self.is_recording() {
            LoopbackState::Recording
        } else if self.has_channels() {
            LoopbackState::Idle
        } else {
            LoopbackState::Uninitialized
        }
    }

    /// Current session flag. Best-effort: only meant for display.
    pub fn is_recording(&self) -> bool {
        self.worker.as_ref().is_some_and(Worker::is_running)
    }

    /// Whether both channel handles are present.
    pub fn has_channels(&self) -> bool {
        self.capture.is_some() && self.playback.is_some()
    }

    /// Whether a loop thread (current or just stopped) has not exited yet.
    pub fn is_worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(Worker::is_alive)
    }

    pub fn diagnostics(&self) -> LoopbackDiagnostics {
        self.diagnostics.lock().clone()
    }

    pub fn current_levels(&self) -> AudioLevels {
        *self.levels.lock()
    }

    /// Allocate playback then capture. Existing channels are torn down and
    /// recreated.
    pub fn initialize(&mut self) -> Result<(), LoopbackError> {
        info!(target: TARGET, "=== Starting loopback initialization ===");

        if self.capture.is_some() || self.playback.is_some() {
            info!(target: TARGET, "Releasing existing channels before reinitialization");
            self.cleanup();
        }

        let result = self.open_channels();
        if result.is_ok() {
            info!(target: TARGET, "=== Loopback initialization complete ===");
        }
        self.publish_state();
        result
    }

    /// Start the loop. Returns without waiting for the loop to run.
    ///
    /// No-op if a session is already active. Missing channels are
    /// reinitialized first; if that fails the session is not started.
    pub fn start_recording(&mut self) -> Result<(), LoopbackError> {
        if self.is_recording() {
            warn!(target: TARGET, "Recording is already in progress");
            return Ok(());
        }

        if !self.has_channels() {
            warn!(target: TARGET, "Channels not initialized, attempting to reinitialize...");
            if let Err(e) = self.reinitialize_channels() {
                error!(target: TARGET, "Failed to reinitialize channels: {}", e);
                self.publish_state();
                return Err(e);
            }
        }

        // A thread from the previous session exits within one iteration.
        self.reap_worker();

        let result = self.spawn_worker();
        match &result {
            Ok(()) => info!(target: TARGET, "Recording task created successfully"),
            Err(e) => {
                error!(target: TARGET, "{}", e);
                self.report_error(e);
            }
        }
        self.publish_state();
        result
    }

    /// Clear the session flag and give the loop a short grace period to exit.
    ///
    /// Does not join the loop thread; it finishes its current iteration and
    /// exits by itself.
    pub fn stop_recording(&mut self) {
        if !self.is_recording() {
            warn!(target: TARGET, "Recording is not in progress");
            return;
        }

        if let Some(worker) = &self.worker {
            worker.running.store(false, Ordering::Release);

            let grace = Duration::from_millis(self.config.timing.stop_grace_ms);
            let deadline = Instant::now() + grace;
            while worker.is_alive() && Instant::now() < deadline {
                thread::sleep(GRACE_POLL);
            }
        }

        info!(target: TARGET, "Recording stopped");
        self.publish_state();
    }

    /// Stop any session and release both channels. Safe to repeat and safe
    /// on a service that was never initialized.
    pub fn deinitialize(&mut self) {
        info!(target: TARGET, "Deinitializing loopback service...");
        self.cleanup();
        info!(target: TARGET, "Loopback service deinitialized");
        self.publish_state();
    }

    // --- Internal helpers ---

    fn open_channels(&mut self) -> Result<(), LoopbackError> {
        // Playback first: creating capture after playback avoids a driver
        // resource conflict on the target.
        let playback = self.open_channel(ChannelRole::Playback)?;
        self.playback = Some(Arc::new(playback));

        match self.open_channel(ChannelRole::Capture) {
            Ok(capture) => {
                self.capture = Some(Arc::new(capture));
                Ok(())
            }
            Err(e) => {
                self.release_channels();
                Err(e)
            }
        }
    }

    fn open_channel(&self, role: ChannelRole) -> Result<D::Channel, LoopbackError> {
        info!(target: TARGET, "Initializing {} channel...", role);
        let spec = self.config.channel_spec(role);
        match self.driver.open(&spec) {
            Ok(channel) => {
                info!(
                    target: TARGET,
                    "{} channel ready on port {} (bclk {}, ws {}, data {})",
                    role, spec.port, spec.pins.bclk, spec.pins.ws, spec.pins.data
                );
                Ok(channel)
            }
            Err(e) => {
                error!(target: TARGET, "Failed to initialize {} channel: {}", role, e);
                self.report_error(&e);
                Err(e)
            }
        }
    }

    /// Stop, release, let the hardware settle, recreate.
    fn reinitialize_channels(&mut self) -> Result<(), LoopbackError> {
        info!(target: TARGET, "Reinitializing channels...");

        self.cleanup();
        sleep_ms(self.config.timing.reinit_settle_ms);

        self.open_channels()?;
        info!(target: TARGET, "Channels reinitialized successfully");
        Ok(())
    }

    fn cleanup(&mut self) {
        if self.is_recording() {
            self.stop_recording();
        }
        self.release_channels();
    }

    /// Drop both handles, capture first. A stopped loop thread is joined
    /// beforehand so no transfer is in flight on a released channel.
    fn release_channels(&mut self) {
        self.reap_worker();

        if self.capture.is_none() && self.playback.is_none() {
            return;
        }

        if self.capture.take().is_some() {
            info!(target: TARGET, "Capture channel released");
        }
        if self.playback.take().is_some() {
            info!(target: TARGET, "Playback channel released");
        }

        sleep_ms(self.config.timing.release_settle_ms);
        info!(target: TARGET, "Channels cleaned up");
    }

    fn reap_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.is_alive() {
                debug!(target: TARGET, "Waiting for previous loop task to exit");
            }
            worker.join();
        }
    }

    fn spawn_worker(&mut self) -> Result<(), LoopbackError> {
        let (Some(capture), Some(playback)) = (&self.capture, &self.playback) else {
            return Err(LoopbackError::TaskSpawn("channels not available".into()));
        };

        {
            let mut d = self.diagnostics.lock();
            let sessions_started = d.sessions_started + 1;
            *d = LoopbackDiagnostics {
                sessions_started,
                ..Default::default()
            };
        }
        *self.levels.lock() = AudioLevels::default();

        let running = Arc::new(AtomicBool::new(true));
        let alive = Arc::new(AtomicBool::new(true));
        let timing = &self.config.timing;

        let ctx = WorkerContext {
            capture: Arc::clone(capture),
            playback: Arc::clone(playback),
            running: Arc::clone(&running),
            alive: Arc::clone(&alive),
            diagnostics: Arc::clone(&self.diagnostics),
            levels: Arc::clone(&self.levels),
            delegate: self.delegate.clone(),
            buffer_len: self.config.frame_buffer_len(),
            bytes_per_sample: self.config.bytes_per_sample(),
            transfer_timeout: timing.transfer_timeout(),
            loop_yield: Duration::from_millis(timing.loop_yield_ms),
            warmup: Duration::from_millis(timing.worker_warmup_ms),
            status_log_every: self.config.status_log_every,
            signal_log_every: self.config.signal_log_every,
        };

        let spawned = thread::Builder::new()
            .name(self.config.task.name.clone())
            .stack_size(self.config.task.stack_size)
            .spawn(move || capture_loop(ctx));

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    running,
                    alive,
                    thread: Some(handle),
                });
                Ok(())
            }
            Err(e) => Err(LoopbackError::TaskSpawn(e.to_string())),
        }
    }

    fn report_error(&self, error: &LoopbackError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }

    fn publish_state(&mut self) {
        let state = self.state();
        if state == self.last_state {
            return;
        }
        self.last_state = state;
        debug!(target: TARGET, "State → {}", state.as_str());
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }
}

impl<D: ChannelDriver> Drop for LoopbackService<D> {
    fn drop(&mut self) {
        self.deinitialize();
    }
}

fn sleep_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Body of the loop thread.
///
/// Each iteration: read one frame, write back whatever was read, yield.
/// Transfer errors are logged and counted; they never end the session.
fn capture_loop<C: AudioChannel>(ctx: WorkerContext<C>) {
    info!(target: WORKER_TARGET, "Recording task started");
    let _exit = ExitGuard {
        running: Arc::clone(&ctx.running),
        alive: Arc::clone(&ctx.alive),
    };

    let mut buf = FrameBuffer::new(ctx.buffer_len, ctx.bytes_per_sample);

    if !ctx.warmup.is_zero() {
        thread::sleep(ctx.warmup);
    }

    let mut loop_count: u64 = 0;
    while ctx.running.load(Ordering::Acquire) {
        loop_count += 1;

        match ctx.capture.read(buf.as_mut_slice(), ctx.transfer_timeout) {
            Ok(0) => {
                ctx.diagnostics.lock().empty_reads += 1;
                if loop_count % ctx.status_log_every == 0 {
                    warn!(target: WORKER_TARGET, "Loop {}: no data read from capture", loop_count);
                }
            }
            Ok(read) => {
                buf.set_filled(read);
                debug!(target: WORKER_TARGET, "Loop {}: read {} bytes", loop_count, read);

                let signal = buf.has_signal();
                if loop_count % ctx.signal_log_every == 0 {
                    if signal {
                        info!(target: WORKER_TARGET, "Audio data detected");
                    }
                    let levels = buf.levels();
                    *ctx.levels.lock() = levels;
                    if let Some(ref delegate) = ctx.delegate {
                        delegate.on_levels_updated(&levels);
                    }
                }

                let written = match ctx.playback.write(buf.filled(), ctx.transfer_timeout) {
                    Ok(0) => {
                        warn!(target: WORKER_TARGET, "Loop {}: no bytes written to playback", loop_count);
                        Some(0)
                    }
                    Ok(written) => Some(written),
                    Err(e) => {
                        error!(target: WORKER_TARGET, "Loop {}: {}", loop_count, e);
                        None
                    }
                };

                let mut d = ctx.diagnostics.lock();
                d.bytes_read += read as u64;
                if signal {
                    d.frames_with_signal += 1;
                }
                match written {
                    Some(n) => d.bytes_written += n as u64,
                    None => d.write_errors += 1,
                }
            }
            Err(e) => {
                error!(target: WORKER_TARGET, "Loop {}: {}", loop_count, e);
                ctx.diagnostics.lock().read_errors += 1;
            }
        }

        ctx.diagnostics.lock().loop_count = loop_count;

        if loop_count % ctx.status_log_every == 0 {
            info!(target: WORKER_TARGET, "Recording task running, total loops: {}", loop_count);
        }

        if ctx.loop_yield.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(ctx.loop_yield);
        }
    }

    drop(buf);
    info!(target: WORKER_TARGET, "Recording task ended after {} loops", loop_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock_channel::MockChannelDriver;
    use crate::models::config::LoopbackTiming;
    use crate::models::error::AllocationStage;

    fn fast_config() -> LoopbackConfiguration {
        LoopbackConfiguration {
            dma_frame_count: 16,
            timing: LoopbackTiming {
                stop_grace_ms: 500,
                ..LoopbackTiming::immediate()
            },
            status_log_every: 10,
            signal_log_every: 2,
            ..Default::default()
        }
    }

    fn service() -> (LoopbackService<MockChannelDriver>, MockChannelDriver) {
        let driver = MockChannelDriver::new();
        let service = LoopbackService::new(driver.clone(), fast_config()).unwrap();
        (service, driver)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[derive(Default)]
    struct RecordingDelegate {
        states: Mutex<Vec<LoopbackState>>,
        errors: Mutex<Vec<LoopbackError>>,
        level_updates: Mutex<u32>,
    }

    impl LoopbackDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: LoopbackState) {
            self.states.lock().push(state);
        }

        fn on_levels_updated(&self, _levels: &AudioLevels) {
            *self.level_updates.lock() += 1;
        }

        fn on_error(&self, error: &LoopbackError) {
            self.errors.lock().push(error.clone());
        }
    }

    #[test]
    fn new_rejects_invalid_configuration() {
        let config = LoopbackConfiguration { bit_width: 7, ..Default::default() };
        let result = LoopbackService::new(MockChannelDriver::new(), config);
        assert!(matches!(result, Err(LoopbackError::InvalidConfiguration(_))));
    }

    #[test]
    fn initialize_opens_playback_before_capture() {
        let (mut service, driver) = service();
        service.initialize().unwrap();

        assert_eq!(driver.open_log(), vec![ChannelRole::Playback, ChannelRole::Capture]);
        assert_eq!(service.state(), LoopbackState::Idle);
        assert_eq!(driver.live_channels(), 2);
    }

    #[test]
    fn capture_failure_releases_playback() {
        let (mut service, driver) = service();
        driver.fail_open(ChannelRole::Capture, AllocationStage::Create, 0x103);

        let err = service.initialize().unwrap_err();

        assert!(err.is_allocation());
        assert_eq!(driver.live_channels(), 0);
        assert!(driver.release_log().contains(&ChannelRole::Playback));
        assert_eq!(service.state(), LoopbackState::Uninitialized);
    }

    #[test]
    fn start_spawns_loop_and_stop_ends_it() {
        let (mut service, driver) = service();
        service.initialize().unwrap();
        service.start_recording().unwrap();

        assert!(service.is_recording());
        assert!(wait_for(|| driver.write_calls() >= 3));

        service.stop_recording();
        assert!(!service.is_recording());
        assert!(!service.is_worker_running());
        assert_eq!(service.state(), LoopbackState::Idle);
    }

    #[test]
    fn loop_writes_what_it_reads() {
        let (mut service, driver) = service();
        let frame: Vec<u8> = (1..=8).collect();
        driver.push_capture_frame(frame.clone());
        service.initialize().unwrap();
        service.start_recording().unwrap();

        assert!(wait_for(|| driver.written_bytes().len() > frame.len()));
        service.stop_recording();

        assert_eq!(&driver.written_bytes()[..frame.len()], frame.as_slice());
        assert!(service.diagnostics().frames_with_signal >= 1);
    }

    #[test]
    fn delegate_sees_transitions_and_levels() {
        let (mut service, _driver) = service();
        let delegate = Arc::new(RecordingDelegate::default());
        service.set_delegate(delegate.clone());

        service.initialize().unwrap();
        service.start_recording().unwrap();
        assert!(wait_for(|| *delegate.level_updates.lock() > 0));
        service.stop_recording();
        service.deinitialize();

        assert_eq!(
            *delegate.states.lock(),
            vec![
                LoopbackState::Idle,
                LoopbackState::Recording,
                LoopbackState::Idle,
                LoopbackState::Uninitialized,
            ]
        );
        assert!(delegate.errors.lock().is_empty());
    }

    #[test]
    fn write_failure_is_counted_not_fatal() {
        let (mut service, driver) = service();
        driver.fail_writes(2);
        service.initialize().unwrap();
        service.start_recording().unwrap();

        assert!(wait_for(|| driver.write_calls() >= 5));
        assert!(service.is_recording());
        service.stop_recording();

        assert_eq!(service.diagnostics().write_errors, 2);
    }

    #[test]
    fn allocation_error_reaches_delegate() {
        let (mut service, driver) = service();
        let delegate = Arc::new(RecordingDelegate::default());
        service.set_delegate(delegate.clone());
        driver.fail_open(ChannelRole::Playback, AllocationStage::Enable, 0x105);

        assert!(service.initialize().is_err());
        assert_eq!(delegate.errors.lock().len(), 1);
        assert!(delegate.states.lock().is_empty());
    }

    #[test]
    fn diagnostics_reset_per_session() {
        let (mut service, driver) = service();
        driver.fail_reads(1);
        service.initialize().unwrap();

        service.start_recording().unwrap();
        assert!(wait_for(|| driver.read_calls() >= 3));
        service.stop_recording();
        let first = service.diagnostics();
        assert!(first.loop_count >= 3);
        assert_eq!(first.read_errors, 1);

        service.start_recording().unwrap();
        service.stop_recording();
        let second = service.diagnostics();
        assert_eq!(second.sessions_started, 2);
        assert_eq!(second.read_errors, 0);
    }

    #[test]
    fn drop_releases_channels() {
        let driver = MockChannelDriver::new();
        {
            let mut service = LoopbackService::new(driver.clone(), fast_config()).unwrap();
            service.initialize().unwrap();
            service.start_recording().unwrap();
        }
        assert_eq!(driver.live_channels(), 0);
    }

    struct PanickingDelegate;

    impl LoopbackDelegate for PanickingDelegate {
        fn on_state_changed(&self, _state: LoopbackState) {}

        fn on_levels_updated(&self, _levels: &AudioLevels) {
            panic!("levels callback failed");
        }

        fn on_error(&self, _error: &LoopbackError) {}
    }

    #[test]
    fn panicking_loop_leaves_service_idle() {
        let (mut service, driver) = service();
        service.set_delegate(Arc::new(PanickingDelegate));
        service.initialize().unwrap();
        service.start_recording().unwrap();

        assert!(wait_for(|| !service.is_worker_running()));
        assert!(!service.is_recording());
        assert_eq!(service.state(), LoopbackState::Idle);

        // The dead thread is reaped and a new session starts normally.
        let before = driver.read_calls();
        service.set_delegate(Arc::new(RecordingDelegate::default()));
        service.start_recording().unwrap();
        assert!(wait_for(|| driver.read_calls() > before + 2));
        assert!(service.is_recording());
        service.stop_recording();
    }
}
