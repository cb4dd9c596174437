//! `FeedPipeline` — the console's capture → encode → relay loop.
//!
//! ```text
//! camera ──► sample ──► JPEG encode ──► FeedChannel.send   (≤ frame budget)
//!                                       FeedChannel.recv ──► FeedView
//! ```
//!
//! A single spawned task drives everything through one `select!` loop: the
//! scheduler ticker, the inbound result stream, a 1 Hz status update, and
//! the stop channel. The camera and the channel open concurrently and fail
//! independently — a failed camera leaves the channel streaming nothing, a
//! failed channel leaves the preview frozen with a status message.
//!
//! # Status channel
//!
//! [`FeedPipeline::spawn`] returns the pipeline handle plus a watch cell
//! with the latest [`FeedView`]; live FPS and frame counters arrive on the
//! status channel as [`PipelineStatus`] snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tomat_capture::{FrameSource, JpegEncoder};
use tomat_core::{CameraConfig, Endpoints, FeedConfig, FeedMessage, SendOutcome, TomatError};
use tomat_relay::{FeedChannel, FeedSender, FrameSink};
use tracing::{debug, info, warn};

use crate::view::FeedView;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub feed:      FeedConfig,
    pub endpoints: Endpoints,
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

/// Pipeline lifecycle phase. Failures never force `Terminated`; only an
/// explicit teardown does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninitialized,
    Initializing,
    Active,
    Terminating,
    Terminated,
}

/// Owns the camera and the channel send half, tracks the phase, and
/// guarantees teardown runs each cleanup step exactly once.
pub struct Lifecycle<S: FrameSource, K: FrameSink> {
    phase:   LifecyclePhase,
    source:  Option<S>,
    sink:    Option<K>,
    blocked: Option<String>,
}

impl<S: FrameSource, K: FrameSink> Lifecycle<S, K> {
    pub fn new() -> Self {
        Self {
            phase: LifecyclePhase::Uninitialized,
            source: None,
            sink: None,
            blocked: None,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn begin_init(&mut self) {
        if self.phase == LifecyclePhase::Uninitialized {
            self.phase = LifecyclePhase::Initializing;
        }
    }

    /// Record the camera acquisition result. Denied or missing hardware
    /// becomes a persistent blocked reason; there is no automatic retry.
    pub fn camera_attached(&mut self, result: Result<S, TomatError>) {
        match result {
            Ok(source) => self.source = Some(source),
            Err(e) => {
                warn!("camera acquisition failed: {e}");
                self.blocked = Some(e.to_string());
            }
        }
    }

    /// Attach the channel send half. The pipeline goes `Active` once the
    /// channel is open — camera readiness gates only the scheduler.
    pub fn channel_attached(&mut self, sink: K) {
        let open = sink.state().is_open();
        self.sink = Some(sink);
        if open && self.phase == LifecyclePhase::Initializing {
            self.phase = LifecyclePhase::Active;
            info!("pipeline active");
        }
    }

    pub fn blocked_reason(&self) -> Option<&str> {
        self.blocked.as_deref()
    }

    /// Whether a scheduling tick may do any work at all. A tick that fires
    /// after teardown must observe `false` and become a no-op.
    pub fn tick_permitted(&self) -> bool {
        self.phase == LifecyclePhase::Active
    }

    pub fn parts(&mut self) -> (Option<&mut S>, Option<&mut K>) {
        (self.source.as_mut(), self.sink.as_mut())
    }

    /// Tear down: close the channel, then release the camera. Both steps
    /// run regardless of each other; a second call is a no-op, so the
    /// camera is released and the channel closed exactly once.
    pub async fn teardown(&mut self) {
        if matches!(
            self.phase,
            LifecyclePhase::Terminating | LifecyclePhase::Terminated
        ) {
            return;
        }
        self.phase = LifecyclePhase::Terminating;
        if let Some(mut sink) = self.sink.take() {
            sink.close().await;
        }
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.phase = LifecyclePhase::Terminated;
        info!("pipeline terminated");
    }
}

impl<S: FrameSource, K: FrameSink> Default for Lifecycle<S, K> {
    fn default() -> Self {
        Self::new()
    }
}

// ── CaptureScheduler ──────────────────────────────────────────────────────────

/// What one scheduling tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent,
    /// Camera has no decodable frame yet; not an error.
    SkippedNotReady,
    /// The channel refused the frame; it is discarded, never retried.
    DroppedBusy,
    /// The channel left `Open`; production stops until a fresh channel.
    ChannelNotOpen,
}

/// Samples, encodes, and sends at most one frame per tick. Backpressure is
/// most-recent-attempt, drop-on-busy: a refused frame is discarded and the
/// next tick samples fresh.
pub struct CaptureScheduler {
    encoder:        JpegEncoder,
    frames_sent:    u64,
    frames_dropped: u64,
    ticks_skipped:  u64,
}

impl CaptureScheduler {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            encoder: JpegEncoder::new(jpeg_quality),
            frames_sent: 0,
            frames_dropped: 0,
            ticks_skipped: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped
    }

    /// Run one qualifying tick. Sampling and encoding happen synchronously
    /// within the tick, so a tick's frame never interleaves with another's.
    pub async fn run_tick<S: FrameSource, K: FrameSink>(
        &mut self,
        source: &mut S,
        sink: &mut K,
    ) -> TickOutcome {
        if !sink.state().is_open() {
            return TickOutcome::ChannelNotOpen;
        }
        let Some(frame) = source.sample() else {
            self.ticks_skipped += 1;
            return TickOutcome::SkippedNotReady;
        };
        let still = match self.encoder.encode(&frame) {
            Ok(still) => still,
            Err(e) => {
                warn!("frame encode failed: {e}");
                self.ticks_skipped += 1;
                return TickOutcome::SkippedNotReady;
            }
        };
        match sink.send(&still).await {
            SendOutcome::Sent => {
                self.frames_sent += 1;
                TickOutcome::Sent
            }
            SendOutcome::Dropped => {
                self.frames_dropped += 1;
                debug!("frame dropped (channel busy or not open)");
                TickOutcome::DroppedBusy
            }
        }
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

/// Live status snapshot sent by the pipeline task to the presentation layer.
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub phase: LifecyclePhase,
    /// Instantaneous outbound frames per second.
    pub fps: f32,
    pub frames_sent:    u64,
    pub frames_dropped: u64,
    pub note: Option<String>,
}

// ── FeedPipeline ──────────────────────────────────────────────────────────────

/// Handle to a running feed pipeline task.
pub struct FeedPipeline {
    stop_tx: mpsc::Sender<()>,
    frames_sent: Arc<AtomicU64>,
    handle: tokio::task::JoinHandle<()>,
}

impl FeedPipeline {
    /// Spawn the capture → encode → relay pipeline.
    ///
    /// Returns the handle plus a watch cell carrying the latest
    /// [`FeedView`]. The pipeline runs until [`stop`](Self::stop).
    pub fn spawn(
        config: ConsoleConfig,
        status_tx: mpsc::Sender<PipelineStatus>,
    ) -> (Self, watch::Receiver<FeedView>) {
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let (view_tx, view_rx) = watch::channel(FeedView::default());
        let frames_sent = Arc::new(AtomicU64::new(0));
        let fs = Arc::clone(&frames_sent);

        let handle = tokio::spawn(run_pipeline(config, stop_rx, status_tx, view_tx, fs));

        (Self { stop_tx, frames_sent, handle }, view_rx)
    }

    /// Request graceful teardown (non-blocking). Safe to call repeatedly.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Wait for the pipeline task to finish tearing down.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

// ── Pipeline task ─────────────────────────────────────────────────────────────

fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource + Send>, TomatError> {
    #[cfg(feature = "camera-gstreamer")]
    {
        return tomat_capture::Camera::open(config)
            .map(|camera| Box::new(camera) as Box<dyn FrameSource + Send>);
    }
    #[cfg(all(not(feature = "camera-gstreamer"), feature = "stub-camera"))]
    {
        info!("no camera backend; producing synthetic frames");
        return Ok(Box::new(tomat_capture::StubSource::new(
            config.width,
            config.height,
        )));
    }
    #[cfg(all(not(feature = "camera-gstreamer"), not(feature = "stub-camera")))]
    {
        let _ = config;
        Err(TomatError::CameraUnavailable {
            reason: "no camera backend compiled in (enable the camera-gstreamer feature)"
                .to_owned(),
        })
    }
}

async fn run_pipeline(
    config: ConsoleConfig,
    mut stop_rx: mpsc::Receiver<()>,
    status_tx: mpsc::Sender<PipelineStatus>,
    view_tx: watch::Sender<FeedView>,
    frames_sent: Arc<AtomicU64>,
) {
    let mut lifecycle: Lifecycle<Box<dyn FrameSource + Send>, FeedSender> = Lifecycle::new();
    let mut scheduler = CaptureScheduler::new(config.feed.jpeg_quality);
    let mut note: Option<String> = None;

    macro_rules! send_status {
        ($phase:expr, $fps:expr) => {
            let _ = status_tx.try_send(PipelineStatus {
                phase: $phase,
                fps: $fps,
                frames_sent: scheduler.frames_sent(),
                frames_dropped: scheduler.frames_dropped(),
                note: note.clone(),
            });
        };
    }

    lifecycle.begin_init();
    send_status!(LifecyclePhase::Initializing, 0.0);

    // Camera and channel come up concurrently; neither depends on the
    // other's success.
    let (camera, channel) = tokio::join!(
        async { open_camera(&config.feed.camera) },
        FeedChannel::open(&config.endpoints.video_url)
    );

    lifecycle.camera_attached(camera);
    if let Some(reason) = lifecycle.blocked_reason() {
        let reason = reason.to_owned();
        note = Some(format!("Error: could not access camera ({reason})"));
        view_tx.send_modify(|v| v.camera_blocked = Some(reason));
    }

    let mut inbound = match channel {
        Ok(channel) => {
            let (sender, inbound_rx) = channel.start_recv_loop();
            lifecycle.channel_attached(sender);
            Some(inbound_rx)
        }
        Err(e) => {
            warn!("video channel connect failed: {e:#}");
            note = Some("WebSocket connection error.".to_owned());
            view_tx.send_modify(|v| v.status = Some("WebSocket connection error.".to_owned()));
            None
        }
    };
    send_status!(lifecycle.phase(), 0.0);

    let mut ticker = tokio::time::interval(config.feed.frame_interval());
    // Late ticks are skipped, never bunched — the frame budget is a cap.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_ticker = tokio::time::interval(Duration::from_secs(1));
    let mut fps_counter = FpsCounter::new();
    let mut channel_down_reported = false;

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                info!("stop requested");
                break;
            }

            _ = ticker.tick() => {
                if !lifecycle.tick_permitted() {
                    continue;
                }
                let (source, sink) = lifecycle.parts();
                let (Some(source), Some(sink)) = (source, sink) else {
                    continue;
                };
                match scheduler.run_tick(source, sink).await {
                    TickOutcome::Sent => {
                        frames_sent.fetch_add(1, Ordering::Relaxed);
                        fps_counter.tick();
                    }
                    TickOutcome::ChannelNotOpen => {
                        if !channel_down_reported {
                            channel_down_reported = true;
                            warn!("video channel left open state; frame production stopped");
                            note = Some("Connection closed.".to_owned());
                            view_tx.send_modify(|v| {
                                v.status = Some("Connection closed.".to_owned())
                            });
                        }
                    }
                    TickOutcome::SkippedNotReady | TickOutcome::DroppedBusy => {}
                }
            }

            msg = recv_inbound(&mut inbound) => {
                match msg {
                    Some(msg) => view_tx.send_modify(|v| v.apply(msg)),
                    // Receive loop ended; the channel state watch already
                    // reflects Closed/Failed, so just stop polling.
                    None => inbound = None,
                }
            }

            _ = status_ticker.tick() => {
                send_status!(lifecycle.phase(), fps_counter.fps());
            }
        }
    }

    // Teardown: the ticker and any pending tick die with this loop, then
    // the channel closes, then the camera is released.
    send_status!(LifecyclePhase::Terminating, 0.0);
    lifecycle.teardown().await;
    send_status!(LifecyclePhase::Terminated, 0.0);
}

async fn recv_inbound(rx: &mut Option<mpsc::Receiver<FeedMessage>>) -> Option<FeedMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Rolling ~1 second FPS counter.
struct FpsCounter {
    count: u32,
    window_start: std::time::Instant,
    last_fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: std::time::Instant::now(),
            last_fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.count += 1;
    }

    /// Returns the FPS over the last ~1 second window; resets the counter.
    fn fps(&mut self) -> f32 {
        let elapsed = self.window_start.elapsed().as_secs_f32();
        if elapsed >= 0.5 {
            self.last_fps = self.count as f32 / elapsed;
            self.count = 0;
            self.window_start = std::time::Instant::now();
        }
        self.last_fps
    }
}
