//! Scripted media backend
//!
//! Deterministic [`MediaBackend`] for development and tests without camera
//! hardware. Each `open_stream` call consumes the next scripted outcome
//! (an empty script always succeeds with defaults), and every negotiation
//! attempt and opened stream is recorded for assertions.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ConstraintProfile, MediaBackend, MediaStream, Probe, StreamError, VideoInput};

/// Minimal JPEG-shaped payload served as the captured frame.
const FAKE_FRAME: &[u8] = b"\xff\xd8\xff\xe0phool-fake-frame\xff\xd9";

/// Behavior of one scripted `open_stream` call.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    Open(FakeStreamConfig),
    Fail(StreamError),
}

/// Configuration for a scripted stream.
#[derive(Debug, Clone)]
pub struct FakeStreamConfig {
    pub width: u32,
    pub height: u32,
    /// Delay before the sink reports ready.
    pub ready_after: Duration,
    /// Payload returned by `capture_frame`.
    pub frame: Bytes,
}

impl Default for FakeStreamConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            ready_after: Duration::ZERO,
            frame: Bytes::from_static(FAKE_FRAME),
        }
    }
}

/// Scripted media backend.
pub struct FakeMedia {
    supported: bool,
    probe: Probe,
    outcomes: Mutex<VecDeque<OpenOutcome>>,
    attempts: Mutex<Vec<ConstraintProfile>>,
    tracks: Mutex<Vec<Arc<AtomicBool>>>,
    qualities: Arc<Mutex<Vec<f32>>>,
}

impl FakeMedia {
    /// Supported backend that cannot enumerate devices (probe unknown)
    /// and opens a default stream on every attempt.
    pub fn new() -> Self {
        Self {
            supported: true,
            probe: Probe::Unknown,
            outcomes: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
            tracks: Mutex::new(Vec::new()),
            qualities: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Platform without any media-capture capability.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Probe reports `count` video inputs.
    pub fn with_devices(count: usize) -> Self {
        let devices = (0..count)
            .map(|i| VideoInput {
                id: format!("camera-{i}"),
                label: format!("Fake Camera {i}"),
            })
            .collect();
        Self {
            probe: Probe::Devices(devices),
            ..Self::new()
        }
    }

    /// Probe reports an empty device list.
    pub fn no_devices() -> Self {
        Self {
            probe: Probe::Devices(Vec::new()),
            ..Self::new()
        }
    }

    /// Script the next `open_stream` call to succeed with `config`.
    pub fn queue_ok(&self, config: FakeStreamConfig) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(OpenOutcome::Open(config));
    }

    /// Script the next `open_stream` call to fail with `error`.
    pub fn queue_fail(&self, error: StreamError) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(OpenOutcome::Fail(error));
    }

    /// Constraint profiles attempted so far, in order.
    pub fn attempts(&self) -> Vec<ConstraintProfile> {
        self.attempts.lock().unwrap().clone()
    }

    /// True when every stream ever opened has had its tracks stopped.
    pub fn all_tracks_stopped(&self) -> bool {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .all(|t| t.load(Ordering::SeqCst))
    }

    /// Number of streams opened so far.
    pub fn streams_opened(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }

    /// Per-stream stopped flags, in open order.
    pub fn tracks_stopped(&self) -> Vec<bool> {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.load(Ordering::SeqCst))
            .collect()
    }

    /// Qualities passed to `capture_frame`, in order.
    pub fn capture_qualities(&self) -> Vec<f32> {
        self.qualities.lock().unwrap().clone()
    }
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaBackend for FakeMedia {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn list_video_inputs(&self) -> Probe {
        self.probe.clone()
    }

    async fn open_stream(
        &self,
        profile: &ConstraintProfile,
    ) -> Result<Box<dyn MediaStream>, StreamError> {
        self.attempts.lock().unwrap().push(*profile);

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| OpenOutcome::Open(FakeStreamConfig::default()));

        match outcome {
            OpenOutcome::Fail(error) => Err(error),
            OpenOutcome::Open(config) => {
                let stopped = Arc::new(AtomicBool::new(false));
                self.tracks.lock().unwrap().push(stopped.clone());
                Ok(Box::new(FakeStream {
                    config,
                    stopped,
                    qualities: self.qualities.clone(),
                }))
            }
        }
    }
}

struct FakeStream {
    config: FakeStreamConfig,
    stopped: Arc<AtomicBool>,
    qualities: Arc<Mutex<Vec<f32>>>,
}

#[async_trait]
impl MediaStream for FakeStream {
    async fn ready(&mut self) -> Result<(), StreamError> {
        if self.is_stopped() {
            return Err(StreamError::Ended);
        }
        if !self.config.ready_after.is_zero() {
            tokio::time::sleep(self.config.ready_after).await;
        }
        if self.is_stopped() {
            return Err(StreamError::Ended);
        }
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    async fn capture_frame(&mut self, quality: f32) -> Result<Bytes, StreamError> {
        if self.is_stopped() {
            return Err(StreamError::Ended);
        }
        self.qualities.lock().unwrap().push(quality);
        Ok(self.config.frame.clone())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
