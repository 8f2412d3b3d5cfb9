//! Camera acquisition state machine
//!
//! Negotiates a working video stream across a ranked list of constraint
//! profiles, falling back to looser profiles until one succeeds.
//! Intermediate failures are expected fallback noise; only the last
//! profile's failure is surfaced, classified into a closed taxonomy with
//! fixed remediation text.
//!
//! Every exit path — capture, cancel, error, drop — stops every acquired
//! track: no stream handle outlives the acquisition that opened it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::capture::{ImageArtifact, CAPTURE_QUALITY};
use crate::media::{ConstraintProfile, MediaBackend, MediaStream, Probe, StreamError};

/// How long to wait for the display sink to become ready after
/// negotiation succeeds before declaring the stream dead.
pub const SINK_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Classified camera failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraErrorKind {
    Unsupported,
    NoDevice,
    PermissionDenied,
    DeviceBusy,
    Overconstrained,
    SecurityBlocked,
    Timeout,
    Unknown,
}

impl CameraErrorKind {
    /// Fixed remediation text shown to the user for this kind.
    pub fn remediation(self) -> &'static str {
        match self {
            CameraErrorKind::Unsupported => {
                "Camera capture is not supported here. Upload a photo instead."
            }
            CameraErrorKind::NoDevice => {
                "No camera was found on this device. Upload a photo instead."
            }
            CameraErrorKind::PermissionDenied => {
                "Unable to access camera. Please ensure camera permissions are granted."
            }
            CameraErrorKind::DeviceBusy => {
                "The camera is in use by another application. Close it and try again."
            }
            CameraErrorKind::Overconstrained => {
                "The camera does not support the requested settings. Try again or upload a photo."
            }
            CameraErrorKind::SecurityBlocked => {
                "Camera access is blocked in this context. Use a secure connection and try again."
            }
            CameraErrorKind::Timeout => {
                "The camera started but never produced a picture. Try again or upload a photo."
            }
            CameraErrorKind::Unknown => "Could not start the camera. Try again or upload a photo.",
        }
    }

    fn classify(error: &StreamError) -> Self {
        match error {
            StreamError::PermissionDenied => CameraErrorKind::PermissionDenied,
            StreamError::NotFound => CameraErrorKind::NoDevice,
            StreamError::Busy => CameraErrorKind::DeviceBusy,
            StreamError::Overconstrained => CameraErrorKind::Overconstrained,
            StreamError::SecurityBlocked => CameraErrorKind::SecurityBlocked,
            StreamError::Ended | StreamError::Other(_) => CameraErrorKind::Unknown,
        }
    }
}

impl fmt::Display for CameraErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraErrorKind::Unsupported => "Unsupported",
            CameraErrorKind::NoDevice => "NoDevice",
            CameraErrorKind::PermissionDenied => "PermissionDenied",
            CameraErrorKind::DeviceBusy => "DeviceBusy",
            CameraErrorKind::Overconstrained => "Overconstrained",
            CameraErrorKind::SecurityBlocked => "SecurityBlocked",
            CameraErrorKind::Timeout => "Timeout",
            CameraErrorKind::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// A classified camera failure plus the underlying reason text. When
/// every profile in the ladder fails, `reason` is the LAST profile's
/// failure — earlier failures are suppressed as fallback noise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraError {
    pub kind: CameraErrorKind,
    pub reason: String,
}

impl CameraError {
    fn new(kind: CameraErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn remediation(&self) -> &'static str {
        self.kind.remediation()
    }
}

/// Acquisition states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    Probing,
    Negotiating { profile: usize },
    Streaming,
    Error(CameraError),
}

/// The ranked constraint ladder, most specific first. Negotiation stops
/// at the first profile that succeeds.
pub fn fallback_ladder() -> [ConstraintProfile; 4] {
    [
        ConstraintProfile::rear_hd(),
        ConstraintProfile::any_hd(),
        ConstraintProfile::any_sd(),
        ConstraintProfile::any(),
    ]
}

struct Inner {
    state: CameraState,
    stream: Option<Box<dyn MediaStream>>,
}

/// Camera acquisition: probe, negotiate, stream, capture, tear down.
///
/// A generation counter is bumped on every `start` and `cancel`; any
/// completion carrying a stale generation stops whatever it acquired and
/// makes no state transition, so a late callback can never resurrect a
/// torn-down stream.
pub struct CameraAcquisition {
    backend: Arc<dyn MediaBackend>,
    inner: Mutex<Inner>,
    generation: AtomicU64,
}

impl CameraAcquisition {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            inner: Mutex::new(Inner {
                state: CameraState::Idle,
                stream: None,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> CameraState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Run the acquisition flow to completion: probe devices, walk the
    /// constraint ladder, attach the first stream that negotiates, and
    /// wait for the sink to become ready. Returns the resulting state.
    pub async fn start(&self) -> CameraState {
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // A restart supersedes any previous attempt; release its stream
        // before acquiring anew.
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(mut stream) = inner.stream.take() {
                stream.stop();
            }
        }

        if !self.backend.is_supported() {
            warn!("platform exposes no media capture capability");
            self.transition(
                gen,
                CameraState::Error(CameraError::new(
                    CameraErrorKind::Unsupported,
                    "media capture unavailable",
                )),
            );
            return self.state();
        }

        if !self.transition(gen, CameraState::Probing) {
            return self.state();
        }

        match self.backend.list_video_inputs().await {
            Probe::Devices(devices) if devices.is_empty() => {
                // Negotiation would only reproduce the failure with worse
                // latency; fail fast.
                warn!("probe found zero video input devices");
                self.transition(
                    gen,
                    CameraState::Error(CameraError::new(
                        CameraErrorKind::NoDevice,
                        "no video input devices",
                    )),
                );
                return self.state();
            }
            Probe::Devices(devices) => {
                debug!(count = devices.len(), "video inputs enumerated");
            }
            Probe::Unknown => {
                debug!("device enumeration unavailable, assuming a camera is present");
            }
        }

        let ladder = fallback_ladder();
        let mut stream = None;
        let mut last_error = StreamError::Other("no constraint profile attempted".into());

        for (i, profile) in ladder.iter().enumerate() {
            if !self.transition(gen, CameraState::Negotiating { profile: i }) {
                return self.state();
            }
            match self.backend.open_stream(profile).await {
                Ok(s) => {
                    info!(profile = i, "camera stream negotiated");
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!(profile = i, error = %e, "constraint profile failed, falling back");
                    last_error = e;
                }
            }
        }

        let Some(mut stream) = stream else {
            let kind = CameraErrorKind::classify(&last_error);
            warn!(error = %last_error, %kind, "camera negotiation exhausted all profiles");
            self.transition(
                gen,
                CameraState::Error(CameraError::new(kind, last_error.to_string())),
            );
            return self.state();
        };

        if !self.transition(gen, CameraState::Streaming) {
            stream.stop();
            return self.state();
        }

        // The sink may never load metadata (dead driver, hung pipeline);
        // bound the wait and tear down on expiry.
        match tokio::time::timeout(SINK_READY_TIMEOUT, stream.ready()).await {
            Ok(Ok(())) => {
                if self.attach(gen, stream) {
                    debug!("camera sink ready");
                } else {
                    debug!("acquisition superseded before sink became ready");
                }
            }
            Ok(Err(e)) => {
                stream.stop();
                let kind = CameraErrorKind::classify(&e);
                warn!(error = %e, "camera stream failed before sink became ready");
                self.transition(
                    gen,
                    CameraState::Error(CameraError::new(kind, e.to_string())),
                );
            }
            Err(_) => {
                stream.stop();
                warn!(
                    timeout_secs = SINK_READY_TIMEOUT.as_secs(),
                    "sink never became ready, tearing down"
                );
                self.transition(
                    gen,
                    CameraState::Error(CameraError::new(
                        CameraErrorKind::Timeout,
                        "sink not ready within timeout",
                    )),
                );
            }
        }

        self.state()
    }

    /// Freeze the current frame into an image artifact, then tear the
    /// acquisition down — the stream is never needed after a capture.
    pub async fn capture(&self) -> anyhow::Result<ImageArtifact> {
        let gen = self.generation.load(Ordering::SeqCst);
        let mut stream = {
            let mut inner = self.inner.lock().unwrap();
            match inner.stream.take() {
                Some(s) => s,
                None => anyhow::bail!("no active camera stream to capture from"),
            }
        };

        let frame = stream.capture_frame(CAPTURE_QUALITY).await;
        stream.stop();
        self.transition(gen, CameraState::Idle);

        let frame = frame?;
        if self.generation.load(Ordering::SeqCst) != gen {
            anyhow::bail!("camera capture canceled");
        }
        info!(bytes = frame.len(), "frame captured");
        Ok(ImageArtifact::from_jpeg(frame))
    }

    /// Cancel any acquisition in progress and release all tracks.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut stream) = inner.stream.take() {
            stream.stop();
        }
        inner.state = CameraState::Idle;
    }

    /// Recovery action: tear down any partial stream and hand control to
    /// the file-selection path.
    pub fn fallback_to_file_upload(&self) {
        info!("falling back to file upload");
        self.cancel();
    }

    /// Apply a state transition unless the attempt has been superseded.
    fn transition(&self, gen: u64, next: CameraState) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if self.generation.load(Ordering::SeqCst) != gen {
            return false;
        }
        inner.state = next;
        true
    }

    /// Attach the negotiated stream unless the attempt has been
    /// superseded; a stale stream is stopped by the caller.
    fn attach(&self, gen: u64, stream: Box<dyn MediaStream>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if self.generation.load(Ordering::SeqCst) != gen {
            drop(inner);
            let mut stream = stream;
            stream.stop();
            return false;
        }
        inner.stream = Some(stream);
        true
    }
}

impl Drop for CameraAcquisition {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(mut stream) = inner.stream.take() {
                stream.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fake::{FakeMedia, FakeStreamConfig};
    use crate::media::Facing;

    fn acquisition(media: &Arc<FakeMedia>) -> CameraAcquisition {
        CameraAcquisition::new(media.clone() as Arc<dyn MediaBackend>)
    }

    // ========== Probe fast paths ==========

    #[tokio::test]
    async fn unsupported_platform_errors_without_probe() {
        let media = Arc::new(FakeMedia::unsupported());
        let camera = acquisition(&media);

        let state = camera.start().await;
        match state {
            CameraState::Error(err) => assert_eq!(err.kind, CameraErrorKind::Unsupported),
            other => panic!("expected Unsupported error, got {other:?}"),
        }
        assert!(media.attempts().is_empty());
    }

    #[tokio::test]
    async fn no_devices_skips_negotiation() {
        let media = Arc::new(FakeMedia::no_devices());
        let camera = acquisition(&media);

        let state = camera.start().await;
        match &state {
            CameraState::Error(err) => {
                assert_eq!(err.kind, CameraErrorKind::NoDevice);
                assert!(err.remediation().contains("No camera"));
            }
            other => panic!("expected NoDevice error, got {other:?}"),
        }
        // Zero negotiation attempts — fast fail
        assert!(media.attempts().is_empty());
    }

    #[tokio::test]
    async fn unknown_probe_proceeds_to_negotiation() {
        let media = Arc::new(FakeMedia::new());
        let camera = acquisition(&media);

        assert_eq!(camera.start().await, CameraState::Streaming);
        assert_eq!(media.attempts().len(), 1);
    }

    // ========== Constraint ladder ==========

    #[test]
    fn ladder_is_most_specific_first() {
        let ladder = fallback_ladder();
        assert_eq!(ladder[0].facing, Facing::Rear);
        assert_eq!(ladder[0].ideal, Some((1280, 720)));
        assert_eq!(ladder[1].facing, Facing::Any);
        assert_eq!(ladder[1].ideal, Some((1280, 720)));
        assert_eq!(ladder[2].ideal, Some((640, 480)));
        assert_eq!(ladder[3].ideal, None);
    }

    #[tokio::test]
    async fn first_success_stops_the_ladder() {
        let media = Arc::new(FakeMedia::with_devices(1));
        let camera = acquisition(&media);

        assert_eq!(camera.start().await, CameraState::Streaming);
        assert_eq!(media.attempts().len(), 1);
        assert_eq!(media.attempts()[0], ConstraintProfile::rear_hd());
    }

    #[tokio::test]
    async fn overconstrained_falls_back_to_next_profile() {
        let media = Arc::new(FakeMedia::with_devices(1));
        media.queue_fail(StreamError::Overconstrained);
        media.queue_ok(FakeStreamConfig::default());
        let camera = acquisition(&media);

        // Profile 1 fails, profile 2 succeeds — no error surfaced
        assert_eq!(camera.start().await, CameraState::Streaming);
        assert_eq!(media.attempts().len(), 2);
        assert_eq!(media.attempts()[1], ConstraintProfile::any_hd());
    }

    #[tokio::test]
    async fn all_failures_surface_only_the_last_reason() {
        let media = Arc::new(FakeMedia::with_devices(1));
        media.queue_fail(StreamError::Overconstrained);
        media.queue_fail(StreamError::Overconstrained);
        media.queue_fail(StreamError::Busy);
        media.queue_fail(StreamError::PermissionDenied);
        let camera = acquisition(&media);

        let state = camera.start().await;
        match state {
            CameraState::Error(err) => {
                assert_eq!(err.kind, CameraErrorKind::PermissionDenied);
                assert_eq!(err.reason, StreamError::PermissionDenied.to_string());
            }
            other => panic!("expected PermissionDenied error, got {other:?}"),
        }
        assert_eq!(media.attempts().len(), 4);
    }

    // ========== Sink readiness ==========

    #[tokio::test(start_paused = true)]
    async fn sink_timeout_tears_down_the_stream() {
        let media = Arc::new(FakeMedia::new());
        media.queue_ok(FakeStreamConfig {
            ready_after: SINK_READY_TIMEOUT + Duration::from_secs(5),
            ..Default::default()
        });
        let camera = acquisition(&media);

        let state = camera.start().await;
        match state {
            CameraState::Error(err) => assert_eq!(err.kind, CameraErrorKind::Timeout),
            other => panic!("expected Timeout error, got {other:?}"),
        }
        assert!(media.all_tracks_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_but_ready_sink_streams() {
        let media = Arc::new(FakeMedia::new());
        media.queue_ok(FakeStreamConfig {
            ready_after: Duration::from_secs(3),
            ..Default::default()
        });
        let camera = acquisition(&media);

        assert_eq!(camera.start().await, CameraState::Streaming);
        assert!(!media.all_tracks_stopped());
        camera.cancel();
        assert!(media.all_tracks_stopped());
    }

    // ========== Teardown discipline ==========

    #[tokio::test]
    async fn cancel_stops_all_tracks() {
        let media = Arc::new(FakeMedia::new());
        let camera = acquisition(&media);

        assert_eq!(camera.start().await, CameraState::Streaming);
        camera.cancel();
        assert_eq!(camera.state(), CameraState::Idle);
        assert!(media.all_tracks_stopped());
    }

    #[tokio::test]
    async fn capture_produces_artifact_and_tears_down() {
        let media = Arc::new(FakeMedia::new());
        let camera = acquisition(&media);

        assert_eq!(camera.start().await, CameraState::Streaming);
        let artifact = camera.capture().await.unwrap();
        assert!(!artifact.payload.is_empty());
        assert!(artifact.preview.starts_with("data:image/jpeg;base64,"));

        assert_eq!(camera.state(), CameraState::Idle);
        assert!(media.all_tracks_stopped());
        assert_eq!(media.capture_qualities(), vec![CAPTURE_QUALITY]);
    }

    #[tokio::test]
    async fn capture_without_stream_fails() {
        let media = Arc::new(FakeMedia::new());
        let camera = acquisition(&media);
        assert!(camera.capture().await.is_err());
    }

    #[tokio::test]
    async fn drop_stops_all_tracks() {
        let media = Arc::new(FakeMedia::new());
        {
            let camera = acquisition(&media);
            assert_eq!(camera.start().await, CameraState::Streaming);
        }
        assert!(media.all_tracks_stopped());
    }

    #[tokio::test]
    async fn fallback_to_file_upload_tears_down() {
        let media = Arc::new(FakeMedia::new());
        let camera = acquisition(&media);

        assert_eq!(camera.start().await, CameraState::Streaming);
        camera.fallback_to_file_upload();
        assert_eq!(camera.state(), CameraState::Idle);
        assert!(media.all_tracks_stopped());
    }

    // ========== Stale callbacks ==========

    #[tokio::test(start_paused = true)]
    async fn cancel_during_ready_wait_discards_the_stream() {
        let media = Arc::new(FakeMedia::new());
        media.queue_ok(FakeStreamConfig {
            ready_after: Duration::from_secs(5),
            ..Default::default()
        });
        let camera = Arc::new(acquisition(&media));

        let task = tokio::spawn({
            let camera = camera.clone();
            async move { camera.start().await }
        });

        // Let the start task reach the ready wait, then cancel under it
        tokio::time::sleep(Duration::from_secs(1)).await;
        camera.cancel();

        let end = task.await.unwrap();
        assert_eq!(end, CameraState::Idle);
        assert!(media.all_tracks_stopped());
    }

    #[tokio::test]
    async fn restart_supersedes_previous_attempt() {
        let media = Arc::new(FakeMedia::new());
        let camera = acquisition(&media);

        assert_eq!(camera.start().await, CameraState::Streaming);
        // Second start tears down the first stream before acquiring anew
        assert_eq!(camera.start().await, CameraState::Streaming);
        assert_eq!(media.streams_opened(), 2);
        assert_eq!(media.tracks_stopped(), vec![true, false]);

        camera.cancel();
        assert!(media.all_tracks_stopped());
    }

    // ========== Remediation mapping ==========

    #[test]
    fn every_kind_has_fixed_remediation() {
        let kinds = [
            CameraErrorKind::Unsupported,
            CameraErrorKind::NoDevice,
            CameraErrorKind::PermissionDenied,
            CameraErrorKind::DeviceBusy,
            CameraErrorKind::Overconstrained,
            CameraErrorKind::SecurityBlocked,
            CameraErrorKind::Timeout,
            CameraErrorKind::Unknown,
        ];
        for kind in kinds {
            assert!(!kind.remediation().is_empty());
        }
        assert_eq!(
            CameraErrorKind::PermissionDenied.remediation(),
            "Unable to access camera. Please ensure camera permissions are granted."
        );
    }

    #[test]
    fn stream_errors_classify_into_closed_taxonomy() {
        assert_eq!(
            CameraErrorKind::classify(&StreamError::PermissionDenied),
            CameraErrorKind::PermissionDenied
        );
        assert_eq!(
            CameraErrorKind::classify(&StreamError::NotFound),
            CameraErrorKind::NoDevice
        );
        assert_eq!(
            CameraErrorKind::classify(&StreamError::Busy),
            CameraErrorKind::DeviceBusy
        );
        assert_eq!(
            CameraErrorKind::classify(&StreamError::Overconstrained),
            CameraErrorKind::Overconstrained
        );
        assert_eq!(
            CameraErrorKind::classify(&StreamError::SecurityBlocked),
            CameraErrorKind::SecurityBlocked
        );
        assert_eq!(
            CameraErrorKind::classify(&StreamError::Other("boom".into())),
            CameraErrorKind::Unknown
        );
    }
}
