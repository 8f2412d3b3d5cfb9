//! Application coordinator
//!
//! Owns the single capture/identification cycle: which image is selected,
//! the current result, the user-visible error text, and the busy/reset
//! bookkeeping that keeps overlapping callbacks from corrupting state.
//! Camera and identification errors are converted into user-visible state
//! here — they never propagate uncaught.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::camera::{CameraAcquisition, CameraState};
use crate::capture::ImageArtifact;
use crate::history::HistoryStore;
use crate::identify::{IdentifyClient, IdentifyError};
use crate::media::MediaBackend;
use crate::result::IdentificationResult;
use crate::session::{AuthClient, SessionManager};
use crate::store::StateStore;

/// Coordinator for one capture/identification cycle at a time.
pub struct App {
    camera: CameraAcquisition,
    identify: IdentifyClient,
    history: HistoryStore,
    session: SessionManager,
    selected: RwLock<Option<ImageArtifact>>,
    result: RwLock<Option<IdentificationResult>>,
    error: RwLock<Option<String>>,
    identify_busy: AtomicBool,
    /// Bumped on reset; an identification resolving under a stale value
    /// is discarded entirely.
    view_generation: AtomicU64,
}

impl App {
    pub fn new(
        media: Arc<dyn MediaBackend>,
        store: Arc<dyn StateStore>,
        base_url: &str,
    ) -> Self {
        Self {
            camera: CameraAcquisition::new(media),
            identify: IdentifyClient::new(base_url),
            history: HistoryStore::new(store.clone()),
            session: SessionManager::new(AuthClient::new(base_url), store),
            selected: RwLock::new(None),
            result: RwLock::new(None),
            error: RwLock::new(None),
            identify_busy: AtomicBool::new(false),
            view_generation: AtomicU64::new(0),
        }
    }

    /// Load persisted history and restore any persisted session.
    pub async fn init(&self) {
        let entries = self.history.load().await;
        debug!(entries, "startup state loaded");
        if let Err(e) = self.session.restore().await {
            warn!(error = %e, "session restore incomplete");
        }
    }

    pub fn camera(&self) -> &CameraAcquisition {
        &self.camera
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn identify_client(&self) -> &IdentifyClient {
        &self.identify
    }

    /// Start the camera flow. A camera failure becomes user-visible
    /// remediation text rather than an error.
    pub async fn start_camera(&self) -> CameraState {
        *self.error.write().await = None;
        let state = self.camera.start().await;
        if let CameraState::Error(err) = &state {
            *self.error.write().await = Some(err.remediation().to_string());
        }
        state
    }

    /// Cancel the camera flow, releasing the stream.
    pub fn cancel_camera(&self) {
        self.camera.cancel();
    }

    /// Freeze a frame from the streaming camera into the selected image.
    /// The camera is torn down on completion.
    pub async fn capture_photo(&self) -> anyhow::Result<()> {
        let artifact = self.camera.capture().await?;
        *self.selected.write().await = Some(artifact);
        Ok(())
    }

    /// Use a picked file instead of the camera.
    pub async fn choose_file(&self, bytes: Vec<u8>, mime: &str) -> anyhow::Result<()> {
        let artifact = ImageArtifact::from_file(bytes, mime)?;
        self.camera.fallback_to_file_upload();
        *self.selected.write().await = Some(artifact);
        Ok(())
    }

    /// Identify the selected image. At most one request is in flight at a
    /// time (busy flag, not cancellation); a result resolving after a
    /// `reset` is discarded. Failures become user-visible state and are
    /// never retried automatically.
    pub async fn identify(&self) -> Result<Option<IdentificationResult>, IdentifyError> {
        let Some(artifact) = self.selected.read().await.clone() else {
            return Ok(None);
        };
        if self.identify_busy.swap(true, Ordering::SeqCst) {
            debug!("identification already in flight, ignoring trigger");
            return Ok(None);
        }

        let gen = self.view_generation.load(Ordering::SeqCst);
        *self.error.write().await = None;
        let credential = self.session.credential().await;

        let outcome = self.identify.identify(&artifact, credential.as_deref()).await;
        self.identify_busy.store(false, Ordering::SeqCst);

        if self.view_generation.load(Ordering::SeqCst) != gen {
            debug!("discarding identification outcome from a superseded view");
            return Ok(None);
        }

        match outcome {
            Ok(result) => {
                *self.result.write().await = Some(result.clone());
                if let Err(e) = self.history.append(result.clone()).await {
                    warn!(error = %e, "failed to persist history");
                }
                Ok(Some(result))
            }
            Err(e) => {
                *self.error.write().await = Some(IdentifyError::USER_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    /// Clear the cycle: selected image, result, error, camera. An
    /// in-flight identification keeps running but its outcome is
    /// discarded when it resolves.
    pub async fn reset(&self) {
        self.view_generation.fetch_add(1, Ordering::SeqCst);
        self.camera.cancel();
        *self.selected.write().await = None;
        *self.result.write().await = None;
        *self.error.write().await = None;
    }

    pub async fn selected_image(&self) -> Option<ImageArtifact> {
        self.selected.read().await.clone()
    }

    pub async fn current_result(&self) -> Option<IdentificationResult> {
        self.result.read().await.clone()
    }

    /// User-visible error text, if any: camera remediation or the fixed
    /// identification failure message.
    pub async fn last_error(&self) -> Option<String> {
        self.error.read().await.clone()
    }
}
