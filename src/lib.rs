//! Phool — client core for a flower identification app
//!
//! A user photographs or uploads a flower; the image goes to a remote
//! identification service; the structured result lands in a capped,
//! persisted history. Presentation is an external collaborator that
//! receives the finished data model.
//!
//! - [`media`]: platform camera ports plus a scripted fake backend
//! - [`camera`]: acquisition state machine with constraint fallback
//! - [`capture`]: captured image artifacts
//! - [`identify`]: identification service client
//! - [`history`]: capped, persisted identification history
//! - [`store`]: key-value persistence port (file-backed and in-memory)
//! - [`session`]: auth token exchange, profile fetch, logout
//! - [`app`]: coordinator tying one capture/identify cycle together

pub mod app;
pub mod camera;
pub mod capture;
pub mod history;
pub mod identify;
pub mod media;
pub mod result;
pub mod session;
pub mod store;

pub use app::App;
pub use camera::{
    fallback_ladder, CameraAcquisition, CameraError, CameraErrorKind, CameraState,
    SINK_READY_TIMEOUT,
};
pub use capture::{ImageArtifact, CAPTURE_QUALITY};
pub use history::{HistoryStore, HISTORY_CAPACITY, HISTORY_KEY};
pub use identify::{IdentifyClient, IdentifyError};
pub use result::{Confidence, IdentificationResult, UserProfile};
pub use session::{
    extract_session_token, watch_popup, AuthClient, AuthError, PopupOutcome, Session,
    SessionManager, SESSION_KEY,
};
pub use store::{FileStore, MemoryStore, StateStore};

/// Header carrying the durable session credential on authenticated
/// requests.
pub const SESSION_HEADER: &str = "X-Session-ID";
