//! Media capture ports
//!
//! Abstracts the platform's camera surface behind backend traits so the
//! acquisition flow can run against real platform glue or the scripted
//! fake in [`fake`]:
//! - [`MediaBackend`]: capability check, device probe, stream negotiation
//! - [`MediaStream`]: a negotiated stream whose tracks must be stopped
//!   before the handle is discarded

pub mod fake;

use async_trait::async_trait;
use bytes::Bytes;

/// Camera facing preference in a constraint profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Prefer the rear-facing (environment) camera.
    Rear,
    /// Any available camera.
    Any,
}

/// A ranked set of requested video-capture parameters offered to the
/// platform's camera negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintProfile {
    pub facing: Facing,
    /// Ideal resolution, bounded by the device maximum. None = no preference.
    pub ideal: Option<(u32, u32)>,
}

impl ConstraintProfile {
    /// Rear-facing camera at ideal 1280x720.
    pub fn rear_hd() -> Self {
        Self {
            facing: Facing::Rear,
            ideal: Some((1280, 720)),
        }
    }

    /// Any camera at ideal 1280x720.
    pub fn any_hd() -> Self {
        Self {
            facing: Facing::Any,
            ideal: Some((1280, 720)),
        }
    }

    /// Any camera at ideal 640x480.
    pub fn any_sd() -> Self {
        Self {
            facing: Facing::Any,
            ideal: Some((640, 480)),
        }
    }

    /// Any camera, no resolution preference.
    pub fn any() -> Self {
        Self {
            facing: Facing::Any,
            ideal: None,
        }
    }
}

/// A video input device reported by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInput {
    pub id: String,
    pub label: String,
}

/// Result of a device probe.
///
/// `Unknown` means the platform cannot enumerate devices at all; callers
/// assume a camera may be available and proceed to negotiation.
#[derive(Debug, Clone)]
pub enum Probe {
    Devices(Vec<VideoInput>),
    Unknown,
}

/// Negotiation and stream failures reported by the platform backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no suitable camera device")]
    NotFound,
    #[error("camera is in use or unreadable")]
    Busy,
    #[error("constraints cannot be satisfied")]
    Overconstrained,
    #[error("camera access blocked by security policy")]
    SecurityBlocked,
    #[error("stream has ended")]
    Ended,
    #[error("{0}")]
    Other(String),
}

/// Platform camera surface.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Whether the platform exposes media capture at all.
    fn is_supported(&self) -> bool;

    /// Probe available video inputs.
    async fn list_video_inputs(&self) -> Probe;

    /// Negotiate a stream satisfying the given constraint profile.
    async fn open_stream(
        &self,
        profile: &ConstraintProfile,
    ) -> Result<Box<dyn MediaStream>, StreamError>;
}

/// A negotiated video stream attached to a display sink.
#[async_trait]
pub trait MediaStream: Send + Sync {
    /// Resolves once the sink reports frames are flowing.
    async fn ready(&mut self) -> Result<(), StreamError>;

    /// Native resolution of the negotiated stream.
    fn resolution(&self) -> (u32, u32);

    /// Encode the current frame as JPEG at `quality` (0.0-1.0), sized to
    /// the native resolution.
    async fn capture_frame(&mut self, quality: f32) -> Result<Bytes, StreamError>;

    /// Stop every acquired track. Idempotent.
    fn stop(&mut self);

    /// True once all tracks are stopped.
    fn is_stopped(&self) -> bool;
}
