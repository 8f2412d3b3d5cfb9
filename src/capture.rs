//! Captured image artifacts
//!
//! The capture pipeline freezes a camera frame (or accepts a picked file)
//! into an immutable artifact: the encoded payload plus a data-URL
//! preview for display.

use anyhow::{ensure, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;

/// JPEG quality used when freezing a camera frame.
pub const CAPTURE_QUALITY: f32 = 0.8;

/// An immutable captured or uploaded image: the binary payload and its
/// renderable preview form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub payload: Bytes,
    pub mime: String,
    /// `data:<mime>;base64,<payload>` preview string.
    pub preview: String,
}

impl ImageArtifact {
    pub fn new(payload: Bytes, mime: &str) -> Self {
        let preview = format!("data:{};base64,{}", mime, BASE64.encode(&payload));
        Self {
            payload,
            mime: mime.to_string(),
            preview,
        }
    }

    /// Artifact for a frame captured from the camera (always JPEG).
    pub fn from_jpeg(payload: Bytes) -> Self {
        Self::new(payload, "image/jpeg")
    }

    /// Artifact for a user-picked file. Non-image MIME types are rejected
    /// up front; the identification service only accepts images.
    pub fn from_file(payload: Vec<u8>, mime: &str) -> Result<Self> {
        ensure!(
            mime.starts_with("image/"),
            "selected file is not an image: {mime}"
        );
        Ok(Self::new(Bytes::from(payload), mime))
    }
}
