//! Identification client
//!
//! Uploads an image artifact to the identification service and returns
//! the structured result. Transport, status and parse failures all
//! collapse into a single user-facing category — identification is
//! user-initiated and idempotent, so retry policy is left to the user.

use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{info, warn};

use crate::capture::ImageArtifact;
use crate::result::IdentificationResult;
use crate::SESSION_HEADER;

/// Identification endpoint path, relative to the service base URL.
pub const IDENTIFY_PATH: &str = "/api/identify-flower";

/// Identification failure. The distinction between network, server and
/// parse failures is kept in the message for logs only.
#[derive(Debug, thiserror::Error)]
pub enum IdentifyError {
    #[error("identification failed: {0}")]
    NetworkOrServer(String),
}

impl IdentifyError {
    /// Fixed text shown to the user for any identification failure.
    pub const USER_MESSAGE: &'static str = "Failed to identify flower. Please try again.";
}

/// HTTP client for the identification service.
pub struct IdentifyClient {
    base_url: String,
    http: reqwest::Client,
}

impl IdentifyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(60))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit an artifact for identification. Sends the binary payload as
    /// multipart field `file`, with the session credential header when a
    /// session exists. Missing `id`/`timestamp` fields in the response
    /// are assigned here.
    pub async fn identify(
        &self,
        artifact: &ImageArtifact,
        credential: Option<&str>,
    ) -> Result<IdentificationResult, IdentifyError> {
        let url = format!("{}{}", self.base_url, IDENTIFY_PATH);

        let part = Part::bytes(artifact.payload.to_vec())
            .file_name("flower.jpg")
            .mime_str(&artifact.mime)
            .map_err(|e| IdentifyError::NetworkOrServer(format!("invalid mime type: {e}")))?;
        let form = Form::new().part("file", part);

        let mut request = self.http.post(&url).multipart(form);
        if let Some(credential) = credential {
            request = request.header(SESSION_HEADER, credential);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "identification request failed");
            IdentifyError::NetworkOrServer(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "identification service returned an error");
            return Err(IdentifyError::NetworkOrServer(format!(
                "service returned {status}"
            )));
        }

        let mut result: IdentificationResult = response.json().await.map_err(|e| {
            warn!(error = %e, "identification response did not parse");
            IdentifyError::NetworkOrServer(e.to_string())
        })?;

        if result.id.is_empty() {
            result.id = uuid::Uuid::new_v4().to_string();
        }
        if result.timestamp.is_empty() {
            result.timestamp = chrono::Utc::now().to_rfc3339();
        }

        info!(
            flower = %result.flower_name,
            confidence = %result.confidence,
            "flower identified"
        );
        Ok(result)
    }

    /// Reachability check against the service health endpoint.
    pub async fn health(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
