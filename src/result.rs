//! Identification data model
//!
//! Structured records returned by the identification service. Results are
//! immutable once returned; missing `id`/`timestamp` fields are assigned
//! client-side by the identification client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service confidence in an identification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "High"),
            Confidence::Medium => write!(f, "Medium"),
            Confidence::Low => write!(f, "Low"),
        }
    }
}

/// A single flower identification returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationResult {
    /// Assigned by the service, or client-side when absent.
    #[serde(default)]
    pub id: String,
    pub flower_name: String,
    pub scientific_name: String,
    pub family: String,
    pub basic_facts: String,
    pub care_instructions: String,
    pub symbolic_meanings: String,
    pub cultivation_tips: String,
    pub seasonal_info: String,
    pub interesting_story: String,
    pub confidence: Confidence,
    /// RFC 3339; assigned client-side when absent.
    #[serde(default)]
    pub timestamp: String,
}

/// Authenticated user profile. Never persisted; re-fetched on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}
