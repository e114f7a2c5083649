//! Entries of the artifact listing (`GET /api/videos`).

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A finished, downloadable video file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name; unique within the listing and used as the download key.
    pub name: String,
    /// Size in bytes.
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            created_at: None,
        }
    }

    /// Size in mebibytes, for display.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    pub fn created_at(&self) -> Option<Timestamp> {
        self.created_at.as_deref().and_then(|s| s.parse().ok())
    }
}
