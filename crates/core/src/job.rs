//! Job identity and the status payload reported by `GET /api/status/{id}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Backend-assigned identifier of one generation job.
///
/// Opaque to the client: it is only ever echoed back in status requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_id)
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

pub const STATE_QUEUED: &str = "queued";
pub const STATE_RUNNING: &str = "running";
pub const STATE_COMPLETED: &str = "completed";
pub const STATE_ERROR: &str = "error";

/// Lifecycle label of a job as reported by the backend.
///
/// Labels the client does not know are kept verbatim in [`JobState::Other`]
/// and are never terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Error,
    Other(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Queued => STATE_QUEUED,
            JobState::Running => STATE_RUNNING,
            JobState::Completed => STATE_COMPLETED,
            JobState::Error => STATE_ERROR,
            JobState::Other(label) => label,
        }
    }

    /// `completed` and `error` end the job; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }
}

impl From<String> for JobState {
    fn from(label: String) -> Self {
        match label.as_str() {
            STATE_QUEUED => JobState::Queued,
            STATE_RUNNING => JobState::Running,
            STATE_COMPLETED => JobState::Completed,
            STATE_ERROR => JobState::Error,
            _ => JobState::Other(label),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// One status snapshot for a job.
///
/// Always replaced as a whole by the next snapshot; fields the backend
/// omits are absent rather than carried over from an earlier poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    /// Completion percentage as reported (nominally 0-100).
    #[serde(default)]
    pub progress: f64,
    /// Human-readable description of the current phase.
    #[serde(default)]
    pub phase: String,
    /// Artifact name of the finished video. Only set once `completed`.
    #[serde(default)]
    pub video_path: Option<String>,
    /// Failure description. Only set once `error`.
    #[serde(default)]
    pub error: Option<String>,

    // Request echo fields. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl JobStatus {
    /// Minimal status with only the required fields set.
    pub fn new(status: JobState, progress: f64, phase: impl Into<String>) -> Self {
        Self {
            status,
            progress,
            phase: phase.into(),
            video_path: None,
            error: None,
            id: None,
            topic: None,
            language: None,
            duration: None,
            created_at: None,
        }
    }

    pub fn with_video_path(mut self, video_path: impl Into<String>) -> Self {
        self.video_path = Some(video_path.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Progress clamped to `0..=100` for display.
    pub fn progress_percent(&self) -> u8 {
        if self.progress.is_nan() {
            return 0;
        }
        self.progress.clamp(0.0, 100.0).round() as u8
    }

    /// The finished video, if this status says the job completed with one.
    pub fn completed_video(&self) -> Option<&str> {
        match self.status {
            JobState::Completed => self.video_path.as_deref(),
            _ => None,
        }
    }

    /// The failure message, if this status says the job failed.
    pub fn failure(&self) -> Option<&str> {
        match self.status {
            JobState::Error => Some(self.error.as_deref().unwrap_or("unknown error")),
            _ => None,
        }
    }

    /// Parsed submission time, when the backend echoed one.
    pub fn created_at(&self) -> Option<Timestamp> {
        self.created_at.as_deref().and_then(|s| s.parse().ok())
    }
}
