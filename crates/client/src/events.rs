//! Events emitted by the [`JobController`](crate::JobController).
//!
//! These are the user-visible signals of the job lifecycle. Presentation
//! code subscribes via [`JobController::subscribe`](crate::JobController::subscribe)
//! and renders them; nothing in the controller depends on anyone listening.

use serde::Serialize;
use studio_core::JobStatus;

#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    /// The backend accepted a job and polling has started.
    Submitted { job_id: String },

    /// Job creation failed. The controller is back to idle.
    SubmissionFailed { error: String },

    /// A poll returned a non-terminal status.
    Progress { job_id: String, status: JobStatus },

    /// A single poll tick failed. Polling continues.
    PollFailed {
        job_id: String,
        error: String,
        /// Failed ticks in a row, including this one.
        consecutive_failures: u32,
    },

    /// The job finished successfully.
    Completed { job_id: String, status: JobStatus },

    /// The job finished with an error.
    Failed { job_id: String, status: JobStatus },

    /// Polling of an active job was cancelled (explicitly or by a newer submit).
    Cancelled { job_id: String },

    /// Polling gave up after too many consecutive failed ticks.
    PollingAbandoned {
        job_id: String,
        consecutive_failures: u32,
    },
}

impl JobEvent {
    /// The job this event concerns, if any.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            JobEvent::Submitted { job_id }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::PollFailed { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Cancelled { job_id }
            | JobEvent::PollingAbandoned { job_id, .. } => Some(job_id),
            JobEvent::SubmissionFailed { .. } => None,
        }
    }

    /// Whether no further events will follow for this job.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            JobEvent::SubmissionFailed { .. }
                | JobEvent::Completed { .. }
                | JobEvent::Failed { .. }
                | JobEvent::Cancelled { .. }
                | JobEvent::PollingAbandoned { .. }
        )
    }
}
