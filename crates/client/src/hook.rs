//! Callback run when a job reaches a terminal status.

use async_trait::async_trait;
use studio_core::{JobHandle, JobStatus};

/// Notified once per job, after the poll loop observes `completed` or
/// `error` and has stopped.
#[async_trait]
pub trait TerminalHook: Send + Sync {
    async fn job_terminated(&self, handle: &JobHandle, status: &JobStatus);
}

/// Hook used when the controller is built without one.
pub(crate) struct NoopHook;

#[async_trait]
impl TerminalHook for NoopHook {
    async fn job_terminated(&self, _handle: &JobHandle, _status: &JobStatus) {}
}
