//! The backend contract the controller and catalog are written against.

use async_trait::async_trait;
use reqwest::Url;
use studio_core::{Artifact, JobHandle, JobRequest, JobStatus};

use crate::api::{ApiError, StudioApi};

/// Operations the job lifecycle needs from a studio backend.
///
/// [`StudioApi`] is the production implementation; tests plug in fakes.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Create a job. Exactly one outbound request per call.
    async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, ApiError>;

    /// Fetch the current status of `handle`.
    async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, ApiError>;

    /// List finished artifacts, in backend order.
    async fn list_artifacts(&self) -> Result<Vec<Artifact>, ApiError>;

    /// Where the bytes of artifact `name` can be fetched.
    fn artifact_url(&self, name: &str) -> Result<Url, ApiError>;
}

#[async_trait]
impl JobBackend for StudioApi {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, ApiError> {
        StudioApi::submit_job(self, request).await
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, ApiError> {
        StudioApi::job_status(self, handle).await
    }

    async fn list_artifacts(&self) -> Result<Vec<Artifact>, ApiError> {
        StudioApi::list_artifacts(self).await
    }

    fn artifact_url(&self, name: &str) -> Result<Url, ApiError> {
        StudioApi::artifact_url(self, name)
    }
}
