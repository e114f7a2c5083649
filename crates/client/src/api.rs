//! REST API client for the studio backend HTTP endpoints.
//!
//! Wraps job submission, status polling, the artifact listing, artifact
//! download and the health check using [`reqwest`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use studio_core::{Artifact, JobHandle, JobRequest, JobStatus};
use tokio::io::AsyncWriteExt;

/// HTTP client for one studio backend.
#[derive(Clone)]
pub struct StudioApi {
    client: reqwest::Client,
    base_url: Url,
}

/// Response returned by `POST /api/generate` after the backend has
/// accepted a job.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job identifier.
    pub job_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response returned by `GET /api/health`.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors from the studio REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, timeout, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Studio API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The configured base URL cannot carry a path.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Writing a downloaded artifact to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioApi {
    /// Create a client with its own connection pool.
    ///
    /// * `base_url` - backend root, e.g. `http://localhost:5000`.
    /// * `timeout`  - per-request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Submit a generation job.
    ///
    /// Sends `POST /api/generate` with `{topic, language, duration}` and
    /// returns the server-assigned job id.
    pub async fn submit_job(&self, request: &JobRequest) -> Result<JobHandle, ApiError> {
        let response = self
            .client
            .post(self.endpoint(&["generate"])?)
            .json(request)
            .send()
            .await?;

        let body: SubmitResponse = Self::parse_response(response).await?;
        if let Some(message) = &body.message {
            tracing::debug!(job_id = %body.job_id, message = %message, "Backend accepted job");
        }
        Ok(JobHandle::new(body.job_id))
    }

    /// Fetch the current status of a job via `GET /api/status/{job_id}`.
    pub async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["status", handle.job_id()])?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List finished artifacts via `GET /api/videos`.
    pub async fn list_artifacts(&self) -> Result<Vec<Artifact>, ApiError> {
        let response = self.client.get(self.endpoint(&["videos"])?).send().await?;

        Self::parse_response(response).await
    }

    /// URL serving the bytes of one artifact (`GET /api/videos/{name}`).
    pub fn artifact_url(&self, name: &str) -> Result<Url, ApiError> {
        self.endpoint(&["videos", name])
    }

    /// Stream an artifact to `dest`, returning the number of bytes written.
    ///
    /// Bytes go to a `.part` sibling that is renamed over `dest` only once
    /// the body is complete. On failure `dest` is left as it was.
    pub async fn download_artifact(&self, name: &str, dest: &Path) -> Result<u64, ApiError> {
        let response = self.client.get(self.artifact_url(name)?).send().await?;
        let response = Self::ensure_success(response).await?;

        let part = partial_path(dest);
        let written = match Self::write_body(response, &part).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(name, error = %e, "Artifact download failed, discarding partial file");
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&part, dest).await?;

        tracing::info!(name, bytes = written, dest = %dest.display(), "Artifact downloaded");
        Ok(written)
    }

    /// Call `GET /api/health`.
    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        let response = self.client.get(self.endpoint(&["health"])?).send().await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Build `{base}/api/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    /// Ensure the response has a success status code, turning anything
    /// else into [`ApiError::Status`] with the body text attached.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn write_body(mut response: reqwest::Response, path: &Path) -> Result<u64, ApiError> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}
