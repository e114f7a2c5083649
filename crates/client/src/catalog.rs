//! In-memory mirror of the backend's artifact listing.
//!
//! The backend listing is authoritative: every successful refresh replaces
//! the local list wholesale, and a failed refresh leaves it untouched.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use studio_core::{Artifact, JobHandle, JobStatus};
use tokio::sync::RwLock;

use crate::api::ApiError;
use crate::backend::JobBackend;
use crate::hook::TerminalHook;

/// Errors from [`ArtifactCatalog`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The listing request failed. The previous list is still held.
    #[error("Failed to fetch artifact listing: {0}")]
    Fetch(#[source] ApiError),

    /// A download URL could not be built for the artifact.
    #[error("Invalid artifact URL for '{name}': {source}")]
    Url {
        name: String,
        #[source]
        source: ApiError,
    },
}

#[derive(Default)]
struct CatalogState {
    artifacts: Vec<Artifact>,
    last_error: Option<String>,
}

/// Holds the list of finished artifacts.
pub struct ArtifactCatalog {
    backend: Arc<dyn JobBackend>,
    state: RwLock<CatalogState>,
}

impl ArtifactCatalog {
    /// Create an empty catalog without contacting the backend.
    pub fn new(backend: Arc<dyn JobBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(CatalogState::default()),
        }
    }

    /// Create a catalog and perform the start-up refresh.
    ///
    /// A failed refresh is logged and leaves the catalog empty.
    pub async fn load(backend: Arc<dyn JobBackend>) -> Arc<Self> {
        let catalog = Arc::new(Self::new(backend));
        // Already logged inside refresh.
        let _ = catalog.refresh().await;
        catalog
    }

    /// Replace the local list with the backend listing.
    pub async fn refresh(&self) -> Result<Vec<Artifact>, CatalogError> {
        match self.backend.list_artifacts().await {
            Ok(artifacts) => {
                tracing::info!(count = artifacts.len(), "Artifact catalog refreshed");
                let mut state = self.state.write().await;
                state.artifacts = artifacts.clone();
                state.last_error = None;
                Ok(artifacts)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Artifact catalog refresh failed, keeping previous list");
                self.state.write().await.last_error = Some(e.to_string());
                Err(CatalogError::Fetch(e))
            }
        }
    }

    /// Current list, in backend order.
    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.state.read().await.artifacts.clone()
    }

    pub async fn get(&self, name: &str) -> Option<Artifact> {
        self.state
            .read()
            .await
            .artifacts
            .iter()
            .find(|a| a.name == name)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.artifacts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.artifacts.is_empty()
    }

    /// Error from the most recent refresh, cleared by the next success.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// URL serving the bytes of artifact `name`, for viewing or download.
    pub fn download_url(&self, name: &str) -> Result<Url, CatalogError> {
        self.backend
            .artifact_url(name)
            .map_err(|source| CatalogError::Url {
                name: name.to_string(),
                source,
            })
    }
}

#[async_trait]
impl TerminalHook for ArtifactCatalog {
    async fn job_terminated(&self, handle: &JobHandle, status: &JobStatus) {
        tracing::debug!(job_id = %handle, state = %status.status, "Refreshing catalog after job ended");
        // Failure already logged and recorded in last_error.
        let _ = self.refresh().await;
    }
}
