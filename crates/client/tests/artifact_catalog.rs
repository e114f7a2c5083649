//! Tests for `ArtifactCatalog` refresh semantics.

mod common;

use assert_matches::assert_matches;
use common::FakeBackend;
use studio_client::{ArtifactCatalog, CatalogError, TerminalHook};
use studio_core::{Artifact, JobHandle, JobState, JobStatus};

fn names(artifacts: &[Artifact]) -> Vec<&str> {
    artifacts.iter().map(|a| a.name.as_str()).collect()
}

#[tokio::test]
async fn refresh_replaces_list_wholesale() {
    let backend = FakeBackend::new();
    backend.listing(vec![Artifact::new("a.mp4", 1), Artifact::new("b.mp4", 2)]);
    backend.listing(vec![Artifact::new("c.mp4", 3)]);
    let catalog = ArtifactCatalog::new(backend.clone());

    let first = catalog.refresh().await.unwrap();
    assert_eq!(names(&first), ["a.mp4", "b.mp4"]);

    catalog.refresh().await.unwrap();
    assert_eq!(names(&catalog.artifacts().await), ["c.mp4"]);
    assert!(catalog.get("a.mp4").await.is_none());
}

#[tokio::test]
async fn refresh_preserves_backend_order() {
    let backend = FakeBackend::new();
    backend.listing(vec![
        Artifact::new("z.mp4", 1),
        Artifact::new("a.mp4", 2),
        Artifact::new("m.mp4", 3),
    ]);
    let catalog = ArtifactCatalog::new(backend.clone());

    catalog.refresh().await.unwrap();

    assert_eq!(names(&catalog.artifacts().await), ["z.mp4", "a.mp4", "m.mp4"]);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_list() {
    let backend = FakeBackend::new();
    backend.listing(vec![Artifact::new("a.mp4", 1)]);
    backend.listing_fails(502);
    backend.listing(vec![Artifact::new("b.mp4", 2)]);
    let catalog = ArtifactCatalog::new(backend.clone());

    catalog.refresh().await.unwrap();
    let result = catalog.refresh().await;

    assert_matches!(result, Err(CatalogError::Fetch(_)));
    assert_eq!(names(&catalog.artifacts().await), ["a.mp4"]);
    assert!(catalog.last_error().await.is_some());

    catalog.refresh().await.unwrap();
    assert_eq!(names(&catalog.artifacts().await), ["b.mp4"]);
    assert!(catalog.last_error().await.is_none());
}

#[tokio::test]
async fn load_performs_startup_refresh() {
    let backend = FakeBackend::new();
    backend.listing(vec![Artifact::new("final_video.mp4", 5 * 1024 * 1024)]);

    let catalog = ArtifactCatalog::load(backend.clone()).await;

    assert_eq!(backend.lists(), 1);
    assert_eq!(catalog.len().await, 1);
    let artifact = catalog.get("final_video.mp4").await.unwrap();
    assert_eq!(artifact.size_mb(), 5.0);
}

#[tokio::test]
async fn load_survives_unreachable_backend() {
    let backend = FakeBackend::new();
    backend.listing_fails(503);

    let catalog = ArtifactCatalog::load(backend.clone()).await;

    assert!(catalog.is_empty().await);
    assert!(catalog.last_error().await.is_some());
}

#[tokio::test]
async fn terminal_hook_refreshes() {
    let backend = FakeBackend::new();
    backend.listing(vec![Artifact::new("abc.mp4", 10)]);
    let catalog = ArtifactCatalog::new(backend.clone());

    let status = JobStatus::new(JobState::Completed, 100.0, "done").with_video_path("abc.mp4");
    catalog
        .job_terminated(&JobHandle::new("abc"), &status)
        .await;

    assert_eq!(backend.lists(), 1);
    assert!(catalog.get("abc.mp4").await.is_some());
}

#[tokio::test]
async fn download_url_points_at_artifact() {
    let backend = FakeBackend::new();
    let catalog = ArtifactCatalog::new(backend.clone());

    let url = catalog.download_url("abc.mp4").unwrap();

    assert_eq!(url.as_str(), "http://studio.test/api/videos/abc.mp4");
}
