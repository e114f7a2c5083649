//! Plain-text rendering of job progress and the artifact listing.

use studio_core::{Artifact, JobStatus};

const BAR_WIDTH: usize = 30;

/// One-line progress display, e.g. `[#########.....]  40% running: rendering`.
pub fn progress_line(status: &JobStatus) -> String {
    let percent = status.progress_percent();
    let filled = BAR_WIDTH * usize::from(percent) / 100;
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled));
    if status.phase.is_empty() {
        format!("[{bar}] {percent:>3}% {}", status.status)
    } else {
        format!("[{bar}] {percent:>3}% {}: {}", status.status, status.phase)
    }
}

/// One listing row: name and size in MB with two decimals.
pub fn artifact_line(artifact: &Artifact) -> String {
    format!("{:<40} {:>8.2} MB", artifact.name, artifact.size_mb())
}
