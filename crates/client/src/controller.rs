//! Lifecycle controller for a single generation job.
//!
//! [`JobController`] submits a job, polls its status on a fixed cadence
//! until the backend reports `completed` or `error`, and then runs its
//! [`TerminalHook`] once. It tracks at most one job: submitting again
//! supersedes whatever was being tracked.
//!
//! Every replacement of the tracked job bumps a generation counter and
//! cancels the old poll loop's [`CancellationToken`]. Poll responses carry
//! the generation and a per-job sequence number, and are dropped on arrival
//! when either is out of date, so a slow response can never overwrite newer
//! state or leak into the next job.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use studio_core::{CoreError, JobHandle, JobRequest, JobState, JobStatus};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::ApiError;
use crate::backend::JobBackend;
use crate::events::JobEvent;
use crate::hook::{NoopHook, TerminalHook};
use crate::poller::{PollLoop, PollPolicy};

/// Broadcast channel capacity for controller events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long [`JobController::shutdown`] waits for the poll loop to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where the controller is in the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// No job is being tracked.
    Idle,
    /// A creation request is in flight.
    Submitting,
    /// The backend accepted the job and the poll loop is running.
    Polling,
    /// The tracked job reported `completed`.
    Completed,
    /// The tracked job reported `error`.
    Failed,
}

impl ControllerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ControllerPhase::Completed | ControllerPhase::Failed)
    }
}

/// Point-in-time copy of the controller's observable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub phase: ControllerPhase,
    pub handle: Option<JobHandle>,
    pub status: Option<JobStatus>,
    /// Most recent user-visible error (submission, poll, or job failure).
    pub last_error: Option<String>,
}

/// Errors returned by [`JobController::submit`].
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The request was rejected before any network call.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// The backend did not accept the job.
    #[error("Failed to submit job: {0}")]
    Submission(#[from] ApiError),

    /// The controller has been shut down.
    #[error("Job controller is shut down")]
    ShutDown,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the controller and its poll loop.
pub(crate) struct ControllerState {
    phase: ControllerPhase,
    status: Option<JobStatus>,
    last_error: Option<String>,
    /// Bumped whenever the tracked job is replaced or cleared.
    generation: u64,
    active: Option<ActiveJob>,
}

struct ActiveJob {
    handle: JobHandle,
    cancel: CancellationToken,
    last_applied_sequence: u64,
    consecutive_failures: u32,
}

/// What happened to one poll response once it reached the shared state.
#[derive(Debug)]
pub(crate) enum PollOutcome {
    /// The response belongs to a job that is no longer tracked, or the job
    /// already reached a terminal status.
    Superseded,
    /// An older response than one already applied.
    OutOfOrder,
    /// Stored as the current, non-terminal status.
    Updated(JobStatus),
    /// Stored as the final status; polling must stop.
    Terminal(JobStatus),
    /// The tick failed; polling continues.
    Failed {
        error: String,
        consecutive_failures: u32,
    },
    /// The tick failed and the consecutive-failure cutoff was reached.
    Abandoned {
        error: String,
        consecutive_failures: u32,
    },
}

impl ControllerState {
    pub(crate) fn new() -> Self {
        Self {
            phase: ControllerPhase::Idle,
            status: None,
            last_error: None,
            generation: 0,
            active: None,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            phase: self.phase,
            handle: self.active.as_ref().map(|a| a.handle.clone()),
            status: self.status.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Stop tracking the current job, if any.
    ///
    /// Returns the handle when the job was still being polled.
    fn supersede(&mut self) -> Option<JobHandle> {
        self.generation += 1;
        let was_polling = self.phase == ControllerPhase::Polling;
        let active = self.active.take()?;
        active.cancel.cancel();
        was_polling.then_some(active.handle)
    }

    /// Start tracking `handle` under the current generation.
    fn activate(&mut self, handle: JobHandle, cancel: CancellationToken) {
        self.phase = ControllerPhase::Polling;
        self.active = Some(ActiveJob {
            handle,
            cancel,
            last_applied_sequence: 0,
            consecutive_failures: 0,
        });
    }

    /// Apply one poll response tagged with the `generation` and `sequence`
    /// it was issued under.
    pub(crate) fn apply_poll(
        &mut self,
        generation: u64,
        sequence: u64,
        result: Result<JobStatus, ApiError>,
        max_consecutive_failures: Option<u32>,
    ) -> PollOutcome {
        if generation != self.generation || self.phase != ControllerPhase::Polling {
            return PollOutcome::Superseded;
        }
        let Some(active) = self.active.as_mut() else {
            return PollOutcome::Superseded;
        };
        if sequence <= active.last_applied_sequence {
            return PollOutcome::OutOfOrder;
        }
        active.last_applied_sequence = sequence;

        match result {
            Ok(status) => {
                active.consecutive_failures = 0;
                self.last_error = None;
                self.status = Some(status.clone());

                if !status.is_terminal() {
                    return PollOutcome::Updated(status);
                }

                active.cancel.cancel();
                self.phase = match status.status {
                    JobState::Completed => ControllerPhase::Completed,
                    _ => ControllerPhase::Failed,
                };
                self.last_error = status.failure().map(str::to_string);
                PollOutcome::Terminal(status)
            }
            Err(e) => {
                active.consecutive_failures += 1;
                let consecutive_failures = active.consecutive_failures;
                let error = e.to_string();
                self.last_error = Some(error.clone());

                let exhausted = max_consecutive_failures
                    .is_some_and(|max| max > 0 && consecutive_failures >= max);
                if !exhausted {
                    return PollOutcome::Failed {
                        error,
                        consecutive_failures,
                    };
                }

                active.cancel.cancel();
                self.active = None;
                self.generation += 1;
                self.phase = ControllerPhase::Idle;
                PollOutcome::Abandoned {
                    error,
                    consecutive_failures,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JobController
// ---------------------------------------------------------------------------

/// Drives one generation job at a time.
///
/// Wrap it in an `Arc` to share it between the presentation layer and
/// background tasks. Dropping the controller cancels its poll loop.
pub struct JobController {
    backend: Arc<dyn JobBackend>,
    hook: Arc<dyn TerminalHook>,
    policy: PollPolicy,
    state: Arc<RwLock<ControllerState>>,
    event_tx: broadcast::Sender<JobEvent>,
    tracker: TaskTracker,
    /// Master cancellation token; each poll loop runs under a child of it.
    cancel: CancellationToken,
}

impl JobController {
    pub fn new(backend: Arc<dyn JobBackend>, policy: PollPolicy) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            hook: Arc::new(NoopHook),
            policy,
            state: Arc::new(RwLock::new(ControllerState::new())),
            event_tx,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Run `hook` once for every job that reaches a terminal status.
    pub fn with_terminal_hook(mut self, hook: Arc<dyn TerminalHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn phase(&self) -> ControllerPhase {
        self.state.read().await.phase
    }

    /// Submit a job and start polling it.
    ///
    /// A blank topic fails with [`ControllerError::Validation`] without any
    /// network call or state change. Otherwise any tracked job is cancelled
    /// first. If creation fails the controller returns to idle.
    pub async fn submit(&self, request: JobRequest) -> Result<JobHandle, ControllerError> {
        if let Err(e) = request.validate() {
            tracing::info!(error = %e, "Rejected job request");
            return Err(e.into());
        }
        if self.cancel.is_cancelled() {
            return Err(ControllerError::ShutDown);
        }

        let (generation, superseded) = {
            let mut state = self.state.write().await;
            let superseded = state.supersede();
            state.phase = ControllerPhase::Submitting;
            state.status = None;
            state.last_error = None;
            (state.generation(), superseded)
        };
        if let Some(old) = superseded {
            tracing::info!(job_id = %old, "Superseded by a new submission");
            self.emit(JobEvent::Cancelled {
                job_id: old.job_id,
            });
        }

        tracing::info!(
            topic = %request.topic,
            language = %request.language,
            duration_minutes = request.duration.minutes(),
            "Submitting job",
        );

        let handle = match self.backend.submit_job(&request).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Job submission failed");
                {
                    let mut state = self.state.write().await;
                    if state.generation() == generation {
                        state.phase = ControllerPhase::Idle;
                        state.last_error = Some(e.to_string());
                    }
                }
                self.emit(JobEvent::SubmissionFailed {
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let job_cancel = self.cancel.child_token();
        {
            let mut state = self.state.write().await;
            if state.generation() != generation {
                tracing::info!(
                    job_id = %handle,
                    "Submission superseded while in flight, not tracking",
                );
                return Ok(handle);
            }
            state.activate(handle.clone(), job_cancel.clone());
        }

        tracing::info!(job_id = %handle, "Job accepted, polling started");
        self.emit(JobEvent::Submitted {
            job_id: handle.job_id.clone(),
        });

        let poll_loop = PollLoop {
            backend: Arc::clone(&self.backend),
            hook: Arc::clone(&self.hook),
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
            handle: handle.clone(),
            generation,
            policy: self.policy,
            cancel: job_cancel,
        };
        self.tracker.spawn(poll_loop.run());

        Ok(handle)
    }

    /// Stop polling the tracked job.
    ///
    /// A response already in flight is discarded when it arrives. The last
    /// stored status stays visible. Returns the handle if a job was being
    /// polled.
    pub async fn cancel(&self) -> Option<JobHandle> {
        let cancelled = {
            let mut state = self.state.write().await;
            let cancelled = state.supersede();
            state.phase = ControllerPhase::Idle;
            cancelled
        };

        if let Some(handle) = &cancelled {
            tracing::info!(job_id = %handle, "Polling cancelled");
            self.emit(JobEvent::Cancelled {
                job_id: handle.job_id.clone(),
            });
        }
        cancelled
    }

    /// Cancel polling and forget the stored status and error.
    pub async fn reset(&self) {
        self.cancel().await;
        let mut state = self.state.write().await;
        state.status = None;
        state.last_error = None;
    }

    /// URL of the finished video, once the tracked job has completed.
    pub async fn download_url(&self) -> Option<Url> {
        let video = {
            let state = self.state.read().await;
            state.status.as_ref()?.completed_video()?.to_string()
        };

        match self.backend.artifact_url(&video) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(video = %video, error = %e, "Cannot build download URL");
                None
            }
        }
    }

    /// Cancel everything and wait for the poll loop to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job controller");
        self.cancel.cancel();
        {
            let mut state = self.state.write().await;
            state.supersede();
            if !state.phase.is_terminal() {
                state.phase = ControllerPhase::Idle;
            }
        }

        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!("Poll loop did not exit before shutdown timeout");
        }
        tracing::info!("Job controller shut down complete");
    }

    fn emit(&self, event: JobEvent) {
        // No receivers is fine.
        let _ = self.event_tx.send(event);
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn running(progress: f64) -> JobStatus {
        JobStatus::new(JobState::Running, progress, "rendering")
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            body: "down".into(),
        }
    }

    /// State tracking `abc` under its first generation.
    fn polling_state() -> (ControllerState, u64, CancellationToken) {
        let mut state = ControllerState::new();
        state.supersede();
        let token = CancellationToken::new();
        state.activate(JobHandle::new("abc"), token.clone());
        let generation = state.generation();
        (state, generation, token)
    }

    #[test]
    fn newer_response_replaces_status_wholesale() {
        let (mut state, generation, _) = polling_state();
        let first = running(40.0).with_error("transient note");
        state.apply_poll(generation, 1, Ok(first), None);

        let second = running(55.0);
        let outcome = state.apply_poll(generation, 2, Ok(second.clone()), None);

        assert_matches!(outcome, PollOutcome::Updated(_));
        assert_eq!(state.status, Some(second));
        assert!(state.status.as_ref().unwrap().error.is_none());
    }

    #[test]
    fn older_response_never_regresses_state() {
        let (mut state, generation, _) = polling_state();
        state.apply_poll(generation, 2, Ok(running(60.0)), None);

        let outcome = state.apply_poll(generation, 1, Ok(running(20.0)), None);

        assert_matches!(outcome, PollOutcome::OutOfOrder);
        assert_eq!(state.status.as_ref().unwrap().progress, 60.0);
    }

    #[test]
    fn response_for_superseded_generation_is_discarded() {
        let (mut state, old_generation, old_token) = polling_state();
        state.supersede();
        state.activate(JobHandle::new("def"), CancellationToken::new());
        let current = state.generation();

        let outcome = state.apply_poll(old_generation, 1, Ok(running(99.0)), None);

        assert_matches!(outcome, PollOutcome::Superseded);
        assert!(old_token.is_cancelled());
        assert!(state.status.is_none());
        assert_ne!(old_generation, current);
    }

    #[test]
    fn terminal_status_freezes_state_and_cancels_loop() {
        let (mut state, generation, token) = polling_state();
        let done = JobStatus::new(JobState::Completed, 100.0, "done").with_video_path("abc.mp4");

        let outcome = state.apply_poll(generation, 1, Ok(done.clone()), None);

        assert_matches!(outcome, PollOutcome::Terminal(_));
        assert_eq!(state.phase, ControllerPhase::Completed);
        assert!(token.is_cancelled());

        let late = state.apply_poll(generation, 2, Ok(running(10.0)), None);
        assert_matches!(late, PollOutcome::Superseded);
        assert_eq!(state.status, Some(done));
    }

    #[test]
    fn error_status_records_failure_message() {
        let (mut state, generation, _) = polling_state();
        let failed = JobStatus::new(JobState::Error, 30.0, "qa").with_error("render crashed");

        state.apply_poll(generation, 1, Ok(failed), None);

        assert_eq!(state.phase, ControllerPhase::Failed);
        assert_eq!(state.last_error.as_deref(), Some("render crashed"));
    }

    #[test]
    fn transport_error_keeps_previous_status() {
        let (mut state, generation, token) = polling_state();
        state.apply_poll(generation, 1, Ok(running(40.0)), None);

        let outcome = state.apply_poll(generation, 2, Err(unavailable()), None);

        assert_matches!(
            outcome,
            PollOutcome::Failed {
                consecutive_failures: 1,
                ..
            }
        );
        assert_eq!(state.phase, ControllerPhase::Polling);
        assert_eq!(state.status.as_ref().unwrap().progress, 40.0);
        assert!(state.last_error.is_some());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn success_resets_failure_streak() {
        let (mut state, generation, _) = polling_state();
        state.apply_poll(generation, 1, Err(unavailable()), Some(2));
        state.apply_poll(generation, 2, Ok(running(10.0)), Some(2));

        let outcome = state.apply_poll(generation, 3, Err(unavailable()), Some(2));

        assert_matches!(
            outcome,
            PollOutcome::Failed {
                consecutive_failures: 1,
                ..
            }
        );
    }

    #[test]
    fn failure_cutoff_abandons_job() {
        let (mut state, generation, token) = polling_state();
        state.apply_poll(generation, 1, Err(unavailable()), Some(2));

        let outcome = state.apply_poll(generation, 2, Err(unavailable()), Some(2));

        assert_matches!(
            outcome,
            PollOutcome::Abandoned {
                consecutive_failures: 2,
                ..
            }
        );
        assert_eq!(state.phase, ControllerPhase::Idle);
        assert!(state.active.is_none());
        assert!(token.is_cancelled());
        assert_ne!(state.generation(), generation);
    }

    #[test]
    fn zero_cutoff_never_abandons() {
        let (mut state, generation, token) = polling_state();

        for sequence in 1..=5 {
            let outcome = state.apply_poll(generation, sequence, Err(unavailable()), Some(0));
            assert_matches!(outcome, PollOutcome::Failed { .. });
        }

        assert_eq!(state.phase, ControllerPhase::Polling);
        assert!(state.active.is_some());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn supersede_reports_only_polling_jobs() {
        let (mut state, generation, _) = polling_state();
        let done = JobStatus::new(JobState::Completed, 100.0, "done");
        state.apply_poll(generation, 1, Ok(done), None);

        assert!(state.supersede().is_none());

        let (mut state, _, _) = polling_state();
        assert_eq!(state.supersede(), Some(JobHandle::new("abc")));
    }

    #[test]
    fn snapshot_exposes_handle_while_tracked() {
        let (state, _, _) = polling_state();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, ControllerPhase::Polling);
        assert_eq!(snapshot.handle, Some(JobHandle::new("abc")));
        assert!(snapshot.status.is_none());
    }
}
