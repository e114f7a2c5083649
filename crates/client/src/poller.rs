//! Fixed-cadence status polling for the tracked job.
//!
//! One [`PollLoop`] task runs per accepted job. Each tick issues a single
//! status request and awaits it before the next tick can fire; ticks that
//! come due while a request is outstanding are skipped rather than queued.
//! The loop ends when the job reaches a terminal status, when its
//! [`CancellationToken`] is cancelled, or when its responses stop being
//! accepted by the controller state.

use std::sync::Arc;
use std::time::Duration;

use studio_core::polling::{clamp_poll_interval, DEFAULT_POLL_INTERVAL};
use studio_core::{JobHandle, JobState};
use tokio::sync::{broadcast, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::JobBackend;
use crate::controller::{ControllerState, PollOutcome};
use crate::events::JobEvent;
use crate::hook::TerminalHook;

/// Poll cadence and failure cutoff.
///
/// Fields are only reachable through the constructors, so the interval is
/// always inside the supported range and a cutoff is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    max_consecutive_failures: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: None,
        }
    }
}

impl PollPolicy {
    /// Policy with the given interval, clamped to the supported range.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: clamp_poll_interval(interval),
            ..Default::default()
        }
    }

    /// Give up after `max` failed ticks in a row. `None` or `Some(0)` never
    /// gives up.
    pub fn with_max_consecutive_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_failures = max.filter(|&n| n > 0);
        self
    }

    /// Time between status requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_consecutive_failures(&self) -> Option<u32> {
        self.max_consecutive_failures
    }
}

/// Everything one poll loop needs. Built by the controller on submit.
pub(crate) struct PollLoop {
    pub(crate) backend: Arc<dyn JobBackend>,
    pub(crate) hook: Arc<dyn TerminalHook>,
    pub(crate) state: Arc<RwLock<ControllerState>>,
    pub(crate) event_tx: broadcast::Sender<JobEvent>,
    pub(crate) handle: JobHandle,
    pub(crate) generation: u64,
    pub(crate) policy: PollPolicy,
    pub(crate) cancel: CancellationToken,
}

impl PollLoop {
    pub(crate) async fn run(self) {
        let job_id = self.handle.job_id().to_string();
        let interval = self.policy.interval();

        // First tick one interval after acceptance.
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(
            job_id = %job_id,
            interval_ms = interval.as_millis() as u64,
            "Poll loop started",
        );

        let mut sequence = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(job_id = %job_id, "Poll loop cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            sequence += 1;
            let result = self.backend.job_status(&self.handle).await;

            // Events for this response are sent before the guard drops, so a
            // superseding submit or cancel always emits after them.
            let mut state = self.state.write().await;
            let outcome = state.apply_poll(
                self.generation,
                sequence,
                result,
                self.policy.max_consecutive_failures(),
            );

            match outcome {
                PollOutcome::Superseded => {
                    tracing::debug!(job_id = %job_id, sequence, "Discarding response for superseded job");
                    break;
                }
                PollOutcome::OutOfOrder => {
                    tracing::debug!(job_id = %job_id, sequence, "Discarding out-of-order response");
                }
                PollOutcome::Updated(status) => {
                    tracing::debug!(
                        job_id = %job_id,
                        state = %status.status,
                        progress = status.progress,
                        phase = %status.phase,
                        "Job progress",
                    );
                    self.emit(JobEvent::Progress {
                        job_id: job_id.clone(),
                        status,
                    });
                }
                PollOutcome::Failed {
                    error,
                    consecutive_failures,
                } => {
                    tracing::warn!(
                        job_id = %job_id,
                        consecutive_failures,
                        error = %error,
                        "Status poll failed, will retry on next tick",
                    );
                    self.emit(JobEvent::PollFailed {
                        job_id: job_id.clone(),
                        error,
                        consecutive_failures,
                    });
                }
                PollOutcome::Abandoned {
                    error,
                    consecutive_failures,
                } => {
                    tracing::error!(
                        job_id = %job_id,
                        consecutive_failures,
                        error = %error,
                        "Giving up on job after repeated poll failures",
                    );
                    self.emit(JobEvent::PollingAbandoned {
                        job_id: job_id.clone(),
                        consecutive_failures,
                    });
                    break;
                }
                PollOutcome::Terminal(status) => {
                    tracing::info!(
                        job_id = %job_id,
                        state = %status.status,
                        video_path = ?status.video_path,
                        error = ?status.error,
                        "Job reached terminal status",
                    );
                    // The hook may be slow; snapshots must not wait on it.
                    drop(state);
                    self.hook.job_terminated(&self.handle, &status).await;

                    let event = match status.status {
                        JobState::Completed => JobEvent::Completed {
                            job_id: job_id.clone(),
                            status,
                        },
                        _ => JobEvent::Failed {
                            job_id: job_id.clone(),
                            status,
                        },
                    };
                    self.emit(event);
                    break;
                }
            }
        }

        tracing::debug!(job_id = %job_id, polls = sequence, "Poll loop exited");
    }

    fn emit(&self, event: JobEvent) {
        let _ = self.event_tx.send(event);
    }
}
