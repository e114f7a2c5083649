//! Shared test helpers: a scripted in-memory [`JobBackend`].

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use studio_client::{ApiError, JobBackend, JobEvent};
use studio_core::{Artifact, JobHandle, JobRequest, JobState, JobStatus};
use tokio::sync::broadcast;

/// One scripted status response.
#[derive(Clone)]
pub enum Reply {
    Status(JobStatus),
    Fail(u16),
    /// Respond with the inner reply after a (virtual) delay.
    Delayed(Duration, Box<Reply>),
}

/// Backend fake driven by per-job reply scripts.
///
/// The last reply in a job's script repeats forever.
#[derive(Default)]
pub struct FakeBackend {
    /// Creation replies in call order, each with its response latency.
    submit_replies: Mutex<VecDeque<(Result<String, u16>, Duration)>>,
    status_scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    listing_replies: Mutex<VecDeque<Result<Vec<Artifact>, u16>>>,
    pub submit_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    status_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept(&self, job_id: &str) {
        self.accept_after(job_id, Duration::ZERO);
    }

    /// Accept the next submission, answering only after `delay`.
    pub fn accept_after(&self, job_id: &str, delay: Duration) {
        self.submit_replies
            .lock()
            .unwrap()
            .push_back((Ok(job_id.to_string()), delay));
    }

    pub fn reject(&self, status: u16) {
        self.submit_replies
            .lock()
            .unwrap()
            .push_back((Err(status), Duration::ZERO));
    }

    pub fn script(&self, job_id: &str, replies: Vec<Reply>) {
        self.status_scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), replies.into());
    }

    pub fn listing(&self, artifacts: Vec<Artifact>) {
        self.listing_replies.lock().unwrap().push_back(Ok(artifacts));
    }

    pub fn listing_fails(&self, status: u16) {
        self.listing_replies.lock().unwrap().push_back(Err(status));
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of status requests issued for `job_id`.
    pub fn polls(&self, job_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == job_id)
            .count()
    }

    fn next_reply(&self, job_id: &str) -> Reply {
        let mut scripts = self.status_scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(job_id) else {
            return Reply::Fail(404);
        };
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Reply::Fail(404))
        }
    }
}

fn status_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        body: format!("scripted failure {status}"),
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn submit_job(&self, _request: &JobRequest) -> Result<JobHandle, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.submit_replies.lock().unwrap().pop_front();
        let Some((reply, delay)) = reply else {
            return Err(status_error(500));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Ok(job_id) => Ok(JobHandle::new(job_id)),
            Err(status) => Err(status_error(status)),
        }
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, ApiError> {
        self.status_calls
            .lock()
            .unwrap()
            .push(handle.job_id().to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut reply = self.next_reply(handle.job_id());
        let result = loop {
            match reply {
                Reply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                Reply::Status(status) => break Ok(status),
                Reply::Fail(status) => break Err(status_error(status)),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_artifacts(&self) -> Result<Vec<Artifact>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.listing_replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok(artifacts)) => Ok(artifacts),
            Some(Err(status)) => Err(status_error(status)),
            None => Ok(Vec::new()),
        }
    }

    fn artifact_url(&self, name: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse("http://studio.test/api/videos/").unwrap();
        url.path_segments_mut().unwrap().pop_if_empty().push(name);
        Ok(url)
    }
}

pub fn running(progress: f64, phase: &str) -> Reply {
    Reply::Status(JobStatus::new(JobState::Running, progress, phase))
}

pub fn completed(video_path: &str) -> Reply {
    Reply::Status(JobStatus::new(JobState::Completed, 100.0, "Completed!").with_video_path(video_path))
}

pub fn failed(message: &str) -> Reply {
    Reply::Status(JobStatus::new(JobState::Error, 30.0, "Phase 2").with_error(message))
}

/// Wait for the first event matching `pred`, skipping the rest.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<JobEvent>,
    pred: impl Fn(&JobEvent) -> bool,
) -> JobEvent {
    loop {
        let event = rx.recv().await.expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}
