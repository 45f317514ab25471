//! Job-status polling.
//!
//! The state machine is split in two: [`next_state`] is a pure transition
//! over one observation, and [`JobPoller`] drives it against the network
//! with a fixed interval between attempts.
//!
//! ```text
//! Submitted ──▶ Pending ──▶ … ──▶ Completed
//!                  │               Failed
//!                  └──(ceiling)──▶ TimedOut
//! ```
//!
//! Transport errors and per-call timeouts are transient: they count as an
//! attempt and the loop carries on. An explicit `failed` report ends the
//! loop at once.

use crate::client::ScrapeApi;
use crate::document::{JobHandle, JobStatus};
use crate::error::Crawl2MdcError;
use crate::progress::ProgressCallback;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a job stands after some number of attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Submitted,
    Pending { attempts: u32 },
    Completed { payload: Value, attempts: u32 },
    Failed { message: String, attempts: u32 },
    TimedOut { attempts: u32 },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Submitted | PollState::Pending { .. })
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        match self {
            PollState::Submitted => 0,
            PollState::Pending { attempts }
            | PollState::Completed { attempts, .. }
            | PollState::Failed { attempts, .. }
            | PollState::TimedOut { attempts } => *attempts,
        }
    }

    /// Map a terminal state onto the pipeline result.
    pub fn into_result(self, job_id: &str) -> Result<(Value, u32), Crawl2MdcError> {
        match self {
            PollState::Completed { payload, attempts } => Ok((payload, attempts)),
            PollState::Failed { message, .. } => Err(Crawl2MdcError::JobFailed {
                job_id: job_id.to_string(),
                message,
            }),
            PollState::TimedOut { attempts } => Err(Crawl2MdcError::JobTimedOut {
                job_id: job_id.to_string(),
                attempts,
            }),
            PollState::Submitted | PollState::Pending { .. } => Err(Crawl2MdcError::Internal(
                format!("job {job_id} polled into a non-terminal state"),
            )),
        }
    }
}

/// What one status request yielded.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The request failed or timed out.
    Unreachable(String),
    Reported(JobStatus),
}

/// Advance the machine by one attempt.
///
/// Terminal states absorb further observations.
pub fn next_state(current: &PollState, observation: Observation, max_attempts: u32) -> PollState {
    if current.is_terminal() {
        return current.clone();
    }
    let attempts = current.attempts() + 1;
    match observation {
        Observation::Reported(JobStatus::Completed { payload }) => {
            PollState::Completed { payload, attempts }
        }
        Observation::Reported(JobStatus::Failed { message }) => {
            PollState::Failed { message, attempts }
        }
        Observation::Unreachable(_) | Observation::Reported(JobStatus::Pending { .. }) => {
            if attempts >= max_attempts {
                PollState::TimedOut { attempts }
            } else {
                PollState::Pending { attempts }
            }
        }
    }
}

/// Drives [`next_state`] against a [`ScrapeApi`].
pub struct JobPoller {
    api: Arc<dyn ScrapeApi>,
    credential: String,
    interval: Duration,
    request_timeout: Duration,
    max_attempts: u32,
    progress: Option<ProgressCallback>,
}

impl JobPoller {
    pub fn new(api: Arc<dyn ScrapeApi>, credential: impl Into<String>) -> Self {
        Self {
            api,
            credential: credential.into(),
            interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            max_attempts: 60,
            progress: None,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn progress(mut self, cb: Option<ProgressCallback>) -> Self {
        self.progress = cb;
        self
    }

    /// Poll `status_url` until the job reaches a terminal state.
    pub async fn run(&self, handle: &JobHandle, status_url: &str) -> PollState {
        let mut state = PollState::Submitted;

        while !state.is_terminal() {
            let attempt = state.attempts() + 1;
            if let Some(ref cb) = self.progress {
                cb.on_poll_attempt(&handle.id, attempt, self.max_attempts);
            }

            let observation = self.observe(status_url).await;
            match &observation {
                Observation::Unreachable(reason) => {
                    warn!(job_id = %handle.id, attempt, "Status request failed: {reason}");
                }
                Observation::Reported(JobStatus::Pending { status }) => {
                    debug!(job_id = %handle.id, attempt, status = %status, "Job still running");
                }
                Observation::Reported(_) => {}
            }

            state = next_state(&state, observation, self.max_attempts);
            if !state.is_terminal() {
                tokio::time::sleep(self.interval).await;
            }
        }

        match &state {
            PollState::Completed { attempts, .. } => {
                info!(job_id = %handle.id, attempts, "Job completed");
            }
            PollState::Failed { message, attempts } => {
                warn!(job_id = %handle.id, attempts, "Job failed: {message}");
            }
            PollState::TimedOut { attempts } => {
                warn!(job_id = %handle.id, attempts, "Job did not complete in time");
            }
            PollState::Submitted | PollState::Pending { .. } => {}
        }
        state
    }

    async fn observe(&self, status_url: &str) -> Observation {
        let call = self.api.job_status(status_url, &self.credential);
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(payload)) => Observation::Reported(JobStatus::from_payload(payload)),
            Ok(Err(e)) => Observation::Unreachable(e.to_string()),
            Err(_) => Observation::Unreachable(format!(
                "timed out after {}s",
                self.request_timeout.as_secs()
            )),
        }
    }
}
