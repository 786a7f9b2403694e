//! Process-local job registry.
//!
//! The registry is a low-latency cache in front of the durable job mirror:
//! terminal jobs are dropped a grace period after they finish, after which
//! pollers fall back to the mirror.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use blueprint_utils::JobStatus;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{Job, JobId, JobSnapshot, JobUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStoreError {
    #[error("Job already registered: {0}")]
    Duplicate(JobId),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Result of a transition request
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(JobSnapshot),
    /// The job was already terminal; nothing changed
    IgnoredTerminal(JobStatus),
}

#[derive(Debug)]
struct Entry {
    job: Job,
    finished_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Entry>>,
}

impl JobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new `pending` job.
    pub async fn register(&self, job: Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::Duplicate(job.id));
        }
        debug!(job_id = %job.id, project_id = %job.project_id, step = %job.step, "Job registered");
        jobs.insert(
            job.id.clone(),
            Entry {
                job,
                finished_at: None,
            },
        );
        Ok(())
    }

    /// Move a job forward.
    ///
    /// A job that is already terminal is left untouched and reported as
    /// `IgnoredTerminal`; any other backward or repeated move is an error.
    pub async fn transition(&self, id: &JobId, update: JobUpdate) -> Result<TransitionOutcome, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;
        let from = entry.job.status;
        let to = update.status();

        if from.is_terminal() {
            warn!(job_id = %id, status = %from, requested = %to, "Ignoring transition of terminal job");
            return Ok(TransitionOutcome::IgnoredTerminal(from));
        }
        if !from.can_transition_to(to) {
            return Err(JobStoreError::InvalidTransition {
                id: id.clone(),
                from,
                to,
            });
        }

        let job = &mut entry.job;
        job.status = to;
        job.updated_at = Utc::now();
        match update {
            JobUpdate::Processing => {}
            JobUpdate::Completed(result) => job.result = Some(result),
            JobUpdate::Failed(error) => job.error = Some(error),
        }
        if to.is_terminal() {
            entry.finished_at = Some(Instant::now());
        }
        Ok(TransitionOutcome::Applied(entry.job.snapshot()))
    }

    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).map(|entry| entry.job.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Drop terminal jobs that finished at least `grace` ago.
    pub async fn evict_expired(&self, grace: Duration) -> usize {
        let now = Instant::now();
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| {
            entry
                .finished_at
                .is_none_or(|finished| now.duration_since(finished) < grace)
        });
        before - jobs.len()
    }

    /// Run [`Self::evict_expired`] every `interval` until `cancel` fires.
    pub fn spawn_evictor(
        self: Arc<Self>,
        interval: Duration,
        grace: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.evict_expired(grace).await;
                        if evicted > 0 {
                            debug!(evicted, "Evicted finished jobs from registry");
                        }
                    }
                }
            }
        })
    }
}
