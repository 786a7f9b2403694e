use std::sync::Arc;

use blueprint_config::JobsConfig;
use blueprint_llm::LlmBackend;
use blueprint_steps::CallSettings;
use blueprint_store::{JobMirror, ProjectAccess};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::executor::JobExecutor;
use crate::launcher::JobLauncher;
use crate::store::JobStore;
use crate::worker::spawn_worker_pool;

/// Registry, launcher, worker pool and evictor wired together
pub struct JobRuntime {
    jobs: Arc<JobStore>,
    mirror: JobMirror,
    launcher: JobLauncher,
    cancel: CancellationToken,
    pool: JoinHandle<()>,
    evictor: JoinHandle<()>,
}

impl JobRuntime {
    /// Start the background tasks. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(
        config: &JobsConfig,
        backend: Arc<dyn LlmBackend>,
        settings: CallSettings,
        mirror: JobMirror,
        access: Arc<dyn ProjectAccess>,
    ) -> Self {
        let jobs = Arc::new(JobStore::new());
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let cancel = CancellationToken::new();

        let executor = Arc::new(JobExecutor::new(backend, settings, jobs.clone(), mirror.clone()));
        let pool = spawn_worker_pool(executor, rx, config.workers, cancel.clone());
        let evictor = jobs.clone().spawn_evictor(
            config.eviction_interval(),
            config.eviction_grace(),
            cancel.clone(),
        );

        Self {
            launcher: JobLauncher::new(jobs.clone(), tx, access),
            jobs,
            mirror,
            cancel,
            pool,
            evictor,
        }
    }

    #[must_use]
    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    #[must_use]
    pub fn mirror(&self) -> &JobMirror {
        &self.mirror
    }

    #[must_use]
    pub fn launcher(&self) -> &JobLauncher {
        &self.launcher
    }

    /// Stop taking jobs and wait for running ones and their mirror writes.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in [("worker pool", self.pool), ("evictor", self.evictor)] {
            if let Err(err) = handle.await {
                warn!(task = name, error = %err, "Background task ended abnormally");
            }
        }
    }
}
