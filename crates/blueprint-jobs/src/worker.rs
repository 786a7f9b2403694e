//! Worker pool draining the job queue.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::executor::{JobExecutor, JobRequest};

/// Spawn the dispatcher that runs queued jobs with at most `workers` in
/// flight.
///
/// On cancellation the dispatcher stops taking new jobs and waits for the
/// running ones to finish. Jobs still queued at that point stay `pending`.
pub fn spawn_worker_pool(
    executor: Arc<JobExecutor>,
    mut queue: mpsc::Receiver<JobRequest>,
    workers: usize,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let concurrency = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let running = TaskTracker::new();

    tokio::spawn(async move {
        info!(concurrency, "Job worker pool started");

        loop {
            let permit = tokio::select! {
                () = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(err) => {
                        error!(error = %err, "Worker semaphore closed");
                        break;
                    }
                },
            };

            let request = tokio::select! {
                () = cancel.cancelled() => break,
                request = queue.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let executor = executor.clone();
            running.spawn(async move {
                let status = executor.execute(request).await;
                debug!(%status, "Worker finished job");
                drop(permit);
            });
        }

        running.close();
        running.wait().await;
        executor.flush_mirror_writes().await;
        info!("Job worker pool stopped");
    })
}
