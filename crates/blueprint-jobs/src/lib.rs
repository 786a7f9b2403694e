//! Background design jobs.
//!
//! A launch registers a `pending` job in the [`JobStore`] and queues it; a
//! fixed pool of workers runs each queued job once through the
//! [`JobExecutor`], which records the terminal outcome in the registry and
//! mirrors it to durable storage. Clients wait with [`await_job`].

mod executor;
mod launcher;
mod model;
mod poller;
mod runtime;
mod store;
mod worker;

pub use executor::{JobExecutor, JobRequest};
pub use launcher::{JobLauncher, LaunchError};
pub use model::{InvalidJobId, Job, JobId, JobSnapshot, JobUpdate};
pub use poller::{JobStatusSource, PollError, PollSettings, await_job};
pub use runtime::JobRuntime;
pub use store::{JobStore, JobStoreError, TransitionOutcome};
pub use worker::spawn_worker_pool;
