//! Debounced and forced persistence of the wizard snapshot.
//!
//! The controller follows the wizard's `watch` channel. Each change restarts
//! the debounce timer; when it elapses the latest state is written wholesale.
//! Forced saves (page hidden, unload, teardown) write immediately on a
//! detached task. Write failures are logged and otherwise ignored.
//!
//! A finished run skips the timer: its snapshot is written as soon as it is
//! seen, exactly once, and every save after that is dropped. Writes are
//! serialized, so an older snapshot can never land on top of it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use blueprint_engine::DesignApi;
use blueprint_utils::{BlobKey, ProjectId};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::state::WizardState;

/// Event that writes the snapshot without waiting for the debounce timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedSave {
    PageHidden,
    Unload,
    Teardown,
}

impl ForcedSave {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PageHidden => "page_hidden",
            Self::Unload => "unload",
            Self::Teardown => "teardown",
        }
    }
}

struct Saver {
    api: Arc<dyn DesignApi>,
    project: ProjectId,
    last_saved: Mutex<Option<DateTime<Utc>>>,
    /// Held across each write; `true` once the finished snapshot is stored
    finished_saved: tokio::sync::Mutex<bool>,
}

impl Saver {
    fn new(api: Arc<dyn DesignApi>, project: ProjectId) -> Self {
        Self {
            api,
            project,
            last_saved: Mutex::new(None),
            finished_saved: tokio::sync::Mutex::new(false),
        }
    }

    async fn save(&self, mut state: WizardState, trigger: &'static str) {
        let mut finished_saved = self.finished_saved.lock().await;
        if *finished_saved {
            debug!(project_id = %self.project, trigger, "Skipping save after the run finished");
            return;
        }

        let finished = state.is_finished();
        let now = Utc::now();
        state.last_saved = Some(now);
        let value = match serde_json::to_value(&state) {
            Ok(value) => value,
            Err(err) => {
                warn!(project_id = %self.project, error = %err, "Could not serialize wizard snapshot");
                return;
            }
        };

        match self.api.set_blob(&self.project, BlobKey::DesignState, value).await {
            Ok(()) => {
                if let Ok(mut last) = self.last_saved.lock() {
                    *last = Some(now);
                }
                if finished {
                    *finished_saved = true;
                    info!(project_id = %self.project, trigger, "Final wizard snapshot saved");
                } else {
                    debug!(project_id = %self.project, trigger, step = %state.step, "Wizard snapshot saved");
                }
            }
            Err(err) => {
                warn!(project_id = %self.project, trigger, error = %err, "Autosave failed");
            }
        }
    }
}

pub struct AutosaveController {
    saver: Arc<Saver>,
    state: watch::Receiver<WizardState>,
    writes: TaskTracker,
    cancel: CancellationToken,
    debounce_task: JoinHandle<()>,
}

impl AutosaveController {
    /// Start following `state`; must run inside a tokio runtime.
    #[must_use]
    pub fn start(
        api: Arc<dyn DesignApi>,
        project: ProjectId,
        state: watch::Receiver<WizardState>,
        debounce: Duration,
    ) -> Self {
        let saver = Arc::new(Saver::new(api, project));
        let cancel = CancellationToken::new();
        let debounce_task = tokio::spawn(debounce_loop(
            saver.clone(),
            state.clone(),
            debounce,
            cancel.clone(),
        ));
        Self {
            saver,
            state,
            writes: TaskTracker::new(),
            cancel,
            debounce_task,
        }
    }

    /// Write the current state now, without waiting for the write to finish.
    pub fn force(&self, trigger: ForcedSave) {
        let state = self.state.borrow().clone();
        let saver = self.saver.clone();
        self.writes.spawn(async move { saver.save(state, trigger.as_str()).await });
    }

    /// Time of the last successful write
    #[must_use]
    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.saver.last_saved.lock().ok().and_then(|last| *last)
    }

    /// Issue the teardown save and stop the debounce timer.
    pub fn teardown(&self) {
        self.force(ForcedSave::Teardown);
        self.cancel.cancel();
        self.writes.close();
    }

    /// Tear down and wait until every issued write has finished.
    pub async fn teardown_and_flush(self) {
        self.teardown();
        self.writes.wait().await;
        if let Err(err) = self.debounce_task.await {
            warn!(error = %err, "Autosave task ended abnormally");
        }
    }
}

async fn debounce_loop(
    saver: Arc<Saver>,
    mut state: watch::Receiver<WizardState>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            changed = state.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        // Restart the timer on every change until one full quiet period
        // passes. A finished run is written right away.
        let mut sender_gone = false;
        while !state.borrow().is_finished() {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(debounce) => break,
                changed = state.changed() => {
                    if changed.is_err() {
                        sender_gone = true;
                        break;
                    }
                }
            }
        }

        let snapshot = state.borrow_and_update().clone();
        saver.save(snapshot, "debounce").await;
        if sender_gone {
            return;
        }
    }
}
