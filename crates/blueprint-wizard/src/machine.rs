//! The design wizard: a forward-only state machine over [`WizardState`].
//!
//! Every transition is published on a `watch` channel so the autosave
//! controller (or a UI) can follow along. Failures leave the wizard in the
//! step that failed with a banner set; [`DesignWizard::retry`] re-runs that
//! step's initiating action.

use std::future::Future;
use std::sync::Arc;

use blueprint_engine::{ApiBridge, DesignApi, collect_stream};
use blueprint_extraction::ExtractionError;
use blueprint_jobs::{PollSettings, await_job};
use blueprint_steps::{
    AnalyzeResult, FinalDecisions, ProjectOverview, RealityCheckResult, StepContext, TechStackResult,
    ValidationReport, parse_step_output,
};
use blueprint_store::{ConversationEntry, ConversationLog};
use blueprint_utils::error::UserFriendlyError;
use blueprint_utils::{BlobKey, ProjectId, StepKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WizardError;
use crate::state::{SEED_QUESTIONS, WizardState, WizardStep, custom_key};

/// What [`DesignWizard::mount`] found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    /// Nothing usable was persisted; the wizard starts at `initial`
    Fresh,
    /// A snapshot was restored verbatim
    Restored { step: WizardStep, job_outstanding: bool },
    /// `mount` already ran for this wizard
    AlreadyMounted,
}

/// A question waiting for an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Answer key (`what`, `why`, `when`, `custom_<i>`)
    pub key: String,
    pub text: String,
}

pub struct DesignWizard {
    api: Arc<dyn DesignApi>,
    bridge: ApiBridge,
    conversation: ConversationLog,
    project: ProjectId,
    poll: PollSettings,
    state: WizardState,
    history: Vec<ConversationEntry>,
    banner: Option<String>,
    resume_notice: bool,
    mounted: bool,
    updates: watch::Sender<WizardState>,
    cancel: CancellationToken,
}

impl DesignWizard {
    #[must_use]
    pub fn new(api: Arc<dyn DesignApi>, project: ProjectId, poll: PollSettings) -> Self {
        let bridge = ApiBridge::new(api.clone());
        let conversation = ConversationLog::new(Arc::new(bridge.clone()));
        let state = WizardState::default();
        let (updates, _) = watch::channel(state.clone());
        Self {
            api,
            bridge,
            conversation,
            project,
            poll,
            state,
            history: Vec::new(),
            banner: None,
            resume_notice: false,
            mounted: false,
            updates,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    #[must_use]
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Error or advisory currently shown to the user
    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
        self.resume_notice = false;
    }

    /// Whether the restored snapshot had a job in flight
    #[must_use]
    pub fn resume_notice(&self) -> bool {
        self.resume_notice
    }

    /// Answered questions, oldest first
    #[must_use]
    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    /// Receive every published state; the receiver starts with the current one seen
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WizardState> {
        self.updates.subscribe()
    }

    /// Token that stops any in-flight poll or stream when cancelled
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Restore the persisted snapshot and conversation log, once.
    ///
    /// Read failures are logged and treated as "nothing persisted".
    pub async fn mount(&mut self) -> MountOutcome {
        if self.mounted {
            return MountOutcome::AlreadyMounted;
        }
        self.mounted = true;

        match self.conversation.load(&self.project).await {
            Ok(entries) => self.history = entries,
            Err(err) => warn!(project_id = %self.project, error = %err, "Could not load conversation log"),
        }

        let Some(snapshot) = self.read_snapshot().await else {
            return MountOutcome::Fresh;
        };
        if snapshot.step == WizardStep::Validated || snapshot.is_complete {
            debug!(project_id = %self.project, "Ignoring snapshot of a finished run");
            return MountOutcome::Fresh;
        }
        if self.state.step == WizardStep::Validated {
            return MountOutcome::Fresh;
        }

        let outcome = MountOutcome::Restored {
            step: snapshot.step,
            job_outstanding: snapshot.job_outstanding,
        };
        if snapshot.job_outstanding {
            self.resume_notice = true;
            self.banner = Some(format!(
                "A background step was still running when you left ({}). Retry it to continue.",
                snapshot.step
            ));
        }
        info!(project_id = %self.project, step = %snapshot.step, "Restored design wizard");
        self.state = snapshot;
        self.publish();
        outcome
    }

    async fn read_snapshot(&self) -> Option<WizardState> {
        let value = match self.api.get_blob(&self.project, BlobKey::DesignState).await {
            Ok(value) => value?,
            Err(err) => {
                warn!(project_id = %self.project, error = %err, "Could not read wizard snapshot");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(project_id = %self.project, error = %err, "Discarding unreadable wizard snapshot");
                None
            }
        }
    }

    /// The question the wizard is waiting on, if any
    #[must_use]
    pub fn current_question(&self) -> Option<Question> {
        match self.state.step {
            WizardStep::Initial => SEED_QUESTIONS
                .get(self.state.current_initial_question)
                .map(|(key, text)| Question {
                    key: (*key).to_string(),
                    text: (*text).to_string(),
                }),
            WizardStep::CustomQuestions => {
                let index = self.state.current_custom_question;
                self.state.custom_questions.get(index).map(|text| Question {
                    key: custom_key(index),
                    text: text.clone(),
                })
            }
            _ => None,
        }
    }

    /// Record an answer to the current question.
    ///
    /// The last seed answer launches `analyze`; the last custom answer
    /// streams `techStack`.
    pub async fn answer(&mut self, text: &str) -> Result<(), WizardError> {
        let answer = text.trim();
        if answer.is_empty() {
            return Err(WizardError::EmptyAnswer);
        }
        let Some(question) = self.current_question() else {
            return Err(self.invalid("answer"));
        };

        self.state.answers.insert(question.key.clone(), answer.to_string());
        match self.state.step {
            WizardStep::Initial => self.state.current_initial_question += 1,
            _ => self.state.current_custom_question += 1,
        }
        self.banner = None;
        self.publish();
        self.log_answer(question.text, answer.to_string()).await;

        match self.state.step {
            WizardStep::Initial if self.state.current_initial_question >= SEED_QUESTIONS.len() => {
                self.run_analyze().await
            }
            WizardStep::CustomQuestions
                if self.state.current_custom_question >= self.state.custom_questions.len() =>
            {
                self.run_tech_stack().await
            }
            _ => Ok(()),
        }
    }

    async fn log_answer(&mut self, question: String, answer: String) {
        let entry = ConversationEntry::answered(question, answer);
        if let Err(err) = self.conversation.append(&self.project, entry.clone()).await {
            warn!(project_id = %self.project, error = %err, "Could not append to conversation log");
        }
        self.history.push(entry);
    }

    /// Pick one of the offered stacks and run the reality check, the final
    /// overview and validation back to back.
    pub async fn select_tech_stack(&mut self, index: usize) -> Result<(), WizardError> {
        if self.state.step != WizardStep::TechStackChoice {
            return Err(self.invalid("select a technology stack"));
        }
        let Some(option) = self.state.tech_stack_options.get(index).cloned() else {
            return Err(WizardError::InvalidSelection {
                index,
                available: self.state.tech_stack_options.len(),
            });
        };
        self.state.selected_tech_stack = Some(option);
        self.state.step = WizardStep::RealityCheck;
        self.banner = None;
        self.publish();
        self.run_reality_check().await
    }

    /// Re-run the action that starts the current step.
    pub async fn retry(&mut self) -> Result<(), WizardError> {
        self.dismiss_banner();
        let seeds_done = self.state.current_initial_question >= SEED_QUESTIONS.len();
        let customs_done = self.state.current_custom_question >= self.state.custom_questions.len();
        match self.state.step {
            WizardStep::Initial if seeds_done => self.run_analyze().await,
            WizardStep::Analyzing => self.run_analyze().await,
            WizardStep::CustomQuestions if customs_done => self.run_tech_stack().await,
            WizardStep::RealityCheck => self.run_reality_check().await,
            WizardStep::Final => self.run_final().await,
            WizardStep::Validating => self.run_validation().await,
            _ => Err(self.invalid("retry")),
        }
    }

    /// Throw the validated design away and start over.
    pub fn modify(&mut self) -> Result<(), WizardError> {
        if self.state.step != WizardStep::Validated || self.state.is_complete {
            return Err(self.invalid("modify"));
        }
        info!(project_id = %self.project, "Resetting design wizard");
        self.state = WizardState::default();
        self.dismiss_banner();
        self.publish();
        Ok(())
    }

    /// Accept the validated design and finish the run.
    ///
    /// The decisions made along the way are sorted out of the conversation
    /// log, then the overview, the validation report and the decisions are
    /// stored with the project. Neither can fail the run: a failed
    /// extraction stores empty decision lists and a failed write is logged.
    pub async fn proceed(&mut self) -> Result<ProjectOverview, WizardError> {
        if self.state.step != WizardStep::Validated || self.state.is_complete {
            return Err(self.invalid("proceed"));
        }
        let Some(overview) = self.state.project_overview.clone() else {
            return Err(self.invalid("proceed"));
        };
        self.state.is_complete = true;
        self.publish();
        info!(project_id = %self.project, "Design accepted");

        let decisions = self.extract_decisions().await;
        let report = self
            .state
            .validation_result
            .clone()
            .unwrap_or_else(ValidationReport::placeholder);
        self.store_result(BlobKey::Description, &overview).await;
        self.store_result(BlobKey::ValidationResult, &report).await;
        self.store_result(BlobKey::FinalDecisions, &decisions).await;
        Ok(overview)
    }

    async fn extract_decisions(&self) -> FinalDecisions {
        let api = self.api.clone();
        match guarded(&self.cancel, api.extract_decisions(&self.project, &self.history)).await {
            Ok(decisions) => {
                debug!(project_id = %self.project, decisions = decisions.len(), "Decisions extracted");
                decisions
            }
            Err(WizardError::Cancelled) => FinalDecisions::default(),
            Err(err) => {
                warn!(project_id = %self.project, error = %err, "Decision extraction failed, storing none");
                FinalDecisions::default()
            }
        }
    }

    async fn store_result<T: Serialize>(&self, key: BlobKey, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(project_id = %self.project, key = %key, error = %err, "Could not serialize design result");
                return;
            }
        };
        if let Err(err) = self.api.set_blob(&self.project, key, value).await {
            warn!(project_id = %self.project, key = %key, error = %err, "Could not store design result");
        }
    }

    async fn run_analyze(&mut self) -> Result<(), WizardError> {
        self.state.step = WizardStep::Analyzing;
        let result = self.run_job(StepKind::Analyze).await;
        let analysis: AnalyzeResult = match result.and_then(decode) {
            Ok(analysis) => analysis,
            Err(err) => return Err(self.fail(StepKind::Analyze, err)),
        };

        self.state.project_type = Some(analysis.project_type);
        self.state.custom_questions = analysis
            .questions
            .into_iter()
            .filter(|q| !q.trim().is_empty())
            .collect();
        self.state.current_custom_question = 0;
        self.state.step = WizardStep::CustomQuestions;
        self.publish();
        Ok(())
    }

    async fn run_tech_stack(&mut self) -> Result<(), WizardError> {
        let options: TechStackResult = match self.run_stream(StepKind::TechStack).await {
            Ok(options) => options,
            Err(err) => return Err(self.fail(StepKind::TechStack, err)),
        };
        if options.options.is_empty() {
            warn!(project_id = %self.project, "No technology stack options offered");
        }
        self.state.tech_stack_options = options.options;
        self.state.selected_tech_stack = None;
        self.state.step = WizardStep::TechStackChoice;
        self.publish();
        Ok(())
    }

    async fn run_reality_check(&mut self) -> Result<(), WizardError> {
        self.state.step = WizardStep::RealityCheck;
        let result = self.run_job(StepKind::RealityCheck).await;
        let check: RealityCheckResult = match result.and_then(decode) {
            Ok(check) => check,
            Err(err) => return Err(self.fail(StepKind::RealityCheck, err)),
        };
        self.state.reality_check = Some(check);
        self.state.step = WizardStep::Final;
        self.publish();
        self.run_final().await
    }

    async fn run_final(&mut self) -> Result<(), WizardError> {
        self.state.step = WizardStep::Final;
        let overview: ProjectOverview = match self.run_stream(StepKind::Final).await {
            Ok(overview) => overview,
            Err(err) => return Err(self.fail(StepKind::Final, err)),
        };
        self.state.project_overview = Some(overview);
        self.state.step = WizardStep::Validating;
        self.publish();
        self.run_validation().await
    }

    /// Validate the overview; a failed call still ends in `validated`
    /// with a zero-score placeholder report.
    async fn run_validation(&mut self) -> Result<(), WizardError> {
        let Some(overview) = self.state.project_overview.clone() else {
            return Err(self.invalid("validate"));
        };
        self.state.step = WizardStep::Validating;
        self.publish();

        let api = self.api.clone();
        let project = self.project.clone();
        let report = match guarded(&self.cancel, api.validate(&project, &overview)).await {
            Ok(report) => report,
            Err(WizardError::Cancelled) => return Err(WizardError::Cancelled),
            Err(err) => {
                warn!(project_id = %self.project, error = %err, "Validation failed, using placeholder report");
                self.banner = Some(format!("Validation failed: {}", err.user_message()));
                ValidationReport::placeholder()
            }
        };
        info!(
            project_id = %self.project,
            overall_score = report.overall_score,
            degraded = report.degraded.len(),
            "Design validated"
        );
        self.state.validation_result = Some(report);
        self.state.step = WizardStep::Validated;
        self.publish();
        Ok(())
    }

    /// Launch `step` as a background job and wait for its result.
    async fn run_job(&mut self, step: StepKind) -> Result<serde_json::Value, WizardError> {
        let context = self.context();
        let api = self.api.clone();
        let project = self.project.clone();
        let job_id = guarded(
            &self.cancel,
            api.launch(&project, step, &self.state.answers, &context),
        )
        .await?;

        debug!(project_id = %self.project, job_id = %job_id, step = %step, "Waiting for job");
        self.state.current_job_id = Some(job_id.clone());
        self.state.job_outstanding = true;
        self.publish();

        let bridge = self.bridge.clone();
        let result = guarded(&self.cancel, await_job(&bridge, &job_id, &project, self.poll)).await;
        // A cancelled wait leaves the job marked outstanding for the next mount.
        if !matches!(result, Err(WizardError::Cancelled)) {
            self.state.job_outstanding = false;
            self.state.current_job_id = None;
        }
        result
    }

    /// Stream `step`, then parse the collected text.
    async fn run_stream<T: DeserializeOwned>(&mut self, step: StepKind) -> Result<T, WizardError> {
        let context = self.context();
        let api = self.api.clone();
        let project = self.project.clone();
        let answers = self.state.answers.clone();
        let text = guarded(&self.cancel, async {
            let stream = api
                .stream_step(&project, step, &answers, &context)
                .await
                .map_err(WizardError::from)?;
            collect_stream(stream).await.map_err(WizardError::from)
        })
        .await?;

        let value = parse_step_output(step, &text)?;
        decode(value)
    }

    fn context(&self) -> StepContext {
        StepContext {
            project_type: self.state.project_type.clone(),
            tech_stack: self.state.selected_tech_stack.clone(),
            reality_check: self.state.reality_check.clone(),
        }
    }

    /// Surface `err` unless it is a cancellation, keeping the current step.
    fn fail(&mut self, step: StepKind, err: WizardError) -> WizardError {
        if err.is_surfaced() {
            warn!(project_id = %self.project, step = %step, error = %err, "Design step failed");
            self.banner = Some(err.user_message());
        } else {
            debug!(project_id = %self.project, step = %step, "Design step cancelled");
        }
        self.publish();
        err
    }

    fn invalid(&self, action: &'static str) -> WizardError {
        WizardError::InvalidAction {
            step: self.state.step,
            action,
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.state.clone());
    }
}

async fn guarded<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, WizardError>
where
    F: Future<Output = Result<T, E>>,
    WizardError: From<E>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(WizardError::Cancelled),
        result = fut => result.map_err(WizardError::from),
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, WizardError> {
    serde_json::from_value(value).map_err(|err| ExtractionError::Schema(err.to_string()).into())
}
