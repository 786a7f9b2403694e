//! Resumable snapshot of one design conversation.

use blueprint_jobs::JobId;
use blueprint_steps::{Answers, ProjectOverview, RealityCheckResult, TechStackOption, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wizard steps in the order a run moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    #[default]
    Initial,
    Analyzing,
    CustomQuestions,
    TechStackChoice,
    RealityCheck,
    Final,
    Validating,
    Validated,
}

impl WizardStep {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Analyzing => "analyzing",
            Self::CustomQuestions => "customQuestions",
            Self::TechStackChoice => "techStackChoice",
            Self::RealityCheck => "realityCheck",
            Self::Final => "final",
            Self::Validating => "validating",
            Self::Validated => "validated",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed opening questions, asked in order
pub const SEED_QUESTIONS: [(&str, &str); 3] = [
    ("what", "What do you want to build?"),
    ("why", "Why do you want to build it?"),
    ("when", "When do you want it finished?"),
];

/// Answer key of the custom question at `index`
#[must_use]
pub fn custom_key(index: usize) -> String {
    format!("custom_{index}")
}

/// Persisted wizard snapshot, written wholesale on every save
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardState {
    pub step: WizardStep,
    pub answers: Answers,
    pub current_initial_question: usize,
    pub current_custom_question: usize,
    pub custom_questions: Vec<String>,
    pub project_type: Option<String>,
    pub tech_stack_options: Vec<TechStackOption>,
    pub selected_tech_stack: Option<TechStackOption>,
    pub reality_check: Option<RealityCheckResult>,
    pub project_overview: Option<ProjectOverview>,
    pub validation_result: Option<ValidationReport>,
    /// A background job was running when the snapshot was taken
    pub job_outstanding: bool,
    pub current_job_id: Option<JobId>,
    pub is_complete: bool,
    pub last_saved: Option<DateTime<Utc>>,
}

impl WizardState {
    /// A finished run's snapshot is written once and never restored.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.step == WizardStep::Validated && self.is_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_wire_names() {
        assert_eq!(
            serde_json::to_value(WizardStep::TechStackChoice).unwrap(),
            json!("techStackChoice")
        );
        assert_eq!(WizardStep::CustomQuestions.as_str(), "customQuestions");
        assert!(WizardStep::Initial < WizardStep::Validated);
    }

    #[test]
    fn test_snapshot_field_names() {
        let state = WizardState {
            step: WizardStep::CustomQuestions,
            current_custom_question: 2,
            ..WizardState::default()
        };
        let value = serde_json::to_value(&state).unwrap();
        for key in [
            "step",
            "answers",
            "currentInitialQuestion",
            "currentCustomQuestion",
            "customQuestions",
            "projectType",
            "techStackOptions",
            "selectedTechStack",
            "realityCheck",
            "projectOverview",
            "validationResult",
            "jobOutstanding",
            "currentJobId",
            "isComplete",
            "lastSaved",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_partial_snapshot_loads() {
        let state: WizardState = serde_json::from_value(json!({
            "step": "customQuestions",
            "answers": {"what": "shop", "why": "learn", "when": "soon", "custom_0": "everyone"},
            "customQuestions": ["Who?", "How?"],
            "currentCustomQuestion": 1
        }))
        .unwrap();
        assert_eq!(state.step, WizardStep::CustomQuestions);
        assert_eq!(state.answers.len(), 4);
        assert!(!state.job_outstanding);
    }
}
