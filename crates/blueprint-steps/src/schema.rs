//! Typed shapes of each step's structured result.
//!
//! Results are validated against these types right after extraction and
//! stored as normalized JSON, so everything downstream can rely on the
//! required fields being present.

use blueprint_extraction::{ExtractionError, parse_as};
use blueprint_utils::StepKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collected answers, keyed by question key (`what`, `why`, `when`,
/// `custom_0`, ...).
pub type Answers = BTreeMap<String, String>;

/// Output of the `analyze` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    pub project_type: String,
    pub questions: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackChoice {
    pub frontend: String,
    pub backend: String,
    pub database: String,
    pub deployment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStackOption {
    pub name: String,
    #[serde(default)]
    pub stack: StackChoice,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

/// Output of the `techStack` step; an empty option list is valid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStackResult {
    pub options: Vec<TechStackOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Risk {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub mitigation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasePlan {
    pub name: String,
    pub duration: String,
    pub features: Vec<String>,
    pub milestones: Vec<String>,
}

/// Output of the `realityCheck` step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealityCheckResult {
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub phases: Vec<PhasePlan>,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewPhase {
    pub name: String,
    pub duration: String,
    pub features: Vec<String>,
}

/// Output of the `final` step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOverview {
    #[serde(rename = "type", default)]
    pub project_type: String,
    pub goal: String,
    #[serde(default)]
    pub target_users: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tech_stack: StackChoice,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub phases: Vec<OverviewPhase>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub success_criteria: String,
    pub summary: String,
}

/// Extra inputs derived from earlier steps
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_stack: Option<TechStackOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality_check: Option<RealityCheckResult>,
}

fn parse_checked<T>(text: &str, check: impl FnOnce(&T) -> Result<(), String>) -> Result<serde_json::Value, ExtractionError>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = parse_as(text)?;
    check(&typed).map_err(ExtractionError::Schema)?;
    serde_json::to_value(&typed).map_err(|e| ExtractionError::Schema(e.to_string()))
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{field}` must not be empty"))
    } else {
        Ok(())
    }
}

/// Extract, repair and schema-check raw model text for `step`.
///
/// Returns the normalized JSON of the typed result.
pub fn parse_step_output(step: StepKind, text: &str) -> Result<serde_json::Value, ExtractionError> {
    match step {
        StepKind::Analyze => parse_checked::<AnalyzeResult>(text, |r| {
            non_empty("projectType", &r.project_type)?;
            if r.questions.iter().all(|q| q.trim().is_empty()) {
                return Err("`questions` must contain at least one question".to_string());
            }
            Ok(())
        }),
        StepKind::TechStack => parse_checked::<TechStackResult>(text, |r| {
            r.options
                .iter()
                .try_for_each(|o| non_empty("options[].name", &o.name))
        }),
        StepKind::RealityCheck => parse_checked::<RealityCheckResult>(text, |_| Ok(())),
        StepKind::Final => parse_checked::<ProjectOverview>(text, |r| {
            non_empty("goal", &r.goal)?;
            non_empty("summary", &r.summary)
        }),
    }
}
