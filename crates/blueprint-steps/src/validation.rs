//! Four-way design validation with partial-failure tolerance.
//!
//! The facets run concurrently against the language model and are joined
//! before scoring. A facet that fails (gateway error or unusable output) is
//! reported in `degraded`, contributes its default shape, and is left out of
//! the weighted score.

use std::sync::Arc;

use blueprint_extraction::parse_as;
use blueprint_llm::LlmBackend;
use blueprint_utils::ProjectId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::prompts::CallSettings;
use crate::schema::ProjectOverview;

/// One independent validation sub-call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationFacet {
    #[serde(rename = "benchmarking")]
    Benchmarking,
    #[serde(rename = "uiux")]
    Uiux,
    #[serde(rename = "feasibility")]
    Feasibility,
    #[serde(rename = "techStack")]
    TechStack,
}

impl ValidationFacet {
    pub const ALL: [ValidationFacet; 4] = [
        ValidationFacet::Benchmarking,
        ValidationFacet::Uiux,
        ValidationFacet::Feasibility,
        ValidationFacet::TechStack,
    ];

    /// Language model call label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Benchmarking => "validate.benchmarking",
            Self::Uiux => "validate.uiux",
            Self::Feasibility => "validate.feasibility",
            Self::TechStack => "validate.techStack",
        }
    }

    /// Share of the overall score when every facet succeeds
    #[must_use]
    pub const fn weight(&self) -> f64 {
        match self {
            Self::Uiux | Self::Feasibility => 0.3,
            Self::Benchmarking | Self::TechStack => 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BenchmarkingReport {
    pub competitors: Vec<Value>,
    pub market_position: String,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Improvement {
    pub issue: String,
    pub suggestion: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiuxReport {
    pub best_practices: Vec<Value>,
    pub strengths: Vec<String>,
    pub improvements: Vec<Improvement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeasibilityReport {
    pub features: Vec<Value>,
    pub total_estimate: String,
    pub critical_path: Vec<String>,
    pub bottlenecks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realistic: Option<bool>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackAssessment {
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub suitability: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TechStackReview {
    pub current_stack: StackAssessment,
    pub alternatives: Vec<Value>,
    pub recommendations: Vec<String>,
    pub concerns: Vec<String>,
}

/// Aggregated outcome of the four validation facets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub overall_score: u32,
    pub benchmarking: BenchmarkingReport,
    pub uiux: UiuxReport,
    pub feasibility: FeasibilityReport,
    pub tech_stack: TechStackReview,
    pub issues: Vec<String>,
    pub strengths: Vec<String>,
    pub suggestions: Vec<String>,
    /// Facets whose call failed and were replaced by their default shape
    #[serde(default)]
    pub degraded: Vec<ValidationFacet>,
    pub timestamp: DateTime<Utc>,
}

impl ValidationReport {
    /// Zero-score report used when the validation call as a whole fails
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            overall_score: 0,
            benchmarking: BenchmarkingReport::default(),
            uiux: UiuxReport::default(),
            feasibility: FeasibilityReport::default(),
            tech_stack: TechStackReview::default(),
            issues: Vec::new(),
            strengths: Vec::new(),
            suggestions: Vec::new(),
            degraded: ValidationFacet::ALL.to_vec(),
            timestamp: Utc::now(),
        }
    }

    /// Combine facet outcomes into one report; `None` marks a failed facet.
    #[must_use]
    pub fn aggregate(
        benchmarking: Option<BenchmarkingReport>,
        uiux: Option<UiuxReport>,
        feasibility: Option<FeasibilityReport>,
        tech_stack: Option<TechStackReview>,
    ) -> Self {
        let mut scored: Vec<(ValidationFacet, f64)> = Vec::with_capacity(4);
        let mut degraded = Vec::new();

        match &benchmarking {
            Some(_) => scored.push((ValidationFacet::Benchmarking, 70.0)),
            None => degraded.push(ValidationFacet::Benchmarking),
        }
        match &uiux {
            Some(report) => {
                let score = report
                    .score
                    .filter(|s| *s > 0.0)
                    .map_or(70.0, |s| s.clamp(0.0, 100.0));
                scored.push((ValidationFacet::Uiux, score));
            }
            None => degraded.push(ValidationFacet::Uiux),
        }
        match &feasibility {
            Some(report) => {
                let score = if report.realistic == Some(true) { 80.0 } else { 50.0 };
                scored.push((ValidationFacet::Feasibility, score));
            }
            None => degraded.push(ValidationFacet::Feasibility),
        }
        match &tech_stack {
            Some(_) => scored.push((ValidationFacet::TechStack, 75.0)),
            None => degraded.push(ValidationFacet::TechStack),
        }

        let benchmarking = benchmarking.unwrap_or_default();
        let uiux = uiux.unwrap_or_default();
        let feasibility = feasibility.unwrap_or_default();
        let tech_stack = tech_stack.unwrap_or_default();

        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        issues.extend(benchmarking.risks.iter().map(|r| format!("Market: {r}")));
        suggestions.extend(
            benchmarking
                .opportunities
                .iter()
                .map(|o| format!("Opportunity: {o}")),
        );
        for improvement in &uiux.improvements {
            if !improvement.issue.is_empty() {
                issues.push(format!("UI/UX: {}", improvement.issue));
            }
            if !improvement.suggestion.is_empty() {
                suggestions.push(format!("UI/UX: {}", improvement.suggestion));
            }
        }
        issues.extend(feasibility.warnings.iter().map(|w| format!("Feasibility: {w}")));
        suggestions.extend(
            feasibility
                .bottlenecks
                .iter()
                .map(|b| format!("Resolve bottleneck: {b}")),
        );
        issues.extend(tech_stack.concerns.iter().map(|c| format!("Tech: {c}")));
        suggestions.extend(tech_stack.recommendations.iter().cloned());

        Self {
            overall_score: weighted_score(&scored),
            strengths: uiux.strengths.clone(),
            benchmarking,
            uiux,
            feasibility,
            tech_stack,
            issues,
            suggestions,
            degraded,
            timestamp: Utc::now(),
        }
    }
}

/// Weighted mean over the facets that produced a score, renormalized so the
/// surviving weights sum to one. No scores yields 0.
#[must_use]
pub fn weighted_score(scored: &[(ValidationFacet, f64)]) -> u32 {
    let total_weight: f64 = scored.iter().map(|(facet, _)| facet.weight()).sum();
    if total_weight <= 0.0 {
        return 0;
    }
    let sum: f64 = scored
        .iter()
        .map(|(facet, score)| facet.weight() * score)
        .sum();
    (sum / total_weight).round().clamp(0.0, 100.0) as u32
}

/// Runs the validation fan-out against a language model backend
#[derive(Clone)]
pub struct DesignValidator {
    backend: Arc<dyn LlmBackend>,
    settings: CallSettings,
}

impl DesignValidator {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, settings: CallSettings) -> Self {
        Self { backend, settings }
    }

    /// Validate `overview`. Always produces a report; failed facets degrade.
    pub async fn validate(&self, project_id: &ProjectId, overview: &ProjectOverview) -> ValidationReport {
        let (benchmarking, uiux, feasibility, tech_stack) = tokio::join!(
            self.run_facet::<BenchmarkingReport>(project_id, ValidationFacet::Benchmarking, overview),
            self.run_facet::<UiuxReport>(project_id, ValidationFacet::Uiux, overview),
            self.run_facet::<FeasibilityReport>(project_id, ValidationFacet::Feasibility, overview),
            self.run_facet::<TechStackReview>(project_id, ValidationFacet::TechStack, overview),
        );

        let report = ValidationReport::aggregate(benchmarking, uiux, feasibility, tech_stack);
        debug!(
            project_id = %project_id,
            overall_score = report.overall_score,
            degraded = report.degraded.len(),
            "Validation aggregated"
        );
        report
    }

    async fn run_facet<T: DeserializeOwned>(
        &self,
        project_id: &ProjectId,
        facet: ValidationFacet,
        overview: &ProjectOverview,
    ) -> Option<T> {
        let inv = self.settings.validation_invocation(project_id, facet, overview);
        let raw = match self.backend.invoke(inv).await {
            Ok(result) => result.raw_response,
            Err(err) => {
                warn!(project_id = %project_id, facet = facet.label(), error = %err, "Validation facet failed");
                return None;
            }
        };
        match parse_as::<T>(&raw) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(project_id = %project_id, facet = facet.label(), error = %err, "Validation facet output unusable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_llm::{LlmError, ScriptedBackend, ScriptedReply};

    fn overview() -> ProjectOverview {
        serde_json::from_str(r#"{"goal":"sell things","summary":"a shop"}"#).unwrap()
    }

    fn full_backend() -> ScriptedBackend {
        ScriptedBackend::new()
            .with_reply(
                "validate.benchmarking",
                ScriptedReply::text(r#"{"risks":["crowded"],"opportunities":["niche"]}"#),
            )
            .with_reply(
                "validate.uiux",
                ScriptedReply::text(
                    r#"{"strengths":["clear"],"improvements":[{"issue":"dense","suggestion":"split"}],"score":90}"#,
                ),
            )
            .with_reply(
                "validate.feasibility",
                ScriptedReply::text(r#"{"realistic":true,"warnings":["tight"],"bottlenecks":["auth"]}"#),
            )
            .with_reply(
                "validate.techStack",
                ScriptedReply::text(r#"{"concerns":["scaling"],"recommendations":["add cache"]}"#),
            )
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = ValidationFacet::ALL.iter().map(ValidationFacet::weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_score_renormalizes() {
        assert_eq!(weighted_score(&[]), 0);
        assert_eq!(weighted_score(&[(ValidationFacet::TechStack, 75.0)]), 75);
        // (0.3*80 + 0.2*70) / 0.5 = 76
        assert_eq!(
            weighted_score(&[
                (ValidationFacet::Feasibility, 80.0),
                (ValidationFacet::Benchmarking, 70.0)
            ]),
            76
        );
    }

    #[test]
    fn test_aggregate_defaults_match_legacy_scores() {
        let report = ValidationReport::aggregate(
            Some(BenchmarkingReport::default()),
            Some(UiuxReport::default()),
            Some(FeasibilityReport::default()),
            Some(TechStackReview::default()),
        );
        // 0.3*70 + 0.3*50 + 0.2*75 + 0.2*70 = 65
        assert_eq!(report.overall_score, 65);
        assert!(report.degraded.is_empty());
    }

    #[test]
    fn test_placeholder_is_zero() {
        let report = ValidationReport::placeholder();
        assert_eq!(report.overall_score, 0);
        assert_eq!(report.degraded.len(), 4);
    }

    #[tokio::test]
    async fn test_all_facets_succeed() {
        let validator = DesignValidator::new(Arc::new(full_backend()), CallSettings::default());
        let project = ProjectId::new("p").unwrap();

        let report = validator.validate(&project, &overview()).await;

        // 0.2*70 + 0.3*90 + 0.3*80 + 0.2*75 = 80
        assert_eq!(report.overall_score, 80);
        assert_eq!(report.strengths, vec!["clear".to_string()]);
        assert!(report.issues.contains(&"Market: crowded".to_string()));
        assert!(report.issues.contains(&"UI/UX: dense".to_string()));
        assert!(report.issues.contains(&"Feasibility: tight".to_string()));
        assert!(report.issues.contains(&"Tech: scaling".to_string()));
        assert!(report.suggestions.contains(&"Opportunity: niche".to_string()));
        assert!(report.suggestions.contains(&"Resolve bottleneck: auth".to_string()));
        assert!(report.suggestions.contains(&"add cache".to_string()));
    }

    #[tokio::test]
    async fn test_partial_failure_still_scores() {
        let backend = full_backend();
        backend.enqueue(
            "validate.uiux",
            ScriptedReply::Fail(LlmError::ProviderOutage("down".to_string())),
        );
        backend.enqueue("validate.benchmarking", ScriptedReply::text("no json here"));
        let validator = DesignValidator::new(Arc::new(backend), CallSettings::default());
        let project = ProjectId::new("p").unwrap();

        let report = validator.validate(&project, &overview()).await;

        // (0.3*80 + 0.2*75) / 0.5 = 78
        assert_eq!(report.overall_score, 78);
        assert_eq!(
            report.degraded,
            vec![ValidationFacet::Benchmarking, ValidationFacet::Uiux]
        );
        assert_eq!(report.uiux, UiuxReport::default());
    }

    #[tokio::test]
    async fn test_two_heavy_facets_fail() {
        let backend = full_backend();
        backend.enqueue(
            "validate.feasibility",
            ScriptedReply::Fail(LlmError::ProviderOutage("down".to_string())),
        );
        backend.enqueue("validate.techStack", ScriptedReply::text("no json here"));
        let validator = DesignValidator::new(Arc::new(backend), CallSettings::default());
        let project = ProjectId::new("p").unwrap();

        let report = validator.validate(&project, &overview()).await;

        // (0.2*70 + 0.3*90) / 0.5 = 82
        assert_eq!(report.overall_score, 82);
        assert_eq!(
            report.degraded,
            vec![ValidationFacet::Feasibility, ValidationFacet::TechStack]
        );
        assert!(report.issues.contains(&"UI/UX: dense".to_string()));
        assert!(!report.issues.iter().any(|i| i.starts_with("Tech:")));
        assert_eq!(report.feasibility, FeasibilityReport::default());
    }

    #[tokio::test]
    async fn test_three_facets_fail_scores_survivor() {
        let backend = ScriptedBackend::new()
            .with_reply(
                "validate.uiux",
                ScriptedReply::text(r#"{"strengths":["clear"],"score":90}"#),
            )
            .with_reply(
                "validate.feasibility",
                ScriptedReply::Fail(LlmError::ProviderOutage("down".to_string())),
            )
            .with_reply("validate.techStack", ScriptedReply::text("no json here"));
        let validator = DesignValidator::new(Arc::new(backend), CallSettings::default());
        let project = ProjectId::new("p").unwrap();

        let report = validator.validate(&project, &overview()).await;

        assert_eq!(report.overall_score, 90);
        assert_eq!(
            report.degraded,
            vec![
                ValidationFacet::Benchmarking,
                ValidationFacet::Feasibility,
                ValidationFacet::TechStack
            ]
        );
        assert_eq!(report.strengths, vec!["clear".to_string()]);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_all_facets_fail_scores_zero() {
        let validator = DesignValidator::new(Arc::new(ScriptedBackend::new()), CallSettings::default());
        let project = ProjectId::new("p").unwrap();

        let report = validator.validate(&project, &overview()).await;

        assert_eq!(report.overall_score, 0);
        assert_eq!(report.degraded.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_facets_run_concurrently() {
        let backend = full_backend().with_delay(std::time::Duration::from_secs(10));
        let validator = DesignValidator::new(Arc::new(backend), CallSettings::default());
        let project = ProjectId::new("p").unwrap();
        let started = tokio::time::Instant::now();

        let report = validator.validate(&project, &overview()).await;

        assert!(report.degraded.is_empty());
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }

    #[test]
    fn test_report_wire_shape() {
        let value = serde_json::to_value(ValidationReport::placeholder()).unwrap();
        assert_eq!(value["overallScore"], 0);
        assert!(value.get("techStack").is_some());
        assert_eq!(value["degraded"][0], "benchmarking");
    }
}
