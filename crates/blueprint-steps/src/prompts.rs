//! Instruction templates for the design steps and validation facets.

use std::fmt::Write as _;
use std::time::Duration;

use blueprint_config::LlmConfig;
use blueprint_llm::{LlmInvocation, Message};
use blueprint_utils::{ProjectId, StepKind};

use crate::decisions::{DECISIONS_LABEL, Exchange, decisions_prompt};
use crate::schema::{Answers, ProjectOverview, StepContext};
use crate::validation::ValidationFacet;

pub(crate) const JSON_ONLY: &str = "Respond with a single JSON object and nothing else. Do not wrap it in prose.";

/// System and user text for one language model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPrompt {
    pub system: String,
    pub user: String,
}

impl StepPrompt {
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        vec![Message::system(self.system), Message::user(self.user)]
    }
}

/// Call parameters shared by every step
#[derive(Debug, Clone, PartialEq)]
pub struct CallSettings {
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub validation_max_tokens: u32,
    pub temperature: f32,
}

impl CallSettings {
    #[must_use]
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self {
            model: llm.model.clone(),
            timeout: llm.timeout(),
            max_tokens: llm.max_tokens,
            validation_max_tokens: llm.validation_max_tokens,
            temperature: llm.temperature,
        }
    }

    fn invocation(&self, project_id: &ProjectId, label: &str, prompt: StepPrompt, max_tokens: u32) -> LlmInvocation {
        LlmInvocation::new(project_id.as_str(), label, self.timeout, prompt.into_messages())
            .with_model(self.model.clone())
            .with_metadata("max_tokens", serde_json::json!(max_tokens))
            .with_metadata("temperature", serde_json::json!(self.temperature))
    }

    /// Build the call for a design step
    #[must_use]
    pub fn step_invocation(
        &self,
        project_id: &ProjectId,
        step: StepKind,
        answers: &Answers,
        context: &StepContext,
    ) -> LlmInvocation {
        self.invocation(
            project_id,
            step.as_str(),
            step_prompt(step, answers, context),
            self.max_tokens,
        )
    }

    /// Build the call for one validation facet
    #[must_use]
    pub fn validation_invocation(
        &self,
        project_id: &ProjectId,
        facet: ValidationFacet,
        overview: &ProjectOverview,
    ) -> LlmInvocation {
        self.invocation(
            project_id,
            facet.label(),
            validation_prompt(facet, overview),
            self.validation_max_tokens,
        )
    }

    /// Build the call that sorts the decisions out of a conversation
    #[must_use]
    pub fn decisions_invocation(&self, project_id: &ProjectId, exchanges: &[Exchange]) -> LlmInvocation {
        self.invocation(
            project_id,
            DECISIONS_LABEL,
            decisions_prompt(exchanges),
            self.validation_max_tokens,
        )
    }
}

impl Default for CallSettings {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

fn render_answers(answers: &Answers) -> String {
    let mut out = String::new();
    for (key, answer) in answers {
        let _ = writeln!(out, "- {key}: {answer}");
    }
    if out.is_empty() {
        out.push_str("(no answers yet)\n");
    }
    out
}

fn render_context(context: &StepContext) -> String {
    let mut out = String::new();
    if let Some(project_type) = &context.project_type {
        let _ = writeln!(out, "Project type: {project_type}");
    }
    if let Some(option) = &context.tech_stack {
        let _ = writeln!(
            out,
            "Chosen technology stack: {} (frontend: {}, backend: {}, database: {}, deployment: {})",
            option.name,
            option.stack.frontend,
            option.stack.backend,
            option.stack.database,
            option.stack.deployment
        );
    }
    if let Some(reality) = &context.reality_check {
        let _ = writeln!(out, "Feasibility recommendation: {}", reality.recommendation);
        for warning in &reality.warnings {
            let _ = writeln!(out, "Warning: {warning}");
        }
        for phase in &reality.phases {
            let _ = writeln!(out, "Proposed phase: {} ({})", phase.name, phase.duration);
        }
    }
    out
}

/// Template for a design step
#[must_use]
pub fn step_prompt(step: StepKind, answers: &Answers, context: &StepContext) -> StepPrompt {
    let (role, task, shape) = match step {
        StepKind::Analyze => (
            "You are a product planning assistant helping a solo developer scope a project.",
            "Classify the project and write 5 to 7 follow-up questions that would most improve the plan.",
            r#"{"projectType": string, "questions": [string], "reasoning": string}"#,
        ),
        StepKind::TechStack => (
            "You are a pragmatic software architect.",
            "Propose two or three technology stacks that fit the project and the developer's timeline.",
            r#"{"options": [{"name": string, "stack": {"frontend": string, "backend": string, "database": string, "deployment": string}, "pros": [string], "cons": [string], "reason": string}]}"#,
        ),
        StepKind::RealityCheck => (
            "You are an experienced engineering lead reviewing a plan for realism.",
            "List warnings and risks, split the work into phases and give an honest recommendation.",
            r#"{"warnings": [string], "risks": [{"type": string, "description": string, "mitigation": string}], "phases": [{"name": string, "duration": string, "features": [string], "milestones": [string]}], "recommendation": string}"#,
        ),
        StepKind::Final => (
            "You are a product planning assistant writing the final project brief.",
            "Summarize the agreed project into a complete overview.",
            r#"{"type": string, "goal": string, "targetUsers": string, "features": [string], "techStack": {"frontend": string, "backend": string, "database": string, "deployment": string}, "timeline": string, "phases": [{"name": string, "duration": string, "features": [string]}], "risks": [string], "successCriteria": string, "summary": string}"#,
        ),
    };

    StepPrompt {
        system: format!("{role}\n{JSON_ONLY}\nShape: {shape}"),
        user: format!(
            "{task}\n\nAnswers so far:\n{}{}",
            render_answers(answers),
            render_context(context)
        ),
    }
}

/// Template for one validation facet of a finished overview
#[must_use]
pub fn validation_prompt(facet: ValidationFacet, overview: &ProjectOverview) -> StepPrompt {
    let (task, shape) = match facet {
        ValidationFacet::Benchmarking => (
            "Compare the project with existing products and describe its market position.",
            r#"{"competitors": [{"name": string, "similarity": string, "strengths": [string], "weaknesses": [string], "differentiation": string}], "marketPosition": string, "risks": [string], "opportunities": [string]}"#,
        ),
        ValidationFacet::Uiux => (
            "Review the planned user experience against common best practices and score it from 0 to 100.",
            r#"{"bestPractices": [{"category": string, "current": string, "recommendation": string, "priority": string}], "strengths": [string], "improvements": [{"issue": string, "suggestion": string, "impact": string}], "score": number}"#,
        ),
        ValidationFacet::Feasibility => (
            "Estimate each feature and judge whether the timeline is realistic.",
            r#"{"features": [{"name": string, "estimatedTime": string, "complexity": string, "dependencies": [string], "risks": [string]}], "totalEstimate": string, "criticalPath": [string], "bottlenecks": [string], "realistic": boolean, "warnings": [string]}"#,
        ),
        ValidationFacet::TechStack => (
            "Critique the chosen technology stack and suggest alternatives where useful.",
            r#"{"currentStack": {"pros": [string], "cons": [string], "suitability": string}, "alternatives": [{"name": string, "pros": [string], "cons": [string], "whenToUse": string}], "recommendations": [string], "concerns": [string]}"#,
        ),
    };
    let overview_json = serde_json::to_string_pretty(overview).unwrap_or_default();

    StepPrompt {
        system: format!("You are a critical reviewer of software project plans.\n{JSON_ONLY}\nShape: {shape}"),
        user: format!("{task}\n\nProject overview:\n{overview_json}"),
    }
}
