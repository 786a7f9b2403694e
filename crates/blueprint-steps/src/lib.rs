//! Design steps: what to ask the language model, what shape the answer must
//! have, and how a finished overview is validated.

pub mod decisions;
pub mod prompts;
pub mod schema;
pub mod validation;

pub use decisions::{Decision, Exchange, FinalDecisions, parse_decisions};
pub use prompts::{CallSettings, StepPrompt, step_prompt, validation_prompt};
pub use schema::{
    AnalyzeResult, Answers, OverviewPhase, PhasePlan, ProjectOverview, RealityCheckResult, Risk,
    StackChoice, StepContext, TechStackOption, TechStackResult, parse_step_output,
};
pub use validation::{DesignValidator, ValidationFacet, ValidationReport};
