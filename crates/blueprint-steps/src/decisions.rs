//! Sorting the decisions made during a design conversation into settled,
//! open and postponed ones.

use std::fmt::Write as _;

use blueprint_extraction::{ExtractionError, parse_as};
use serde::{Deserialize, Serialize};

use crate::prompts::{JSON_ONLY, StepPrompt};

/// Language model call label of the decision extraction
pub const DECISIONS_LABEL: &str = "extractDecisions";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Decision {
    pub decision: String,
    pub reason: String,
}

/// Decisions taken from the conversation, grouped by how settled they are
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalDecisions {
    /// Agreed and fixed
    pub completed: Vec<Decision>,
    /// Still being discussed or on hold
    pub pending: Vec<Decision>,
    /// Explicitly left for later
    pub deferred: Vec<Decision>,
}

impl FinalDecisions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.pending.is_empty() && self.deferred.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.completed.len() + self.pending.len() + self.deferred.len()
    }

    fn drop_blank(mut self) -> Self {
        for list in [&mut self.completed, &mut self.pending, &mut self.deferred] {
            list.retain(|d| !d.decision.trim().is_empty());
        }
        self
    }
}

/// One question and the answer given to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Template for the decision extraction over `exchanges`
#[must_use]
pub fn decisions_prompt(exchanges: &[Exchange]) -> StepPrompt {
    let mut transcript = String::new();
    for exchange in exchanges {
        let _ = writeln!(transcript, "Question: {}", exchange.question);
        if !exchange.answer.trim().is_empty() {
            let _ = writeln!(transcript, "Answer: {}", exchange.answer);
        }
    }
    if transcript.is_empty() {
        transcript.push_str("(no conversation)\n");
    }

    StepPrompt {
        system: format!(
            "You are a project management expert. Extract the final decisions from the conversation and sort them:\n\
             completed: agreed and fixed; pending: still being discussed or on hold; deferred: postponed to later.\n\
             Keep every decision concrete.\n{JSON_ONLY}\n\
             Shape: {{\"completed\": [{{\"decision\": string, \"reason\": string}}], \"pending\": [...], \"deferred\": [...]}}"
        ),
        user: format!("Extract the final decisions from this conversation:\n\n{transcript}"),
    }
}

/// Extract and repair the model's answer. Missing groups are empty and
/// entries without a decision are dropped.
pub fn parse_decisions(text: &str) -> Result<FinalDecisions, ExtractionError> {
    parse_as::<FinalDecisions>(text).map(FinalDecisions::drop_blank)
}
