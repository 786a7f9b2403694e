//! Scripted backend: canned replies keyed by invocation label.
//!
//! Used by tests and by `provider = "scripted"` for offline runs. Each label
//! has an optional queue of one-shot replies consumed first, then a standing
//! reply used for every later call.

use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, TextStream};

/// One canned reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Full text, streamed as a single fragment
    Text(String),
    /// Text delivered as separate stream fragments (concatenated for `invoke`)
    Fragments(Vec<String>),
    /// Fail before producing anything
    Fail(LlmError),
    /// Stream the fragments, then break off without an end marker
    Interrupted(Vec<String>),
    /// Never answer
    Hang,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(fragments.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    queued: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
    standing: HashMap<String, ScriptedReply>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used for every call with `label` once its queue is empty.
    #[must_use]
    pub fn with_reply(mut self, label: impl Into<String>, reply: ScriptedReply) -> Self {
        self.standing.insert(label.into(), reply);
        self
    }

    /// Latency added before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a one-shot reply for the next call with `label`.
    pub fn enqueue(&self, label: impl Into<String>, reply: ScriptedReply) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.entry(label.into()).or_default().push_back(reply);
        }
    }

    /// Labels of every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn call_count(&self, label: &str) -> usize {
        self.calls().iter().filter(|l| l.as_str() == label).count()
    }

    async fn next_reply(&self, label: &str) -> Result<ScriptedReply, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(label.to_string());
        }
        let queued = self
            .queued
            .lock()
            .ok()
            .and_then(|mut q| q.get_mut(label).and_then(VecDeque::pop_front));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        queued
            .or_else(|| self.standing.get(label).cloned())
            .ok_or_else(|| LlmError::Unsupported(format!("no scripted reply for '{label}'")))
    }

    /// Backend preloaded with plausible replies for every step and
    /// validation facet, for offline demos.
    #[must_use]
    pub fn demo() -> Self {
        let mut backend = Self::new().with_delay(Duration::from_millis(300));
        for (label, body) in DEMO_REPLIES {
            backend = backend.with_reply(*label, ScriptedReply::text(*body));
        }
        backend
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        match self.next_reply(&inv.label).await? {
            ScriptedReply::Text(text) => Ok(LlmResult::new(text, "scripted", "scripted")),
            ScriptedReply::Fragments(parts) => {
                Ok(LlmResult::new(parts.concat(), "scripted", "scripted"))
            }
            ScriptedReply::Fail(err) => Err(err),
            ScriptedReply::Interrupted(_) => Err(LlmError::StreamInterrupted(
                "scripted interruption".to_string(),
            )),
            ScriptedReply::Hang => std::future::pending().await,
        }
    }

    async fn stream(&self, inv: LlmInvocation) -> Result<TextStream, LlmError> {
        match self.next_reply(&inv.label).await? {
            ScriptedReply::Text(text) => Ok(Box::pin(stream::iter([Ok(text)]))),
            ScriptedReply::Fragments(parts) => {
                Ok(Box::pin(stream::iter(parts.into_iter().map(Ok))))
            }
            ScriptedReply::Fail(err) => Err(err),
            ScriptedReply::Interrupted(parts) => {
                let items: Vec<Result<String, LlmError>> = parts
                    .into_iter()
                    .map(Ok)
                    .chain([Err(LlmError::StreamInterrupted(
                        "scripted interruption".to_string(),
                    ))])
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
            ScriptedReply::Hang => Ok(Box::pin(stream::pending())),
        }
    }
}

const DEMO_REPLIES: &[(&str, &str)] = &[
    (
        "analyze",
        r#"Here is my analysis:
```json
{
  "projectType": "online shop",
  "questions": [
    "Who are your primary customers?",
    "What kinds of products will you sell?",
    "Which payment methods do you need?",
    "Do you need inventory management?",
    "Will you ship internationally?"
  ],
  "reasoning": "The goals describe selling goods to consumers online."
}
```"#,
    ),
    (
        "techStack",
        r#"{"options": [
  {"name": "Modern Stack", "stack": {"frontend": "Next.js", "backend": "Node.js API routes", "database": "PostgreSQL", "deployment": "Vercel"},
   "pros": ["Fast iteration", "Large ecosystem"], "cons": ["Vendor coupling"], "reason": "Good fit for a small team learning web development."},
  {"name": "Lightweight Stack", "stack": {"frontend": "Astro", "backend": "Hosted commerce API", "database": "Managed by provider", "deployment": "Netlify"},
   "pros": ["Minimal code"], "cons": ["Less control"], "reason": "Ships quickly within a three month window."}
]}"#,
    ),
    (
        "realityCheck",
        r#"{"warnings": ["Payments integration often takes longer than planned"],
 "risks": [{"type": "schedule", "description": "Three months is tight for custom checkout", "mitigation": "Use a hosted checkout"}],
 "phases": [
   {"name": "Foundation", "duration": "4 weeks", "features": ["Catalog", "Accounts"], "milestones": ["Catalog live"]},
   {"name": "Commerce", "duration": "6 weeks", "features": ["Cart", "Checkout"], "milestones": ["First order"]}
 ],
 "recommendation": "Start with a hosted checkout and expand later."}"#,
    ),
    (
        "final",
        r#"{"type": "online shop", "goal": "Sell handmade goods online", "targetUsers": "Craft buyers",
 "features": ["Catalog", "Cart", "Checkout"],
 "techStack": {"frontend": "Next.js", "backend": "Node.js API routes", "database": "PostgreSQL", "deployment": "Vercel"},
 "timeline": "3 months",
 "phases": [{"name": "Foundation", "duration": "4 weeks", "features": ["Catalog", "Accounts"]}],
 "risks": ["Payments integration"], "successCriteria": "Ten orders in the first month",
 "summary": "A small online shop built to learn full-stack development."}"#,
    ),
    (
        "extractDecisions",
        r#"{"completed": [{"decision": "Launch with a hosted checkout", "reason": "Fits the three month window"}],
 "pending": [{"decision": "Shipping regions", "reason": "International shipping is still open"}],
 "deferred": [{"decision": "Inventory management", "reason": "Not needed for the first catalog"}]}"#,
    ),
    (
        "validate.benchmarking",
        r#"{"competitors": [{"name": "Etsy", "similarity": "high", "strengths": ["Audience"], "weaknesses": ["Fees"], "differentiation": "Own brand"}],
 "marketPosition": "Niche storefront", "risks": ["Crowded market"], "opportunities": ["Local pickup"]}"#,
    ),
    (
        "validate.uiux",
        r#"{"bestPractices": [], "strengths": ["Simple checkout flow"],
 "improvements": [{"issue": "No search", "suggestion": "Add product search", "impact": "Faster discovery"}], "score": 78}"#,
    ),
    (
        "validate.feasibility",
        r#"{"features": [], "totalEstimate": "10 weeks", "criticalPath": ["Checkout"], "bottlenecks": ["Payment provider approval"], "realistic": true, "warnings": []}"#,
    ),
    (
        "validate.techStack",
        r#"{"currentStack": {"pros": ["Well documented"], "cons": ["Cold starts"], "suitability": "good"}, "alternatives": [],
 "recommendations": ["Use a managed Postgres"], "concerns": ["Image hosting costs"]}"#,
    ),
];
