//! The agent capability set and the shared processing template.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

use juriflow::error::{Error, Result};
use juriflow::gateway::{CompletionRequest, LlmGateway};
use juriflow::opinions::{AgentOpinion, ContextDocument};

/// Free-form extra instructions passed down from the caller, keyed by label.
pub type AgentExtras = HashMap<String, String>;

/// Phrases that lower the heuristic self-confidence when present in a
/// response. Matching is lowercase substring.
const UNCERTAINTY_PHRASES: [&str; 5] = [
    "not sure",
    "unclear",
    "cannot determine",
    "insufficient information",
    "unable to assess",
];

/// Responses shorter than this are penalized.
const SHORT_RESPONSE_CHARS: usize = 200;

/// What kind of agent this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Expert,
    Attorney,
    Coordinator,
}

impl AgentKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::Attorney => "attorney",
            Self::Coordinator => "coordinator",
        }
    }
}

/// Identity triple plus kind.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub kind: AgentKind,
}

/// Deterministic self-confidence for one response.
///
/// Start at 0.8; subtract 0.3 for short responses, 0.2 for uncertainty
/// phrasing, 0.1 for thin context; clamp to `[0, 1]`. This is intentionally
/// not a calibrated probability.
pub fn heuristic_confidence(response: &str, context_docs: &[ContextDocument]) -> f32 {
    let mut confidence: f32 = 0.8;
    if response.chars().count() < SHORT_RESPONSE_CHARS {
        confidence -= 0.3;
    }
    let lower = response.to_lowercase();
    if UNCERTAINTY_PHRASES.iter().any(|p| lower.contains(p)) {
        confidence -= 0.2;
    }
    if context_docs.len() < 2 {
        confidence -= 0.1;
    }
    confidence.clamp(0.0, 1.0)
}

/// Capability set every specialist implements.
///
/// Agents never call the vector store; context arrives resolved.
#[async_trait]
pub trait Agent: Send + Sync {
    fn identity(&self) -> AgentIdentity;

    fn model(&self) -> &str;

    fn temperature(&self) -> f32;

    /// System prompt, when the specialty defines one.
    fn system_prompt(&self) -> Option<String> {
        None
    }

    /// Assemble the user prompt from context, question and extras.
    fn build_prompt(
        &self,
        context_docs: &[ContextDocument],
        question: &str,
        extras: &AgentExtras,
    ) -> String;

    /// Post-process hook: attorneys use it to attach specialty and cited
    /// legislation.
    fn annotate(&self, _opinion: &mut AgentOpinion, _response: &str) {}

    /// Template method: validate, build prompt, call the gateway, wrap the
    /// response in an opinion with heuristic confidence.
    async fn process(
        &self,
        gateway: &LlmGateway,
        context_docs: &[ContextDocument],
        question: &str,
        extras: &AgentExtras,
    ) -> Result<AgentOpinion> {
        if question.trim().is_empty() {
            return Err(Error::validation("question must not be empty"));
        }

        let prompt = self.build_prompt(context_docs, question, extras);
        let mut request = CompletionRequest::new(prompt, self.model(), self.temperature());
        if let Some(system) = self.system_prompt() {
            request = request.with_system(system);
        }

        let outcome = gateway.complete(request).await?;
        let identity = self.identity();
        let mut opinion = AgentOpinion {
            agent_id: identity.id.to_string(),
            agent_name: identity.name.to_string(),
            agent_kind: identity.kind.tag().to_string(),
            specialty: None,
            confidence: heuristic_confidence(&outcome.text, context_docs),
            referenced_documents: referenced_documents(context_docs),
            cited_legislation: Vec::new(),
            opinion: outcome.text.clone(),
            created_at: Utc::now(),
        };
        self.annotate(&mut opinion, &outcome.text);
        Ok(opinion)
    }
}

/// Distinct parent-document ids of the supplied context, in first-seen order.
pub(crate) fn referenced_documents(context_docs: &[ContextDocument]) -> Vec<String> {
    let mut seen = Vec::new();
    for doc in context_docs {
        if let Some(id) = &doc.document_id {
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
    }
    seen
}

/// Render context excerpts as a numbered block.
pub(crate) fn format_context(context_docs: &[ContextDocument]) -> String {
    if context_docs.is_empty() {
        return "(no case documents retrieved)".to_string();
    }
    context_docs
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[Document {}]\n{}", i + 1, doc.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render extras as `label: value` lines, sorted for prompt stability.
pub(crate) fn format_extras(extras: &AgentExtras) -> String {
    if extras.is_empty() {
        return String::new();
    }
    let mut entries: Vec<(&String, &String)> = extras.iter().collect();
    entries.sort_by_key(|(k, _)| k.as_str());
    let body = entries
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\nAdditional instructions:\n{body}")
}

/// Triggers found in the question, lowercase substring match.
pub(crate) fn matched_triggers<'a>(question: &str, triggers: &[&'a str]) -> Vec<&'a str> {
    let lower = question.to_lowercase();
    triggers
        .iter()
        .filter(|t| lower.contains(&t.to_lowercase()))
        .copied()
        .collect()
}
