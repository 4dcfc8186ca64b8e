//! Draft continuation document.
//!
//! One LLM call producing a Markdown pleading draft with explicit
//! `[PERSONALIZE: ...]` placeholders for the fields only the client's
//! attorney can fill in.

use std::sync::Arc;

use tracing::warn;

use juriflow::error::Result;
use juriflow::gateway::{CompletionRequest, LlmGateway};

use crate::prognosis::Prognosis;

const SYSTEM_PROMPT: &str = "You draft continuation documents (pleadings, manifestations, \
next procedural steps) for ongoing cases. Write in Markdown. For every party-specific field \
(names, dates, amounts, court details) insert an explicit placeholder in the form \
[PERSONALIZE: description of what to fill in]. Do not invent personal data.";

pub(crate) const PERSONALIZE_MARKER: &str = "[PERSONALIZE:";

/// Runs the draft LLM step.
pub struct DraftWriter {
    gateway: Arc<LlmGateway>,
    model: String,
    temperature: f32,
}

impl DraftWriter {
    pub fn new(gateway: Arc<LlmGateway>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            gateway,
            model: model.into(),
            temperature,
        }
    }

    /// Produce the Markdown draft for the case.
    pub async fn write(
        &self,
        compiled_opinion: &str,
        prognosis: &Prognosis,
        case_facts: &str,
    ) -> Result<String> {
        let prompt = format!(
            "Compiled legal opinion:\n{compiled_opinion}\n\nRecommended strategy:\n{}\n\n\
             Case facts:\n{case_facts}\n\nDraft the continuation document now.",
            prognosis.overall_recommendation,
        );
        let request = CompletionRequest::new(prompt, self.model.clone(), self.temperature)
            .with_system(SYSTEM_PROMPT);
        let outcome = self.gateway.complete(request).await?;

        if !outcome.text.contains(PERSONALIZE_MARKER) {
            warn!("draft came back without [PERSONALIZE:] placeholders");
        }
        Ok(outcome.text)
    }
}
