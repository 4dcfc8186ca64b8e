//! Document-relevance step: which complementary documents does this
//! petition need?
//!
//! One LLM call with a fixed system prompt demanding strict JSON. The
//! parser validates every item; items with an unknown priority degrade to
//! `important`, and a response with zero valid items is a parse failure
//! that captures the raw head of the response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use juriflow::error::{Error, Result};
use juriflow::gateway::{CompletionRequest, LlmGateway};
use juriflow::opinions::ContextDocument;

/// Suggested list bounds requested from the model.
pub const MIN_SUGGESTIONS: usize = 3;
pub const MAX_SUGGESTIONS: usize = 15;

/// Cap on petition text included in the prompt.
const PETITION_TEXT_LIMIT: usize = 8000;

/// Cap on RAG context chunks included in the prompt.
const RAG_CONTEXT_LIMIT: usize = 5;

const SYSTEM_PROMPT: &str = "You are a legal document analyst. Given the text of an initial \
petition, list the complementary documents needed to analyze the case properly. Respond with \
STRICT JSON and nothing else, in exactly this shape: {\"documents_suggested\": [{\"type\": \
\"<document type>\", \"justification\": \"<why it is needed>\", \"priority\": \
\"essential|important|desirable\"}]}. Suggest between 3 and 15 documents.";

/// Priority of a suggested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedPriority {
    Essential,
    Important,
    Desirable,
}

impl SuggestedPriority {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "essential" => Some(Self::Essential),
            "important" => Some(Self::Important),
            "desirable" => Some(Self::Desirable),
            _ => None,
        }
    }
}

/// One complementary document the model asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedDocument {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub justification: String,
    pub priority: SuggestedPriority,
}

/// Runs the document-relevance LLM step.
pub struct DocumentRelevanceAnalyzer {
    gateway: Arc<LlmGateway>,
    model: String,
    temperature: f32,
}

impl DocumentRelevanceAnalyzer {
    pub fn new(gateway: Arc<LlmGateway>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            gateway,
            model: model.into(),
            temperature,
        }
    }

    /// Ask the model which documents the petition needs.
    pub async fn analyze(
        &self,
        petition_text: &str,
        rag_context: &[ContextDocument],
    ) -> Result<Vec<SuggestedDocument>> {
        let petition_excerpt: String = petition_text.chars().take(PETITION_TEXT_LIMIT).collect();

        let context_block = if rag_context.is_empty() {
            String::new()
        } else {
            let body = rag_context
                .iter()
                .take(RAG_CONTEXT_LIMIT)
                .enumerate()
                .map(|(i, doc)| format!("[{}] {}", i + 1, doc.text))
                .collect::<Vec<_>>()
                .join("\n");
            format!("\n\nRelated material already on file:\n{body}")
        };

        let prompt = format!(
            "Petition text:\n{petition_excerpt}{context_block}\n\nReturn the JSON object now."
        );
        let request = CompletionRequest::new(prompt, self.model.clone(), self.temperature)
            .with_system(SYSTEM_PROMPT);
        let outcome = self.gateway.complete(request).await?;

        parse_suggestions(&outcome.text)
    }
}

/// Parse and validate the model's JSON. Public for tests.
pub(crate) fn parse_suggestions(raw: &str) -> Result<Vec<SuggestedDocument>> {
    let json_slice = extract_json_object(raw)
        .ok_or_else(|| Error::parse_failure("response contains no JSON object", raw))?;
    let value: serde_json::Value = serde_json::from_str(json_slice)
        .map_err(|e| Error::parse_failure(format!("invalid JSON: {e}"), raw))?;
    let items = value
        .get("documents_suggested")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::parse_failure("missing documents_suggested array", raw))?;

    let mut suggestions = Vec::new();
    for item in items {
        let doc_type = item.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let justification = item
            .get("justification")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if doc_type.trim().is_empty() || justification.trim().is_empty() {
            warn!("dropping suggestion with empty type or justification");
            continue;
        }
        let priority = match item.get("priority").and_then(|v| v.as_str()) {
            Some(raw_priority) => SuggestedPriority::parse(raw_priority).unwrap_or_else(|| {
                warn!(priority = raw_priority, "unknown priority, defaulting to important");
                SuggestedPriority::Important
            }),
            None => {
                warn!("suggestion missing priority, defaulting to important");
                SuggestedPriority::Important
            }
        };
        suggestions.push(SuggestedDocument {
            doc_type: doc_type.trim().to_string(),
            justification: justification.trim().to_string(),
            priority,
        });
    }

    if suggestions.is_empty() {
        return Err(Error::parse_failure(
            "no valid document suggestions in response",
            raw,
        ));
    }
    if suggestions.len() > MAX_SUGGESTIONS {
        warn!(
            count = suggestions.len(),
            "model suggested more than {MAX_SUGGESTIONS} documents, truncating"
        );
        suggestions.truncate(MAX_SUGGESTIONS);
    }
    Ok(suggestions)
}

/// Slice out the outermost JSON object, tolerating markdown fences and
/// prose around it.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
