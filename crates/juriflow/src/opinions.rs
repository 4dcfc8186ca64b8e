//! Opinions produced by agents, and the context they reason over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A retrieved chunk handed to an agent as reasoning context.
///
/// Agents never touch the vector store themselves; the coordinator resolves
/// context and passes it down as plain text plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDocument {
    /// Parent document id, when the chunk came from the store.
    pub document_id: Option<String>,
    pub text: String,
}

impl ContextDocument {
    pub fn new(document_id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            document_id,
            text: text.into(),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(None, text)
    }
}

/// A structured opinion returned by one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOpinion {
    /// Registry id of the agent (e.g. `"medical"`, `"labor"`).
    pub agent_id: String,
    /// Display name.
    pub agent_name: String,
    /// Type tag: `"expert"`, `"attorney"` or `"coordinator"`.
    pub agent_kind: String,
    /// Specialty label, set for attorneys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    pub opinion: String,
    /// Heuristic self-confidence in `[0, 1]`.
    pub confidence: f32,
    /// Ids of the documents the agent was shown.
    #[serde(default)]
    pub referenced_documents: Vec<String>,
    /// Legal references extracted from the response, for attorneys.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cited_legislation: Vec<String>,
    pub created_at: DateTime<Utc>,
}
