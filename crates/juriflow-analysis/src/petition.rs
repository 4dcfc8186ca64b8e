//! Petition aggregate and its state machine.
//!
//! States advance only along the declared order; the only allowed
//! regression is into `ERROR`, which is terminal, as is `COMPLETED`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use juriflow::error::{Error, Result};
use juriflow_agents::AgentOutcome;

use crate::prognosis::Prognosis;
use crate::relevance::{SuggestedDocument, SuggestedPriority};

/// Lifecycle of a petition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PetitionState {
    AwaitingDocuments,
    DocumentsBeingAnalyzed,
    ReadyForAnalysis,
    AnalysisInProgress,
    Completed,
    Error,
}

impl PetitionState {
    /// Position in the declared order. `Error` sits outside the ladder.
    fn rank(self) -> u8 {
        match self {
            Self::AwaitingDocuments => 0,
            Self::DocumentsBeingAnalyzed => 1,
            Self::ReadyForAnalysis => 2,
            Self::AnalysisInProgress => 3,
            Self::Completed => 4,
            Self::Error => u8::MAX,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Final deliverables of a completed petition analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetitionAnalysis {
    pub compiled_answer: String,
    pub confidence: f32,
    pub expert_opinions: Vec<AgentOutcome>,
    pub attorney_opinions: Vec<AgentOutcome>,
    pub prognosis: Prognosis,
    pub draft: String,
    pub completed_at: DateTime<Utc>,
}

/// One petition under analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Petition {
    pub id: Uuid,
    /// Upload job that ingests the petition document itself.
    pub upload_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// Set once the petition document finishes ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    pub state: PetitionState,
    #[serde(default)]
    pub documents_suggested: Vec<SuggestedDocument>,
    #[serde(default)]
    pub submitted_documents: Vec<Uuid>,
    #[serde(default)]
    pub experts_selected: Vec<String>,
    #[serde(default)]
    pub attorneys_selected: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PetitionAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Petition {
    /// Number of essential suggestions.
    pub fn essential_count(&self) -> usize {
        self.documents_suggested
            .iter()
            .filter(|s| s.priority == SuggestedPriority::Essential)
            .count()
    }

    /// Whether every essential suggestion is covered by a submitted
    /// document.
    pub fn essentials_satisfied(&self) -> bool {
        self.submitted_documents.len() >= self.essential_count()
    }

    /// Document set for RAG during the petition analysis.
    pub fn analysis_document_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(1 + self.submitted_documents.len());
        if let Some(doc) = self.document_id {
            ids.push(doc);
        }
        ids.extend(self.submitted_documents.iter().copied());
        ids
    }
}

/// Mutex-guarded `petition_id -> Petition` table.
#[derive(Debug, Default)]
pub struct PetitionStore {
    petitions: Mutex<HashMap<Uuid, Petition>>,
}

impl PetitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, id: Uuid, upload_id: Uuid, action_type: Option<String>) -> Result<()> {
        let mut petitions = self.petitions.lock();
        if petitions.contains_key(&id) {
            return Err(Error::validation(format!("petition {id} already exists")));
        }
        let now = Utc::now();
        petitions.insert(
            id,
            Petition {
                id,
                upload_id,
                action_type,
                document_id: None,
                state: PetitionState::AwaitingDocuments,
                documents_suggested: Vec::new(),
                submitted_documents: Vec::new(),
                experts_selected: Vec::new(),
                attorneys_selected: Vec::new(),
                analysis: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Petition> {
        self.petitions.lock().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<Petition> {
        let mut petitions: Vec<Petition> = self.petitions.lock().values().cloned().collect();
        petitions.sort_by_key(|p| p.created_at);
        petitions
    }

    /// Advance the state machine. Only forward moves along the declared
    /// order are allowed; `Error` is reachable from any non-terminal state.
    pub fn transition(&self, id: Uuid, next: PetitionState) -> Result<()> {
        self.mutate(id, |petition| {
            if next == PetitionState::Error {
                petition.state = PetitionState::Error;
                return Ok(());
            }
            if next.rank() <= petition.state.rank() {
                return Err(Error::validation(format!(
                    "invalid petition transition: {:?} -> {next:?}",
                    petition.state
                )));
            }
            petition.state = next;
            Ok(())
        })
    }

    pub fn set_document(&self, id: Uuid, document_id: Uuid) -> Result<()> {
        self.mutate(id, |petition| {
            petition.document_id = Some(document_id);
            Ok(())
        })
    }

    pub fn set_suggestions(&self, id: Uuid, suggestions: Vec<SuggestedDocument>) -> Result<()> {
        self.mutate(id, |petition| {
            petition.documents_suggested = suggestions;
            Ok(())
        })
    }

    pub fn add_submitted_document(&self, id: Uuid, document_id: Uuid) -> Result<Petition> {
        self.mutate_returning(id, |petition| {
            if !petition.submitted_documents.contains(&document_id) {
                petition.submitted_documents.push(document_id);
            }
            Ok(())
        })
    }

    pub fn set_selection(&self, id: Uuid, experts: Vec<String>, attorneys: Vec<String>) -> Result<()> {
        self.mutate(id, |petition| {
            petition.experts_selected = experts;
            petition.attorneys_selected = attorneys;
            Ok(())
        })
    }

    /// Record the final deliverables and complete the petition.
    pub fn set_analysis(&self, id: Uuid, analysis: PetitionAnalysis) -> Result<()> {
        self.mutate(id, |petition| {
            petition.analysis = Some(analysis);
            petition.state = PetitionState::Completed;
            Ok(())
        })
    }

    /// Record a failure. Reachable from any non-terminal state.
    pub fn set_error(&self, id: Uuid, message: &str) -> Result<()> {
        self.mutate(id, |petition| {
            petition.state = PetitionState::Error;
            petition.error_message = Some(message.to_string());
            Ok(())
        })
    }

    fn mutate(&self, id: Uuid, f: impl FnOnce(&mut Petition) -> Result<()>) -> Result<()> {
        self.mutate_returning(id, f).map(|_| ())
    }

    fn mutate_returning(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Petition) -> Result<()>,
    ) -> Result<Petition> {
        let mut petitions = self.petitions.lock();
        let petition = petitions
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("petition {id}")))?;
        if petition.state.is_terminal() {
            return Err(Error::validation(format!(
                "petition {id} is {:?} and can no longer change",
                petition.state
            )));
        }
        f(petition)?;
        petition.updated_at = Utc::now();
        Ok(petition.clone())
    }
}
