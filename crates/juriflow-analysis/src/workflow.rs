//! The petition workflow: ingestion, document suggestion, gating, and the
//! analyze -> prognose -> draft chain.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use juriflow::documents::DocumentType;
use juriflow::error::{Error, Result};
use juriflow::gateway::LlmGateway;
use juriflow::vector_stores::VectorStore;
use juriflow_ingest::{IngestionPipeline, UploadJobStore, UploadState};

use crate::orchestrator::Orchestrator;
use crate::petition::{PetitionAnalysis, PetitionState, PetitionStore};
use crate::prognosis::PrognosisAnalyzer;
use crate::relevance::{DocumentRelevanceAnalyzer, SuggestedDocument};
use crate::analysis_jobs::AnalysisRequest;
use crate::draft::DraftWriter;

/// Cap on the case-facts excerpt fed to the prognosis and draft steps.
const CASE_FACTS_LIMIT: usize = 4000;

/// Head of the petition text used as the RAG query during document
/// suggestion.
const RELEVANCE_QUERY_LIMIT: usize = 500;

/// Drives petitions through their state machine.
pub struct PetitionWorkflow {
    petitions: Arc<PetitionStore>,
    uploads: Arc<UploadJobStore>,
    pipeline: Arc<IngestionPipeline>,
    orchestrator: Arc<Orchestrator>,
    vector_store: Arc<dyn VectorStore>,
    relevance: DocumentRelevanceAnalyzer,
    prognosis: PrognosisAnalyzer,
    draft: DraftWriter,
}

impl PetitionWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        petitions: Arc<PetitionStore>,
        uploads: Arc<UploadJobStore>,
        pipeline: Arc<IngestionPipeline>,
        orchestrator: Arc<Orchestrator>,
        vector_store: Arc<dyn VectorStore>,
        gateway: Arc<LlmGateway>,
        model: impl Into<String> + Clone,
        temperature: f32,
    ) -> Self {
        Self {
            petitions,
            uploads,
            pipeline,
            orchestrator,
            vector_store,
            relevance: DocumentRelevanceAnalyzer::new(
                Arc::clone(&gateway),
                model.clone().into(),
                temperature,
            ),
            prognosis: PrognosisAnalyzer::new(Arc::clone(&gateway), model.clone().into(), temperature),
            draft: DraftWriter::new(gateway, model.into(), temperature),
        }
    }

    pub fn petitions(&self) -> Arc<PetitionStore> {
        Arc::clone(&self.petitions)
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Ingest the petition document itself, then bind the resulting
    /// document id to the petition. Runs in the background.
    #[instrument(skip(self, path), fields(petition_id = %petition_id))]
    pub async fn ingest_petition(
        &self,
        petition_id: Uuid,
        upload_id: Uuid,
        path: PathBuf,
        original_name: String,
        declared: DocumentType,
    ) {
        self.pipeline
            .ingest(upload_id, path, original_name, declared)
            .await;

        match self.uploads.get(upload_id) {
            Some(job) if job.state == UploadState::Completed => {
                if let Some(metadata) = job.result {
                    info!(document_id = %metadata.id, "petition document ingested");
                    if let Err(e) = self.petitions.set_document(petition_id, metadata.id) {
                        warn!(error = %e, "could not bind petition document");
                    }
                }
            }
            Some(job) => {
                let message = job
                    .error_message
                    .unwrap_or_else(|| "petition ingestion failed".to_string());
                error!(%message, "petition ingestion failed");
                let _ = self.petitions.set_error(petition_id, &message);
            }
            None => {
                error!("upload job vanished during petition ingestion");
                let _ = self
                    .petitions
                    .set_error(petition_id, "petition upload job not found");
            }
        }
    }

    /// Ingest a complementary document and associate it with the petition.
    /// A failed complementary upload is degraded, not fatal: the petition
    /// keeps waiting for a retry.
    #[instrument(skip(self, path), fields(petition_id = %petition_id))]
    pub async fn ingest_additional_document(
        &self,
        petition_id: Uuid,
        upload_id: Uuid,
        path: PathBuf,
        original_name: String,
        declared: DocumentType,
    ) {
        self.pipeline
            .ingest(upload_id, path, original_name, declared)
            .await;

        match self.uploads.get(upload_id) {
            Some(job) if job.state == UploadState::Completed => {
                if let Some(metadata) = job.result {
                    match self
                        .petitions
                        .add_submitted_document(petition_id, metadata.id)
                    {
                        Ok(_) => self.recheck_readiness(petition_id),
                        Err(e) => warn!(error = %e, "could not attach document to petition"),
                    }
                }
            }
            _ => warn!("complementary document ingestion failed; petition unchanged"),
        }
    }

    /// Move to READY_FOR_ANALYSIS once every essential suggestion is
    /// covered.
    fn recheck_readiness(&self, petition_id: Uuid) {
        let Some(petition) = self.petitions.get(petition_id) else {
            return;
        };
        if petition.state == PetitionState::DocumentsBeingAnalyzed
            && !petition.documents_suggested.is_empty()
            && petition.essentials_satisfied()
        {
            if let Err(e) = self
                .petitions
                .transition(petition_id, PetitionState::ReadyForAnalysis)
            {
                warn!(error = %e, "could not mark petition ready");
            } else {
                info!(petition_id = %petition_id, "petition ready for analysis");
            }
        }
    }

    /// Run the document-relevance step.
    ///
    /// Idempotent: once a petition has suggestions, subsequent calls return
    /// the cached list without another LLM call.
    #[instrument(skip(self), fields(petition_id = %petition_id))]
    pub async fn analyze_documents(&self, petition_id: Uuid) -> Result<Vec<SuggestedDocument>> {
        let petition = self
            .petitions
            .get(petition_id)
            .ok_or_else(|| Error::not_found(format!("petition {petition_id}")))?;

        if !petition.documents_suggested.is_empty() {
            info!("document suggestions already computed, returning cached list");
            return Ok(petition.documents_suggested);
        }

        let document_id = petition.document_id.ok_or_else(|| {
            Error::too_early("petition document is still being ingested")
        })?;

        if petition.state == PetitionState::AwaitingDocuments {
            self.petitions
                .transition(petition_id, PetitionState::DocumentsBeingAnalyzed)?;
        }

        let outcome = self.suggest_documents(document_id).await;
        match outcome {
            Ok(suggestions) => {
                self.petitions
                    .set_suggestions(petition_id, suggestions.clone())?;
                self.recheck_readiness(petition_id);
                Ok(suggestions)
            }
            Err(err) => {
                error!(error = %err, "document relevance step failed");
                let _ = self.petitions.set_error(petition_id, &err.to_string());
                Err(err)
            }
        }
    }

    async fn suggest_documents(&self, document_id: Uuid) -> Result<Vec<SuggestedDocument>> {
        let chunks = self.vector_store.get_by_document(document_id).await?;
        let petition_text = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if petition_text.trim().is_empty() {
            return Err(Error::validation(
                "petition has no indexed text to analyze",
            ));
        }

        // RAG context is nice-to-have here; failures inside rag_query
        // already degrade to an empty list.
        let query: String = petition_text.chars().take(RELEVANCE_QUERY_LIMIT).collect();
        let coordinator = self.orchestrator.coordinator();
        let rag_context = coordinator.rag_query(&query, 5, None).await;

        self.relevance.analyze(&petition_text, &rag_context).await
    }

    /// Admit the full petition analysis. Synchronous validation, background
    /// execution.
    pub fn start_analysis(
        self: Arc<Self>,
        petition_id: Uuid,
        experts: Vec<String>,
        attorneys: Vec<String>,
    ) -> Result<()> {
        let petition = self
            .petitions
            .get(petition_id)
            .ok_or_else(|| Error::not_found(format!("petition {petition_id}")))?;
        if petition.state != PetitionState::ReadyForAnalysis {
            return Err(Error::validation(format!(
                "petition is {:?}, not READY_FOR_ANALYSIS",
                petition.state
            )));
        }

        self.orchestrator
            .coordinator()
            .registry()
            .validate_selection(&experts, &attorneys)?;

        self.petitions
            .set_selection(petition_id, experts, attorneys)?;
        self.petitions
            .transition(petition_id, PetitionState::AnalysisInProgress)?;

        tokio::spawn(async move {
            self.run_petition_analysis(petition_id).await;
        });
        Ok(())
    }

    /// The analyze -> prognose -> draft chain. Every failure lands on the
    /// petition as ERROR.
    #[instrument(skip(self), fields(petition_id = %petition_id))]
    async fn run_petition_analysis(&self, petition_id: Uuid) {
        let Some(petition) = self.petitions.get(petition_id) else {
            return;
        };

        let case_facts = self.case_facts(&petition.analysis_document_ids()).await;
        let request = AnalysisRequest {
            prompt: build_analysis_prompt(petition.action_type.as_deref()),
            experts_selected: petition.experts_selected.clone(),
            attorneys_selected: petition.attorneys_selected.clone(),
            document_ids: Some(petition.analysis_document_ids()),
        };

        let result = match self.orchestrator.run_analysis(&request).await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "petition analysis failed");
                let _ = self.petitions.set_error(petition_id, &err.to_string());
                return;
            }
        };

        let all_opinions: Vec<_> = result
            .expert_opinions
            .iter()
            .chain(&result.attorney_opinions)
            .cloned()
            .collect();
        let prognosis = match self
            .prognosis
            .analyze(&result.compiled_answer, &all_opinions, &case_facts)
            .await
        {
            Ok(prognosis) => prognosis,
            Err(err) => {
                error!(error = %err, "prognosis step failed");
                let _ = self.petitions.set_error(petition_id, &err.to_string());
                return;
            }
        };

        let draft = match self
            .draft
            .write(&result.compiled_answer, &prognosis, &case_facts)
            .await
        {
            Ok(draft) => draft,
            Err(err) => {
                error!(error = %err, "draft step failed");
                let _ = self.petitions.set_error(petition_id, &err.to_string());
                return;
            }
        };

        let analysis = PetitionAnalysis {
            compiled_answer: result.compiled_answer,
            confidence: result.confidence,
            expert_opinions: result.expert_opinions,
            attorney_opinions: result.attorney_opinions,
            prognosis,
            draft,
            completed_at: chrono::Utc::now(),
        };
        if let Err(e) = self.petitions.set_analysis(petition_id, analysis) {
            error!(error = %e, "could not record petition analysis");
        } else {
            info!("petition completed");
        }
    }

    /// Best-effort case-facts excerpt from the petition's documents.
    async fn case_facts(&self, document_ids: &[Uuid]) -> String {
        let mut facts = String::new();
        for id in document_ids {
            match self.vector_store.get_by_document(*id).await {
                Ok(chunks) => {
                    for chunk in chunks {
                        if facts.len() >= CASE_FACTS_LIMIT {
                            break;
                        }
                        facts.push_str(&chunk.text);
                        facts.push('\n');
                    }
                }
                Err(e) => warn!(error = %e, "could not load case facts for document"),
            }
            if facts.len() >= CASE_FACTS_LIMIT {
                break;
            }
        }
        facts.chars().take(CASE_FACTS_LIMIT).collect()
    }
}

fn build_analysis_prompt(action_type: Option<&str>) -> String {
    match action_type {
        Some(action) => format!(
            "Analyze the ingested case documents for this {action}: assess the merits, the \
             strength of the evidence, applicable liability and the likely outcomes."
        ),
        None => "Analyze the ingested case documents: assess the merits, the strength of the \
                 evidence, applicable liability and the likely outcomes."
            .to_string(),
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod workflow_tests;
