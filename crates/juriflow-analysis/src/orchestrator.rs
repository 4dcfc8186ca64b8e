//! End-to-end analysis flow over the coordinator.
//!
//! Two surfaces over the same flow: `run_analysis` returns the full result
//! synchronously (the legacy surface, also reused by the petition
//! workflow), and `start` admits a background job whose progress lands on
//! the [`AnalysisJobStore`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use juriflow::error::Result;
use juriflow::vector_stores::DocumentFilter;
use juriflow_agents::{AgentExtras, Coordinator};

use crate::analysis_jobs::{AnalysisJobStore, AnalysisRequest, AnalysisResult};

/// Stage percents for the background flow.
const PCT_CONSULTING_RAG: u8 = 10;
const PCT_DELEGATING_EXPERTS: u8 = 30;
const PCT_DELEGATING_ATTORNEYS: u8 = 55;
const PCT_COMPILING: u8 = 80;

/// Admits and runs multi-agent analyses.
pub struct Orchestrator {
    coordinator: Arc<Coordinator>,
    jobs: Arc<AnalysisJobStore>,
}

impl Orchestrator {
    pub fn new(coordinator: Arc<Coordinator>, jobs: Arc<AnalysisJobStore>) -> Self {
        Self { coordinator, jobs }
    }

    pub fn jobs(&self) -> Arc<AnalysisJobStore> {
        Arc::clone(&self.jobs)
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Validate agent selections without admitting anything.
    pub fn validate_selection(&self, request: &AnalysisRequest) -> Result<()> {
        self.coordinator
            .registry()
            .validate_selection(&request.experts_selected, &request.attorneys_selected)
    }

    /// Admit a background analysis. Unknown agent ids are rejected here,
    /// synchronously, and no job is created.
    pub fn start(&self, request: AnalysisRequest) -> Result<Uuid> {
        self.validate_selection(&request)?;

        let id = Uuid::new_v4();
        self.jobs.create(id, request.clone())?;
        info!(analysis_id = %id, "analysis admitted");

        let coordinator = Arc::clone(&self.coordinator);
        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            let progress_jobs = Arc::clone(&jobs);
            let outcome = run_flow(&coordinator, &request, move |stage, percent| {
                let _ = progress_jobs.update_stage(id, stage, percent);
            })
            .await;
            match outcome {
                Ok(result) => {
                    info!(analysis_id = %id, "analysis completed");
                    if let Err(e) = jobs.record_result(id, result) {
                        error!(analysis_id = %id, error = %e, "could not record analysis result");
                    }
                }
                Err(err) => {
                    error!(analysis_id = %id, error = %err, tag = err.kind_tag(), "analysis failed");
                    let _ = jobs.record_error(id, &err.to_string(), err.kind_tag());
                }
            }
        });

        Ok(id)
    }

    /// Legacy synchronous surface: run the whole flow and return the result.
    #[instrument(skip(self, request), fields(prompt_len = request.prompt.len()))]
    pub async fn run_analysis(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        self.validate_selection(request)?;
        run_flow(&self.coordinator, request, |_, _| {}).await
    }
}

/// The analysis flow shared by both surfaces. `progress` receives the stage
/// tag and percent before each step.
async fn run_flow(
    coordinator: &Coordinator,
    request: &AnalysisRequest,
    progress: impl Fn(&str, u8),
) -> Result<AnalysisResult> {
    let started_at = Utc::now();
    let clock = Instant::now();
    let extras = AgentExtras::new();

    progress("CONSULTING_RAG", PCT_CONSULTING_RAG);
    let filter = request
        .document_ids
        .as_ref()
        .map(|ids| DocumentFilter::new(ids.iter().copied()));
    let context = coordinator
        .rag_query(&request.prompt, coordinator.default_rag_k(), filter.as_ref())
        .await;

    let expert_opinions = if request.experts_selected.is_empty() {
        Vec::new()
    } else {
        progress("DELEGATING_EXPERTS", PCT_DELEGATING_EXPERTS);
        coordinator
            .delegate_to_experts(&request.prompt, &context, &request.experts_selected, &extras)
            .await
    };

    let attorney_opinions = if request.attorneys_selected.is_empty() {
        Vec::new()
    } else {
        progress("DELEGATING_ATTORNEYS", PCT_DELEGATING_ATTORNEYS);
        coordinator
            .delegate_to_attorneys(&request.prompt, &context, &request.attorneys_selected, &extras)
            .await
    };

    progress("COMPILING", PCT_COMPILING);
    let compiled = coordinator
        .compile(&expert_opinions, &attorney_opinions, &context, &request.prompt)
        .await?;

    Ok(AnalysisResult {
        compiled_answer: compiled.opinion,
        confidence: compiled.confidence,
        documents_consulted: compiled.referenced_documents,
        experts_used: request.experts_selected.clone(),
        attorneys_used: request.attorneys_selected.clone(),
        duration_seconds: clock.elapsed().as_secs_f64(),
        started_at,
        ended_at: Utc::now(),
        expert_opinions,
        attorney_opinions,
    })
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
