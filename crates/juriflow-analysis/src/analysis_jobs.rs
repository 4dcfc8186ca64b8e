//! In-process table of analysis jobs.
//!
//! Same discipline as the upload table: serialized writes, monotone
//! progress, frozen terminal states. Additionally, once a job completes its
//! result payload is immutable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use juriflow::error::{Error, Result};
use juriflow_agents::AgentOutcome;

/// Lifecycle of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    Initiated,
    Processing,
    Completed,
    Error,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// What the client asked to analyze.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub prompt: String,
    #[serde(default)]
    pub experts_selected: Vec<String>,
    #[serde(default)]
    pub attorneys_selected: Vec<String>,
    /// Optional restriction of RAG retrieval to these documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<Uuid>>,
}

/// Terminal payload of a successful analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub compiled_answer: String,
    pub confidence: f32,
    pub expert_opinions: Vec<AgentOutcome>,
    pub attorney_opinions: Vec<AgentOutcome>,
    pub documents_consulted: Vec<String>,
    pub experts_used: Vec<String>,
    pub attorneys_used: Vec<String>,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// One analysis job, as observed by the polling endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub request: AnalysisRequest,
    pub state: AnalysisState,
    pub current_stage: String,
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_tag: Option<String>,
}

/// Aggregate counts across the table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub total: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Mutex-guarded `analysis_id -> AnalysisJob` table.
#[derive(Debug, Default)]
pub struct AnalysisJobStore {
    jobs: Mutex<HashMap<Uuid, AnalysisJob>>,
}

impl AnalysisJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, id: Uuid, request: AnalysisRequest) -> Result<()> {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&id) {
            return Err(Error::validation(format!("analysis job {id} already exists")));
        }
        let now = Utc::now();
        jobs.insert(
            id,
            AnalysisJob {
                id,
                request,
                state: AnalysisState::Initiated,
                current_stage: "Initiated".to_string(),
                progress_percent: 0,
                created_at: now,
                updated_at: now,
                result: None,
                error_message: None,
                error_tag: None,
            },
        );
        Ok(())
    }

    pub fn update_stage(&self, id: Uuid, stage: &str, percent: u8) -> Result<()> {
        self.mutate(id, |job| {
            let percent = percent.min(100);
            if percent < job.progress_percent {
                warn!(
                    analysis_id = %id,
                    current = job.progress_percent,
                    requested = percent,
                    "ignoring progress regression"
                );
            } else {
                job.progress_percent = percent;
            }
            job.current_stage = stage.to_string();
            if job.progress_percent > 0 && job.state == AnalysisState::Initiated {
                job.state = AnalysisState::Processing;
            }
        })
    }

    pub fn record_result(&self, id: Uuid, result: AnalysisResult) -> Result<()> {
        self.mutate(id, |job| {
            job.state = AnalysisState::Completed;
            job.current_stage = "Completed".to_string();
            job.progress_percent = 100;
            job.result = Some(result);
        })
    }

    pub fn record_error(&self, id: Uuid, message: &str, tag: &str) -> Result<()> {
        self.mutate(id, |job| {
            job.state = AnalysisState::Error;
            job.error_message = Some(message.to_string());
            job.error_tag = Some(tag.to_string());
        })
    }

    pub fn get(&self, id: Uuid) -> Option<AnalysisJob> {
        self.jobs.lock().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<AnalysisJob> {
        let mut jobs: Vec<AnalysisJob> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.jobs
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("analysis job {id}")))
    }

    pub fn stats(&self) -> AnalysisStats {
        let jobs = self.jobs.lock();
        let mut stats = AnalysisStats {
            total: jobs.len(),
            ..AnalysisStats::default()
        };
        for job in jobs.values() {
            match job.state {
                AnalysisState::Completed => stats.completed += 1,
                AnalysisState::Error => stats.failed += 1,
                _ => stats.in_flight += 1,
            }
        }
        stats
    }

    /// Apply `f` under the lock. Terminal jobs, and with them completed
    /// results, are immutable.
    fn mutate(&self, id: Uuid, f: impl FnOnce(&mut AnalysisJob)) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("analysis job {id}")))?;
        if job.state.is_terminal() {
            warn!(analysis_id = %id, state = ?job.state, "ignoring update to terminal job");
            return Ok(());
        }
        f(job);
        job.updated_at = Utc::now();
        Ok(())
    }
}
