//! Multi-agent analysis endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use juriflow_agents::{AgentCatalogEntry, AgentOutcome};
use juriflow_analysis::{AnalysisRequest, AnalysisState};

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::validate::validate_prompt;

#[derive(Debug, Deserialize)]
pub struct StartAnalysisBody {
    pub prompt: String,
    #[serde(default)]
    pub experts_selected: Vec<String>,
    #[serde(default)]
    pub attorneys_selected: Vec<String>,
    #[serde(default)]
    pub document_ids: Option<Vec<Uuid>>,
}

impl StartAnalysisBody {
    fn into_request(self) -> AnalysisRequest {
        AnalysisRequest {
            prompt: self.prompt,
            experts_selected: self.experts_selected,
            attorneys_selected: self.attorneys_selected,
            document_ids: self.document_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartAnalysisResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisState,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisStatusResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisState,
    pub current_stage: String,
    pub progress_percent: u8,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResultResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisState,
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

/// `POST /api/analysis/start`
#[instrument(skip(state, body))]
pub async fn start(
    State(state): State<AppState>,
    Json(body): Json<StartAnalysisBody>,
) -> Result<(StatusCode, Json<StartAnalysisResponse>)> {
    validate_prompt(&body.prompt)?;
    let analysis_id = state.orchestrator.start(body.into_request())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartAnalysisResponse {
            analysis_id,
            status: AnalysisState::Initiated,
            message: format!("analysis admitted; poll /api/analysis/status/{analysis_id}"),
        }),
    ))
}

/// `GET /api/analysis/status/{analysis_id}`
pub async fn status(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<AnalysisStatusResponse>> {
    let job = state
        .orchestrator
        .jobs()
        .get(analysis_id)
        .ok_or_else(|| ApiError::NotFound(format!("analysis {analysis_id}")))?;
    Ok(Json(AnalysisStatusResponse {
        analysis_id: job.id,
        status: job.state,
        current_stage: job.current_stage,
        progress_percent: job.progress_percent,
        updated_at: job.updated_at,
        error_message: job.error_message,
    }))
}

/// `GET /api/analysis/result/{analysis_id}`
pub async fn result(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<AnalysisResultResponse>> {
    let job = state
        .orchestrator
        .jobs()
        .get(analysis_id)
        .ok_or_else(|| ApiError::NotFound(format!("analysis {analysis_id}")))?;

    match job.state {
        AnalysisState::Completed => {
            let result = job.result.ok_or_else(|| {
                ApiError::Internal("completed analysis is missing its result".into())
            })?;
            Ok(Json(AnalysisResultResponse {
                analysis_id,
                status: AnalysisState::Completed,
                compiled_answer: result.compiled_answer,
                confidence: result.confidence,
                expert_opinions: result.expert_opinions,
                attorney_opinions: result.attorney_opinions,
                documents_consulted: result.documents_consulted,
                experts_used: result.experts_used,
                attorneys_used: result.attorneys_used,
                duration_seconds: result.duration_seconds,
                started_at: result.started_at,
                ended_at: result.ended_at,
            }))
        }
        AnalysisState::Error => Err(ApiError::JobFailed(
            job.error_message
                .unwrap_or_else(|| "analysis failed".to_string()),
        )),
        AnalysisState::Initiated | AnalysisState::Processing => Err(ApiError::TooEarly(format!(
            "analysis {analysis_id} is still {:?}",
            job.state
        ))),
    }
}

/// `GET /api/analysis/experts`
pub async fn experts(State(state): State<AppState>) -> Json<Vec<AgentCatalogEntry>> {
    Json(state.registry.expert_catalog())
}

/// `GET /api/analysis/attorneys`
pub async fn attorneys(State(state): State<AppState>) -> Json<Vec<AgentCatalogEntry>> {
    Json(state.registry.attorney_catalog())
}

/// `POST /api/analysis/multi-agent`
///
/// Deprecated synchronous surface kept for existing clients; prefer
/// `POST /api/analysis/start` plus polling.
#[instrument(skip(state, body))]
pub async fn multi_agent(
    State(state): State<AppState>,
    Json(body): Json<StartAnalysisBody>,
) -> Result<Json<juriflow_analysis::AnalysisResult>> {
    warn!("POST /api/analysis/multi-agent is deprecated; use /api/analysis/start");
    validate_prompt(&body.prompt)?;
    let result = state
        .orchestrator
        .run_analysis(&body.into_request())
        .await?;
    Ok(Json(result))
}
