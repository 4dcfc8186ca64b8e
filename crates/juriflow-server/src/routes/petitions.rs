//! Petition workflow endpoints.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use juriflow::documents::DocumentType;
use juriflow_analysis::{Petition, PetitionState};

use crate::error::{ApiError, Result};
use crate::routes::documents::{read_multipart, save_upload};
use crate::state::AppState;
use crate::validate::{validate_petition_extension, validate_upload_extension, validate_upload_size};

#[derive(Debug, Serialize)]
pub struct StartPetitionResponse {
    pub petition_id: Uuid,
    pub upload_id: Uuid,
    pub status: PetitionState,
}

#[derive(Debug, Serialize)]
pub struct PetitionAcceptedResponse {
    pub petition_id: Uuid,
    pub status: PetitionState,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AddDocumentResponse {
    pub petition_id: Uuid,
    pub upload_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzePetitionBody {
    #[serde(default)]
    pub experts_selected: Vec<String>,
    #[serde(default)]
    pub attorneys_selected: Vec<String>,
}

/// `POST /api/petitions/start` (multipart: `file`, optional `action_type`)
#[instrument(skip(state, multipart))]
pub async fn start(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StartPetitionResponse>)> {
    let (file, fields) = read_multipart(&mut multipart).await?;
    let (file_name, data) =
        file.ok_or_else(|| ApiError::Validation("missing 'file' field".into()))?;
    let action_type = fields.get("action_type").cloned().filter(|v| !v.is_empty());

    let extension = validate_petition_extension(&file_name)?;
    validate_upload_size(data.len(), state.settings.upload_max_bytes())?;
    let declared = DocumentType::from_extension(&extension)
        .ok_or_else(|| ApiError::UnsupportedMedia(format!("unrecognized extension .{extension}")))?;

    let petition_id = Uuid::new_v4();
    let upload_id = Uuid::new_v4();
    let path = save_upload(&state, upload_id, &extension, &data).await?;

    state.petitions.create(petition_id, upload_id, action_type)?;
    state
        .uploads
        .create(upload_id, &file_name, data.len() as u64)?;
    info!(%petition_id, %upload_id, "petition admitted");

    let workflow = Arc::clone(&state.workflow);
    tokio::spawn(async move {
        workflow
            .ingest_petition(petition_id, upload_id, path, file_name, declared)
            .await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartPetitionResponse {
            petition_id,
            upload_id,
            status: PetitionState::AwaitingDocuments,
        }),
    ))
}

/// `GET /api/petitions`
pub async fn list(State(state): State<AppState>) -> Json<Vec<Petition>> {
    Json(state.petitions.list())
}

/// `GET /api/petitions/status/{petition_id}`
pub async fn status(
    State(state): State<AppState>,
    Path(petition_id): Path<Uuid>,
) -> Result<Json<Petition>> {
    let petition = state
        .petitions
        .get(petition_id)
        .ok_or_else(|| ApiError::NotFound(format!("petition {petition_id}")))?;
    Ok(Json(petition))
}

/// `POST /api/petitions/{petition_id}/analyze-documents`
///
/// Idempotent: once computed, the suggestion list is served from the
/// petition without another model call.
#[instrument(skip(state))]
pub async fn analyze_documents(
    State(state): State<AppState>,
    Path(petition_id): Path<Uuid>,
) -> Result<(StatusCode, Json<PetitionAcceptedResponse>)> {
    let petition = state
        .petitions
        .get(petition_id)
        .ok_or_else(|| ApiError::NotFound(format!("petition {petition_id}")))?;

    let workflow = Arc::clone(&state.workflow);
    tokio::spawn(async move {
        if let Err(e) = workflow.analyze_documents(petition_id).await {
            error!(petition_id = %petition_id, error = %e, "document suggestion failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(PetitionAcceptedResponse {
            petition_id,
            status: petition.state,
            message: "document analysis running; poll /api/petitions/status".to_string(),
        }),
    ))
}

/// `POST /api/petitions/{petition_id}/add-document` (multipart: `file`)
#[instrument(skip(state, multipart))]
pub async fn add_document(
    State(state): State<AppState>,
    Path(petition_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AddDocumentResponse>)> {
    let petition = state
        .petitions
        .get(petition_id)
        .ok_or_else(|| ApiError::NotFound(format!("petition {petition_id}")))?;
    if petition.state.is_terminal() {
        return Err(ApiError::Validation(format!(
            "petition is {:?} and no longer accepts documents",
            petition.state
        )));
    }

    let (file, _) = read_multipart(&mut multipart).await?;
    let (file_name, data) =
        file.ok_or_else(|| ApiError::Validation("missing 'file' field".into()))?;
    let extension = validate_upload_extension(&file_name)?;
    validate_upload_size(data.len(), state.settings.upload_max_bytes())?;
    let declared = DocumentType::from_extension(&extension)
        .ok_or_else(|| ApiError::UnsupportedMedia(format!("unrecognized extension .{extension}")))?;

    let upload_id = Uuid::new_v4();
    let path = save_upload(&state, upload_id, &extension, &data).await?;
    state
        .uploads
        .create(upload_id, &file_name, data.len() as u64)?;

    let workflow = Arc::clone(&state.workflow);
    tokio::spawn(async move {
        workflow
            .ingest_additional_document(petition_id, upload_id, path, file_name, declared)
            .await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AddDocumentResponse {
            petition_id,
            upload_id,
        }),
    ))
}

/// `POST /api/petitions/{petition_id}/analyze`
#[instrument(skip(state, body))]
pub async fn analyze(
    State(state): State<AppState>,
    Path(petition_id): Path<Uuid>,
    Json(body): Json<AnalyzePetitionBody>,
) -> Result<(StatusCode, Json<PetitionAcceptedResponse>)> {
    Arc::clone(&state.workflow)
        .start_analysis(petition_id, body.experts_selected, body.attorneys_selected)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PetitionAcceptedResponse {
            petition_id,
            status: PetitionState::AnalysisInProgress,
            message: "analysis, prognosis and draft running; poll /api/petitions/status"
                .to_string(),
        }),
    ))
}
