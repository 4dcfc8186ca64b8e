//! Document ingestion endpoints.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use juriflow::documents::{DocumentType, ExtractionMethod};
use juriflow_ingest::{UploadJob, UploadState};

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::validate::{validate_upload_extension, validate_upload_size};

#[derive(Debug, Serialize)]
pub struct StartUploadResponse {
    pub upload_id: Uuid,
    pub status: UploadState,
}

#[derive(Debug, Serialize)]
pub struct UploadStatusResponse {
    pub upload_id: Uuid,
    pub status: UploadState,
    pub current_stage: String,
    pub progress_percent: u8,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<UploadJob> for UploadStatusResponse {
    fn from(job: UploadJob) -> Self {
        Self {
            upload_id: job.id,
            status: job.state,
            current_stage: job.current_stage,
            progress_percent: job.progress_percent,
            updated_at: job.updated_at,
            error_message: job.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResultResponse {
    pub document_id: Uuid,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub page_count: usize,
    pub method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_avg_confidence: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub low_confidence_pages: Vec<usize>,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Pull the `file` field (and optionally other text fields) out of a
/// multipart body.
pub(crate) async fn read_multipart(
    multipart: &mut Multipart,
) -> Result<(Option<(String, Vec<u8>)>, std::collections::HashMap<String, String>)> {
    let mut file = None;
    let mut fields = std::collections::HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(ToString::to_string)
                    .ok_or_else(|| ApiError::Validation("file field has no filename".into()))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("could not read file field: {e}")))?;
                file = Some((file_name, data.to_vec()));
            }
            Some(other) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("could not read field: {e}")))?;
                fields.insert(other.to_string(), value);
            }
            None => {}
        }
    }

    Ok((file, fields))
}

/// Persist an accepted upload to the temp directory.
pub(crate) async fn save_upload(
    state: &AppState,
    upload_id: Uuid,
    extension: &str,
    data: &[u8],
) -> Result<std::path::PathBuf> {
    let dir = &state.settings.upload_temp_path;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::Internal(format!("could not create upload directory: {e}")))?;
    let path = dir.join(format!("{upload_id}.{extension}"));
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ApiError::Internal(format!("could not persist upload: {e}")))?;
    Ok(path)
}

/// `POST /api/documents/start-upload`
#[instrument(skip(state, multipart))]
pub async fn start_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StartUploadResponse>)> {
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
    info!(%upload_id, name = %file_name, size = data.len(), "upload admitted");

    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        pipeline.ingest(upload_id, path, file_name, declared).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartUploadResponse {
            upload_id,
            status: UploadState::Initiated,
        }),
    ))
}

/// `GET /api/documents/upload-status/{upload_id}`
pub async fn upload_status(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> Result<Json<UploadStatusResponse>> {
    let job = state
        .uploads
        .get(upload_id)
        .ok_or_else(|| ApiError::NotFound(format!("upload {upload_id}")))?;
    Ok(Json(job.into()))
}

/// `GET /api/documents/upload-result/{upload_id}`
pub async fn upload_result(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> Result<Json<UploadResultResponse>> {
    let job = state
        .uploads
        .get(upload_id)
        .ok_or_else(|| ApiError::NotFound(format!("upload {upload_id}")))?;

    match job.state {
        UploadState::Completed => {
            let metadata = job.result.ok_or_else(|| {
                ApiError::Internal("completed upload is missing its result".into())
            })?;
            Ok(Json(UploadResultResponse {
                document_id: metadata.id,
                name: metadata.name,
                size: metadata.size_bytes,
                doc_type: metadata.doc_type,
                page_count: metadata.page_count,
                method: metadata.method,
                ocr_avg_confidence: metadata.ocr_avg_confidence,
                low_confidence_pages: metadata.low_confidence_pages,
                chunk_count: metadata.chunk_count,
                created_at: metadata.created_at,
            }))
        }
        UploadState::Error => Err(ApiError::JobFailed(
            job.error_message
                .unwrap_or_else(|| "ingestion failed".to_string()),
        )),
        _ => Err(ApiError::TooEarly(format!(
            "upload {upload_id} is still {:?}",
            job.state
        ))),
    }
}

/// `GET /api/documents/uploads`
pub async fn list_uploads(State(state): State<AppState>) -> Json<Vec<UploadStatusResponse>> {
    Json(state.uploads.list().into_iter().map(Into::into).collect())
}

#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub document_id: Uuid,
    pub deleted_chunks: usize,
}

/// `DELETE /api/documents/{document_id}`
///
/// Removes the document's chunks from the vector store (cascade by chunk-id
/// prefix). Unknown ids are a 404; nothing else references documents.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DeleteDocumentResponse>> {
    use juriflow::vector_stores::VectorStore;

    let chunks = state.vector_store.get_by_document(document_id).await?;
    if chunks.is_empty() {
        return Err(ApiError::NotFound(format!("document {document_id}")));
    }
    state.vector_store.delete_document(document_id).await?;
    info!(%document_id, deleted_chunks = chunks.len(), "document deleted");
    Ok(Json(DeleteDocumentResponse {
        document_id,
        deleted_chunks: chunks.len(),
    }))
}
