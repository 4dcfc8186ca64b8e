//! Health and usage endpoints.

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health`: liveness plus a snapshot of every subsystem.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "services": {
            "vector_store": { "chunks": state.vector_store.len() },
            "uploads": state.uploads.stats(),
            "analyses": state.orchestrator.jobs().stats(),
            "llm": state.gateway.usage(),
        },
    }))
}

/// `GET /api/usage`: process-level LLM usage aggregates.
pub async fn usage(State(state): State<AppState>) -> Json<juriflow::usage::UsageSnapshot> {
    Json(state.gateway.usage())
}
