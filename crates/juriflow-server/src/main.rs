//! JuriFlow server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use juriflow::config::Settings;
use juriflow_openai::{OpenAIChatModel, OpenAIEmbeddings};
use juriflow_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let chat_model = Arc::new(OpenAIChatModel::new(&settings.llm_api_key));
    let embeddings = Arc::new(
        OpenAIEmbeddings::new(&settings.llm_api_key).with_model(&settings.embedding_model),
    );

    tokio::fs::create_dir_all(&settings.upload_temp_path)
        .await
        .context("creating upload directory")?;
    tokio::fs::create_dir_all(&settings.embedding_cache_path)
        .await
        .context("creating embedding cache directory")?;

    let addr = settings.server_addr.clone();
    // The OCR engine and page renderer are deployment-specific; the server
    // starts without them and rejects scanned input until they are wired.
    let state = AppState::build(settings, chat_model, embeddings, None)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "juriflow-server listening");
    axum::serve(listener, build_router(state))
        .await
        .context("serving")?;
    Ok(())
}
