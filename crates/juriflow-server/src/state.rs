//! Shared application state and component wiring.

use std::sync::Arc;

use tracing::warn;

use juriflow::chat_models::ChatModel;
use juriflow::config::Settings;
use juriflow::embeddings::Embeddings;
use juriflow::error::Result;
use juriflow::gateway::LlmGateway;
use juriflow::vector_stores::{InMemoryVectorStore, VectorStore};
use juriflow_agents::{AgentRegistry, AgentSettings, Coordinator};
use juriflow_analysis::{AnalysisJobStore, Orchestrator, PetitionStore, PetitionWorkflow};
use juriflow_extract::{OcrOptions, OcrProcessor};
use juriflow_ingest::{CachedEmbedder, EmbeddingCache, IngestionPipeline, UploadJobStore};
use juriflow_splitters::TokenTextSplitter;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub uploads: Arc<UploadJobStore>,
    pub pipeline: Arc<IngestionPipeline>,
    pub orchestrator: Arc<Orchestrator>,
    pub workflow: Arc<PetitionWorkflow>,
    pub registry: Arc<AgentRegistry>,
    pub gateway: Arc<LlmGateway>,
    pub vector_store: Arc<InMemoryVectorStore>,
    pub petitions: Arc<PetitionStore>,
}

impl AppState {
    /// Wire every subsystem from the given providers.
    ///
    /// `ocr` is optional: without it, scanned PDFs and image uploads fail
    /// with a clear error (the OCR engine is an external collaborator).
    pub fn build(
        settings: Settings,
        chat_model: Arc<dyn ChatModel>,
        embeddings: Arc<dyn Embeddings>,
        ocr: Option<Arc<OcrProcessor>>,
    ) -> Result<Self> {
        let settings = Arc::new(settings);

        let gateway = Arc::new(
            LlmGateway::new(chat_model).with_call_timeout(settings.llm_call_timeout),
        );

        let embedder = Arc::new(CachedEmbedder::new(
            embeddings,
            EmbeddingCache::new(settings.embedding_cache_path.clone()),
        ));

        let vector_store = Arc::new(InMemoryVectorStore::new());
        let uploads = Arc::new(UploadJobStore::new());

        let splitter = TokenTextSplitter::for_model(&settings.embedding_model)
            .map_err(|e| juriflow::error::Error::config(e.to_string()))?
            .with_chunk_size(settings.chunk_max_tokens)
            .with_chunk_overlap(settings.chunk_overlap_tokens)
            .build()
            .map_err(|e| juriflow::error::Error::config(e.to_string()))?;

        let mut pipeline = IngestionPipeline::new(
            splitter,
            Arc::clone(&embedder),
            Arc::clone(&vector_store) as Arc<dyn VectorStore>,
            Arc::clone(&uploads),
        );
        match ocr {
            Some(processor) => {
                let options = OcrOptions {
                    language: settings.ocr_language.clone(),
                    dpi: settings.ocr_dpi,
                    preprocess: true,
                    page_limit: None,
                    low_confidence_threshold: settings.ocr_low_conf_threshold,
                };
                pipeline = pipeline.with_ocr(processor, options);
            }
            None => {
                warn!("no OCR engine configured; scanned PDFs and images will be rejected");
            }
        }
        let pipeline = Arc::new(pipeline);

        let registry = Arc::new(AgentRegistry::with_defaults(AgentSettings::from(
            settings.as_ref(),
        )));
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&gateway),
            Arc::clone(&vector_store) as Arc<dyn VectorStore>,
            embedder as Arc<dyn Embeddings>,
            Arc::clone(&registry),
            settings.analysis_model.clone(),
            settings.analysis_temperature,
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            coordinator,
            Arc::new(AnalysisJobStore::new()),
        ));

        let petitions = Arc::new(PetitionStore::new());
        let workflow = Arc::new(PetitionWorkflow::new(
            Arc::clone(&petitions),
            Arc::clone(&uploads),
            Arc::clone(&pipeline),
            Arc::clone(&orchestrator),
            Arc::clone(&vector_store) as Arc<dyn VectorStore>,
            Arc::clone(&gateway),
            settings.analysis_model.clone(),
            settings.analysis_temperature,
        ));

        Ok(Self {
            settings,
            uploads,
            pipeline,
            orchestrator,
            workflow,
            registry,
            gateway,
            vector_store,
            petitions,
        })
    }
}
