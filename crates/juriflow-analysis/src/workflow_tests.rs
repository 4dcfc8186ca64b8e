use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use juriflow::chat_models::{ChatModel, ChatRequest, ChatResponse, Role, TokenUsage};
use juriflow::documents::DocumentType;
use juriflow::embeddings::Embeddings;
use juriflow::error::{Error, Result};
use juriflow::gateway::LlmGateway;
use juriflow::vector_stores::{InMemoryVectorStore, VectorStore};
use juriflow_agents::{AgentRegistry, AgentSettings, Coordinator};
use juriflow_ingest::{CachedEmbedder, EmbeddingCache, IngestionPipeline, UploadJobStore};
use juriflow_splitters::TokenTextSplitter;

use crate::analysis_jobs::AnalysisJobStore;
use crate::orchestrator::Orchestrator;
use crate::petition::{PetitionState, PetitionStore};
use crate::relevance::SuggestedPriority;
use crate::workflow::PetitionWorkflow;

const SPECIALIST_ANSWER: &str = "The exposure described in the petition is consistent with \
the diagnosed condition, and the available records support a causal nexus, subject to the \
reservations noted regarding the missing complementary examinations and employer records.";

const SUGGESTIONS_JSON: &str = "{\"documents_suggested\": [\
    {\"type\": \"medical report\", \"justification\": \"establishes the diagnosis\", \
     \"priority\": \"essential\"},\
    {\"type\": \"employment contract\", \"justification\": \"proves the relationship\", \
     \"priority\": \"important\"},\
    {\"type\": \"witness statements\", \"justification\": \"corroborates conditions\", \
     \"priority\": \"desirable\"}]}";

const PROGNOSIS_JSON: &str = "{\"scenarios\": [\
    {\"scenario\": \"VICTORY_TOTAL\", \"probability\": 15},\
    {\"scenario\": \"VICTORY_PARTIAL\", \"probability\": 45, \
     \"value_range\": \"R$ 30k-80k\", \"estimated_duration_months\": 24},\
    {\"scenario\": \"SETTLEMENT\", \"probability\": 30},\
    {\"scenario\": \"DEFEAT\", \"probability\": 10}],\
    \"overall_recommendation\": \"Open settlement talks before the first hearing.\",\
    \"critical_factors\": [\"medical nexus evidence\", \"employer safety records\"]}";

const DRAFT_MD: &str = "# Continuation Pleading\n\n[PERSONALIZE: full name of the claimant] \
respectfully submits this manifestation.\n\n## Requests\n\n1. [PERSONALIZE: court and case \
number]\n";

/// Routes responses by the system prompt of each step; counts relevance
/// calls to pin idempotence.
struct ScriptedModel {
    relevance_calls: AtomicUsize,
    break_prognosis: bool,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            relevance_calls: AtomicUsize::new(0),
            break_prognosis: false,
        }
    }

    fn with_broken_prognosis() -> Self {
        Self {
            break_prognosis: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let text = if system.contains("legal document analyst") {
            self.relevance_calls.fetch_add(1, Ordering::SeqCst);
            SUGGESTIONS_JSON.to_string()
        } else if system.contains("litigation strategist") {
            if self.break_prognosis {
                "The outlook is generally favorable.".to_string()
            } else {
                PROGNOSIS_JSON.to_string()
            }
        } else if system.contains("continuation documents") {
            DRAFT_MD.to_string()
        } else {
            SPECIALIST_ANSWER.to_string()
        };

        Ok(ChatResponse {
            text,
            usage: Some(TokenUsage::new(120, 80)),
        })
    }
}

struct FakeEmbeddings;

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, t.chars().count() as f32, 1.0])
            .collect())
    }

    fn model_id(&self) -> &str {
        "fake-embedding-model"
    }
}

struct Harness {
    workflow: Arc<PetitionWorkflow>,
    petitions: Arc<PetitionStore>,
    uploads: Arc<UploadJobStore>,
    model: Arc<ScriptedModel>,
    _dir: TempDir,
}

fn harness(model: ScriptedModel) -> Harness {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(model);
    let gateway = Arc::new(LlmGateway::new(
        Arc::clone(&model) as Arc<dyn ChatModel>
    ));
    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new());
    let uploads = Arc::new(UploadJobStore::new());
    let embedder = Arc::new(CachedEmbedder::new(
        Arc::new(FakeEmbeddings),
        EmbeddingCache::new(dir.path().join("cache")),
    ));
    let pipeline = Arc::new(IngestionPipeline::new(
        TokenTextSplitter::cl100k().unwrap(),
        Arc::clone(&embedder),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::clone(&uploads),
    ));
    let registry = Arc::new(AgentRegistry::with_defaults(AgentSettings::new(
        "gpt-4", 0.2, 0.3,
    )));
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&gateway),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        embedder as Arc<dyn Embeddings>,
        registry,
        "gpt-4",
        0.3,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        coordinator,
        Arc::new(AnalysisJobStore::new()),
    ));
    let petitions = Arc::new(PetitionStore::new());
    let workflow = Arc::new(PetitionWorkflow::new(
        Arc::clone(&petitions),
        Arc::clone(&uploads),
        pipeline,
        orchestrator,
        store as Arc<dyn VectorStore>,
        gateway,
        "gpt-4",
        0.3,
    ));
    Harness {
        workflow,
        petitions,
        uploads,
        model,
        _dir: dir,
    }
}

fn build_docx(dir: &Path, name: &str, paragraphs: &[&str]) -> PathBuf {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

/// Create a petition and ingest its document, returning the petition id.
async fn seeded_petition(h: &Harness, dir: &TempDir) -> Uuid {
    let petition_id = Uuid::new_v4();
    let upload_id = Uuid::new_v4();
    h.petitions
        .create(petition_id, upload_id, Some("labor claim".into()))
        .unwrap();
    h.uploads.create(upload_id, "petition.docx", 2048).unwrap();

    let path = build_docx(
        dir.path(),
        "petition.docx",
        &[
            "Initial petition: the claimant worked for eight years under continuous \
             exposure to organic solvents without adequate protective equipment.",
            "The claimant seeks recognition of the occupational disease and the \
             corresponding compensation.",
        ],
    );
    h.workflow
        .ingest_petition(
            petition_id,
            upload_id,
            path,
            "petition.docx".into(),
            DocumentType::Docx,
        )
        .await;
    petition_id
}

async fn wait_for_state(h: &Harness, id: Uuid, state: PetitionState) {
    for _ in 0..300 {
        if h.petitions.get(id).unwrap().state == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "petition never reached {state:?}, stuck at {:?}",
        h.petitions.get(id).unwrap().state
    );
}

#[tokio::test]
async fn petition_ingestion_binds_the_document() {
    let h = harness(ScriptedModel::new());
    let dir = TempDir::new().unwrap();
    let id = seeded_petition(&h, &dir).await;

    let petition = h.petitions.get(id).unwrap();
    assert_eq!(petition.state, PetitionState::AwaitingDocuments);
    assert!(petition.document_id.is_some());
}

#[tokio::test]
async fn analyze_documents_suggests_and_caches() {
    let h = harness(ScriptedModel::new());
    let dir = TempDir::new().unwrap();
    let id = seeded_petition(&h, &dir).await;

    let suggestions = h.workflow.analyze_documents(id).await.unwrap();
    assert_eq!(suggestions.len(), 3);
    assert_eq!(suggestions[0].priority, SuggestedPriority::Essential);
    assert_eq!(
        h.petitions.get(id).unwrap().state,
        PetitionState::DocumentsBeingAnalyzed
    );
    assert_eq!(h.model.relevance_calls.load(Ordering::SeqCst), 1);

    // Second invocation returns the cached list without another LLM call.
    let again = h.workflow.analyze_documents(id).await.unwrap();
    assert_eq!(again.len(), 3);
    assert_eq!(h.model.relevance_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn analyze_documents_before_ingestion_is_too_early() {
    let h = harness(ScriptedModel::new());
    let petition_id = Uuid::new_v4();
    h.petitions
        .create(petition_id, Uuid::new_v4(), None)
        .unwrap();

    let err = h.workflow.analyze_documents(petition_id).await.unwrap_err();
    assert!(matches!(err, Error::TooEarly(_)));
}

#[tokio::test]
async fn essential_submission_unlocks_readiness() {
    let h = harness(ScriptedModel::new());
    let dir = TempDir::new().unwrap();
    let id = seeded_petition(&h, &dir).await;
    h.workflow.analyze_documents(id).await.unwrap();

    // One essential suggestion; submitting one document satisfies it.
    let upload_id = Uuid::new_v4();
    h.uploads.create(upload_id, "laudo.docx", 512).unwrap();
    let path = build_docx(
        dir.path(),
        "laudo.docx",
        &["Medical report confirming chronic solvent-induced toxic hepatitis."],
    );
    h.workflow
        .ingest_additional_document(id, upload_id, path, "laudo.docx".into(), DocumentType::Docx)
        .await;

    let petition = h.petitions.get(id).unwrap();
    assert_eq!(petition.state, PetitionState::ReadyForAnalysis);
    assert_eq!(petition.submitted_documents.len(), 1);
}

#[tokio::test]
async fn full_analysis_chain_completes_the_petition() {
    let h = harness(ScriptedModel::new());
    let dir = TempDir::new().unwrap();
    let id = seeded_petition(&h, &dir).await;
    h.workflow.analyze_documents(id).await.unwrap();

    let upload_id = Uuid::new_v4();
    h.uploads.create(upload_id, "laudo.docx", 512).unwrap();
    let path = build_docx(dir.path(), "laudo.docx", &["Medical report."]);
    h.workflow
        .ingest_additional_document(id, upload_id, path, "laudo.docx".into(), DocumentType::Docx)
        .await;

    Arc::clone(&h.workflow)
        .start_analysis(id, vec!["medical".into()], vec!["labor".into()])
        .unwrap();
    assert_eq!(
        h.petitions.get(id).unwrap().state,
        PetitionState::AnalysisInProgress
    );

    wait_for_state(&h, id, PetitionState::Completed).await;
    let petition = h.petitions.get(id).unwrap();
    let analysis = petition.analysis.unwrap();
    assert!(!analysis.compiled_answer.is_empty());
    assert_eq!(analysis.expert_opinions.len(), 1);
    assert_eq!(analysis.attorney_opinions.len(), 1);

    let sum: f64 = analysis
        .prognosis
        .scenarios
        .iter()
        .map(|s| s.probability)
        .sum();
    assert!((sum - 100.0).abs() <= 1.0);
    assert!(analysis.draft.contains("[PERSONALIZE:"));
}

#[tokio::test]
async fn broken_prognosis_errors_the_petition() {
    let h = harness(ScriptedModel::with_broken_prognosis());
    let dir = TempDir::new().unwrap();
    let id = seeded_petition(&h, &dir).await;
    h.workflow.analyze_documents(id).await.unwrap();

    let upload_id = Uuid::new_v4();
    h.uploads.create(upload_id, "laudo.docx", 512).unwrap();
    let path = build_docx(dir.path(), "laudo.docx", &["Medical report."]);
    h.workflow
        .ingest_additional_document(id, upload_id, path, "laudo.docx".into(), DocumentType::Docx)
        .await;

    Arc::clone(&h.workflow)
        .start_analysis(id, vec!["medical".into()], vec![])
        .unwrap();
    wait_for_state(&h, id, PetitionState::Error).await;
    let petition = h.petitions.get(id).unwrap();
    assert!(petition.error_message.is_some());
}

#[tokio::test]
async fn analysis_requires_readiness() {
    let h = harness(ScriptedModel::new());
    let dir = TempDir::new().unwrap();
    let id = seeded_petition(&h, &dir).await;

    let err = Arc::clone(&h.workflow)
        .start_analysis(id, vec!["medical".into()], vec![])
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn analysis_rejects_unknown_agents() {
    let h = harness(ScriptedModel::new());
    let dir = TempDir::new().unwrap();
    let id = seeded_petition(&h, &dir).await;
    h.workflow.analyze_documents(id).await.unwrap();
    let upload_id = Uuid::new_v4();
    h.uploads.create(upload_id, "x.docx", 512).unwrap();
    let path = build_docx(dir.path(), "x.docx", &["Extra document."]);
    h.workflow
        .ingest_additional_document(id, upload_id, path, "x.docx".into(), DocumentType::Docx)
        .await;

    let err = Arc::clone(&h.workflow)
        .start_analysis(id, vec!["ghost".into()], vec![])
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    // The petition stays where it was.
    assert_eq!(
        h.petitions.get(id).unwrap().state,
        PetitionState::ReadyForAnalysis
    );
}
