use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use juriflow::chat_models::{ChatModel, ChatRequest, ChatResponse, TokenUsage};
use juriflow::documents::ChunkRecord;
use juriflow::embeddings::Embeddings;
use juriflow::error::{Error, Result};
use juriflow::gateway::LlmGateway;
use juriflow::vector_stores::{InMemoryVectorStore, VectorStore};
use juriflow_agents::{AgentRegistry, AgentSettings, Coordinator};

use crate::analysis_jobs::{AnalysisJobStore, AnalysisRequest, AnalysisState};
use crate::orchestrator::Orchestrator;

const LONG_ANSWER: &str = "Considering the records retrieved for this case, the exposure \
history and the medical documentation are mutually consistent and support the requested \
assessment, with the caveats discussed in the body of this opinion regarding missing exams.";

struct MarkedFailureModel {
    poison_marker: Option<String>,
}

#[async_trait]
impl ChatModel for MarkedFailureModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        if let Some(marker) = &self.poison_marker {
            if request
                .messages
                .iter()
                .any(|m| m.content.contains(marker.as_str()))
            {
                return Err(Error::upstream("injected specialist failure"));
            }
        }
        Ok(ChatResponse {
            text: LONG_ANSWER.to_string(),
            usage: Some(TokenUsage::new(80, 40)),
        })
    }
}

struct FakeEmbeddings;

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.5]).collect())
    }

    fn model_id(&self) -> &str {
        "fake-embedding-model"
    }
}

async fn orchestrator_with(
    poison_marker: Option<&str>,
    seed_store: bool,
) -> (Orchestrator, Arc<AnalysisJobStore>, Uuid) {
    let store = Arc::new(InMemoryVectorStore::new());
    let doc = Uuid::new_v4();
    if seed_store {
        store
            .upsert(
                doc,
                vec![ChunkRecord::new(doc, 0, "employment records excerpt")],
                vec![vec![1.0, 0.5]],
            )
            .await
            .unwrap();
    }

    let gateway = Arc::new(LlmGateway::new(Arc::new(MarkedFailureModel {
        poison_marker: poison_marker.map(ToString::to_string),
    })));
    let registry = Arc::new(AgentRegistry::with_defaults(AgentSettings::new(
        "gpt-4", 0.2, 0.3,
    )));
    let coordinator = Arc::new(Coordinator::new(
        gateway,
        store,
        Arc::new(FakeEmbeddings),
        registry,
        "gpt-4",
        0.3,
    ));
    let jobs = Arc::new(AnalysisJobStore::new());
    (Orchestrator::new(coordinator, Arc::clone(&jobs)), jobs, doc)
}

fn request(experts: &[&str], attorneys: &[&str]) -> AnalysisRequest {
    AnalysisRequest {
        prompt: "Evaluate nexus between illness and work.".into(),
        experts_selected: experts.iter().map(ToString::to_string).collect(),
        attorneys_selected: attorneys.iter().map(ToString::to_string).collect(),
        document_ids: None,
    }
}

async fn wait_terminal(jobs: &AnalysisJobStore, id: Uuid) -> crate::analysis_jobs::AnalysisJob {
    for _ in 0..200 {
        if let Some(job) = jobs.get(id) {
            if job.state.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("analysis {id} never reached a terminal state");
}

#[tokio::test]
async fn unknown_agent_is_rejected_without_admitting_a_job() {
    let (orchestrator, jobs, _) = orchestrator_with(None, true).await;
    let err = orchestrator.start(request(&["ghost"], &[])).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(jobs.stats().total, 0);
}

#[tokio::test]
async fn background_analysis_runs_to_completion() {
    let (orchestrator, jobs, _) = orchestrator_with(None, true).await;
    let id = orchestrator
        .start(request(&["medical", "workplace_safety"], &[]))
        .unwrap();

    let admitted = jobs.get(id).unwrap();
    assert!(matches!(
        admitted.state,
        AnalysisState::Initiated | AnalysisState::Processing | AnalysisState::Completed
    ));

    let job = wait_terminal(&jobs, id).await;
    assert_eq!(job.state, AnalysisState::Completed);
    assert_eq!(job.progress_percent, 100);

    let result = job.result.unwrap();
    assert_eq!(result.expert_opinions.len(), 2);
    assert!(result.attorney_opinions.is_empty());
    assert!(!result.compiled_answer.is_empty());
    assert_eq!(result.experts_used, vec!["medical", "workplace_safety"]);
    assert!(result.duration_seconds >= 0.0);
    assert!(result.ended_at >= result.started_at);
    assert!(!result.documents_consulted.is_empty());
}

#[tokio::test]
async fn failing_specialist_leaves_an_error_slot_and_penalized_confidence() {
    let (orchestrator, jobs, _) =
        orchestrator_with(Some("workplace-safety assessment"), true).await;
    let id = orchestrator
        .start(request(&["medical", "workplace_safety"], &[]))
        .unwrap();
    let job = wait_terminal(&jobs, id).await;

    assert_eq!(job.state, AnalysisState::Completed);
    let result = job.result.unwrap();
    assert!(!result.expert_opinions[0].is_error());
    assert!(result.expert_opinions[1].is_error());
    // medical at 0.8, one failed agent, context present: 0.8 - 0.10.
    assert!((result.confidence - 0.7).abs() < 1e-5);
}

#[tokio::test]
async fn rag_only_analysis_is_permitted() {
    let (orchestrator, _, _) = orchestrator_with(None, false).await;
    let result = orchestrator.run_analysis(&request(&[], &[])).await.unwrap();
    assert!(result.expert_opinions.is_empty());
    assert!(result.attorney_opinions.is_empty());
    assert!(!result.compiled_answer.is_empty());
    // Neutral 0.5 base minus the empty-context penalty.
    assert!((result.confidence - 0.35).abs() < 1e-5);
}

#[tokio::test]
async fn document_filter_restricts_rag() {
    let (orchestrator, _, seeded_doc) = orchestrator_with(None, true).await;
    let mut filtered = request(&[], &[]);
    filtered.document_ids = Some(vec![Uuid::new_v4()]);
    let result = orchestrator.run_analysis(&filtered).await.unwrap();
    assert!(result.documents_consulted.is_empty());

    let mut matching = request(&[], &[]);
    matching.document_ids = Some(vec![seeded_doc]);
    let result = orchestrator.run_analysis(&matching).await.unwrap();
    assert_eq!(result.documents_consulted, vec![seeded_doc.to_string()]);
}
