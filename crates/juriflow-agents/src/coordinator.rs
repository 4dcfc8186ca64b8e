//! The coordinating agent.
//!
//! The coordinator is the only component that touches the vector store. It
//! retrieves RAG context, fans the question out to the selected specialists
//! as concurrent tasks with all-settled semantics, and compiles the final
//! opinion in one closing LLM call.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use juriflow::embeddings::Embeddings;
use juriflow::error::Result;
use juriflow::gateway::{CompletionRequest, LlmGateway};
use juriflow::opinions::{AgentOpinion, ContextDocument};
use juriflow::vector_stores::{DocumentFilter, VectorStore};

use crate::agent::{format_context, referenced_documents, AgentExtras, AgentKind};
use crate::registry::AgentRegistry;

/// Default number of chunks retrieved per RAG query.
const DEFAULT_RAG_K: usize = 5;

/// Per-agent failure slot. One specialist failing never cancels the others;
/// its slot records what went wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFailure {
    /// Always true; marks the slot as an error in serialized payloads.
    pub error: bool,
    pub agent_id: String,
    pub message: String,
    pub tag: String,
}

/// Outcome slot for one selected agent, in selection order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentOutcome {
    Opinion(AgentOpinion),
    Failed(AgentFailure),
}

impl AgentOutcome {
    pub fn agent_id(&self) -> &str {
        match self {
            Self::Opinion(opinion) => &opinion.agent_id,
            Self::Failed(failure) => &failure.agent_id,
        }
    }

    pub fn as_opinion(&self) -> Option<&AgentOpinion> {
        match self {
            Self::Opinion(opinion) => Some(opinion),
            Self::Failed(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Aggregate confidence for a compiled result.
///
/// Mean of the successful self-confidences, minus 0.10 per failed agent,
/// minus 0.15 when no context was retrieved; clamped to `[0, 1]`. With no
/// specialist opinions at all the mean term is a neutral 0.5.
pub fn aggregate_confidence(successes: &[f32], failed_agents: usize, context_empty: bool) -> f32 {
    let mean = if successes.is_empty() {
        0.5
    } else {
        successes.iter().sum::<f32>() / successes.len() as f32
    };
    let mut confidence = mean - 0.10 * failed_agents as f32;
    if context_empty {
        confidence -= 0.15;
    }
    confidence.clamp(0.0, 1.0)
}

/// RAG retrieval, specialist fan-out and final compilation.
pub struct Coordinator {
    gateway: Arc<LlmGateway>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embeddings>,
    registry: Arc<AgentRegistry>,
    model: String,
    temperature: f32,
    rag_k: usize,
}

impl Coordinator {
    pub fn new(
        gateway: Arc<LlmGateway>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embeddings>,
        registry: Arc<AgentRegistry>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            gateway,
            store,
            embedder,
            registry,
            model: model.into(),
            temperature,
            rag_k: DEFAULT_RAG_K,
        }
    }

    #[must_use]
    pub fn with_rag_k(mut self, k: usize) -> Self {
        self.rag_k = k.max(1);
        self
    }

    pub fn registry(&self) -> Arc<AgentRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn gateway(&self) -> Arc<LlmGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn default_rag_k(&self) -> usize {
        self.rag_k
    }

    /// Retrieve the top-k chunks for a query.
    ///
    /// Degrades gracefully: any embedding or store failure logs a warning
    /// and returns an empty context, which the confidence model penalizes.
    pub async fn rag_query(
        &self,
        query: &str,
        k: usize,
        filter: Option<&DocumentFilter>,
    ) -> Vec<ContextDocument> {
        let embedding = match self.embedder.embed_query(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(error = %e, "query embedding failed, continuing without RAG context");
                return Vec::new();
            }
        };
        match self.store.search(&embedding, k, filter).await {
            Ok(hits) => {
                debug!(hits = hits.len(), "RAG query resolved");
                hits.into_iter()
                    .map(|hit| {
                        ContextDocument::new(
                            Some(hit.chunk.document_id.to_string()),
                            hit.chunk.text,
                        )
                    })
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "vector search failed, continuing without RAG context");
                Vec::new()
            }
        }
    }

    /// Run the selected experts concurrently. Slots come back in selection
    /// order; a failed expert occupies its slot with an [`AgentFailure`].
    pub async fn delegate_to_experts(
        &self,
        question: &str,
        context_docs: &[ContextDocument],
        expert_ids: &[String],
        extras: &AgentExtras,
    ) -> Vec<AgentOutcome> {
        let agents = expert_ids
            .iter()
            .map(|id| (id.clone(), self.registry.create_expert(id)))
            .collect();
        self.delegate(agents, question, context_docs, extras).await
    }

    /// Identical protocol for the selected attorneys.
    pub async fn delegate_to_attorneys(
        &self,
        question: &str,
        context_docs: &[ContextDocument],
        attorney_ids: &[String],
        extras: &AgentExtras,
    ) -> Vec<AgentOutcome> {
        let agents = attorney_ids
            .iter()
            .map(|id| (id.clone(), self.registry.create_attorney(id)))
            .collect();
        self.delegate(agents, question, context_docs, extras).await
    }

    async fn delegate(
        &self,
        agents: Vec<(String, Option<Arc<dyn crate::agent::Agent>>)>,
        question: &str,
        context_docs: &[ContextDocument],
        extras: &AgentExtras,
    ) -> Vec<AgentOutcome> {
        // Spawn everything first so the specialists genuinely run in
        // parallel, then settle each slot independently.
        let handles: Vec<(String, Option<tokio::task::JoinHandle<Result<AgentOpinion>>>)> =
            agents
                .into_iter()
                .map(|(id, agent)| {
                    let Some(agent) = agent else {
                        return (id, None);
                    };
                    let gateway = Arc::clone(&self.gateway);
                    let context = context_docs.to_vec();
                    let question = question.to_string();
                    let extras = extras.clone();
                    let handle = tokio::spawn(async move {
                        agent.process(&gateway, &context, &question, &extras).await
                    });
                    (id, Some(handle))
                })
                .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = match handle {
                None => AgentOutcome::Failed(AgentFailure {
                    error: true,
                    agent_id: id.clone(),
                    message: format!("unknown agent id: {id}"),
                    tag: "validation".to_string(),
                }),
                Some(handle) => match handle.await {
                    Ok(Ok(opinion)) => AgentOutcome::Opinion(opinion),
                    Ok(Err(err)) => {
                        warn!(agent_id = %id, error = %err, "specialist failed");
                        AgentOutcome::Failed(AgentFailure {
                            error: true,
                            agent_id: id.clone(),
                            message: err.to_string(),
                            tag: err.kind_tag().to_string(),
                        })
                    }
                    Err(join_err) => AgentOutcome::Failed(AgentFailure {
                        error: true,
                        agent_id: id.clone(),
                        message: format!("specialist task aborted: {join_err}"),
                        tag: "internal".to_string(),
                    }),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Compile the final legal opinion from everything gathered so far.
    pub async fn compile(
        &self,
        expert_opinions: &[AgentOutcome],
        attorney_opinions: &[AgentOutcome],
        context_docs: &[ContextDocument],
        original_question: &str,
    ) -> Result<AgentOpinion> {
        let prompt = build_compile_prompt(
            expert_opinions,
            attorney_opinions,
            context_docs,
            original_question,
        );
        let request = CompletionRequest::new(prompt, self.model.clone(), self.temperature)
            .with_system(
                "You are the coordinating attorney of a multidisciplinary legal team. \
                 Compile the specialist opinions below into one coherent legal opinion: \
                 points of agreement, points of divergence, and a reasoned conclusion.",
            );
        let outcome = self.gateway.complete(request).await?;

        let successes: Vec<f32> = expert_opinions
            .iter()
            .chain(attorney_opinions)
            .filter_map(AgentOutcome::as_opinion)
            .map(|opinion| opinion.confidence)
            .collect();
        let failed = expert_opinions
            .iter()
            .chain(attorney_opinions)
            .filter(|outcome| outcome.is_error())
            .count();

        Ok(AgentOpinion {
            agent_id: "coordinator".to_string(),
            agent_name: "Coordinator".to_string(),
            agent_kind: AgentKind::Coordinator.tag().to_string(),
            specialty: None,
            opinion: outcome.text,
            confidence: aggregate_confidence(&successes, failed, context_docs.is_empty()),
            referenced_documents: referenced_documents(context_docs),
            cited_legislation: Vec::new(),
            created_at: Utc::now(),
        })
    }
}

fn build_compile_prompt(
    expert_opinions: &[AgentOutcome],
    attorney_opinions: &[AgentOutcome],
    context_docs: &[ContextDocument],
    original_question: &str,
) -> String {
    let mut sections = Vec::new();
    sections.push(format!("Original question:\n{original_question}"));
    sections.push(format!(
        "Case context:\n{}",
        format_context(context_docs)
    ));
    sections.push(render_opinion_block("Technical expert opinions", expert_opinions));
    sections.push(render_opinion_block("Attorney opinions", attorney_opinions));
    sections.push(
        "Compile the final legal opinion. Reconcile divergences explicitly and state the \
         overall assessment of the case."
            .to_string(),
    );
    sections.join("\n\n")
}

fn render_opinion_block(title: &str, outcomes: &[AgentOutcome]) -> String {
    if outcomes.is_empty() {
        return format!("{title}: none requested.");
    }
    let body = outcomes
        .iter()
        .map(|outcome| match outcome {
            AgentOutcome::Opinion(opinion) => format!(
                "## {} (confidence {:.2})\n{}",
                opinion.agent_name, opinion.confidence, opinion.opinion
            ),
            AgentOutcome::Failed(failure) => format!(
                "## {} - UNAVAILABLE\nThis specialist failed: {}",
                failure.agent_id, failure.message
            ),
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{title}:\n{body}")
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod coordinator_tests;
