//! The single chokepoint for LLM calls.
//!
//! Every completion in the system goes through [`LlmGateway::complete`]:
//! retries with exponential backoff on rate-limit and timeout errors, a
//! per-call deadline, and usage/cost accounting. Other errors fail fast.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::chat_models::{ChatMessage, ChatModel, ChatRequest, TokenUsage};
use crate::error::{Error, Result};
use crate::usage::{UsageSnapshot, UsageTracker};

/// Exponential backoff schedule: the sleep before retry N is
/// `DEFAULT_BACKOFF[N - 1]`, clamped to the last entry.
const DEFAULT_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Total attempts per call, counting the first one.
const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// One gateway call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Result of a gateway call. `usage` is provider-reported when available,
/// otherwise estimated from text length.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub text: String,
    pub usage: TokenUsage,
}

/// Retry/timeout/accounting wrapper around a [`ChatModel`].
pub struct LlmGateway {
    model: Arc<dyn ChatModel>,
    usage: Arc<UsageTracker>,
    backoff: Vec<Duration>,
    max_attempts: usize,
    call_timeout: Duration,
}

impl LlmGateway {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            usage: Arc::new(UsageTracker::new()),
            backoff: DEFAULT_BACKOFF.to_vec(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: Duration::from_secs(60),
        }
    }

    /// Override the backoff schedule. Must not be empty.
    #[must_use]
    pub fn with_backoff_schedule(mut self, schedule: Vec<Duration>) -> Self {
        if !schedule.is_empty() {
            self.backoff = schedule;
        }
        self
    }

    /// Override the total attempt count.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Override the per-call deadline.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Share an existing tracker (e.g. one surfaced on `/health`).
    #[must_use]
    pub fn with_usage_tracker(mut self, tracker: Arc<UsageTracker>) -> Self {
        self.usage = tracker;
        self
    }

    /// Process-level usage aggregates.
    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    pub fn usage_tracker(&self) -> Arc<UsageTracker> {
        Arc::clone(&self.usage)
    }

    /// Run one completion with retries.
    ///
    /// Rate-limit and timeout errors are retried until `max_attempts` is
    /// exhausted, sleeping the backoff schedule between tries; any other
    /// error is returned immediately.
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutcome> {
        let chat_request = build_chat_request(&request);
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let step = (attempt - 1).min(self.backoff.len() - 1);
                let sleep = self.backoff[step];
                debug!(attempt, ?sleep, model = %request.model, "retrying LLM call");
                tokio::time::sleep(sleep).await;
            }

            let call = self.model.complete(chat_request.clone());
            let outcome = match tokio::time::timeout(self.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::timeout(format!(
                    "LLM call exceeded {:?} deadline",
                    self.call_timeout
                ))),
            };

            match outcome {
                Ok(response) => {
                    let usage = response.usage.unwrap_or_else(|| {
                        estimate_usage(&chat_request.messages, &response.text)
                    });
                    self.usage
                        .record(&request.model, usage.prompt_tokens, usage.completion_tokens);
                    return Ok(CompletionOutcome {
                        text: response.text,
                        usage,
                    });
                }
                Err(err) if err.is_retryable() => {
                    warn!(attempt, model = %request.model, error = %err, "retryable LLM failure");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("retry loop exited without error")))
    }
}

fn build_chat_request(request: &CompletionRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(ChatMessage::system(system.clone()));
    }
    messages.push(ChatMessage::user(request.prompt.clone()));
    ChatRequest {
        messages,
        model: request.model.clone(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

/// Rough token estimate when the provider reports no usage: one token per
/// four characters.
fn estimate_usage(messages: &[ChatMessage], completion: &str) -> TokenUsage {
    let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
    TokenUsage::new((prompt_chars / 4) as u32, (completion.len() / 4) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_models::ChatResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with the given error for `failures` calls, then succeeds.
    struct FlakyModel {
        failures: usize,
        calls: AtomicUsize,
        error: fn() -> Error,
    }

    impl FlakyModel {
        fn new(failures: usize, error: fn() -> Error) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                error,
            }
        }
    }

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(ChatResponse {
                    text: "final answer".into(),
                    usage: Some(TokenUsage::new(10, 5)),
                })
            }
        }
    }

    fn fast_gateway(model: Arc<dyn ChatModel>) -> LlmGateway {
        LlmGateway::new(model)
            .with_backoff_schedule(vec![Duration::from_millis(1), Duration::from_millis(1)])
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let gateway = fast_gateway(Arc::new(FlakyModel::new(0, || Error::rate_limit("x"))));
        let outcome = gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .unwrap();
        assert_eq!(outcome.text, "final answer");
        assert_eq!(gateway.usage().total_calls, 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let gateway = fast_gateway(Arc::new(FlakyModel::new(2, || Error::rate_limit("429"))));
        let outcome = gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .unwrap();
        assert_eq!(outcome.text, "final answer");
    }

    #[tokio::test]
    async fn exhausted_retries_surface_rate_limit() {
        let gateway = fast_gateway(Arc::new(FlakyModel::new(99, || Error::rate_limit("429"))));
        let err = gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimitExceeded(_)));
    }

    #[tokio::test]
    async fn timeout_errors_are_retried() {
        let gateway = fast_gateway(Arc::new(FlakyModel::new(1, || Error::timeout("slow"))));
        assert!(gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn upstream_errors_fail_fast() {
        let model = Arc::new(FlakyModel::new(1, || Error::upstream("500")));
        let gateway = fast_gateway(Arc::clone(&model) as Arc<dyn ChatModel>);
        let err = gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        // One call only: no retry happened.
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn usage_records_reported_tokens() {
        let gateway = fast_gateway(Arc::new(FlakyModel::new(0, || Error::upstream(""))));
        gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .unwrap();
        let snap = gateway.usage();
        assert_eq!(snap.prompt_tokens, 10);
        assert_eq!(snap.completion_tokens, 5);
        assert!(snap.estimated_cost_usd > 0.0);
    }

    struct SlowModel;

    #[async_trait]
    impl ChatModel for SlowModel {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ChatResponse {
                text: String::new(),
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn deadline_converts_to_timeout_error() {
        let gateway = LlmGateway::new(Arc::new(SlowModel))
            .with_max_attempts(1)
            .with_call_timeout(Duration::from_millis(10));
        let err = gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn backoff_schedule_clamps_to_last_step() {
        // Five attempts against a two-step schedule: the later sleeps reuse
        // the last entry instead of indexing out of bounds.
        let model = Arc::new(FlakyModel::new(4, || Error::rate_limit("429")));
        let gateway = LlmGateway::new(Arc::clone(&model) as Arc<dyn ChatModel>)
            .with_backoff_schedule(vec![Duration::from_millis(1), Duration::from_millis(2)])
            .with_max_attempts(5);
        let outcome = gateway
            .complete(CompletionRequest::new("q", "gpt-4", 0.3))
            .await
            .unwrap();
        assert_eq!(outcome.text, "final answer");
        assert_eq!(model.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn system_message_precedes_user() {
        let request = CompletionRequest::new("question", "gpt-4", 0.1).with_system("sys");
        let chat = build_chat_request(&request);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, crate::chat_models::Role::System);
        assert_eq!(chat.messages[1].content, "question");
    }

    #[test]
    fn estimated_usage_scales_with_length() {
        let messages = vec![ChatMessage::user("x".repeat(400))];
        let usage = estimate_usage(&messages, &"y".repeat(100));
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 25);
    }
}
