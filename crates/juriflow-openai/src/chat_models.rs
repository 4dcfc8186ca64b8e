//! `OpenAI` chat-completion provider.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use juriflow::chat_models::{ChatModel, ChatRequest, ChatResponse, Role, TokenUsage};
use juriflow::error::{Error, Result};

use crate::error_map::classify;

/// Chat completions through the `OpenAI` API.
///
/// This type performs exactly one API call per request; retries, timeouts
/// and usage accounting belong to the core gateway.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
}

impl OpenAIChatModel {
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self {
            client: Client::with_config(config),
        }
    }

    /// Point the client at a compatible API endpoint.
    #[must_use]
    pub fn with_api_base(self, api_base: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_base(api_base.into());
        Self {
            client: Client::with_config(config),
        }
    }
}

fn convert_message(
    message: &juriflow::chat_models::ChatMessage,
) -> Result<ChatCompletionRequestMessage> {
    let converted = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| classify(&e))?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| classify(&e))?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| classify(&e))?
            .into(),
    };
    Ok(converted)
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let messages = request
            .messages
            .iter()
            .map(convert_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(request.model.clone())
            .messages(messages)
            .temperature(request.temperature);
        if let Some(max_tokens) = request.max_tokens {
            builder.max_tokens(max_tokens);
        }
        let api_request = builder.build().map_err(|e| classify(&e))?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| classify(&e))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(Error::upstream("OpenAI returned an empty completion"));
        }

        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        Ok(ChatResponse { text, usage })
    }
}
