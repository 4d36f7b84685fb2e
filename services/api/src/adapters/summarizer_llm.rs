//! services/api/src/adapters/summarizer_llm.rs
//!
//! This module contains the adapter for the summarizing LLM.
//! It implements the `LanguageModelService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use summarizer_core::ports::{LanguageModelService, PortError, PortResult};

/// Low temperature keeps the output close to the sources.
const TEMPERATURE: f32 = 0.2;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LanguageModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiSummarizerAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiSummarizerAdapter {
    /// Creates a new `OpenAiSummarizerAdapter`. Calls taking longer than
    /// `timeout` are abandoned.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }
}

//=========================================================================================
// `LanguageModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModelService for OpenAiSummarizerAdapter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(TEMPERATURE)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let chat = self.client.chat();
        let response = tokio::time::timeout(self.timeout, chat.create(request))
            .await
            .map_err(|_| PortError::Timeout(self.timeout.as_secs()))?
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Summarizer LLM response contained no text content.".to_string())
            })
    }
}
