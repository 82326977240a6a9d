//! OpenAI-compatible chat-completions client
//!
//! Used by the chat backend to reach the model upstream (Ollama by default).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::base::{CompletionProvider, Message, ProviderError, ProviderResult};

/// Chat-completions request format
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

/// Chat-completions response format
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol
pub struct OpenAiCompatClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            client: Client::builder()
                .http1_only() // Force HTTP/1.1 to avoid issues with some local servers
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: if api_key.trim().is_empty() {
                None
            } else {
                Some(api_key)
            },
            model: model.into(),
        }
    }

    fn apply_headers(&self, req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => req_builder.header("Authorization", format!("Bearer {}", api_key)),
            None => req_builder,
        }
    }

    fn parse_response(response: ChatCompletionResponse) -> ProviderResult<String> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatClient {
    async fn chat(&self, messages: Vec<Message>) -> ProviderResult<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        debug!(
            "Sending chat request to {} with model {}",
            self.api_base, self.model
        );

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .apply_headers(self.client.post(&url).json(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let response_data: ChatCompletionResponse = response.json().await?;
        Self::parse_response(response_data)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
