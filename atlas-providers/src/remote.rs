//! Reply source backed by the Planet Atlas chat endpoint

use async_trait::async_trait;
use atlas_core::reply::{ReplyError, ReplyResult, ReplySource};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Either field may be present; `error` wins when both are
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Posts each user message to `POST /api/chat`.
///
/// No timeout and no retry: a failure is reported once.
pub struct RemoteReplySource {
    client: Client,
    endpoint: String,
}

impl RemoteReplySource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ReplySource for RemoteReplySource {
    async fn generate_reply(&self, text: &str) -> ReplyResult<String> {
        debug!("Posting chat message to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { message: text })
            .send()
            .await
            .map_err(|e| ReplyError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReplyError::Transport(e.to_string()))?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ReplyError::Transport(format!("invalid response body (HTTP {}): {}", status, e))
        })?;

        if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
            return Err(ReplyError::Remote(error));
        }

        parsed.response.ok_or_else(|| {
            ReplyError::Transport(format!("HTTP {}: response carries no reply", status))
        })
    }

    fn name(&self) -> &str {
        "remote"
    }
}
