use std::sync::Arc;

use atlas_core::config::UpstreamConfig;
use atlas_providers::{CompletionProvider, OpenAiCompatClient};

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn CompletionProvider>,
    pub system_prompt: Arc<str>,
}

impl AppState {
    pub fn new(provider: Arc<dyn CompletionProvider>, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn from_config(upstream: &UpstreamConfig) -> Self {
        let client = OpenAiCompatClient::new(
            upstream.api_base.clone(),
            upstream.api_key.clone(),
            upstream.model.clone(),
        );
        Self::new(Arc::new(client), upstream.system_prompt.as_str())
    }
}
