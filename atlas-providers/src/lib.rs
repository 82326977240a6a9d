//! Reply sources and chat-completions providers for Planet Atlas
//!
//! The session store only sees [`ReplySource`]; which variant backs it is
//! decided once from configuration by [`build_reply_source`].

pub mod base;
pub mod openai;
pub mod remote;
pub mod simulated;

pub use base::{CompletionProvider, Message, ProviderError, ProviderResult};
pub use openai::OpenAiCompatClient;
pub use remote::RemoteReplySource;
pub use simulated::{SimulatedReplySource, DEMO_REPLIES};

use std::sync::Arc;

use atlas_core::config::{ReplyConfig, ReplyMode};
use atlas_core::reply::ReplySource;
use tracing::debug;

/// Build the reply source selected by `config.mode`
pub fn build_reply_source(config: &ReplyConfig) -> Arc<dyn ReplySource> {
    let source: Arc<dyn ReplySource> = match config.mode {
        ReplyMode::Simulated => Arc::new(SimulatedReplySource::new(
            config.min_delay_ms,
            config.max_delay_ms,
        )),
        ReplyMode::Remote => Arc::new(RemoteReplySource::new(config.endpoint.clone())),
    };
    debug!("Using {} reply source", source.name());
    source
}
