//! Reply source capability
//!
//! The session store asks a [`ReplySource`] for the assistant's answer to a
//! user message. Implementations live in `atlas-providers`.

use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of a reply source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// The endpoint answered with an application-level error
    #[error("{0}")]
    Remote(String),

    /// Network or decoding failure
    #[error("{0}")]
    Transport(String),
}

pub type ReplyResult<T> = Result<T, ReplyError>;

/// Produces assistant text for a user message
#[async_trait]
pub trait ReplySource: Send + Sync {
    /// Generate a reply for `text`
    async fn generate_reply(&self, text: &str) -> ReplyResult<String>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
