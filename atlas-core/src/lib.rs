//! Core types and traits for Planet Atlas
//!
//! This crate owns the chat-session store, its persistence codec and the
//! reply-source capability the store calls into. Provider implementations
//! live in `atlas-providers`.

pub mod config;
pub mod error;
pub mod logging;
pub mod reply;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
pub use reply::{ReplyError, ReplySource};
pub use session::{Message, Session, SessionId, SessionStore};
