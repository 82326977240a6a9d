//! Chat backend for Planet Atlas
//!
//! Serves `POST /api/chat` against an OpenAI-compatible upstream and the
//! built frontend from a static directory.

pub mod handlers;
pub mod server;
pub mod state;

pub use server::{build_router, run_server};
pub use state::AppState;
