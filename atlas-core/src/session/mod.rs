//! Chat session management
//!
//! Sessions are kept in memory by the [`SessionStore`] and written through,
//! as one JSON array, to a single key-value slot.

pub mod codec;
pub mod manager;
pub mod persistence;
pub mod store;

pub use manager::{PendingReply, SessionStore, StoreSnapshot};
pub use persistence::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SessionPersistence, SlotPersistence,
    CHATS_KEY, DEMO_CHATS_KEY,
};
pub use store::{derive_title, Message, Session, SessionId, SessionSummary, PLACEHOLDER_TITLE};
