//! Session store: the stateful core behind the chat UI

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::persistence::SessionPersistence;
use super::store::{derive_title, Message, Session, SessionId, SessionSummary};
use crate::reply::{ReplyError, ReplyResult, ReplySource};
use crate::{Error, Result};

/// Everything a presentation layer needs to render
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub sessions: Vec<Session>,
    pub active: Option<SessionId>,
    pub loading: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Most recently created first
    sessions: Vec<Session>,
    active: Option<SessionId>,
    /// Sessions with a reply in flight
    pending: HashSet<SessionId>,
}

impl StoreState {
    fn find(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    fn find_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }
}

/// Owns the chat sessions and the active selection.
///
/// Every mutation is written through to the persistence port while the state
/// lock is held. Cloning is cheap and yields a handle to the same store.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<Mutex<StoreState>>,
    persistence: Arc<dyn SessionPersistence>,
    replies: Arc<dyn ReplySource>,
}

impl SessionStore {
    /// Open a store, loading the persisted sessions once
    pub fn open(persistence: Arc<dyn SessionPersistence>, replies: Arc<dyn ReplySource>) -> Self {
        let sessions = persistence.load();
        debug!(
            "Session store opened with {} sessions (replies: {})",
            sessions.len(),
            replies.name()
        );

        Self {
            state: Arc::new(Mutex::new(StoreState {
                sessions,
                ..StoreState::default()
            })),
            persistence,
            replies,
        }
    }

    /// Insert an empty session at the head and make it active
    pub fn create_session(&self) -> SessionId {
        let session = Session::new();
        let id = session.id.clone();

        let mut state = self.state.lock();
        state.sessions.insert(0, session);
        state.active = Some(id.clone());
        self.persistence.save(&state.sessions);

        debug!("Created session {}", id);
        id
    }

    /// Set or clear the active selection.
    ///
    /// An id that does not resolve leaves the selection unchanged.
    pub fn select_session(&self, id: Option<&SessionId>) -> Result<()> {
        let mut state = self.state.lock();
        match id {
            None => {
                state.active = None;
                Ok(())
            }
            Some(id) if state.find(id).is_some() => {
                state.active = Some(id.clone());
                Ok(())
            }
            Some(id) => {
                debug!("Ignoring selection of unknown session {}", id);
                Err(Error::NotFound(format!("session {}", id)))
            }
        }
    }

    /// Remove a session, clearing the selection if it was active.
    ///
    /// Returns whether anything was removed.
    pub fn delete_session(&self, id: &SessionId) -> bool {
        let mut state = self.state.lock();
        let before = state.sessions.len();
        state.sessions.retain(|s| &s.id != id);
        if state.sessions.len() == before {
            return false;
        }

        if state.active.as_ref() == Some(id) {
            state.active = None;
        }
        self.persistence.save(&state.sessions);

        debug!("Deleted session {}", id);
        true
    }

    /// Append a user message and request the assistant reply.
    ///
    /// With `None` a new session titled after `text` is created and made
    /// active. The reply is produced on a spawned task and appended to the
    /// session it was requested for; if that session is gone by then the
    /// reply is dropped. Outside a Tokio runtime this fails with
    /// `Error::Internal` before touching any state.
    pub fn send_message(&self, id: Option<&SessionId>, text: &str) -> Result<PendingReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("message must not be empty".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("no Tokio runtime to run the reply on: {}", e)))?;

        let session_id = {
            let mut state = self.state.lock();

            let session_id = match id {
                Some(id) => {
                    if state.find(id).is_none() {
                        return Err(Error::NotFound(format!("session {}", id)));
                    }
                    if state.pending.contains(id) {
                        return Err(Error::ReplyPending(id.to_string()));
                    }
                    id.clone()
                }
                None => {
                    let session = Session::with_title(derive_title(text));
                    let id = session.id.clone();
                    state.sessions.insert(0, session);
                    state.active = Some(id.clone());
                    debug!("Created session {} for first message", id);
                    id
                }
            };

            let session = state
                .find_mut(&session_id)
                .ok_or_else(|| Error::Internal(format!("session {} vanished", session_id)))?;
            if session.has_placeholder_title() {
                session.title = derive_title(text);
            }
            session.push(Message::user(text));

            state.pending.insert(session_id.clone());
            self.persistence.save(&state.sessions);
            session_id
        };

        let store = self.clone();
        let reply_for = session_id.clone();
        let text = text.to_string();
        let handle = runtime.spawn(async move {
            debug!("Requesting reply for session {}", reply_for);
            // A panic in the source surfaces here as a JoinError
            let replies = store.replies.clone();
            let reply_task = tokio::spawn(async move { replies.generate_reply(&text).await });
            let result = match reply_task.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Reply source panicked for session {}: {}", reply_for, e);
                    Err(ReplyError::Transport("reply task failed".to_string()))
                }
            };
            store.complete_reply(&reply_for, result);
        });

        Ok(PendingReply { session_id, handle })
    }

    /// Fold a settled reply into its session, if it still exists
    fn complete_reply(&self, id: &SessionId, result: ReplyResult<String>) {
        let content = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Reply for session {} failed: {:?}", id, e);
                error_notice(&e)
            }
        };

        let mut state = self.state.lock();
        state.pending.remove(id);

        if let Some(session) = state.find_mut(id) {
            session.push(Message::assistant(content));
        } else {
            debug!("Session {} was deleted before its reply arrived", id);
            return;
        }
        self.persistence.save(&state.sessions);
    }

    /// All sessions, most recently created first
    pub fn sessions(&self) -> Vec<Session> {
        self.state.lock().sessions.clone()
    }

    /// Look up a session by id
    pub fn session(&self, id: &SessionId) -> Option<Session> {
        self.state.lock().find(id).cloned()
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.state.lock().active.clone()
    }

    /// The currently selected session, if any
    pub fn active_session(&self) -> Option<Session> {
        let state = self.state.lock();
        state.active.as_ref().and_then(|id| state.find(id)).cloned()
    }

    /// True while any reply is in flight
    pub fn is_loading(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    /// True while a reply for `id` is in flight
    pub fn is_pending(&self, id: &SessionId) -> bool {
        self.state.lock().pending.contains(id)
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.state.lock().sessions.iter().map(Session::summary).collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock();
        StoreSnapshot {
            sessions: state.sessions.clone(),
            active: state.active.clone(),
            loading: !state.pending.is_empty(),
        }
    }
}

/// Inline assistant text shown when a reply fails
fn error_notice(error: &ReplyError) -> String {
    let detail = error.to_string();
    if detail.trim().is_empty() {
        "Error: Something went wrong".to_string()
    } else {
        format!("Error: {}", detail)
    }
}

/// Handle to a reply requested by [`SessionStore::send_message`].
///
/// Dropping it leaves the reply running in the background.
#[derive(Debug)]
pub struct PendingReply {
    session_id: SessionId,
    handle: JoinHandle<()>,
}

impl PendingReply {
    /// Session the reply will be appended to
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Wait until the reply has been folded into the store
    pub async fn settled(self) {
        if let Err(e) = self.handle.await {
            error!("Reply task for session {} failed: {}", self.session_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::persistence::{
        KeyValueStore, MemoryKeyValueStore, SlotPersistence, CHATS_KEY,
    };
    use crate::session::store::PLACEHOLDER_TITLE;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    struct EchoReplies;

    #[async_trait]
    impl ReplySource for EchoReplies {
        async fn generate_reply(&self, text: &str) -> ReplyResult<String> {
            Ok(format!("echo: {}", text))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct FailingReplies(ReplyError);

    #[async_trait]
    impl ReplySource for FailingReplies {
        async fn generate_reply(&self, _text: &str) -> ReplyResult<String> {
            Err(self.0.clone())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct PanickingReplies;

    #[async_trait]
    impl ReplySource for PanickingReplies {
        async fn generate_reply(&self, _text: &str) -> ReplyResult<String> {
            panic!("reply source blew up");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    /// Holds each reply until a permit is released for it
    struct GatedReplies {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ReplySource for GatedReplies {
        async fn generate_reply(&self, text: &str) -> ReplyResult<String> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ReplyError::Transport(e.to_string()))?;
            permit.forget();
            Ok(format!("late: {}", text))
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn open_with(replies: Arc<dyn ReplySource>) -> (SessionStore, Arc<MemoryKeyValueStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let persistence = Arc::new(SlotPersistence::new(kv.clone(), CHATS_KEY));
        (SessionStore::open(persistence, replies), kv)
    }

    fn gated() -> (SessionStore, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let (store, _) = open_with(Arc::new(GatedReplies { gate: gate.clone() }));
        (store, gate)
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_routine_operations_are_quiet_at_info() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let (store, _) = open_with(Arc::new(EchoReplies));
            let id = store.create_session();
            store.delete_session(&id);
        });

        let captured = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        assert!(captured.is_empty(), "unexpected log output: {}", captured);
    }

    #[test]
    fn test_create_sessions_distinct_and_newest_first() {
        let (store, _) = open_with(Arc::new(EchoReplies));
        let created: Vec<SessionId> = (0..5).map(|_| store.create_session()).collect();

        let listed: Vec<SessionId> = store.sessions().into_iter().map(|s| s.id).collect();
        let expected: Vec<SessionId> = created.iter().rev().cloned().collect();
        assert_eq!(listed, expected);

        let unique: HashSet<&SessionId> = created.iter().collect();
        assert_eq!(unique.len(), 5);

        assert_eq!(store.active_id().as_ref(), created.last());
        assert_eq!(store.active_session().unwrap().title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_delete_active_clears_selection() {
        let (store, _) = open_with(Arc::new(EchoReplies));
        let first = store.create_session();
        let second = store.create_session();

        assert!(store.delete_session(&first));
        assert_eq!(store.active_id(), Some(second.clone()));

        assert!(store.delete_session(&second));
        assert!(store.active_session().is_none());
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, _) = open_with(Arc::new(EchoReplies));
        let id = store.create_session();
        assert!(store.delete_session(&id));
        assert!(!store.delete_session(&id));
        assert!(!store.delete_session(&SessionId::from("never-existed")));
    }

    #[test]
    fn test_select_session() {
        let (store, _) = open_with(Arc::new(EchoReplies));
        let first = store.create_session();
        let second = store.create_session();

        store.select_session(Some(&first)).unwrap();
        assert_eq!(store.active_id(), Some(first.clone()));

        let err = store
            .select_session(Some(&SessionId::from("missing")))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.active_id(), Some(first));

        store.select_session(None).unwrap();
        assert!(store.active_session().is_none());
        assert!(store.session(&second).is_some());
    }

    #[tokio::test]
    async fn test_panicking_source_settles_with_error_notice() {
        let (store, _) = open_with(Arc::new(PanickingReplies));

        let pending = store.send_message(None, "hello").unwrap();
        let id = pending.session_id().clone();
        pending.settled().await;

        assert!(!store.is_loading());
        assert!(!store.is_pending(&id));
        let session = store.session(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert!(!session.messages[1].is_user);
        assert_eq!(session.messages[1].content, "Error: reply task failed");

        // The session accepts further messages
        store.send_message(Some(&id), "again").unwrap().settled().await;
        assert_eq!(store.session(&id).unwrap().messages.len(), 4);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_send_without_runtime_leaves_state_untouched() {
        let (store, kv) = open_with(Arc::new(EchoReplies));
        let id = store.create_session();
        let saved = kv.get(CHATS_KEY).unwrap();

        let err = store.send_message(Some(&id), "hello").unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        let err = store.send_message(None, "hello").unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        assert_eq!(store.sessions().len(), 1);
        assert!(store.session(&id).unwrap().messages.is_empty());
        assert!(!store.is_loading());
        assert_eq!(kv.get(CHATS_KEY).unwrap(), saved);
    }

    #[tokio::test]
    async fn test_first_message_creates_session() {
        let (store, _) = open_with(Arc::new(EchoReplies));

        let pending = store.send_message(None, "hello").unwrap();
        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "hello");
        assert_eq!(sessions[0].messages.len(), 1);
        assert_eq!(sessions[0].messages[0].content, "hello");
        assert!(sessions[0].messages[0].is_user);
        assert_eq!(store.active_id().as_ref(), Some(pending.session_id()));

        pending.settled().await;
        let session = store.active_session().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "echo: hello");
        assert!(!session.messages[1].is_user);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_long_first_message_truncates_title() {
        let (store, _) = open_with(Arc::new(EchoReplies));
        let id = store.create_session();
        let text = "abcdefghij".repeat(6);
        assert_eq!(text.chars().count(), 60);

        store.send_message(Some(&id), &text).unwrap().settled().await;

        let session = store.session(&id).unwrap();
        assert_eq!(session.title, format!("{}...", &text[..50]));

        store
            .send_message(Some(&id), "second question")
            .unwrap()
            .settled()
            .await;
        assert_eq!(store.session(&id).unwrap().title, session.title);
    }

    #[tokio::test]
    async fn test_reply_failure_appends_inline_error() {
        let (store, _) = open_with(Arc::new(FailingReplies(ReplyError::Remote(
            "model offline".to_string(),
        ))));

        let pending = store.send_message(None, "Where is Nauru?").unwrap();
        let id = pending.session_id().clone();
        pending.settled().await;

        let session = store.session(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        let notice = &session.messages[1];
        assert!(!notice.is_user);
        assert!(notice.content.starts_with("Error:"));
        assert!(notice.content.contains("model offline"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_empty_transport_error_gets_generic_notice() {
        let (store, _) = open_with(Arc::new(FailingReplies(ReplyError::Transport(
            String::new(),
        ))));

        let pending = store.send_message(None, "hi").unwrap();
        let id = pending.session_id().clone();
        pending.settled().await;

        let session = store.session(&id).unwrap();
        assert_eq!(session.messages[1].content, "Error: Something went wrong");
    }

    #[tokio::test]
    async fn test_loading_flag_tracks_pending_reply() {
        let (store, gate) = gated();
        let pending = store.send_message(None, "Capital of Peru?").unwrap();
        let id = pending.session_id().clone();

        assert!(store.is_loading());
        assert!(store.is_pending(&id));
        assert!(store.snapshot().loading);

        gate.add_permits(1);
        pending.settled().await;

        assert!(!store.is_loading());
        assert!(!store.is_pending(&id));
        assert_eq!(store.session(&id).unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_deleted_session_is_not_resurrected() {
        let (store, gate) = gated();
        let pending = store.send_message(None, "Tell me about Bhutan").unwrap();
        let id = pending.session_id().clone();

        assert!(store.delete_session(&id));
        gate.add_permits(1);
        pending.settled().await;

        assert!(store.session(&id).is_none());
        assert!(store.sessions().is_empty());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_reply_follows_session_not_selection() {
        let (store, gate) = gated();
        let pending = store.send_message(None, "Question for A").unwrap();
        let a = pending.session_id().clone();

        let b = store.create_session();
        assert_eq!(store.active_id(), Some(b.clone()));

        gate.add_permits(1);
        pending.settled().await;

        assert_eq!(store.session(&a).unwrap().messages.len(), 2);
        assert!(store.session(&b).unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_second_send_while_pending_is_rejected() {
        let (store, gate) = gated();
        let pending = store.send_message(None, "first").unwrap();
        let id = pending.session_id().clone();

        let err = store.send_message(Some(&id), "second").unwrap_err();
        assert!(matches!(err, Error::ReplyPending(_)));
        assert_eq!(store.session(&id).unwrap().messages.len(), 1);

        // Other sessions are unaffected
        let other = store.create_session();
        let other_pending = store.send_message(Some(&other), "elsewhere").unwrap();

        gate.add_permits(2);
        pending.settled().await;
        other_pending.settled().await;
        assert_eq!(store.session(&other).unwrap().messages.len(), 2);

        gate.add_permits(1);
        store.send_message(Some(&id), "second").unwrap().settled().await;
        assert_eq!(store.session(&id).unwrap().messages.len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_sends() {
        let (store, _) = open_with(Arc::new(EchoReplies));

        let err = store.send_message(None, "   ").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.sessions().is_empty());

        let err = store
            .send_message(Some(&SessionId::from("ghost")), "hi")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(store.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_message_text_is_trimmed() {
        let (store, _) = open_with(Arc::new(EchoReplies));
        let pending = store.send_message(None, "  Andes  \n").unwrap();
        let id = pending.session_id().clone();
        pending.settled().await;

        let session = store.session(&id).unwrap();
        assert_eq!(session.title, "Andes");
        assert_eq!(session.messages[0].content, "Andes");
        assert_eq!(session.messages[1].content, "echo: Andes");
    }

    #[tokio::test]
    async fn test_mutations_write_through() {
        let (store, kv) = open_with(Arc::new(EchoReplies));
        let empty = store.create_session();
        store.send_message(None, "Deepest lake?").unwrap().settled().await;
        assert!(kv.get(CHATS_KEY).unwrap().is_some());

        let reopened = SessionStore::open(
            Arc::new(SlotPersistence::new(kv.clone(), CHATS_KEY)),
            Arc::new(EchoReplies),
        );
        let sessions = reopened.sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].messages.len(), 2);
        assert_eq!(sessions[1].id, empty);
        assert!(reopened.active_session().is_none());

        reopened.delete_session(&empty);
        let again = SessionStore::open(
            Arc::new(SlotPersistence::new(kv, CHATS_KEY)),
            Arc::new(EchoReplies),
        );
        assert_eq!(again.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_summaries_and_snapshot() {
        let (store, _) = open_with(Arc::new(EchoReplies));
        store.create_session();
        store.send_message(None, "Fjords").unwrap().settled().await;

        let summaries = store.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].title, "Fjords");
        assert_eq!(summaries[0].message_count, 2);
        assert_eq!(summaries[1].title, PLACEHOLDER_TITLE);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.sessions.len(), 2);
        assert_eq!(snapshot.active.as_ref(), Some(&summaries[0].id));
        assert!(!snapshot.loading);
    }
}
