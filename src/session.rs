use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::constants::SYSTEM_PROMPT;
use crate::conversation::{ConversationStore, Turn};
use crate::error::SubmitError;
use crate::sanitizer::sanitize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    AwaitingResponse,
}

/// What a page render needs from a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub turns: Vec<Turn>,
    pub awaiting_response: bool,
    pub last_error: Option<String>,
    pub notice: Option<String>,
}

struct SessionInner {
    store: ConversationStore,
    state: SubmissionState,
    last_error: Option<String>,
    notice: Option<String>,
}

/// One browser (or terminal) conversation: its history plus the
/// submission state machine guarding it.
///
/// The lock is never held across the provider call, so a second submission
/// made while a reply is pending sees `AwaitingResponse` and is refused
/// instead of queued.
pub struct ChatSession {
    inner: Mutex<SessionInner>,
    client: Arc<dyn CompletionClient>,
}

impl ChatSession {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                store: ConversationStore::new(),
                state: SubmissionState::Idle,
                last_error: None,
                notice: None,
            }),
            client,
        }
    }

    /// Run one user turn. Returns the stored assistant turn on success.
    ///
    /// On a provider failure the user turn stays in the history, no
    /// assistant turn is added and the error is remembered for display.
    pub async fn submit(&self, input: &str) -> Result<Turn, SubmitError> {
        let message = input.trim();
        if message.is_empty() {
            return Err(SubmitError::EmptyInput);
        }

        let request = {
            let mut inner = self.inner.lock().await;
            if inner.state == SubmissionState::AwaitingResponse {
                warn!("Rejecting submission while a response is pending");
                return Err(SubmitError::Busy);
            }
            inner.store.append(Turn::user(message));
            inner.state = SubmissionState::AwaitingResponse;
            inner.last_error = None;
            CompletionRequest::new(SYSTEM_PROMPT, inner.store.snapshot())
        };

        debug!(turns = request.messages.len(), "Submitting conversation");
        let outcome = self.client.complete(&request).await;

        let mut inner = self.inner.lock().await;
        inner.state = SubmissionState::Idle;
        match outcome {
            Ok(raw) => {
                let turn = Turn::assistant(sanitize(&raw));
                inner.store.append(turn.clone());
                Ok(turn)
            }
            Err(e) => {
                warn!(kind = ?e.kind, "Completion failed: {}", e.message);
                inner.last_error = Some(e.to_string());
                Err(SubmitError::Completion(e))
            }
        }
    }

    /// Drop the whole history. Refused while a reply is pending so the
    /// reply cannot land in a fresh conversation.
    pub async fn reset(&self) -> Result<(), SubmitError> {
        let mut inner = self.inner.lock().await;
        if inner.state == SubmissionState::AwaitingResponse {
            return Err(SubmitError::Busy);
        }
        inner.store.reset();
        inner.last_error = None;
        inner.notice = None;
        Ok(())
    }

    /// Leave a one-shot message for the next page render.
    pub async fn set_notice(&self, notice: impl Into<String>) {
        self.inner.lock().await.notice = Some(notice.into());
    }

    pub async fn take_notice(&self) -> Option<String> {
        self.inner.lock().await.notice.take()
    }

    pub async fn snapshot(&self) -> Vec<Turn> {
        self.inner.lock().await.store.snapshot()
    }

    pub async fn state(&self) -> SubmissionState {
        self.inner.lock().await.state
    }

    pub async fn view(&self) -> SessionView {
        let inner = self.inner.lock().await;
        SessionView {
            turns: inner.store.snapshot(),
            awaiting_response: inner.state == SubmissionState::AwaitingResponse,
            last_error: inner.last_error.clone(),
            notice: inner.notice.clone(),
        }
    }
}

struct SessionEntry {
    session: Arc<ChatSession>,
    last_seen: Instant,
}

/// All live sessions of the web front-end, keyed by cookie id.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    client: Arc<dyn CompletionClient>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(client: Arc<dyn CompletionClient>, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            client,
            idle_ttl,
        }
    }

    /// Look up a live session without creating one.
    pub async fn get(&self, id: Option<Uuid>) -> Option<Arc<ChatSession>> {
        let id = id?;
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions, now);

        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    fn prune(&self, sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant) {
        let before = sessions.len();
        let ttl = self.idle_ttl;
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
        if sessions.len() < before {
            info!(expired = before - sessions.len(), "Dropped idle sessions");
        }
    }

    /// Look up the session for `id`, or start a new one if the id is
    /// missing, unknown or expired. The returned flag is `true` for a new
    /// session.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, Arc<ChatSession>, bool) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.prune(&mut sessions, now);

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = now;
                return (id, entry.session.clone(), false);
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(ChatSession::new(self.client.clone()));
        sessions.insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_seen: now,
            },
        );
        info!(session = %id, "Started new chat session");
        (id, session, true)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
