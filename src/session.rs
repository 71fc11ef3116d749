//! Conversation controller driving the tutor chat.
//!
//! One [`ChatSession`] owns the message log and runs at most one send cycle at a
//! time. A cycle appends the user turn, delivers it through a [`ChatTransport`]
//! with retry and backoff, grows a single assistant entry from streamed
//! fragments, and persists every log change to the snapshot store.
//!
//! Callbacks and completions from a cycle that was replaced or cleared are
//! ignored, so a late transport never edits the log of a newer cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chat_api::cancel::{self, await_or_cancel, is_cancelled, CancellationSignal};
use chat_api::retry::is_retryable;
use chat_api::{ChatApiClient, ChatApiError, ChatMessage, ChatTransport, Role};
use snapshot_store::{read_snapshot, remove_snapshot, write_snapshot, SnapshotStore};
use tokio::sync::broadcast;

use crate::config::{EnvConfig, SessionConfig};
use crate::error::ChatError;

/// Identifier of one send cycle within a session.
pub type CycleId = u64;

const EVENT_CAPACITY: usize = 256;

/// How a cycle asks the transport for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Incremental fragments grow the assistant entry as they arrive.
    #[default]
    Streaming,
    /// One buffered reply appended at once.
    Buffered,
}

/// Lifecycle notification for UI layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { cycle_id: CycleId },
    /// `content` is the full accumulated assistant text, not the delta.
    Fragment { cycle_id: CycleId, content: String },
    Completed { cycle_id: CycleId },
    Failed { cycle_id: CycleId, error: ChatError },
    Cancelled { cycle_id: CycleId },
    Cleared,
}

struct ActiveCycle {
    cycle_id: CycleId,
    cancel: CancellationSignal,
}

#[derive(Default)]
struct SessionState {
    messages: Vec<ChatMessage>,
    loading: bool,
    is_typing: bool,
    error: Option<String>,
    active: Option<ActiveCycle>,
}

impl SessionState {
    fn is_current(&self, cycle_id: CycleId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.cycle_id == cycle_id)
    }
}

/// Per-cycle context captured when a send is accepted.
struct Cycle {
    id: CycleId,
    cancel: CancellationSignal,
    /// Log before the user turn was appended; restored on failure.
    pre_send: Vec<ChatMessage>,
    /// Log sent to the transport; every attempt restarts from it.
    request: Vec<ChatMessage>,
}

pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn SnapshotStore>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    next_cycle_id: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatSession {
    /// Creates a session, restoring the persisted log when it is readable.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn SnapshotStore>,
        config: SessionConfig,
    ) -> Self {
        let messages = initial_messages(store.as_ref(), &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            transport,
            store,
            config,
            state: Mutex::new(SessionState {
                messages,
                ..SessionState::default()
            }),
            next_cycle_id: AtomicU64::new(1),
            events,
        }
    }

    /// Wires an HTTP client and file store from `STUDY_CHAT_*` variables.
    pub fn from_env() -> Result<Self, ChatError> {
        let env = EnvConfig::from_env();
        let client = ChatApiClient::new(env.api_config())?;
        Ok(Self::new(
            Arc::new(client),
            Arc::new(env.snapshot_store()),
            SessionConfig::default(),
        ))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock_state().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().loading
    }

    /// True from acceptance until the first reply text arrives.
    pub fn is_typing(&self) -> bool {
        self.lock_state().is_typing
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Sends `text` with the configured default delivery mode.
    pub async fn send(&self, text: &str) -> Result<(), ChatError> {
        self.send_with(text, self.config.default_mode).await
    }

    /// Runs one send cycle.
    ///
    /// Blank input and input received while a cycle is loading are ignored and
    /// return `Ok(())` without touching the log.
    pub async fn send_with(&self, text: &str, mode: DeliveryMode) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let Some(cycle) = self.begin_cycle(text) else {
            tracing::debug!("send ignored while a request is loading");
            return Ok(());
        };

        let result = self.deliver(&cycle, mode).await;
        self.finish_cycle(&cycle, result)
    }

    /// Aborts the in-flight request; partial assistant text stays in the log.
    pub fn cancel_request(&self) {
        let mut state = self.lock_state();
        let Some((cycle_id, signal)) = state
            .active
            .as_ref()
            .map(|active| (active.cycle_id, Arc::clone(&active.cancel)))
        else {
            return;
        };

        cancel::cancel(&signal);
        state.loading = false;
        state.is_typing = false;
        tracing::info!(cycle_id, "request cancelled by caller");
    }

    /// Resets the log to the seed entry and drops the persisted snapshot.
    pub fn clear_messages(&self) {
        let mut state = self.lock_state();
        if let Some(active) = state.active.take() {
            cancel::cancel(&active.cancel);
        }

        state.messages = vec![self.seed_message()];
        state.error = None;
        state.loading = false;
        state.is_typing = false;

        if let Err(error) = remove_snapshot(self.store.as_ref(), &self.config.storage_key) {
            tracing::warn!(%error, "failed to remove conversation snapshot");
        }
        drop(state);
        self.emit(SessionEvent::Cleared);
    }

    fn begin_cycle(&self, text: &str) -> Option<Cycle> {
        let mut state = self.lock_state();
        if state.loading {
            return None;
        }

        if let Some(previous) = state.active.take() {
            cancel::cancel(&previous.cancel);
            tracing::debug!(cycle_id = previous.cycle_id, "superseding previous request");
        }

        let id = self.next_cycle_id.fetch_add(1, Ordering::SeqCst);
        let signal = cancel::new_signal();

        state.error = None;
        state.loading = true;
        state.is_typing = true;
        let pre_send = state.messages.clone();
        state.messages.push(ChatMessage::user(text));
        let request = state.messages.clone();
        state.active = Some(ActiveCycle {
            cycle_id: id,
            cancel: Arc::clone(&signal),
        });
        self.persist(&state.messages);
        drop(state);

        self.emit(SessionEvent::Started { cycle_id: id });
        Some(Cycle {
            id,
            cancel: signal,
            pre_send,
            request,
        })
    }

    async fn deliver(&self, cycle: &Cycle, mode: DeliveryMode) -> Result<(), ChatApiError> {
        let policy = self.config.retry;
        let mut attempt = 1;

        loop {
            tracing::debug!(cycle_id = cycle.id, attempt, ?mode, "delivering message");
            let result = match mode {
                DeliveryMode::Streaming => self.attempt_streamed(cycle).await,
                DeliveryMode::Buffered => self.attempt_buffered(cycle).await,
            };

            if is_cancelled(Some(&cycle.cancel)) {
                return Err(ChatApiError::Cancelled);
            }

            let error = match result {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };

            if !is_retryable(&error) || !policy.has_attempts_after(attempt) {
                return Err(error);
            }

            let delay = policy.delay_for(attempt - 1);
            tracing::warn!(
                cycle_id = cycle.id,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                %error,
                "chat attempt failed, retrying"
            );
            self.reset_attempt(cycle);
            await_or_cancel(tokio::time::sleep(delay), Some(&cycle.cancel)).await?;
            attempt += 1;
        }
    }

    async fn attempt_streamed(&self, cycle: &Cycle) -> Result<(), ChatApiError> {
        let mut content = String::new();
        let mut on_fragment = |fragment: &str| {
            content.push_str(fragment);
            self.apply_fragment(cycle, &content);
        };

        self.transport
            .complete_streamed(&cycle.request, Some(&cycle.cancel), &mut on_fragment)
            .await
    }

    async fn attempt_buffered(&self, cycle: &Cycle) -> Result<(), ChatApiError> {
        let completion = self
            .transport
            .complete_once(&cycle.request, Some(&cycle.cancel))
            .await?;

        let mut state = self.lock_state();
        if is_cancelled(Some(&cycle.cancel)) || !state.is_current(cycle.id) {
            return Err(ChatApiError::Cancelled);
        }

        tracing::debug!(cycle_id = cycle.id, tokens = completion.token_count, "reply received");
        state.messages.push(ChatMessage::assistant(completion.text));
        state.is_typing = false;
        self.persist(&state.messages);
        Ok(())
    }

    /// Replace the growing assistant entry with the accumulated `content`.
    fn apply_fragment(&self, cycle: &Cycle, content: &str) {
        let mut state = self.lock_state();
        // Checked under the lock so nothing lands after `cancel_request` returns.
        if is_cancelled(Some(&cycle.cancel)) || !state.is_current(cycle.id) {
            return;
        }

        let assistant = ChatMessage::assistant(content);
        if state.messages.len() == cycle.request.len() {
            state.messages.push(assistant);
            state.is_typing = false;
        } else if let Some(last) = state.messages.last_mut() {
            *last = assistant;
        }
        self.persist(&state.messages);
        drop(state);

        self.emit(SessionEvent::Fragment {
            cycle_id: cycle.id,
            content: content.to_owned(),
        });
    }

    /// Drop partial output of a failed attempt before retrying.
    fn reset_attempt(&self, cycle: &Cycle) {
        let mut state = self.lock_state();
        if !state.is_current(cycle.id) || state.messages.len() <= cycle.request.len() {
            return;
        }

        state.messages.truncate(cycle.request.len());
        state.is_typing = true;
        self.persist(&state.messages);
    }

    fn finish_cycle(
        &self,
        cycle: &Cycle,
        result: Result<(), ChatApiError>,
    ) -> Result<(), ChatError> {
        let result = result.map_err(ChatError::from);
        let mut state = self.lock_state();
        if !state.is_current(cycle.id) {
            tracing::debug!(cycle_id = cycle.id, "ignoring outcome of superseded request");
            return result;
        }

        state.active = None;
        state.loading = false;
        state.is_typing = false;

        let event = match &result {
            Ok(()) => {
                tracing::info!(cycle_id = cycle.id, messages = state.messages.len(), "reply complete");
                SessionEvent::Completed { cycle_id: cycle.id }
            }
            Err(ChatError::Cancelled) => {
                state.error = Some(ChatError::Cancelled.to_string());
                SessionEvent::Cancelled { cycle_id: cycle.id }
            }
            Err(error) => {
                tracing::warn!(cycle_id = cycle.id, %error, category = ?error.category(), "chat request failed");
                state.messages = cycle.pre_send.clone();
                self.sync_snapshot(&state.messages);
                state.error = Some(error.to_string());
                SessionEvent::Failed {
                    cycle_id: cycle.id,
                    error: error.clone(),
                }
            }
        };
        drop(state);

        self.emit(event);
        result
    }

    /// Write the log when it holds more than the seed entry.
    fn persist(&self, messages: &[ChatMessage]) {
        if messages.len() <= 1 {
            return;
        }
        if let Err(error) = write_snapshot(self.store.as_ref(), &self.config.storage_key, messages)
        {
            tracing::warn!(%error, "failed to persist conversation snapshot");
        }
    }

    /// Make storage match a rolled-back log, including one reduced to the seed entry.
    fn sync_snapshot(&self, messages: &[ChatMessage]) {
        if messages.len() > 1 {
            self.persist(messages);
        } else if let Err(error) = remove_snapshot(self.store.as_ref(), &self.config.storage_key) {
            tracing::warn!(%error, "failed to remove conversation snapshot");
        }
    }

    fn seed_message(&self) -> ChatMessage {
        ChatMessage::system(self.config.system_prompt.clone())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn initial_messages(store: &dyn SnapshotStore, config: &SessionConfig) -> Vec<ChatMessage> {
    let seed = || vec![ChatMessage::system(config.system_prompt.clone())];

    match read_snapshot(store, &config.storage_key) {
        Ok(Some(messages)) if messages.first().is_some_and(|first| first.role == Role::System) => {
            messages
        }
        Ok(Some(_)) => {
            tracing::warn!("snapshot lacks a leading system entry, starting fresh");
            seed()
        }
        Ok(None) => seed(),
        Err(error) => {
            tracing::warn!(%error, "discarding unreadable conversation snapshot");
            seed()
        }
    }
}
