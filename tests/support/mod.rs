#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chat_api::cancel::{is_cancelled, CancellationSignal};
use chat_api::events::Completion;
use snapshot_store::{read_snapshot, MemoryStore, SnapshotStore, DEFAULT_SNAPSHOT_KEY};
use study_chat::{
    ChatApiError, ChatMessage, ChatSession, ChatTransport, SessionConfig, SessionEvent,
};
use tokio::sync::broadcast;
use tokio::time::Instant;

pub const SYSTEM_PROMPT: &str = "System message";

/// Scripted outcome of one transport call.
pub enum Step {
    Stream(Vec<&'static str>),
    StreamThenFail(Vec<&'static str>, ChatApiError),
    Reply(&'static str),
    Fail(ChatApiError),
    /// Emits `before`, waits for cancellation, then emits `after` anyway.
    HoldUntilCancelled {
        before: Vec<&'static str>,
        after: Vec<&'static str>,
    },
}

pub struct Attempt {
    pub at: Instant,
    pub messages: Vec<ChatMessage>,
}

#[derive(Default)]
struct Trace {
    steps: VecDeque<Step>,
    attempts: Vec<Attempt>,
    snapshots: Vec<Option<Vec<ChatMessage>>>,
}

pub struct ScriptedTransport {
    trace: Mutex<Trace>,
    observed: Option<MemoryStore>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            trace: Mutex::new(Trace {
                steps: steps.into(),
                ..Trace::default()
            }),
            observed: None,
        }
    }

    /// Records the persisted conversation after every delivered fragment.
    pub fn observing(steps: Vec<Step>, store: MemoryStore) -> Self {
        Self {
            observed: Some(store),
            ..Self::new(steps)
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.lock().attempts.len()
    }

    pub fn attempt_gaps(&self) -> Vec<Duration> {
        let trace = self.lock();
        trace
            .attempts
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.lock()
            .attempts
            .iter()
            .map(|attempt| attempt.messages.clone())
            .collect()
    }

    pub fn snapshots(&self) -> Vec<Option<Vec<ChatMessage>>> {
        self.lock().snapshots.clone()
    }

    fn begin(&self, messages: &[ChatMessage]) -> Option<Step> {
        let mut trace = self.lock();
        trace.attempts.push(Attempt {
            at: Instant::now(),
            messages: messages.to_vec(),
        });
        trace.steps.pop_front()
    }

    fn emit(&self, on_fragment: &mut (dyn for<'f> FnMut(&'f str) + Send), fragments: &[&str]) {
        for fragment in fragments {
            on_fragment(fragment);
            if let Some(store) = &self.observed {
                let snapshot = read_snapshot(store, DEFAULT_SNAPSHOT_KEY).expect("snapshot readable");
                self.lock().snapshots.push(snapshot);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Trace> {
        self.trace
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

async fn wait_for_cancel(cancellation: Option<&CancellationSignal>) {
    while !is_cancelled(cancellation) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Completion, ChatApiError> {
        let text = match self.begin(messages) {
            Some(Step::Reply(text)) => text.to_string(),
            Some(Step::Stream(fragments)) => fragments.concat(),
            Some(Step::StreamThenFail(_, error)) | Some(Step::Fail(error)) => return Err(error),
            Some(Step::HoldUntilCancelled { .. }) => {
                wait_for_cancel(cancellation).await;
                return Err(ChatApiError::Cancelled);
            }
            None => return Err(ChatApiError::Network("script exhausted".to_string())),
        };

        Ok(Completion {
            token_count: text.split_whitespace().count() as u64,
            text,
        })
    }

    async fn complete_streamed(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
        on_fragment: &mut (dyn for<'f> FnMut(&'f str) + Send),
    ) -> Result<(), ChatApiError> {
        match self.begin(messages) {
            Some(Step::Stream(fragments)) => {
                self.emit(on_fragment, &fragments);
                Ok(())
            }
            Some(Step::StreamThenFail(fragments, error)) => {
                self.emit(on_fragment, &fragments);
                Err(error)
            }
            Some(Step::Reply(text)) => {
                self.emit(on_fragment, &[text]);
                Ok(())
            }
            Some(Step::Fail(error)) => Err(error),
            Some(Step::HoldUntilCancelled { before, after }) => {
                self.emit(on_fragment, &before);
                wait_for_cancel(cancellation).await;
                self.emit(on_fragment, &after);
                Err(ChatApiError::Cancelled)
            }
            None => Err(ChatApiError::Network("script exhausted".to_string())),
        }
    }
}

pub fn config() -> SessionConfig {
    SessionConfig::default().with_system_prompt(SYSTEM_PROMPT)
}

pub fn session(steps: Vec<Step>, store: &MemoryStore) -> (Arc<ChatSession>, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::observing(steps, store.clone()));
    let session = ChatSession::new(transport.clone(), Arc::new(store.clone()), config());
    (Arc::new(session), transport)
}

pub fn stored(store: &MemoryStore) -> Option<Vec<ChatMessage>> {
    read_snapshot(store, DEFAULT_SNAPSHOT_KEY).expect("snapshot readable")
}

pub fn seed() -> ChatMessage {
    ChatMessage::system(SYSTEM_PROMPT)
}

pub fn network_error() -> ChatApiError {
    ChatApiError::Network("connection refused".to_string())
}

pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Waits for the next fragment event and returns its accumulated content.
pub async fn next_fragment(events: &mut broadcast::Receiver<SessionEvent>) -> String {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Fragment { content, .. }) => return content,
                Ok(_) => continue,
                Err(error) => panic!("event stream closed: {error}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("fragment event within five seconds")
}

pub fn store_with(messages: &[ChatMessage]) -> MemoryStore {
    let store = MemoryStore::new();
    let raw = serde_json::to_string(messages).expect("serialize");
    store.set(DEFAULT_SNAPSHOT_KEY, &raw).expect("seed store");
    store
}
