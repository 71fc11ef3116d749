use async_trait::async_trait;

use crate::cancel::CancellationSignal;
use crate::error::ChatApiError;
use crate::events::Completion;
use crate::message::ChatMessage;

/// Chat-completion transport consumed by conversation controllers.
///
/// `messages` must be non-empty and end with the turn to answer. Implementations
/// consult their request budget before any network call.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One buffered request resolving to the full reply.
    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Completion, ChatApiError>;

    /// One streamed request; `on_fragment` receives text deltas in arrival order and
    /// is never invoked after `cancellation` is raised.
    async fn complete_streamed(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
        on_fragment: &mut (dyn for<'f> FnMut(&'f str) + Send),
    ) -> Result<(), ChatApiError>;
}
