use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ChatApiError;

/// Cancellation signal shared between the owner of a request and its read loop.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub fn new_signal() -> CancellationSignal {
    Arc::new(AtomicBool::new(false))
}

pub fn cancel(signal: &CancellationSignal) {
    signal.store(true, Ordering::Release);
}

pub fn is_cancelled(signal: Option<&CancellationSignal>) -> bool {
    signal.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Drive `future` to completion unless `cancellation` is raised first.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
