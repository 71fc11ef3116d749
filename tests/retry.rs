mod support;

use std::time::Duration;

use reqwest::StatusCode;
use snapshot_store::MemoryStore;
use study_chat::{ChatApiError, ChatError, ChatMessage, ErrorCategory, SessionEvent};
use support::{drain, network_error, seed, session, store_with, stored, Step};

fn assert_gap(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(100),
        "gap {actual:?} should be about {expected:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn network_failure_retries_with_backoff_then_rolls_back() {
    let store = MemoryStore::new();
    let (session, transport) = session(
        vec![
            Step::Fail(network_error()),
            Step::Fail(network_error()),
            Step::Fail(network_error()),
        ],
        &store,
    );
    let mut events = session.subscribe();

    let error = session.send("Hello").await.expect_err("send fails");

    assert_eq!(error.category(), ErrorCategory::Network);
    assert_eq!(transport.attempt_count(), 3);
    let gaps = transport.attempt_gaps();
    assert_eq!(gaps.len(), 2);
    assert_gap(gaps[0], 1000);
    assert_gap(gaps[1], 2000);

    assert_eq!(session.messages(), vec![seed()]);
    assert_eq!(
        session.error().as_deref(),
        Some("Network error. Please check your internet connection.")
    );
    assert!(!session.is_loading());
    assert!(!session.is_typing());
    assert_eq!(stored(&store), None);

    let events = drain(&mut events);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Failed {
            error: ChatError::Network { .. },
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn rollback_resyncs_storage_to_prior_history() {
    let history = vec![
        seed(),
        ChatMessage::user("What is osmosis?"),
        ChatMessage::assistant("Water moving across a membrane."),
    ];
    let store = store_with(&history);
    let (session, _transport) = session(
        vec![
            Step::Fail(network_error()),
            Step::Fail(network_error()),
            Step::Fail(network_error()),
        ],
        &store,
    );
    assert_eq!(session.messages(), history);

    session.send("And diffusion?").await.expect_err("send fails");

    assert_eq!(session.messages(), history);
    assert_eq!(stored(&store), Some(history));
}

#[tokio::test(start_paused = true)]
async fn upstream_error_is_retried_and_reported() {
    let upstream = || ChatApiError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "API Error".to_string(),
    };
    let store = MemoryStore::new();
    let (session, transport) = session(
        vec![
            Step::Fail(upstream()),
            Step::Fail(upstream()),
            Step::Fail(upstream()),
        ],
        &store,
    );

    let error = session.send("Hello").await.expect_err("send fails");

    assert_eq!(error.category(), ErrorCategory::Upstream);
    assert_eq!(transport.attempt_count(), 3);
    assert_eq!(
        session.error().as_deref(),
        Some("The chat service returned an error: API Error")
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limited_send_fails_without_retry() {
    let store = MemoryStore::new();
    let (session, transport) = session(
        vec![Step::Fail(ChatApiError::RateLimited { wait_secs: 30 })],
        &store,
    );

    let error = session.send("Hello").await.expect_err("send fails");

    assert_eq!(error, ChatError::RateLimited { wait_secs: 30 });
    assert_eq!(transport.attempt_count(), 1);
    assert_eq!(
        session.error().as_deref(),
        Some("Please wait 30 seconds before sending another message.")
    );
    assert_eq!(session.messages(), vec![seed()]);
}

#[tokio::test(start_paused = true)]
async fn retry_discards_partial_output_of_failed_attempt() {
    let store = MemoryStore::new();
    let (session, transport) = session(
        vec![
            Step::StreamThenFail(vec!["Photosyn"], network_error()),
            Step::Stream(vec!["Photosynthesis ", "makes sugar."]),
        ],
        &store,
    );

    session.send("Explain photosynthesis").await.expect("retry succeeds");

    let request = vec![seed(), ChatMessage::user("Explain photosynthesis")];
    assert_eq!(transport.requests(), vec![request.clone(), request.clone()]);
    assert_gap(transport.attempt_gaps()[0], 1000);

    let mut expected = request;
    expected.push(ChatMessage::assistant("Photosynthesis makes sugar."));
    assert_eq!(session.messages(), expected);
    assert_eq!(stored(&store), Some(expected));
    assert!(session.error().is_none());
}

#[tokio::test(start_paused = true)]
async fn decode_failures_are_not_retried() {
    let decode = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
    let store = MemoryStore::new();
    let (session, transport) = session(vec![Step::Fail(ChatApiError::Decode(decode))], &store);

    let error = session.send("Hello").await.expect_err("send fails");

    assert_eq!(error.category(), ErrorCategory::Unknown);
    assert_eq!(transport.attempt_count(), 1);
    assert_eq!(session.messages(), vec![seed()]);
}
