use chat_api::headers::{
    build_headers, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_USER_AGENT,
};
use chat_api::{ChatApiConfig, ChatApiError};

#[test]
fn header_map_contains_auth_and_content_headers() {
    let config = ChatApiConfig::new("  anon-key ").insert_header("X-Client-Info", " web ");

    let headers = build_headers(&config, true).expect("header construction");
    assert_eq!(
        headers.get(HEADER_AUTHORIZATION).expect("authorization header"),
        "Bearer anon-key"
    );
    assert_eq!(
        headers.get(HEADER_CONTENT_TYPE).expect("content type"),
        "application/json"
    );
    assert_eq!(
        headers.get(HEADER_ACCEPT).expect("accept"),
        "text/event-stream"
    );
    assert_eq!(headers.get("x-client-info").expect("extra header"), "web");
    assert!(headers
        .get(HEADER_USER_AGENT)
        .expect("default user agent")
        .starts_with("study-chat/"));
}

#[test]
fn buffered_requests_accept_json() {
    let config = ChatApiConfig::new("key").with_user_agent("tutor-web/2.0");

    let headers = build_headers(&config, false).expect("header construction");
    assert_eq!(headers.get(HEADER_ACCEPT).expect("accept"), "application/json");
    assert_eq!(
        headers.get(HEADER_USER_AGENT).expect("user agent"),
        "tutor-web/2.0"
    );
}

#[test]
fn missing_api_key_is_rejected() {
    let error = build_headers(&ChatApiConfig::new("   "), true).expect_err("blank key must fail");
    assert!(matches!(error, ChatApiError::MissingApiKey));
}
