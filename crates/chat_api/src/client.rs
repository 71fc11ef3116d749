use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::cancel::{await_or_cancel, is_cancelled, CancellationSignal};
use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::events::{Completion, StreamEvent};
use crate::headers::build_headers;
use crate::message::ChatMessage;
use crate::payload::{ChatRequest, CompletionBody};
use crate::rate_limit::RateLimiter;
use crate::sse::SseLineParser;
use crate::transport::ChatTransport;
use crate::url::normalize_chat_url;

/// HTTP client for the chat-completion endpoint.
///
/// Clones share the underlying connection pool and the rate-limit window.
#[derive(Debug, Clone)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
    limiter: RateLimiter,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::Client)?;
        let limiter = RateLimiter::new(config.rate_limit);
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    /// Replace the request budget, e.g. to share one window between clients.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_chat_url(&self.config.base_url)
    }

    pub fn build_headers(&self, stream: bool) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config, stream)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ChatApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ChatApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn chat_request(&self, messages: &[ChatMessage], stream: bool) -> ChatRequest {
        ChatRequest::new(self.config.model.clone(), messages.to_vec())
            .streaming(stream)
            .with_conversation_id(self.config.conversation_id.clone())
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        if request.messages.is_empty() {
            return Err(ChatApiError::EmptyConversation);
        }

        let headers = self.build_headers(request.stream)?;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(request))
    }

    /// Admit one dispatch through the request budget and send it.
    async fn dispatch(
        &self,
        messages: &[ChatMessage],
        stream: bool,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        let request = self.build_request(&self.chat_request(messages, stream))?;

        if let Err(exceeded) = self.limiter.try_acquire() {
            tracing::debug!(wait_secs = exceeded.wait_secs(), "request budget exhausted");
            return Err(ChatApiError::RateLimited {
                wait_secs: exceeded.wait_secs(),
            });
        }

        tracing::debug!(
            messages = messages.len(),
            stream,
            model = %self.config.model,
            "dispatching chat completion"
        );

        let response = await_or_cancel(request.send(), cancellation)
            .await?
            .map_err(ChatApiError::from)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        let message = parse_error_message(status, &body);
        tracing::debug!(%status, %message, "chat completion rejected");
        Err(ChatApiError::Status { status, message })
    }

    pub async fn complete_once(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Completion, ChatApiError> {
        let response = self.dispatch(messages, false, cancellation).await?;
        let bytes = await_or_cancel(response.bytes(), cancellation)
            .await?
            .map_err(ChatApiError::from)?;
        let body = serde_json::from_slice::<CompletionBody>(&bytes)?;

        Ok(Completion {
            text: body.message,
            token_count: body.tokens,
        })
    }

    pub async fn stream_with_handler<F>(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
        mut on_fragment: F,
    ) -> Result<(), ChatApiError>
    where
        F: FnMut(&str) + Send,
    {
        let response = self.dispatch(messages, true, cancellation).await?;
        let mut body = response.bytes_stream();
        let mut parser = SseLineParser::default();

        loop {
            let Some(chunk) = await_or_cancel(body.next(), cancellation).await? else {
                break;
            };
            let chunk = chunk.map_err(ChatApiError::from)?;
            if deliver_events(parser.feed(&chunk), cancellation, &mut on_fragment)? {
                break;
            }
        }

        if !parser.is_done() {
            deliver_events(parser.finish(), cancellation, &mut on_fragment)?;
        }

        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        Ok(())
    }
}

#[async_trait]
impl ChatTransport for ChatApiClient {
    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Completion, ChatApiError> {
        ChatApiClient::complete_once(self, messages, cancellation).await
    }

    async fn complete_streamed(
        &self,
        messages: &[ChatMessage],
        cancellation: Option<&CancellationSignal>,
        on_fragment: &mut (dyn for<'f> FnMut(&'f str) + Send),
    ) -> Result<(), ChatApiError> {
        self.stream_with_handler(messages, cancellation, on_fragment)
            .await
    }
}

/// Returns true once the terminal marker was delivered.
fn deliver_events<F>(
    events: Vec<StreamEvent>,
    cancellation: Option<&CancellationSignal>,
    on_fragment: &mut F,
) -> Result<bool, ChatApiError>
where
    F: FnMut(&str),
{
    for event in events {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        match event {
            StreamEvent::Fragment { text } => on_fragment(&text),
            StreamEvent::Done => return Ok(true),
        }
    }

    Ok(false)
}
