// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock backend adapter for deterministic testing.
//!
//! `MockBackend` implements `BackendAdapter` with pre-configured replies,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use costgate_core::traits::BackendAdapter;
use costgate_core::types::{BackendDescriptor, BackendResponse};
use costgate_core::CostgateError;

/// Token counts reported when a reply does not set its own.
pub const DEFAULT_INPUT_TOKENS: u32 = 100;
pub const DEFAULT_OUTPUT_TOKENS: u32 = 50;

#[derive(Debug, Clone)]
enum Reply {
    Ok(BackendResponse),
    Fail { status: u16, message: String },
}

/// A mock backend that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty, a default
/// "mock response" with 100 input and 50 output tokens is returned.
pub struct MockBackend {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
    /// `(backend_id, request_text)` per call, in call order.
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockBackend {
    /// Create a new mock backend with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock backend pre-loaded with the given response texts.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let replies = responses
            .into_iter()
            .map(|text| Reply::Ok(default_response(text)))
            .collect();
        Self {
            replies: Arc::new(Mutex::new(replies)),
            ..Self::new()
        }
    }

    /// Queue a response text with default token counts.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .await
            .push_back(Reply::Ok(default_response(text.into())));
    }

    /// Queue a response with explicit token counts.
    pub async fn add_response_with_usage(
        &self,
        text: impl Into<String>,
        input_tokens: u32,
        output_tokens: u32,
    ) {
        self.replies.lock().await.push_back(Reply::Ok(BackendResponse {
            text: text.into(),
            input_tokens,
            output_tokens,
        }));
    }

    /// Queue a backend failure.
    pub async fn add_failure(&self, status: u16, message: impl Into<String>) {
        self.replies.lock().await.push_back(Reply::Fail {
            status,
            message: message.into(),
        });
    }

    /// Delay every call by `delay` before replying.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    /// Number of calls started, including ones that later timed out.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Backend ids called, in call order.
    pub async fn called_backends(&self) -> Vec<String> {
        self.seen.lock().await.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Request texts received, in call order.
    pub async fn received_texts(&self) -> Vec<String> {
        self.seen.lock().await.iter().map(|(_, t)| t.clone()).collect()
    }

    async fn next_reply(&self) -> Reply {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Reply::Ok(default_response("mock response".to_string())))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn default_response(text: String) -> BackendResponse {
    BackendResponse {
        text,
        input_tokens: DEFAULT_INPUT_TOKENS,
        output_tokens: DEFAULT_OUTPUT_TOKENS,
    }
}

#[async_trait]
impl BackendAdapter for MockBackend {
    async fn call(
        &self,
        backend: &BackendDescriptor,
        request_text: &str,
        _max_output_tokens: u32,
    ) -> Result<BackendResponse, CostgateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .await
            .push((backend.id.clone(), request_text.to_string()));

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        match self.next_reply().await {
            Reply::Ok(response) => Ok(response),
            Reply::Fail { status, message } => Err(CostgateError::Backend { status, message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> BackendDescriptor {
        BackendDescriptor {
            id: "mock".into(),
            input_unit_cost: 0.001,
            output_unit_cost: 0.002,
            max_context_tokens: 8_000,
            compliance_eligible: false,
            capability_rank: 1,
        }
    }

    #[tokio::test]
    async fn returns_queued_then_default() {
        let backend = MockBackend::with_responses(vec!["first".into()]);
        let first = backend.call(&descriptor(), "q", 10).await.unwrap();
        assert_eq!(first.text, "first");
        let second = backend.call(&descriptor(), "q", 10).await.unwrap();
        assert_eq!(second.text, "mock response");
        assert_eq!(second.input_tokens, DEFAULT_INPUT_TOKENS);
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.called_backends().await, vec!["mock", "mock"]);
    }

    #[tokio::test]
    async fn queued_failure_is_a_backend_error() {
        let backend = MockBackend::new();
        backend.add_failure(503, "overloaded").await;
        let err = backend.call(&descriptor(), "q", 10).await.unwrap_err();
        assert!(matches!(err, CostgateError::Backend { status: 503, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied() {
        let backend = MockBackend::new();
        backend.set_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        backend.call(&descriptor(), "q", 10).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
