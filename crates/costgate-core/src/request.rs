// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The immutable per-call request object threaded through the pipeline.

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use crate::error::CostgateError;
use crate::traits::EmbeddingAdapter;
use crate::types::CacheKey;

/// A single inbound request.
///
/// Created once per pipeline call and discarded when the call returns. The
/// embedding is computed on first use and memoized, so the semantic cache
/// lookup and the later insert share one embedder call.
#[derive(Debug)]
pub struct Request {
    text: String,
    context: Option<String>,
    backend_class: Option<String>,
    cache_key: CacheKey,
    created_at: DateTime<Utc>,
    embedding: OnceCell<Vec<f32>>,
}

impl Request {
    /// Build a request, rejecting empty or oversized text.
    ///
    /// `max_chars` bounds the combined length of text and context.
    pub fn new(
        text: impl Into<String>,
        context: Option<String>,
        backend_class: Option<String>,
        created_at: DateTime<Utc>,
        max_chars: usize,
    ) -> Result<Self, CostgateError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CostgateError::Validation(
                "request text must not be empty".to_string(),
            ));
        }

        let context = context.filter(|c| !c.trim().is_empty());
        let total_chars =
            text.chars().count() + context.as_deref().map_or(0, |c| c.chars().count());
        if total_chars > max_chars {
            return Err(CostgateError::Validation(format!(
                "request is {total_chars} characters, limit is {max_chars}"
            )));
        }

        let backend_class = backend_class
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let cache_key = CacheKey::derive(&text, context.as_deref(), backend_class.as_deref());

        Ok(Self {
            text,
            context,
            backend_class,
            cache_key,
            created_at,
            embedding: OnceCell::new(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn backend_class(&self) -> Option<&str> {
        self.backend_class.as_deref()
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    /// When the request was accepted.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Return the request embedding, computing it with `embedder` on first call.
    ///
    /// A failed computation is not memoized; the next call retries.
    pub async fn embedding(&self, embedder: &dyn EmbeddingAdapter) -> Result<&[f32], CostgateError> {
        self.embedding
            .get_or_try_init(|| async { embedder.embed(&self.embedding_text()).await })
            .await
            .map(|v| v.as_slice())
    }

    /// Text fed to the embedder: the request plus any context.
    fn embedding_text(&self) -> String {
        match &self.context {
            Some(ctx) => format!("{}\n{}", self.text, ctx),
            None => self.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn empty_text_is_rejected() {
        let err = Request::new("   ", None, None, now(), 1000).unwrap_err();
        assert!(matches!(err, CostgateError::Validation(_)));
    }

    #[test]
    fn oversized_request_is_rejected() {
        let err = Request::new("abcdef", Some("ghij".into()), None, now(), 8).unwrap_err();
        assert!(err.to_string().contains("10 characters"));
    }

    #[test]
    fn same_content_yields_same_key() {
        let a = Request::new("explain lifetimes", None, None, now(), 1000).unwrap();
        let b = Request::new("explain lifetimes", Some("  ".into()), None, now(), 1000).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn context_and_class_change_the_key() {
        let base = Request::new("explain lifetimes", None, None, now(), 1000).unwrap();
        let ctx = Request::new("explain lifetimes", Some("fn f() {}".into()), None, now(), 1000)
            .unwrap();
        let class =
            Request::new("explain lifetimes", None, Some("eu-large".into()), now(), 1000).unwrap();
        assert_ne!(base.cache_key(), ctx.cache_key());
        assert_ne!(base.cache_key(), class.cache_key());
        assert_ne!(ctx.cache_key(), class.cache_key());
    }

    #[test]
    fn key_is_hex_sha256() {
        let r = Request::new("hello", None, None, now(), 1000).unwrap();
        assert_eq!(r.cache_key().as_str().len(), 64);
        assert!(r.cache_key().as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
