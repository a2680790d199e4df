// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miss coalescing.
//!
//! Concurrent misses for one cache key share a single backend call. The
//! first caller becomes the leader; later callers subscribe to the leader's
//! result. A leader that fails or is dropped closes the channel and its
//! followers retry on their own.

use std::sync::Arc;

use costgate_core::CacheKey;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

/// A leader's response, handed to every follower.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedResponse {
    pub text: String,
    pub backend_id: String,
}

/// In-flight backend calls keyed by cache key.
#[derive(Debug, Default)]
pub struct Coalescer {
    inflight: DashMap<CacheKey, broadcast::Sender<Arc<SharedResponse>>>,
}

/// What a caller should do after joining.
pub enum Role<'a> {
    /// Make the backend call and publish the result.
    Leader(LeaderGuard<'a>),
    /// Wait for the leader's result.
    Follower(broadcast::Receiver<Arc<SharedResponse>>),
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight call for `key`, or start one.
    pub fn join(&self, key: &CacheKey) -> Role<'_> {
        match self.inflight.entry(key.clone()) {
            // Subscribing under the shard lock means the leader cannot
            // remove-and-send in between.
            Entry::Occupied(existing) => Role::Follower(existing.get().subscribe()),
            Entry::Vacant(slot) => {
                let (tx, _) = broadcast::channel(1);
                slot.insert(tx);
                Role::Leader(LeaderGuard {
                    coalescer: self,
                    key: key.clone(),
                    published: false,
                })
            }
        }
    }

    /// Number of keys with a call in flight.
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }
}

/// Held by the leader for the duration of its backend call.
///
/// Dropping it without publishing releases the key and wakes followers with
/// a closed channel.
pub struct LeaderGuard<'a> {
    coalescer: &'a Coalescer,
    key: CacheKey,
    published: bool,
}

impl LeaderGuard<'_> {
    /// Hand `response` to every follower and release the key.
    pub fn publish(mut self, response: SharedResponse) {
        self.published = true;
        if let Some((_, tx)) = self.coalescer.inflight.remove(&self.key) {
            // No followers is fine.
            let _ = tx.send(Arc::new(response));
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.coalescer.inflight.remove(&self.key);
        }
    }
}
