//! Authentication vector cache
//!
//! Answers are cached per user name after a successful exchange. Entries
//! expire after the configured TTL and the oldest entry is evicted when the
//! cache is full. Lookups never mutate the cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::types::{AuthenticationAnswer, AuthenticationRequest};

#[derive(Debug, Clone)]
struct CacheEntry {
    answer: AuthenticationAnswer,
    inserted: Instant,
}

/// Per-user cache of authentication answers
#[derive(Debug)]
pub struct VectorCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    /// 0 means unbounded
    capacity: usize,
}

impl VectorCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.capacity)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.inserted.elapsed() >= self.ttl
    }

    /// Cached answer for `user_name`, if present and not expired
    pub fn get(&self, user_name: &str) -> Option<AuthenticationAnswer> {
        self.entries
            .get(user_name)
            .filter(|e| !self.is_expired(e))
            .map(|e| e.answer.clone())
    }

    /// Whether a cached answer can serve `request` without an MAR
    pub fn is_reusable(
        cached: &AuthenticationAnswer,
        request: &AuthenticationRequest,
        needs_profile: bool,
    ) -> bool {
        !request.is_resync() && (!needs_profile || cached.user_profile.is_some())
    }

    /// Cached answer usable for `request`
    pub fn lookup(
        &self,
        request: &AuthenticationRequest,
        needs_profile: bool,
    ) -> Option<AuthenticationAnswer> {
        if request.is_resync() {
            return None;
        }
        self.get(&request.user_name)
            .filter(|cached| Self::is_reusable(cached, request, needs_profile))
    }

    /// Store `answer` and return the canonical answer for the call.
    ///
    /// An answer without a profile keeps the profile of the entry it replaces.
    pub fn put(&self, mut answer: AuthenticationAnswer) -> AuthenticationAnswer {
        if answer.user_profile.is_none() {
            answer.user_profile = self
                .entries
                .get(&answer.user_name)
                .filter(|e| !self.is_expired(e))
                .and_then(|e| e.answer.user_profile.clone());
        }

        if self.capacity > 0
            && !self.entries.contains_key(&answer.user_name)
            && self.entries.len() >= self.capacity
        {
            self.gc();
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            answer.user_name.clone(),
            CacheEntry {
                answer: answer.clone(),
                inserted: Instant::now(),
            },
        );
        answer
    }

    /// Drop the entry for `user_name`
    pub fn remove(&self, user_name: &str) {
        self.entries.remove(user_name);
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().inserted)
            .map(|e| e.key().clone());
        if let Some(user_name) = oldest {
            log::debug!("Vector cache full, evicting [{}]", user_name);
            self.entries.remove(&user_name);
        }
    }

    /// Purge expired entries, returning how many were removed
    pub fn gc(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.inserted.elapsed() < ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run [`gc`](Self::gc) every `interval` until the task is aborted
    pub fn spawn_gc(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = self.gc();
                if purged > 0 {
                    log::debug!("Vector cache GC purged {} entries ({} left)", purged, self.len());
                }
            }
        })
    }
}
