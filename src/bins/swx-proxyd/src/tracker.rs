//! Session-Id correlation between outbound requests and inbound answers
//!
//! Each outstanding MAR/SAR owns a oneshot rendezvous keyed by its
//! Session-Id. The receive task resolves it; the waiting call owns the
//! [`PendingRequest`] guard, which removes the entry when it goes away.
//!
//! Entries are bound to the link their request was written on, so losing a
//! link aborts only the requests that link carried.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use swx_diameter::swx::SwxAnswer;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{SwxError, SwxResult};
use crate::stats::SwxStats;

/// Link id of an entry that has not been written anywhere yet
pub const UNBOUND_LINK: u64 = 0;

#[derive(Debug)]
struct Slot {
    tx: oneshot::Sender<SwxAnswer>,
    link: u64,
}

/// Correlation table of pending SWx requests
#[derive(Debug)]
pub struct RequestTracker {
    pending: DashMap<String, Slot>,
    stats: Arc<SwxStats>,
}

impl RequestTracker {
    pub fn new(stats: Arc<SwxStats>) -> Self {
        Self {
            pending: DashMap::new(),
            stats,
        }
    }

    /// Register `session_id` before its request is sent.
    ///
    /// Fails if the Session-Id is already pending.
    pub fn register(&self, session_id: &str) -> SwxResult<PendingRequest<'_>> {
        match self.pending.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(SwxError::AlreadyRegistered(session_id.to_string())),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(Slot {
                    tx,
                    link: UNBOUND_LINK,
                });
                Ok(PendingRequest {
                    tracker: self,
                    session_id: session_id.to_string(),
                    rx,
                })
            }
        }
    }

    /// Hand `answer` to the request waiting on its Session-Id.
    ///
    /// Returns false, and counts an unmatched session, when nobody is waiting.
    pub fn resolve(&self, answer: SwxAnswer) -> bool {
        let session_id = answer.session_id().to_string();
        let delivered = match self.pending.remove(&session_id) {
            Some((_, slot)) => slot.tx.send(answer).is_ok(),
            None => false,
        };
        if !delivered {
            self.stats.inc_unmatched_session();
        }
        delivered
    }

    /// Remove `session_id` without answering it; idempotent
    pub fn deregister(&self, session_id: &str) -> bool {
        self.pending.remove(session_id).is_some()
    }

    /// Record that `session_id` went out on `link`. No-op for unknown ids.
    pub fn bind_link(&self, session_id: &str, link: u64) {
        if let Some(mut slot) = self.pending.get_mut(session_id) {
            slot.link = link;
        }
    }

    /// Drop the entries written on `link`; their waiters observe a closed
    /// channel. Entries bound elsewhere or not yet sent are kept.
    pub fn abort_link(&self, link: u64) -> usize {
        let mut aborted = 0;
        self.pending.retain(|_, slot| {
            let keep = slot.link != link;
            if !keep {
                aborted += 1;
            }
            keep
        });
        aborted
    }

    /// Drop every pending entry; waiters observe a closed channel
    pub fn abort_all(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.pending.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Outcome of waiting on a pending request
#[derive(Debug)]
pub enum WaitOutcome {
    Answer(SwxAnswer),
    /// Entry removed without an answer (connection loss, cancellation)
    Closed,
    TimedOut,
}

/// Registered request; deregisters itself when dropped
#[derive(Debug)]
pub struct PendingRequest<'a> {
    tracker: &'a RequestTracker,
    session_id: String,
    rx: oneshot::Receiver<SwxAnswer>,
}

impl PendingRequest<'_> {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Wait for the answer, at most `timeout`
    pub async fn wait(&mut self, timeout: Duration) -> WaitOutcome {
        self.wait_until(Instant::now() + timeout).await
    }

    pub async fn wait_until(&mut self, deadline: Instant) -> WaitOutcome {
        match tokio::time::timeout_at(deadline, &mut self.rx).await {
            Ok(Ok(answer)) => WaitOutcome::Answer(answer),
            Ok(Err(_)) => WaitOutcome::Closed,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.tracker.deregister(&self.session_id);
    }
}
