//! SWx inbound answer handling
//!
//! Called by the receive task for every application message. Answers are
//! decoded once into [`SwxAnswer`] and handed to the request waiting on
//! their Session-Id.

use std::sync::Arc;

use swx_diameter::swx::SwxAnswer;
use swx_diameter::{DiameterError, DiameterMessage};

use crate::stats::SwxStats;
use crate::tracker::RequestTracker;

/// Routes inbound SWx answers to pending requests
#[derive(Debug)]
pub struct InboundDispatcher {
    tracker: Arc<RequestTracker>,
    stats: Arc<SwxStats>,
}

impl InboundDispatcher {
    pub fn new(tracker: Arc<RequestTracker>, stats: Arc<SwxStats>) -> Self {
        Self { tracker, stats }
    }

    pub fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }

    pub fn stats(&self) -> &Arc<SwxStats> {
        &self.stats
    }

    /// Count and log a frame that did not decode. Nothing is resolved, so
    /// its request, if any, runs into its timeout.
    pub fn drop_undecodable(&self, err: &DiameterError) {
        self.stats.inc_unparseable();
        log::error!("Undecodable Diameter frame dropped: {}", err);
    }

    /// Deliver one inbound message. Returns true if a waiter received it.
    pub fn dispatch(&self, msg: &DiameterMessage) -> bool {
        let answer = match SwxAnswer::parse(msg) {
            Ok(answer) => answer,
            Err(e) => {
                self.stats.inc_unparseable();
                log::error!(
                    "Unparseable SWx message (cmd={}, hbh={:#x}): {}",
                    msg.header.command_code,
                    msg.header.hop_by_hop_id,
                    e
                );
                return false;
            }
        };

        let session_id = answer.session_id().to_string();
        if self.tracker.resolve(answer) {
            log::debug!("[{}] answer delivered", session_id);
            true
        } else {
            log::warn!(
                "[{}] no pending request for answer (cmd={}), dropped",
                session_id,
                msg.header.command_code
            );
            false
        }
    }
}
