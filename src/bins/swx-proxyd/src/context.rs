//! SWx proxy context
//!
//! Process-scoped state shared by RPC handlers and the Diameter receive
//! task. Built once at startup and passed around as `Arc<SwxProxyContext>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::VectorCache;
use crate::config::SwxProxyConfig;
use crate::stats::SwxStats;
use crate::swx_handler::InboundDispatcher;
use crate::swx_path::DiameterSender;
use crate::tracker::RequestTracker;

/// Diameter Session-Id generator (`<origin-host>;<high>;<low>`)
#[derive(Debug)]
pub struct SessionIdGenerator {
    origin_host: String,
    high: u32,
    low: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new(origin_host: &str) -> Self {
        let high = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        Self {
            origin_host: origin_host.to_string(),
            high,
            low: AtomicU64::new(1),
        }
    }

    /// Next unique Session-Id
    pub fn next(&self) -> String {
        let low = self.low.fetch_add(1, Ordering::Relaxed);
        format!("{};{};{}", self.origin_host, self.high, low)
    }
}

/// SWx proxy context
pub struct SwxProxyContext {
    pub config: SwxProxyConfig,
    pub stats: Arc<SwxStats>,
    pub tracker: Arc<RequestTracker>,
    pub dispatcher: Arc<InboundDispatcher>,
    /// `None` when caching is disabled
    pub cache: Option<Arc<VectorCache>>,
    pub sender: Arc<dyn DiameterSender>,
    pub session_ids: SessionIdGenerator,
}

impl SwxProxyContext {
    /// Build the context. `make_sender` receives the dispatcher its
    /// receive path must feed.
    pub fn new<F>(config: SwxProxyConfig, make_sender: F) -> Arc<Self>
    where
        F: FnOnce(Arc<InboundDispatcher>) -> Arc<dyn DiameterSender>,
    {
        let stats = Arc::new(SwxStats::new());
        let tracker = Arc::new(RequestTracker::new(stats.clone()));
        let dispatcher = Arc::new(InboundDispatcher::new(tracker.clone(), stats.clone()));
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(VectorCache::from_config(&config.cache)));
        let sender = make_sender(dispatcher.clone());
        let session_ids = SessionIdGenerator::new(&config.diameter.origin_host);

        log::debug!(
            "SWx proxy context ready (cache={}, verify_authorization={}, min_vectors={})",
            cache.is_some(),
            config.verify_authorization,
            config.min_requested_vectors
        );

        Arc::new(Self {
            config,
            stats,
            tracker,
            dispatcher,
            cache,
            sender,
            session_ids,
        })
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }
}
