//! SWx proxy statistics

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// SWx proxy counters, updated fire-and-forget from every task
#[derive(Debug, Default)]
pub struct SwxStats {
    /// Transmitted MAR count
    pub tx_mar: AtomicU64,
    /// Transmitted SAR count
    pub tx_sar: AtomicU64,
    /// MAR send failures (after retries)
    pub tx_mar_error: AtomicU64,
    /// SAR send failures (after retries)
    pub tx_sar_error: AtomicU64,
    /// Round trips that hit the answer timeout
    pub timeouts: AtomicU64,
    /// Inbound messages that could not be decoded
    pub unparseable: AtomicU64,
    /// Answers whose Session-Id had no pending request
    pub unmatched_session: AtomicU64,
    /// Pending requests closed without an answer
    pub aborted: AtomicU64,
    /// Users rejected by the authorization check
    pub unauthorized: AtomicU64,
    /// Requests served from the vector cache
    pub cache_hit: AtomicU64,
    /// Requests that needed an MAR
    pub cache_miss: AtomicU64,
    /// Received DWA count
    pub rx_dwa: AtomicU64,
    /// Result-Code tallies
    pub result_codes: DashMap<u32, u64>,
    /// Experimental-Result-Code tallies
    pub experimental_codes: DashMap<u32, u64>,
}

/// Point-in-time copy of the scalar counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwxStatsSnapshot {
    pub tx_mar: u64,
    pub tx_sar: u64,
    pub tx_mar_error: u64,
    pub tx_sar_error: u64,
    pub timeouts: u64,
    pub unparseable: u64,
    pub unmatched_session: u64,
    pub aborted: u64,
    pub unauthorized: u64,
    pub cache_hit: u64,
    pub cache_miss: u64,
}

impl SwxStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_tx_mar(&self) {
        self.tx_mar.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tx_sar(&self) {
        self.tx_sar.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tx_mar_error(&self) {
        self.tx_mar_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tx_sar_error(&self) {
        self.tx_sar_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unparseable(&self) {
        self.unparseable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unmatched_session(&self) {
        self.unmatched_session.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_miss.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rx_dwa(&self) {
        self.rx_dwa.fetch_add(1, Ordering::Relaxed);
    }

    /// Tally a base Result-Code
    pub fn record_result_code(&self, code: u32) {
        *self.result_codes.entry(code).or_insert(0) += 1;
    }

    /// Tally an Experimental-Result-Code
    pub fn record_experimental_code(&self, code: u32) {
        *self.experimental_codes.entry(code).or_insert(0) += 1;
    }

    pub fn result_code_count(&self, code: u32) -> u64 {
        self.result_codes.get(&code).map_or(0, |c| *c)
    }

    pub fn experimental_code_count(&self, code: u32) -> u64 {
        self.experimental_codes.get(&code).map_or(0, |c| *c)
    }

    pub fn snapshot(&self) -> SwxStatsSnapshot {
        SwxStatsSnapshot {
            tx_mar: self.tx_mar.load(Ordering::Relaxed),
            tx_sar: self.tx_sar.load(Ordering::Relaxed),
            tx_mar_error: self.tx_mar_error.load(Ordering::Relaxed),
            tx_sar_error: self.tx_sar_error.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            unparseable: self.unparseable.load(Ordering::Relaxed),
            unmatched_session: self.unmatched_session.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            cache_hit: self.cache_hit.load(Ordering::Relaxed),
            cache_miss: self.cache_miss.load(Ordering::Relaxed),
        }
    }

    /// Log the counters at info level
    pub fn log_summary(&self) {
        let s = self.snapshot();
        log::info!(
            "SWx stats: MAR tx={} err={}, SAR tx={} err={}, timeouts={}, unparseable={}, \
             unmatched={}, aborted={}, unauthorized={}, cache hit={} miss={}",
            s.tx_mar,
            s.tx_mar_error,
            s.tx_sar,
            s.tx_sar_error,
            s.timeouts,
            s.unparseable,
            s.unmatched_session,
            s.aborted,
            s.unauthorized,
            s.cache_hit,
            s.cache_miss
        );
        for entry in self.result_codes.iter() {
            log::info!("  Result-Code {}: {}", entry.key(), entry.value());
        }
        for entry in self.experimental_codes.iter() {
            log::info!("  Experimental-Result-Code {}: {}", entry.key(), entry.value());
        }
    }
}
