//! SWx proxy configuration
//!
//! Loaded from the YAML file given with `-c`; every field has a default so a
//! partial file (or no file) yields a working configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use swx_diameter::DiameterConfig;

use crate::error::{SwxError, SwxResult};

/// Minimum number of vectors requested from the HSS per MAR
pub const DEFAULT_MIN_REQUESTED_VECTORS: u32 = 5;

/// Vector cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime in seconds
    pub ttl_sec: u64,
    /// Maximum number of cached users
    pub capacity: usize,
    /// Interval of the expired-entry sweep in seconds
    pub gc_interval_sec: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_sec: 1800,
            capacity: 100_000,
            gc_interval_sec: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_sec)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_sec)
    }
}

/// SBI (JSON over HTTP/2) listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SbiConfig {
    pub addr: String,
    pub port: u16,
}

impl Default for SbiConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0".to_string(),
            port: 9110,
        }
    }
}

/// Top-level SWx proxy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwxProxyConfig {
    pub diameter: DiameterConfig,
    /// Lower bound for SIP-Number-Auth-Items on non-resync MARs
    pub min_requested_vectors: u32,
    /// Per round-trip answer timeout in milliseconds
    pub timeout_ms: u64,
    /// Send attempts after the first failed one
    pub send_retries: u32,
    /// Always run the SAR and reject users barred from non-3GPP access
    pub verify_authorization: bool,
    pub cache: CacheConfig,
    pub sbi: SbiConfig,
}

impl Default for SwxProxyConfig {
    fn default() -> Self {
        Self {
            diameter: DiameterConfig::default(),
            min_requested_vectors: DEFAULT_MIN_REQUESTED_VECTORS,
            timeout_ms: 10_000,
            send_retries: 1,
            verify_authorization: false,
            cache: CacheConfig::default(),
            sbi: SbiConfig::default(),
        }
    }
}

impl SwxProxyConfig {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> SwxResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| SwxError::InvalidArgument(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> SwxResult<Self> {
        if !path.exists() {
            log::warn!(
                "Configuration file not found: {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            SwxError::InvalidArgument(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Reject configurations the proxy cannot run with
    pub fn validate(&self) -> SwxResult<()> {
        if self.diameter.origin_host.is_empty() || self.diameter.origin_realm.is_empty() {
            return Err(SwxError::InvalidArgument(
                "diameter.origin_host and diameter.origin_realm must be set".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(SwxError::InvalidArgument("timeout_ms must be positive".into()));
        }
        if self.min_requested_vectors == 0 {
            return Err(SwxError::InvalidArgument(
                "min_requested_vectors must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
