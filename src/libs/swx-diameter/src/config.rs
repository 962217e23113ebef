//! Diameter configuration types

use serde::Deserialize;

/// Diameter client configuration for the SWx connection towards the HSS
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiameterConfig {
    /// Diameter Identity of the local peer (FQDN), sent as Origin-Host
    pub origin_host: String,

    /// Diameter realm of the local peer, sent as Origin-Realm
    pub origin_realm: String,

    /// Realm of the HSS, sent as Destination-Realm
    pub destination_realm: String,

    /// Diameter Identity of the HSS, sent as Destination-Host when set
    pub destination_host: Option<String>,

    /// HSS address (`host:port`)
    pub hss_addr: String,

    /// Watchdog (Tc) interval in seconds
    pub watchdog_interval_sec: u64,

    /// Product-Name advertised in CER
    pub product_name: String,
}

impl Default for DiameterConfig {
    fn default() -> Self {
        Self {
            origin_host: "aaa.localdomain".to_string(),
            origin_realm: "localdomain".to_string(),
            destination_realm: "localdomain".to_string(),
            destination_host: None,
            hss_addr: format!("127.0.0.1:{}", crate::DIAMETER_PORT),
            watchdog_interval_sec: 30,
            product_name: "nextgcore-swx-proxyd".to_string(),
        }
    }
}
