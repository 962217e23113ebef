//! NextGCore SWx Diameter Library
//!
//! Diameter support needed by a 3GPP AAA-side SWx client:
//! - Base protocol message/AVP codec (RFC 6733)
//! - TCP transport with split read/write halves
//! - Client peer handshake (CER/CEA) and watchdog (DWR/DWA) helpers
//! - SWx application (3GPP TS 29.273): MAR/MAA, SAR/SAA

pub mod avp;
pub mod common;
pub mod config;
pub mod error;
pub mod message;
pub mod peer;
pub mod swx;
pub mod transport;

pub use avp::*;
pub use common::*;
pub use config::*;
pub use error::*;
pub use message::*;
pub use peer::*;
pub use transport::*;

/// 3GPP Vendor ID
pub const OGS_3GPP_VENDOR_ID: u32 = 10415;

/// Diameter protocol version
pub const DIAMETER_VERSION: u8 = 1;

/// Default Diameter port
pub const DIAMETER_PORT: u16 = 3868;
