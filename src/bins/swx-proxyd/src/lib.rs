//! NextGCore SWx Proxy Library
//!
//! Authentication proxy between non-3GPP access (ePDG / AAA) and the HSS:
//! - `Authenticate` RPC over HTTP/2 JSON
//! - SWx MAR/MAA for authentication vectors, SAR/SAA for Non-3GPP-User-Data
//! - Per-user vector cache
//! - Session-Id correlation of answers arriving on the shared Diameter link

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod result;
pub mod sbi_path;
pub mod stats;
pub mod swx_build;
pub mod swx_handler;
pub mod swx_path;
pub mod tracker;
pub mod types;


// Re-export commonly used types
pub use auth::{validate_request, AuthProxy};
pub use cache::VectorCache;
pub use config::{CacheConfig, SbiConfig, SwxProxyConfig, DEFAULT_MIN_REQUESTED_VECTORS};
pub use context::{SessionIdGenerator, SwxProxyContext};
pub use error::{Rejection, StatusCode, SwxError, SwxResult};
pub use result::translate_result;
pub use sbi_path::{handle_request, AuthenticateResponse, SwxSbiServer, AUTHENTICATE_PATH};
pub use stats::{SwxStats, SwxStatsSnapshot};
pub use swx_build::{build_mar, build_sar};
pub use swx_handler::InboundDispatcher;
pub use swx_path::{send_with_retries, DiameterSender, SwxConnection, MAX_MISSED_DWA};
pub use tracker::{PendingRequest, RequestTracker, WaitOutcome};
pub use types::{
    AuthenticationAnswer, AuthenticationRequest, AuthenticationScheme, SipAuthVector,
    UserProfile, MAX_USER_NAME_LEN,
};
