//! SWx proxy errors and RPC status codes

use serde::{Deserialize, Serialize};
use swx_diameter::DiameterError;
use thiserror::Error;

use crate::types::AuthenticationAnswer;

/// RPC status vocabulary returned to callers of `Authenticate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    InvalidArgument,
    DeadlineExceeded,
    Aborted,
    PermissionDenied,
    Internal,
}

impl StatusCode {
    /// HTTP status used by the SBI front end
    pub fn http_status(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::InvalidArgument => 400,
            StatusCode::PermissionDenied => 403,
            StatusCode::Aborted => 409,
            StatusCode::Internal => 500,
            StatusCode::DeadlineExceeded => 504,
        }
    }
}

/// SWx proxy error type
#[derive(Error, Debug)]
pub enum SwxError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Timed out waiting for {0} answer")]
    DeadlineExceeded(&'static str),

    #[error("Session {0} closed without an answer")]
    Aborted(String),

    #[error("Diameter Result-Code {code}: {reason}")]
    ResultCode { code: u32, reason: String, status: StatusCode },

    #[error("Diameter Experimental-Result-Code {code}: {reason}")]
    ExperimentalResultCode { code: u32, reason: String, status: StatusCode },

    #[error("User {0} is not authorized for non-3GPP access")]
    Unauthorized(String),

    #[error("Session {0} is already registered")]
    AlreadyRegistered(String),

    #[error("Unexpected answer: {0}")]
    UnexpectedAnswer(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Diameter error: {0}")]
    Diameter(#[from] DiameterError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwxError {
    /// Map an error onto the RPC status vocabulary
    pub fn status(&self) -> StatusCode {
        match self {
            SwxError::InvalidArgument(_) => StatusCode::InvalidArgument,
            SwxError::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
            SwxError::Aborted(_) => StatusCode::Aborted,
            SwxError::ResultCode { status, .. } => *status,
            SwxError::ExperimentalResultCode { status, .. } => *status,
            SwxError::Unauthorized(_) => StatusCode::PermissionDenied,
            SwxError::AlreadyRegistered(_)
            | SwxError::UnexpectedAnswer(_)
            | SwxError::Send(_)
            | SwxError::Diameter(_)
            | SwxError::Internal(_) => StatusCode::Internal,
        }
    }
}

/// SWx proxy result type
pub type SwxResult<T> = Result<T, SwxError>;

/// Failed `Authenticate` call.
///
/// `answer` is set when the call was denied after vectors were already
/// fetched: the caller gets both the denial and the primary vectors.
#[derive(Debug)]
pub struct Rejection {
    pub error: SwxError,
    pub answer: Option<AuthenticationAnswer>,
}

impl Rejection {
    /// Status of the underlying error
    pub fn status(&self) -> StatusCode {
        self.error.status()
    }
}

impl From<SwxError> for Rejection {
    fn from(error: SwxError) -> Self {
        Self { error, answer: None }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for Rejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
