//! Diameter result code translation
//!
//! A Result-Code of 0 (absent) or 2xxx is success, and so is an absent
//! Experimental-Result. Anything not recognised is an internal error.

use swx_diameter::{ExperimentalResult, ExperimentalResultCode, ResultCode};

use crate::error::{StatusCode, SwxError, SwxResult};
use crate::stats::SwxStats;

fn base_status(code: u32) -> Option<(StatusCode, String)> {
    if code == 0 {
        return None;
    }
    match ResultCode::from_code(code) {
        Some(rc) if rc.is_success() => None,
        Some(rc @ (ResultCode::AuthenticationRejected | ResultCode::AuthorizationRejected)) => {
            Some((StatusCode::PermissionDenied, format!("{rc:?}")))
        }
        Some(rc) => Some((StatusCode::Internal, format!("{rc:?}"))),
        None => Some((StatusCode::Internal, "unknown result code".to_string())),
    }
}

fn experimental_status(code: u32) -> Option<(StatusCode, String)> {
    use ExperimentalResultCode::*;

    if code == 0 {
        return None;
    }
    match ExperimentalResultCode::from_code(code) {
        Some(rc) if rc.is_success() => None,
        Some(
            rc @ (UserUnknown
            | IdentityNotRegistered
            | RoamingNotAllowed
            | UnknownEpsSubscription
            | UserNoNon3gppSubscription
            | RatTypeNotAllowed),
        ) => Some((StatusCode::PermissionDenied, format!("{rc:?}"))),
        Some(rc @ AuthSchemeNotSupported) => Some((StatusCode::InvalidArgument, format!("{rc:?}"))),
        Some(rc) => Some((StatusCode::Internal, format!("{rc:?}"))),
        None => Some((StatusCode::Internal, "unknown experimental result code".to_string())),
    }
}

/// Translate the result of an MAA/SAA.
///
/// Both codes are tallied in `stats`; the experimental code only decides
/// the outcome when the base code is a success.
pub fn translate_result(
    result_code: Option<u32>,
    experimental: Option<&ExperimentalResult>,
    stats: &SwxStats,
) -> SwxResult<()> {
    let base = result_code.unwrap_or(0);
    stats.record_result_code(base);
    if let Some(er) = experimental {
        stats.record_experimental_code(er.experimental_result_code);
    }

    if let Some((status, reason)) = base_status(base) {
        return Err(SwxError::ResultCode {
            code: base,
            reason,
            status,
        });
    }

    let exp = experimental.map_or(0, |er| er.experimental_result_code);
    if let Some((status, reason)) = experimental_status(exp) {
        return Err(SwxError::ExperimentalResultCode {
            code: exp,
            reason,
            status,
        });
    }
    Ok(())
}
