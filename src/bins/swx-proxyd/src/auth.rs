//! `Authenticate` handling
//!
//! One call runs at most two SWx round trips: the MAR for vectors and,
//! when a profile or authorization check is needed, an SAR for
//! Non-3GPP-User-Data. Each round trip registers its Session-Id before the
//! request leaves and the guard removes it again on every exit path.

use std::sync::Arc;

use swx_diameter::swx::{MultimediaAuthAnswer, Non3GppUserData, SwxAnswer};
use swx_diameter::{DiameterMessage, SubscriptionIdType};
use tokio::time::Instant;

use crate::context::SwxProxyContext;
use crate::error::{Rejection, SwxError, SwxResult};
use crate::result::translate_result;
use crate::swx_build::{build_mar, build_sar};
use crate::swx_path::send_with_retries;
use crate::tracker::WaitOutcome;
use crate::types::{
    AuthenticationAnswer, AuthenticationRequest, SipAuthVector, UserProfile, MAX_USER_NAME_LEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Mar,
    Sar,
}

impl Exchange {
    fn answer_name(&self) -> &'static str {
        match self {
            Exchange::Mar => "MAA",
            Exchange::Sar => "SAA",
        }
    }
}

/// Check an inbound request before anything is sent
pub fn validate_request(request: &AuthenticationRequest) -> SwxResult<()> {
    if request.user_name.is_empty() {
        return Err(SwxError::InvalidArgument("user name is empty".into()));
    }
    if request.user_name.chars().count() > MAX_USER_NAME_LEN {
        return Err(SwxError::InvalidArgument(format!(
            "user name {} is longer than {} characters",
            request.user_name, MAX_USER_NAME_LEN
        )));
    }
    if request.sip_num_auth_vectors == 0 {
        return Err(SwxError::InvalidArgument(
            "requested number of auth vectors is 0".into(),
        ));
    }
    Ok(())
}

/// SWx authentication proxy
#[derive(Clone)]
pub struct AuthProxy {
    ctx: Arc<SwxProxyContext>,
}

impl AuthProxy {
    pub fn new(ctx: Arc<SwxProxyContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<SwxProxyContext> {
        &self.ctx
    }

    /// Fetch authentication vectors (and optionally the user profile) for
    /// `request.user_name`.
    pub async fn authenticate(
        &self,
        request: &AuthenticationRequest,
    ) -> Result<AuthenticationAnswer, Rejection> {
        validate_request(request)?;

        let config = &self.ctx.config;
        let needs_sar = config.verify_authorization || request.retrieve_user_profile;

        if let Some(cache) = self.ctx.cache.as_ref().filter(|_| !request.is_resync()) {
            match cache.lookup(request, needs_sar) {
                Some(cached) => {
                    self.ctx.stats.inc_cache_hit();
                    log::debug!("[{}] served from vector cache", request.user_name);
                    return Ok(cached);
                }
                None => self.ctx.stats.inc_cache_miss(),
            }
        }

        let maa = self.fetch_vectors(request).await?;

        let mut answer = AuthenticationAnswer {
            user_name: request.user_name.clone(),
            sip_auth_vectors: convert_vectors(&request.user_name, &maa),
            user_profile: None,
        };
        log::debug!(
            "[{}] MAA carried {} vectors",
            request.user_name,
            answer.sip_auth_vectors.len()
        );

        if needs_sar {
            match self.fetch_user_data(&request.user_name).await {
                Ok(user_data) => {
                    let allowed = user_data
                        .as_ref()
                        .map_or(true, Non3GppUserData::access_allowed);
                    if config.verify_authorization && !allowed {
                        self.ctx.stats.inc_unauthorized();
                        log::warn!("[{}] non-3GPP access not allowed", request.user_name);
                        return Err(Rejection {
                            error: SwxError::Unauthorized(request.user_name.clone()),
                            answer: Some(answer),
                        });
                    }
                    match user_data.as_ref().map(extract_profile).transpose() {
                        Ok(profile) => answer.user_profile = profile.flatten(),
                        Err(e) => log::error!("[{}] SAA: {}", request.user_name, e),
                    }
                }
                Err(e) => log::error!("[{}] SAR failed: {}", request.user_name, e),
            }
        }

        if let Some(cache) = &self.ctx.cache {
            answer = cache.put(answer);
        }
        Ok(answer)
    }

    async fn fetch_vectors(&self, request: &AuthenticationRequest) -> SwxResult<MultimediaAuthAnswer> {
        let min_vectors = if self.ctx.cache_enabled() && !request.is_resync() {
            self.ctx.config.min_requested_vectors
        } else {
            0
        };

        let session_id = self.ctx.session_ids.next();
        let mar = build_mar(&self.ctx.config.diameter, &session_id, request, min_vectors)?;
        match self.round_trip(Exchange::Mar, &session_id, &mar).await? {
            SwxAnswer::Maa(maa) => {
                translate_result(maa.result_code, maa.experimental_result.as_ref(), &self.ctx.stats)?;
                Ok(maa)
            }
            other => Err(unexpected(Exchange::Mar, &other)),
        }
    }

    async fn fetch_user_data(&self, user_name: &str) -> SwxResult<Option<Non3GppUserData>> {
        let session_id = self.ctx.session_ids.next();
        let sar = build_sar(&self.ctx.config.diameter, &session_id, user_name);
        match self.round_trip(Exchange::Sar, &session_id, &sar).await? {
            SwxAnswer::Saa(saa) => {
                translate_result(saa.result_code, saa.experimental_result.as_ref(), &self.ctx.stats)?;
                Ok(saa.user_data)
            }
            other => Err(unexpected(Exchange::Sar, &other)),
        }
    }

    /// Register, send and wait for one answer
    async fn round_trip(
        &self,
        exchange: Exchange,
        session_id: &str,
        msg: &DiameterMessage,
    ) -> SwxResult<SwxAnswer> {
        let stats = &self.ctx.stats;
        let timeout = self.ctx.config.timeout();
        // One deadline covers connecting, sending and waiting
        let deadline = Instant::now() + timeout;
        let mut pending = self.ctx.tracker.register(session_id)?;

        let sending = send_with_retries(self.ctx.sender.as_ref(), msg, self.ctx.config.send_retries);
        let Ok(sent) = tokio::time::timeout_at(deadline, sending).await else {
            stats.inc_timeouts();
            log::warn!("[{}] {:?} not sent within {:?}", session_id, exchange, timeout);
            return Err(SwxError::DeadlineExceeded(exchange.answer_name()));
        };
        match (exchange, sent) {
            (Exchange::Mar, Ok(())) => stats.inc_tx_mar(),
            (Exchange::Sar, Ok(())) => stats.inc_tx_sar(),
            (Exchange::Mar, Err(e)) => {
                stats.inc_tx_mar_error();
                return Err(e);
            }
            (Exchange::Sar, Err(e)) => {
                stats.inc_tx_sar_error();
                return Err(e);
            }
        }
        log::debug!("[{}] {:?} sent", session_id, exchange);

        match pending.wait_until(deadline).await {
            WaitOutcome::Answer(answer) => {
                if let SwxAnswer::Error(err) = &answer {
                    stats.record_result_code(err.result_code.unwrap_or(0));
                }
                Ok(answer)
            }
            WaitOutcome::TimedOut => {
                stats.inc_timeouts();
                log::warn!("[{}] no {} within {:?}", session_id, exchange.answer_name(), timeout);
                Err(SwxError::DeadlineExceeded(exchange.answer_name()))
            }
            WaitOutcome::Closed => {
                stats.inc_aborted();
                Err(SwxError::Aborted(session_id.to_string()))
            }
        }
    }
}

fn unexpected(exchange: Exchange, answer: &SwxAnswer) -> SwxError {
    let got = match answer {
        SwxAnswer::Maa(_) => "MAA".to_string(),
        SwxAnswer::Saa(_) => "SAA".to_string(),
        SwxAnswer::Error(e) => format!(
            "error answer (cmd={}, Result-Code={})",
            e.command_code,
            e.result_code.unwrap_or(0)
        ),
    };
    SwxError::UnexpectedAnswer(format!("expected {}, got {}", exchange.answer_name(), got))
}

fn convert_vectors(user_name: &str, maa: &MultimediaAuthAnswer) -> Vec<SipAuthVector> {
    maa.auth_data_items
        .iter()
        .filter_map(|item| {
            let vector = SipAuthVector::from_auth_data_item(item);
            if vector.is_none() {
                log::warn!("[{}] skipping vector with unknown scheme {:?}", user_name, item.scheme);
            }
            vector
        })
        .collect()
}

/// MSISDN from Non-3GPP-User-Data; only END_USER_E164 is accepted
fn extract_profile(data: &Non3GppUserData) -> SwxResult<Option<UserProfile>> {
    let Some(sub) = &data.subscription_id else {
        return Ok(None);
    };
    match sub.id_type() {
        Some(SubscriptionIdType::EndUserE164) => Ok(Some(UserProfile {
            msisdn: sub.subscription_id_data.clone(),
        })),
        _ => Err(SwxError::Internal(format!(
            "unexpected Subscription-Id-Type {}",
            sub.subscription_id_type
        ))),
    }
}
