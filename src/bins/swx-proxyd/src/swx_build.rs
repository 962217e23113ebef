//! SWx request building
//!
//! Turns an `Authenticate` request into the MAR, and a user name into the
//! SAR used to fetch Non-3GPP-User-Data.

use swx_diameter::swx::{create_mar, create_sar, ServerAssignmentType};
use swx_diameter::{DiameterConfig, DiameterMessage};

use crate::error::{SwxError, SwxResult};
use crate::types::{AuthenticationRequest, AuthenticationScheme};

/// Build the MAR for `request`.
///
/// SIP-Number-Auth-Items is raised to `min_vectors`; pass 0 to send the
/// caller's count unchanged.
pub fn build_mar(
    config: &DiameterConfig,
    session_id: &str,
    request: &AuthenticationRequest,
    min_vectors: u32,
) -> SwxResult<DiameterMessage> {
    let scheme = AuthenticationScheme::from_name(&request.authentication_scheme).ok_or_else(|| {
        SwxError::InvalidArgument(format!(
            "unsupported authentication scheme: {}",
            request.authentication_scheme
        ))
    })?;

    let num_vectors = request.sip_num_auth_vectors.max(min_vectors);
    let resync = request.is_resync().then_some(&request.resync_info[..]);

    Ok(create_mar(
        session_id,
        config,
        &request.user_name,
        num_vectors,
        scheme.as_diameter_str(),
        resync,
    ))
}

/// Build the SAR (AAA_USER_DATA_REQUEST) for `user_name`
pub fn build_sar(config: &DiameterConfig, session_id: &str, user_name: &str) -> DiameterMessage {
    create_sar(
        session_id,
        config,
        user_name,
        ServerAssignmentType::AaaUserDataRequest,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use swx_diameter::swx::{avp, cmd};
    use swx_diameter::OGS_3GPP_VENDOR_ID;

    fn num_auth_items(msg: &DiameterMessage) -> Option<u32> {
        msg.find_vendor_avp(avp::SIP_NUMBER_AUTH_ITEMS, OGS_3GPP_VENDOR_ID)
            .and_then(|a| a.as_u32())
    }

    #[test]
    fn test_mar_escalates_vector_count() {
        let config = DiameterConfig::default();
        let req = AuthenticationRequest::new("001010000000001", 2);
        let mar = build_mar(&config, "aaa;1;1", &req, 5).unwrap();
        assert_eq!(mar.header.command_code, cmd::MULTIMEDIA_AUTH);
        assert_eq!(num_auth_items(&mar), Some(5));

        let req = AuthenticationRequest::new("001010000000001", 8);
        let mar = build_mar(&config, "aaa;1;2", &req, 5).unwrap();
        assert_eq!(num_auth_items(&mar), Some(8));

        let req = AuthenticationRequest::new("001010000000001", 1);
        let mar = build_mar(&config, "aaa;1;3", &req, 0).unwrap();
        assert_eq!(num_auth_items(&mar), Some(1));
    }

    #[test]
    fn test_mar_unsupported_scheme() {
        let mut req = AuthenticationRequest::new("001010000000001", 1);
        req.authentication_scheme = "DIGEST_MD5".to_string();
        assert!(matches!(
            build_mar(&DiameterConfig::default(), "aaa;1;4", &req, 5),
            Err(SwxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mar_resync_info() {
        let mut req = AuthenticationRequest::new("001010000000001", 1);
        req.resync_info = Bytes::from_static(&[0x11; 30]);
        let mar = build_mar(&DiameterConfig::default(), "aaa;1;5", &req, 0).unwrap();
        let item = mar
            .find_vendor_avp(avp::SIP_AUTH_DATA_ITEM, OGS_3GPP_VENDOR_ID)
            .unwrap()
            .children()
            .unwrap();
        assert!(item.iter().any(|a| a.code == avp::SIP_AUTHORIZATION));
    }

    #[test]
    fn test_sar() {
        let sar = build_sar(&DiameterConfig::default(), "aaa;1;6", "001010000000001");
        assert_eq!(sar.header.command_code, cmd::SERVER_ASSIGNMENT);
        assert_eq!(sar.user_name(), Some("001010000000001"));
        assert_eq!(sar.session_id(), Some("aaa;1;6"));
    }
}
