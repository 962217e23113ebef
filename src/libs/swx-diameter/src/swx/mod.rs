//! SWx Interface - 3GPP AAA Server <-> HSS (3GPP TS 29.273)
//!
//! The AAA side of the SWx interface:
//! - Multimedia-Auth-Request/Answer (MAR/MAA) for authentication vectors
//! - Server-Assignment-Request/Answer (SAR/SAA) for non-3GPP user data
//!
//! Requests are built from a [`DiameterConfig`]; answers are decoded into the
//! tagged [`SwxAnswer`] so callers match on the command instead of probing
//! AVPs. The answer builders at the bottom are the HSS half of the exchange.

use bytes::Bytes;

use crate::avp::{find_all_vendor_avps, find_avp, find_vendor_avp, Avp, AvpData};
use crate::common::{avp_code, ExperimentalResult, RatType, SubscriptionId};
use crate::config::DiameterConfig;
use crate::error::{DiameterError, DiameterResult};
use crate::message::DiameterMessage;
use crate::OGS_3GPP_VENDOR_ID;

/// SWx Application ID (3GPP TS 29.273)
pub const SWX_APPLICATION_ID: u32 = 16777265;

/// SWx Command Codes (shared with Cx)
pub mod cmd {
    /// Multimedia-Auth-Request/Answer
    pub const MULTIMEDIA_AUTH: u32 = 303;
    /// Server-Assignment-Request/Answer
    pub const SERVER_ASSIGNMENT: u32 = 301;
}

/// SWx AVP Codes
pub mod avp {
    /// Non-3GPP-User-Data
    pub const NON_3GPP_USER_DATA: u32 = 1500;
    /// Non-3GPP-IP-Access
    pub const NON_3GPP_IP_ACCESS: u32 = 1501;
    /// 3GPP-AAA-Server-Name
    pub const AAA_SERVER_NAME: u32 = 318;
    /// SIP-Number-Auth-Items (from Cx)
    pub const SIP_NUMBER_AUTH_ITEMS: u32 = 607;
    /// SIP-Authentication-Scheme (from Cx)
    pub const SIP_AUTHENTICATION_SCHEME: u32 = 608;
    /// SIP-Authenticate (from Cx)
    pub const SIP_AUTHENTICATE: u32 = 609;
    /// SIP-Authorization (from Cx)
    pub const SIP_AUTHORIZATION: u32 = 610;
    /// SIP-Auth-Data-Item (from Cx)
    pub const SIP_AUTH_DATA_ITEM: u32 = 612;
    /// Server-Assignment-Type (from Cx)
    pub const SERVER_ASSIGNMENT_TYPE: u32 = 614;
    /// Confidentiality-Key (from Cx)
    pub const CONFIDENTIALITY_KEY: u32 = 625;
    /// Integrity-Key (from Cx)
    pub const INTEGRITY_KEY: u32 = 626;
}

/// Authentication schemes for SWx
pub mod auth_scheme {
    pub const EAP_AKA: &str = "EAP-AKA";
    pub const EAP_AKA_PRIME: &str = "EAP-AKA'";
}

/// Non-3GPP-IP-Access values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Non3GppIpAccess {
    SubscriptionAllowed = 0,
    SubscriptionBarred = 1,
}

/// Server-Assignment-Type values (same as Cx)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ServerAssignmentType {
    NoAssignment = 0,
    Registration = 1,
    ReRegistration = 2,
    UnregisteredUser = 3,
    TimeoutDeregistration = 4,
    UserDeregistration = 5,
    AdministrativeDeregistration = 8,
    AuthenticationFailure = 9,
    AuthenticationTimeout = 10,
    AaaUserDataRequest = 12,
    PgwUpdate = 13,
    Restoration = 14,
}

fn add_session_header(msg: &mut DiameterMessage, session_id: &str, config: &DiameterConfig) {
    msg.add_avp(Avp::mandatory(
        avp_code::SESSION_ID,
        AvpData::Utf8String(session_id.to_string()),
    ));

    // Vendor-Specific-Application-Id
    msg.add_avp(Avp::mandatory(
        avp_code::VENDOR_SPECIFIC_APPLICATION_ID,
        AvpData::Grouped(vec![
            Avp::mandatory(avp_code::VENDOR_ID, AvpData::Unsigned32(OGS_3GPP_VENDOR_ID)),
            Avp::mandatory(
                avp_code::AUTH_APPLICATION_ID,
                AvpData::Unsigned32(SWX_APPLICATION_ID),
            ),
        ]),
    ));

    // Auth-Session-State (NO_STATE_MAINTAINED)
    msg.add_avp(Avp::mandatory(
        avp_code::AUTH_SESSION_STATE,
        AvpData::Enumerated(1),
    ));

    msg.add_avp(Avp::mandatory(
        avp_code::ORIGIN_HOST,
        AvpData::DiameterIdentity(config.origin_host.clone()),
    ));
    msg.add_avp(Avp::mandatory(
        avp_code::ORIGIN_REALM,
        AvpData::DiameterIdentity(config.origin_realm.clone()),
    ));
    if let Some(host) = &config.destination_host {
        msg.add_avp(Avp::mandatory(
            avp_code::DESTINATION_HOST,
            AvpData::DiameterIdentity(host.clone()),
        ));
    }
    msg.add_avp(Avp::mandatory(
        avp_code::DESTINATION_REALM,
        AvpData::DiameterIdentity(config.destination_realm.clone()),
    ));
}

/// Create a Multimedia-Auth-Request (MAR) for SWx.
///
/// `resync_info` (RAND || AUTS) goes into SIP-Authorization of the
/// SIP-Auth-Data-Item when the UE requested resynchronization.
pub fn create_mar(
    session_id: &str,
    config: &DiameterConfig,
    user_name: &str,
    num_auth_items: u32,
    scheme: &str,
    resync_info: Option<&[u8]>,
) -> DiameterMessage {
    let mut msg = DiameterMessage::new_request(cmd::MULTIMEDIA_AUTH, SWX_APPLICATION_ID);
    add_session_header(&mut msg, session_id, config);

    // User-Name (IMSI)
    msg.add_avp(Avp::mandatory(
        avp_code::USER_NAME,
        AvpData::Utf8String(user_name.to_string()),
    ));

    msg.add_avp(Avp::vendor_mandatory(
        avp::SIP_NUMBER_AUTH_ITEMS,
        OGS_3GPP_VENDOR_ID,
        AvpData::Unsigned32(num_auth_items),
    ));

    let mut auth_data = vec![Avp::vendor_mandatory(
        avp::SIP_AUTHENTICATION_SCHEME,
        OGS_3GPP_VENDOR_ID,
        AvpData::Utf8String(scheme.to_string()),
    )];
    if let Some(resync) = resync_info {
        auth_data.push(Avp::vendor_mandatory(
            avp::SIP_AUTHORIZATION,
            OGS_3GPP_VENDOR_ID,
            AvpData::OctetString(Bytes::copy_from_slice(resync)),
        ));
    }
    msg.add_avp(Avp::vendor_mandatory(
        avp::SIP_AUTH_DATA_ITEM,
        OGS_3GPP_VENDOR_ID,
        AvpData::Grouped(auth_data),
    ));

    msg.add_avp(Avp::vendor_mandatory(
        avp_code::RAT_TYPE,
        OGS_3GPP_VENDOR_ID,
        AvpData::Enumerated(RatType::Wlan as i32),
    ));

    msg
}

/// Create a Server-Assignment-Request (SAR) for SWx.
///
/// The local Origin-Host is announced as 3GPP-AAA-Server-Name.
pub fn create_sar(
    session_id: &str,
    config: &DiameterConfig,
    user_name: &str,
    assignment_type: ServerAssignmentType,
) -> DiameterMessage {
    let mut msg = DiameterMessage::new_request(cmd::SERVER_ASSIGNMENT, SWX_APPLICATION_ID);
    add_session_header(&mut msg, session_id, config);

    msg.add_avp(Avp::mandatory(
        avp_code::USER_NAME,
        AvpData::Utf8String(user_name.to_string()),
    ));

    msg.add_avp(Avp::vendor_mandatory(
        avp::AAA_SERVER_NAME,
        OGS_3GPP_VENDOR_ID,
        AvpData::DiameterIdentity(config.origin_host.clone()),
    ));

    msg.add_avp(Avp::vendor_mandatory(
        avp::SERVER_ASSIGNMENT_TYPE,
        OGS_3GPP_VENDOR_ID,
        AvpData::Enumerated(assignment_type as i32),
    ));

    msg
}

/// One SIP-Auth-Data-Item of an MAA
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SipAuthDataItem {
    /// SIP-Authentication-Scheme
    pub scheme: String,
    /// SIP-Authenticate (RAND || AUTN)
    pub authenticate: Bytes,
    /// SIP-Authorization (XRES)
    pub authorization: Bytes,
    /// Confidentiality-Key
    pub confidentiality_key: Bytes,
    /// Integrity-Key
    pub integrity_key: Bytes,
}

impl SipAuthDataItem {
    fn from_avp(item: &Avp) -> DiameterResult<Self> {
        let children = item.children()?;
        let octets = |code: u32| {
            find_vendor_avp(&children, code, OGS_3GPP_VENDOR_ID)
                .and_then(|a| a.as_octet_string().cloned())
                .unwrap_or_default()
        };
        Ok(Self {
            scheme: find_vendor_avp(&children, avp::SIP_AUTHENTICATION_SCHEME, OGS_3GPP_VENDOR_ID)
                .and_then(|a| a.as_utf8_string())
                .unwrap_or_default()
                .to_string(),
            authenticate: octets(avp::SIP_AUTHENTICATE),
            authorization: octets(avp::SIP_AUTHORIZATION),
            confidentiality_key: octets(avp::CONFIDENTIALITY_KEY),
            integrity_key: octets(avp::INTEGRITY_KEY),
        })
    }

    fn to_avp(&self) -> Avp {
        let octets = |code: u32, data: &Bytes| {
            Avp::vendor_mandatory(code, OGS_3GPP_VENDOR_ID, AvpData::OctetString(data.clone()))
        };
        Avp::vendor_mandatory(
            avp::SIP_AUTH_DATA_ITEM,
            OGS_3GPP_VENDOR_ID,
            AvpData::Grouped(vec![
                Avp::vendor_mandatory(
                    avp::SIP_AUTHENTICATION_SCHEME,
                    OGS_3GPP_VENDOR_ID,
                    AvpData::Utf8String(self.scheme.clone()),
                ),
                octets(avp::SIP_AUTHENTICATE, &self.authenticate),
                octets(avp::SIP_AUTHORIZATION, &self.authorization),
                octets(avp::CONFIDENTIALITY_KEY, &self.confidentiality_key),
                octets(avp::INTEGRITY_KEY, &self.integrity_key),
            ]),
        )
    }
}

/// Non-3GPP-User-Data carried in an SAA
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Non3GppUserData {
    /// Subscription-Id (MSISDN)
    pub subscription_id: Option<SubscriptionId>,
    /// Raw Non-3GPP-IP-Access value; absent means not barred
    pub non_3gpp_ip_access: Option<u32>,
}

impl Non3GppUserData {
    fn from_avp(data: &Avp) -> DiameterResult<Self> {
        let children = data.children()?;

        let subscription_id = match find_avp(&children, avp_code::SUBSCRIPTION_ID) {
            Some(sub) => {
                let fields = sub.children()?;
                let id_type = find_avp(&fields, avp_code::SUBSCRIPTION_ID_TYPE)
                    .and_then(|a| a.as_u32())
                    .ok_or_else(|| DiameterError::MissingAvp("Subscription-Id-Type".into()))?;
                let id_data = find_avp(&fields, avp_code::SUBSCRIPTION_ID_DATA)
                    .and_then(|a| a.as_utf8_string())
                    .ok_or_else(|| DiameterError::MissingAvp("Subscription-Id-Data".into()))?;
                Some(SubscriptionId {
                    subscription_id_type: id_type,
                    subscription_id_data: id_data.to_string(),
                })
            }
            None => None,
        };

        let non_3gpp_ip_access =
            find_vendor_avp(&children, avp::NON_3GPP_IP_ACCESS, OGS_3GPP_VENDOR_ID)
                .and_then(|a| a.as_u32());

        Ok(Self {
            subscription_id,
            non_3gpp_ip_access,
        })
    }

    /// Whether non-3GPP access is allowed for the subscriber
    pub fn access_allowed(&self) -> bool {
        self.non_3gpp_ip_access
            .map_or(true, |v| v == Non3GppIpAccess::SubscriptionAllowed as u32)
    }

    fn to_avp(&self) -> Avp {
        let mut children = Vec::new();
        if let Some(sub) = &self.subscription_id {
            children.push(Avp::mandatory(
                avp_code::SUBSCRIPTION_ID,
                AvpData::Grouped(vec![
                    Avp::mandatory(
                        avp_code::SUBSCRIPTION_ID_TYPE,
                        AvpData::Enumerated(sub.subscription_id_type as i32),
                    ),
                    Avp::mandatory(
                        avp_code::SUBSCRIPTION_ID_DATA,
                        AvpData::Utf8String(sub.subscription_id_data.clone()),
                    ),
                ]),
            ));
        }
        if let Some(access) = self.non_3gpp_ip_access {
            children.push(Avp::vendor_mandatory(
                avp::NON_3GPP_IP_ACCESS,
                OGS_3GPP_VENDOR_ID,
                AvpData::Enumerated(access as i32),
            ));
        }
        Avp::vendor_mandatory(
            avp::NON_3GPP_USER_DATA,
            OGS_3GPP_VENDOR_ID,
            AvpData::Grouped(children),
        )
    }
}

/// Decoded Multimedia-Auth-Answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultimediaAuthAnswer {
    pub session_id: String,
    pub result_code: Option<u32>,
    pub experimental_result: Option<ExperimentalResult>,
    pub user_name: Option<String>,
    pub num_auth_items: Option<u32>,
    pub auth_data_items: Vec<SipAuthDataItem>,
}

/// Decoded Server-Assignment-Answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAssignmentAnswer {
    pub session_id: String,
    pub result_code: Option<u32>,
    pub experimental_result: Option<ExperimentalResult>,
    pub user_name: Option<String>,
    pub user_data: Option<Non3GppUserData>,
}

/// Answer with the 'E' bit set (protocol error from the HSS or a relay)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorAnswer {
    pub session_id: String,
    pub command_code: u32,
    pub result_code: Option<u32>,
}

/// Inbound SWx answer, decided at parse time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwxAnswer {
    Maa(MultimediaAuthAnswer),
    Saa(ServerAssignmentAnswer),
    Error(ErrorAnswer),
}

impl SwxAnswer {
    /// Decode an SWx answer. Requests and unknown commands are rejected.
    pub fn parse(msg: &DiameterMessage) -> DiameterResult<Self> {
        if msg.header.is_request() {
            return Err(DiameterError::Protocol(format!(
                "expected an answer, got request {}",
                msg.header.command_code
            )));
        }

        let session_id = msg
            .session_id()
            .ok_or_else(|| DiameterError::MissingAvp("Session-Id".into()))?
            .to_string();

        if msg.header.is_error() {
            return Ok(SwxAnswer::Error(ErrorAnswer {
                session_id,
                command_code: msg.header.command_code,
                result_code: msg.result_code(),
            }));
        }

        if msg.header.application_id != SWX_APPLICATION_ID {
            return Err(DiameterError::Protocol(format!(
                "unexpected application id {}",
                msg.header.application_id
            )));
        }

        let result_code = msg.result_code();
        let experimental_result = msg.experimental_result()?;
        let user_name = msg.user_name().map(str::to_string);

        match msg.header.command_code {
            cmd::MULTIMEDIA_AUTH => {
                let auth_data_items =
                    find_all_vendor_avps(&msg.avps, avp::SIP_AUTH_DATA_ITEM, OGS_3GPP_VENDOR_ID)
                        .into_iter()
                        .map(SipAuthDataItem::from_avp)
                        .collect::<DiameterResult<Vec<_>>>()?;
                Ok(SwxAnswer::Maa(MultimediaAuthAnswer {
                    session_id,
                    result_code,
                    experimental_result,
                    user_name,
                    num_auth_items: msg
                        .find_vendor_avp(avp::SIP_NUMBER_AUTH_ITEMS, OGS_3GPP_VENDOR_ID)
                        .and_then(|a| a.as_u32()),
                    auth_data_items,
                }))
            }
            cmd::SERVER_ASSIGNMENT => {
                let user_data = msg
                    .find_vendor_avp(avp::NON_3GPP_USER_DATA, OGS_3GPP_VENDOR_ID)
                    .map(Non3GppUserData::from_avp)
                    .transpose()?;
                Ok(SwxAnswer::Saa(ServerAssignmentAnswer {
                    session_id,
                    result_code,
                    experimental_result,
                    user_name,
                    user_data,
                }))
            }
            other => Err(DiameterError::UnknownCommand(other)),
        }
    }

    /// Session-Id of the answer
    pub fn session_id(&self) -> &str {
        match self {
            SwxAnswer::Maa(a) => &a.session_id,
            SwxAnswer::Saa(a) => &a.session_id,
            SwxAnswer::Error(a) => &a.session_id,
        }
    }
}

/// Start an answer to an SWx request, echoing Session-Id and stamping the
/// answering peer's identity.
pub fn create_answer(request: &DiameterMessage, config: &DiameterConfig) -> DiameterMessage {
    let mut msg = DiameterMessage::new_answer(request);
    if let Some(sid) = request.session_id() {
        msg.add_avp(Avp::mandatory(
            avp_code::SESSION_ID,
            AvpData::Utf8String(sid.to_string()),
        ));
    }
    msg.add_avp(Avp::mandatory(
        avp_code::AUTH_SESSION_STATE,
        AvpData::Enumerated(1),
    ));
    msg.add_avp(Avp::mandatory(
        avp_code::ORIGIN_HOST,
        AvpData::DiameterIdentity(config.origin_host.clone()),
    ));
    msg.add_avp(Avp::mandatory(
        avp_code::ORIGIN_REALM,
        AvpData::DiameterIdentity(config.origin_realm.clone()),
    ));
    if let Some(user) = request.user_name() {
        msg.add_avp(Avp::mandatory(
            avp_code::USER_NAME,
            AvpData::Utf8String(user.to_string()),
        ));
    }
    msg
}

/// Add a base Result-Code AVP
pub fn add_result_code(msg: &mut DiameterMessage, code: u32) {
    msg.add_avp(Avp::mandatory(avp_code::RESULT_CODE, AvpData::Unsigned32(code)));
}

/// Add a 3GPP Experimental-Result AVP
pub fn add_experimental_result(msg: &mut DiameterMessage, code: u32) {
    msg.add_avp(Avp::mandatory(
        avp_code::EXPERIMENTAL_RESULT,
        AvpData::Grouped(vec![
            Avp::mandatory(avp_code::VENDOR_ID, AvpData::Unsigned32(OGS_3GPP_VENDOR_ID)),
            Avp::mandatory(avp_code::EXPERIMENTAL_RESULT_CODE, AvpData::Unsigned32(code)),
        ]),
    ));
}

/// Add SIP-Number-Auth-Items and one SIP-Auth-Data-Item per vector
pub fn add_auth_data_items(msg: &mut DiameterMessage, items: &[SipAuthDataItem]) {
    msg.add_avp(Avp::vendor_mandatory(
        avp::SIP_NUMBER_AUTH_ITEMS,
        OGS_3GPP_VENDOR_ID,
        AvpData::Unsigned32(items.len() as u32),
    ));
    for item in items {
        msg.add_avp(item.to_avp());
    }
}

/// Add a Non-3GPP-User-Data AVP
pub fn add_non_3gpp_user_data(msg: &mut DiameterMessage, data: &Non3GppUserData) {
    msg.add_avp(data.to_avp());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SubscriptionIdType;

    fn aaa_config() -> DiameterConfig {
        DiameterConfig {
            origin_host: "aaa.epc.mnc001.mcc001.3gppnetwork.org".to_string(),
            origin_realm: "epc.mnc001.mcc001.3gppnetwork.org".to_string(),
            destination_realm: "epc.mnc001.mcc001.3gppnetwork.org".to_string(),
            ..Default::default()
        }
    }

    fn hss_config() -> DiameterConfig {
        DiameterConfig {
            origin_host: "hss.epc.mnc001.mcc001.3gppnetwork.org".to_string(),
            ..aaa_config()
        }
    }

    fn wire(msg: &DiameterMessage) -> DiameterMessage {
        let mut bytes = msg.encode().freeze();
        DiameterMessage::decode(&mut bytes).unwrap()
    }

    fn vector(i: u8) -> SipAuthDataItem {
        SipAuthDataItem {
            scheme: auth_scheme::EAP_AKA.to_string(),
            authenticate: Bytes::from(vec![i; 32]),
            authorization: Bytes::from(vec![i; 8]),
            confidentiality_key: Bytes::from(vec![i; 16]),
            integrity_key: Bytes::from(vec![i; 16]),
        }
    }

    #[test]
    fn test_create_mar() {
        let msg = wire(&create_mar(
            "aaa;1;1",
            &aaa_config(),
            "001010123456789",
            5,
            auth_scheme::EAP_AKA_PRIME,
            None,
        ));

        assert_eq!(msg.header.command_code, cmd::MULTIMEDIA_AUTH);
        assert_eq!(msg.header.application_id, SWX_APPLICATION_ID);
        assert!(msg.header.is_request());
        assert_eq!(msg.user_name(), Some("001010123456789"));
        assert_eq!(
            msg.find_vendor_avp(avp::SIP_NUMBER_AUTH_ITEMS, OGS_3GPP_VENDOR_ID)
                .and_then(|a| a.as_u32()),
            Some(5)
        );
        assert_eq!(
            msg.find_vendor_avp(avp_code::RAT_TYPE, OGS_3GPP_VENDOR_ID)
                .and_then(|a| a.as_i32()),
            Some(RatType::Wlan as i32)
        );
        assert!(msg.find_avp(avp_code::DESTINATION_HOST).is_none());

        let item = msg
            .find_vendor_avp(avp::SIP_AUTH_DATA_ITEM, OGS_3GPP_VENDOR_ID)
            .unwrap()
            .children()
            .unwrap();
        assert_eq!(
            find_avp(&item, avp::SIP_AUTHENTICATION_SCHEME).and_then(|a| a.as_utf8_string()),
            Some("EAP-AKA'")
        );
        assert!(find_avp(&item, avp::SIP_AUTHORIZATION).is_none());
    }

    #[test]
    fn test_create_mar_with_resync() {
        let mut config = aaa_config();
        config.destination_host = Some("hss.epc.mnc001.mcc001.3gppnetwork.org".to_string());
        let resync = [0xAAu8; 30];
        let msg = wire(&create_mar(
            "aaa;1;2",
            &config,
            "001010123456789",
            1,
            auth_scheme::EAP_AKA,
            Some(&resync),
        ));

        assert!(msg.find_avp(avp_code::DESTINATION_HOST).is_some());
        let item = msg
            .find_vendor_avp(avp::SIP_AUTH_DATA_ITEM, OGS_3GPP_VENDOR_ID)
            .unwrap()
            .children()
            .unwrap();
        assert_eq!(
            find_avp(&item, avp::SIP_AUTHORIZATION)
                .and_then(|a| a.as_octet_string())
                .map(|b| b.to_vec()),
            Some(resync.to_vec())
        );
    }

    #[test]
    fn test_create_sar() {
        let msg = wire(&create_sar(
            "aaa;1;3",
            &aaa_config(),
            "001010123456789",
            ServerAssignmentType::AaaUserDataRequest,
        ));

        assert_eq!(msg.header.command_code, cmd::SERVER_ASSIGNMENT);
        assert_eq!(msg.header.application_id, SWX_APPLICATION_ID);
        assert_eq!(
            msg.find_vendor_avp(avp::SERVER_ASSIGNMENT_TYPE, OGS_3GPP_VENDOR_ID)
                .and_then(|a| a.as_i32()),
            Some(12)
        );
        assert_eq!(
            msg.find_vendor_avp(avp::AAA_SERVER_NAME, OGS_3GPP_VENDOR_ID)
                .and_then(|a| a.as_utf8_string()),
            Some("aaa.epc.mnc001.mcc001.3gppnetwork.org")
        );
    }

    #[test]
    fn test_parse_maa() {
        let mar = create_mar("aaa;1;4", &aaa_config(), "001010123456789", 3, auth_scheme::EAP_AKA, None);
        let mut maa = create_answer(&mar, &hss_config());
        add_result_code(&mut maa, 2001);
        add_auth_data_items(&mut maa, &[vector(1), vector(2), vector(3)]);

        let SwxAnswer::Maa(parsed) = SwxAnswer::parse(&wire(&maa)).unwrap() else {
            panic!("expected MAA");
        };
        assert_eq!(parsed.session_id, "aaa;1;4");
        assert_eq!(parsed.result_code, Some(2001));
        assert_eq!(parsed.experimental_result, None);
        assert_eq!(parsed.num_auth_items, Some(3));
        assert_eq!(parsed.user_name.as_deref(), Some("001010123456789"));
        assert_eq!(parsed.auth_data_items, vec![vector(1), vector(2), vector(3)]);
    }

    #[test]
    fn test_parse_maa_experimental_failure() {
        let mar = create_mar("aaa;1;5", &aaa_config(), "001010123456789", 1, auth_scheme::EAP_AKA, None);
        let mut maa = create_answer(&mar, &hss_config());
        add_experimental_result(&mut maa, 5001);

        let answer = SwxAnswer::parse(&wire(&maa)).unwrap();
        assert_eq!(answer.session_id(), "aaa;1;5");
        let SwxAnswer::Maa(parsed) = answer else {
            panic!("expected MAA");
        };
        assert_eq!(parsed.result_code, None);
        assert_eq!(parsed.experimental_result, Some(ExperimentalResult::new(5001)));
        assert!(parsed.auth_data_items.is_empty());
    }

    #[test]
    fn test_parse_saa_user_data() {
        let sar = create_sar(
            "aaa;1;6",
            &aaa_config(),
            "001010123456789",
            ServerAssignmentType::AaaUserDataRequest,
        );
        let mut saa = create_answer(&sar, &hss_config());
        add_result_code(&mut saa, 2001);
        add_non_3gpp_user_data(
            &mut saa,
            &Non3GppUserData {
                subscription_id: Some(SubscriptionId::new_e164("15551234567")),
                non_3gpp_ip_access: Some(Non3GppIpAccess::SubscriptionBarred as u32),
            },
        );

        let SwxAnswer::Saa(parsed) = SwxAnswer::parse(&wire(&saa)).unwrap() else {
            panic!("expected SAA");
        };
        let data = parsed.user_data.unwrap();
        let sub = data.subscription_id.clone().unwrap();
        assert_eq!(sub.id_type(), Some(SubscriptionIdType::EndUserE164));
        assert_eq!(sub.subscription_id_data, "15551234567");
        assert!(!data.access_allowed());
    }

    #[test]
    fn test_absent_ip_access_is_allowed() {
        assert!(Non3GppUserData::default().access_allowed());
    }

    #[test]
    fn test_parse_error_answer() {
        let mar = create_mar("aaa;1;7", &aaa_config(), "001010123456789", 1, auth_scheme::EAP_AKA, None);
        let mut answer = create_answer(&mar, &hss_config());
        answer.header.set_error();
        add_result_code(&mut answer, 3002);

        assert_eq!(
            SwxAnswer::parse(&wire(&answer)).unwrap(),
            SwxAnswer::Error(ErrorAnswer {
                session_id: "aaa;1;7".to_string(),
                command_code: cmd::MULTIMEDIA_AUTH,
                result_code: Some(3002),
            })
        );
    }

    #[test]
    fn test_parse_rejects_requests_and_unknown_commands() {
        let mar = create_mar("aaa;1;8", &aaa_config(), "001010123456789", 1, auth_scheme::EAP_AKA, None);
        assert!(matches!(
            SwxAnswer::parse(&mar),
            Err(DiameterError::Protocol(_))
        ));

        let mut rta = DiameterMessage::new_answer(&DiameterMessage::new_request(304, SWX_APPLICATION_ID));
        rta.add_avp(Avp::mandatory(
            avp_code::SESSION_ID,
            AvpData::Utf8String("aaa;1;9".to_string()),
        ));
        assert!(matches!(
            SwxAnswer::parse(&rta),
            Err(DiameterError::UnknownCommand(304))
        ));
    }

    #[test]
    fn test_parse_requires_session_id() {
        let maa = DiameterMessage::new_answer(&DiameterMessage::new_request(
            cmd::MULTIMEDIA_AUTH,
            SWX_APPLICATION_ID,
        ));
        assert!(matches!(
            SwxAnswer::parse(&maa),
            Err(DiameterError::MissingAvp(_))
        ));
    }
}
