//! Common Diameter types and constants

use crate::OGS_3GPP_VENDOR_ID;

/// AVP codes for base protocol and shared 3GPP AVPs
pub mod avp_code {
    // RFC 6733 Base Protocol AVPs
    pub const USER_NAME: u32 = 1;
    pub const HOST_IP_ADDRESS: u32 = 257;
    pub const AUTH_APPLICATION_ID: u32 = 258;
    pub const VENDOR_SPECIFIC_APPLICATION_ID: u32 = 260;
    pub const SESSION_ID: u32 = 263;
    pub const ORIGIN_HOST: u32 = 264;
    pub const SUPPORTED_VENDOR_ID: u32 = 265;
    pub const VENDOR_ID: u32 = 266;
    pub const RESULT_CODE: u32 = 268;
    pub const PRODUCT_NAME: u32 = 269;
    pub const DISCONNECT_CAUSE: u32 = 273;
    pub const AUTH_SESSION_STATE: u32 = 277;
    pub const ORIGIN_STATE_ID: u32 = 278;
    pub const DESTINATION_REALM: u32 = 283;
    pub const DESTINATION_HOST: u32 = 293;
    pub const ORIGIN_REALM: u32 = 296;
    pub const EXPERIMENTAL_RESULT: u32 = 297;
    pub const EXPERIMENTAL_RESULT_CODE: u32 = 298;

    // Subscription ID AVPs (RFC 4006)
    pub const SUBSCRIPTION_ID: u32 = 443;
    pub const SUBSCRIPTION_ID_DATA: u32 = 444;
    pub const SUBSCRIPTION_ID_TYPE: u32 = 450;

    // 3GPP specific AVPs
    pub const RAT_TYPE: u32 = 1032;
}

/// Subscription ID type values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SubscriptionIdType {
    EndUserE164 = 0,
    EndUserImsi = 1,
    EndUserSipUri = 2,
    EndUserNai = 3,
    EndUserPrivate = 4,
}

impl SubscriptionIdType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::EndUserE164),
            1 => Some(Self::EndUserImsi),
            2 => Some(Self::EndUserSipUri),
            3 => Some(Self::EndUserNai),
            4 => Some(Self::EndUserPrivate),
            _ => None,
        }
    }
}

/// Auth session state values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AuthSessionState {
    StateMaintained = 0,
    NoStateMaintained = 1,
}

/// RAT type values (3GPP TS 29.212)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RatType {
    Wlan = 0,
    Virtual = 1,
    Utran = 1000,
    Geran = 1001,
    Eutran = 1004,
}

/// Experimental-Result structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentalResult {
    pub vendor_id: u32,
    pub experimental_result_code: u32,
}

impl ExperimentalResult {
    pub fn new(result_code: u32) -> Self {
        Self {
            vendor_id: OGS_3GPP_VENDOR_ID,
            experimental_result_code: result_code,
        }
    }
}

/// Subscription-Id structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionId {
    /// Raw Subscription-Id-Type; unknown values are kept so callers can report them
    pub subscription_id_type: u32,
    pub subscription_id_data: String,
}

impl SubscriptionId {
    pub fn new_e164(msisdn: &str) -> Self {
        Self {
            subscription_id_type: SubscriptionIdType::EndUserE164 as u32,
            subscription_id_data: msisdn.to_string(),
        }
    }

    pub fn new_imsi(imsi: &str) -> Self {
        Self {
            subscription_id_type: SubscriptionIdType::EndUserImsi as u32,
            subscription_id_data: imsi.to_string(),
        }
    }

    /// Typed view of the Subscription-Id-Type
    pub fn id_type(&self) -> Option<SubscriptionIdType> {
        SubscriptionIdType::from_u32(self.subscription_id_type)
    }
}
