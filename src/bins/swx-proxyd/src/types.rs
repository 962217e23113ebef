//! Authenticate RPC data model
//!
//! Byte fields travel as lowercase hex strings in JSON.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use swx_diameter::swx::{auth_scheme, SipAuthDataItem};

/// Maximum IMSI length in digits
pub const MAX_USER_NAME_LEN: usize = 15;

/// EAP method the vectors are requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationScheme {
    EapAka,
    EapAkaPrime,
}

impl AuthenticationScheme {
    /// Parse an RPC scheme name or a SIP-Authentication-Scheme value
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EAP_AKA" | auth_scheme::EAP_AKA => Some(Self::EapAka),
            "EAP_AKA_PRIME" | auth_scheme::EAP_AKA_PRIME => Some(Self::EapAkaPrime),
            _ => None,
        }
    }

    /// SIP-Authentication-Scheme value carried on SWx
    pub fn as_diameter_str(&self) -> &'static str {
        match self {
            Self::EapAka => auth_scheme::EAP_AKA,
            Self::EapAkaPrime => auth_scheme::EAP_AKA_PRIME,
        }
    }
}

fn default_scheme() -> String {
    "EAP_AKA".to_string()
}

/// Inbound `Authenticate` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    /// Subscriber IMSI
    pub user_name: String,
    /// Requested number of vectors; may be below the policy minimum
    pub sip_num_auth_vectors: u32,
    /// RAND || AUTS on resynchronization, empty otherwise
    #[serde(default, with = "hex_bytes")]
    pub resync_info: Bytes,
    /// Fetch Non-3GPP-User-Data with an SAR after the MAR
    #[serde(default)]
    pub retrieve_user_profile: bool,
    /// Scheme name (`EAP_AKA` or `EAP_AKA_PRIME`)
    #[serde(default = "default_scheme")]
    pub authentication_scheme: String,
}

impl AuthenticationRequest {
    pub fn new(user_name: &str, sip_num_auth_vectors: u32) -> Self {
        Self {
            user_name: user_name.to_string(),
            sip_num_auth_vectors,
            resync_info: Bytes::new(),
            retrieve_user_profile: false,
            authentication_scheme: default_scheme(),
        }
    }

    pub fn is_resync(&self) -> bool {
        !self.resync_info.is_empty()
    }
}

/// One authentication vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipAuthVector {
    pub authentication_scheme: AuthenticationScheme,
    /// RAND || AUTN
    #[serde(with = "hex_bytes")]
    pub rand_autn: Bytes,
    #[serde(with = "hex_bytes")]
    pub xres: Bytes,
    #[serde(with = "hex_bytes")]
    pub confidentiality_key: Bytes,
    #[serde(with = "hex_bytes")]
    pub integrity_key: Bytes,
}

impl SipAuthVector {
    /// Convert an MAA SIP-Auth-Data-Item; `None` for unknown schemes
    pub fn from_auth_data_item(item: &SipAuthDataItem) -> Option<Self> {
        Some(Self {
            authentication_scheme: AuthenticationScheme::from_name(&item.scheme)?,
            rand_autn: item.authenticate.clone(),
            xres: item.authorization.clone(),
            confidentiality_key: item.confidentiality_key.clone(),
            integrity_key: item.integrity_key.clone(),
        })
    }
}

/// Subscriber data from the SAA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub msisdn: String,
}

/// `Authenticate` result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationAnswer {
    pub user_name: String,
    #[serde(default)]
    pub sip_auth_vectors: Vec<SipAuthVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserProfile>,
}

mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map(Bytes::from).map_err(serde::de::Error::custom)
    }
}
