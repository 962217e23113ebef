//! Diameter error types and result codes

use thiserror::Error;

/// Diameter error type
#[derive(Error, Debug)]
pub enum DiameterError {
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Invalid AVP: {0}")]
    InvalidAvp(String),

    #[error("Missing mandatory AVP: {0}")]
    MissingAvp(String),

    #[error("Invalid AVP value: {0}")]
    InvalidAvpValue(String),

    #[error("Buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Unknown command code: {0}")]
    UnknownCommand(u32),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not connected to peer")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diameter result type
pub type DiameterResult<T> = Result<T, DiameterError>;

/// Diameter Result-Code values (RFC 6733)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResultCode {
    // Informational (1xxx)
    MultiRoundAuth = 1001,

    // Success (2xxx)
    Success = 2001,
    LimitedSuccess = 2002,

    // Protocol Errors (3xxx)
    CommandUnsupported = 3001,
    UnableToDeliver = 3002,
    RealmNotServed = 3003,
    TooBusy = 3004,
    LoopDetected = 3005,
    RedirectIndication = 3006,
    ApplicationUnsupported = 3007,
    InvalidHdrBits = 3008,
    InvalidAvpBits = 3009,
    UnknownPeer = 3010,

    // Transient Failures (4xxx)
    AuthenticationRejected = 4001,
    OutOfSpace = 4002,
    ElectionLost = 4003,

    // Permanent Failures (5xxx)
    AvpUnsupported = 5001,
    UnknownSessionId = 5002,
    AuthorizationRejected = 5003,
    InvalidAvpValue = 5004,
    MissingAvp = 5005,
    ResourcesExceeded = 5006,
    ContradictingAvps = 5007,
    AvpNotAllowed = 5008,
    AvpOccursTooManyTimes = 5009,
    NoCommonApplication = 5010,
    UnsupportedVersion = 5011,
    UnableToComply = 5012,
    InvalidBitInHeader = 5013,
    InvalidAvpLength = 5014,
    InvalidMessageLength = 5015,
    InvalidAvpBitCombo = 5016,
    NoCommonSecurity = 5017,
}

impl ResultCode {
    /// Look up a known base result code.
    ///
    /// Unknown values yield `None`; callers must not treat them as success.
    pub fn from_code(value: u32) -> Option<Self> {
        use ResultCode::*;
        const KNOWN: &[ResultCode] = &[
            MultiRoundAuth, Success, LimitedSuccess,
            CommandUnsupported, UnableToDeliver, RealmNotServed, TooBusy, LoopDetected,
            RedirectIndication, ApplicationUnsupported, InvalidHdrBits, InvalidAvpBits,
            UnknownPeer,
            AuthenticationRejected, OutOfSpace, ElectionLost,
            AvpUnsupported, UnknownSessionId, AuthorizationRejected, InvalidAvpValue,
            MissingAvp, ResourcesExceeded, ContradictingAvps, AvpNotAllowed,
            AvpOccursTooManyTimes, NoCommonApplication, UnsupportedVersion, UnableToComply,
            InvalidBitInHeader, InvalidAvpLength, InvalidMessageLength, InvalidAvpBitCombo,
            NoCommonSecurity,
        ];
        KNOWN.iter().copied().find(|rc| *rc as u32 == value)
    }

    /// 2xxx
    pub fn is_success(&self) -> bool {
        (2000..3000).contains(&(*self as u32))
    }

    /// 3xxx
    pub fn is_protocol_error(&self) -> bool {
        (3000..4000).contains(&(*self as u32))
    }

    /// 4xxx
    pub fn is_transient_failure(&self) -> bool {
        (4000..5000).contains(&(*self as u32))
    }
}

/// 3GPP Experimental-Result-Code values used on SWx (3GPP TS 29.273 / 29.229)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ExperimentalResultCode {
    FirstRegistration = 2001,
    SubsequentRegistration = 2002,
    UserUnknown = 5001,
    IdentitiesDontMatch = 5002,
    IdentityNotRegistered = 5003,
    RoamingNotAllowed = 5004,
    IdentityAlreadyRegistered = 5005,
    AuthSchemeNotSupported = 5006,
    InAssignmentType = 5007,
    TooMuchData = 5008,
    NotSupportedUserData = 5009,
    UnknownEpsSubscription = 5420,
    UserNoNon3gppSubscription = 5450,
    UserNoApnSubscription = 5451,
    RatTypeNotAllowed = 5452,
}

impl ExperimentalResultCode {
    /// Look up a known experimental result code
    pub fn from_code(value: u32) -> Option<Self> {
        use ExperimentalResultCode::*;
        const KNOWN: &[ExperimentalResultCode] = &[
            FirstRegistration, SubsequentRegistration,
            UserUnknown, IdentitiesDontMatch, IdentityNotRegistered, RoamingNotAllowed,
            IdentityAlreadyRegistered, AuthSchemeNotSupported, InAssignmentType, TooMuchData,
            NotSupportedUserData,
            UnknownEpsSubscription, UserNoNon3gppSubscription, UserNoApnSubscription,
            RatTypeNotAllowed,
        ];
        KNOWN.iter().copied().find(|rc| *rc as u32 == value)
    }

    /// Check if result code indicates success
    pub fn is_success(&self) -> bool {
        (2000..3000).contains(&(*self as u32))
    }
}
