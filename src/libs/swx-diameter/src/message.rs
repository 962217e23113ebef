//! Diameter messages (RFC 6733 section 3)
//!
//! A message is a fixed 20 byte header followed by AVPs. Length and
//! Command-Code are 24-bit fields; everything else is byte or word aligned.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::avp::Avp;
use crate::common::{avp_code, ExperimentalResult};
use crate::error::{DiameterError, DiameterResult};
use crate::DIAMETER_VERSION;

/// Diameter message header size
pub const DIAMETER_HEADER_SIZE: usize = 20;

/// Command flag bits
pub mod cmd_flags {
    pub const REQUEST: u8 = 0x80;
    pub const PROXIABLE: u8 = 0x40;
    pub const ERROR: u8 = 0x20;
    /// Potentially re-transmitted
    pub const RETRANSMIT: u8 = 0x10;
}

/// Diameter message header
#[derive(Debug, Clone)]
pub struct DiameterHeader {
    pub version: u8,
    /// Total message length, header included
    pub length: u32,
    pub flags: u8,
    pub command_code: u32,
    pub application_id: u32,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
}

impl DiameterHeader {
    fn with_flags(flags: u8, command_code: u32, application_id: u32) -> Self {
        Self {
            version: DIAMETER_VERSION,
            length: DIAMETER_HEADER_SIZE as u32,
            flags,
            command_code,
            application_id,
            hop_by_hop_id: 0,
            end_to_end_id: 0,
        }
    }

    /// Proxiable request header; identifiers are assigned when sent
    pub fn new_request(command_code: u32, application_id: u32) -> Self {
        Self::with_flags(
            cmd_flags::REQUEST | cmd_flags::PROXIABLE,
            command_code,
            application_id,
        )
    }

    /// Answer header echoing the request's command, application,
    /// identifiers and P bit
    pub fn new_answer(request: &DiameterHeader) -> Self {
        Self {
            hop_by_hop_id: request.hop_by_hop_id,
            end_to_end_id: request.end_to_end_id,
            ..Self::with_flags(
                request.flags & cmd_flags::PROXIABLE,
                request.command_code,
                request.application_id,
            )
        }
    }

    fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn is_request(&self) -> bool {
        self.has_flag(cmd_flags::REQUEST)
    }

    pub fn is_answer(&self) -> bool {
        !self.is_request()
    }

    /// 'E' bit: protocol error answer
    pub fn is_error(&self) -> bool {
        self.has_flag(cmd_flags::ERROR)
    }

    pub fn set_error(&mut self) {
        self.flags |= cmd_flags::ERROR;
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_uint(u64::from(self.length), 3);
        buf.put_u8(self.flags);
        buf.put_uint(u64::from(self.command_code), 3);
        buf.put_u32(self.application_id);
        buf.put_u32(self.hop_by_hop_id);
        buf.put_u32(self.end_to_end_id);
    }

    pub fn decode(buf: &mut Bytes) -> DiameterResult<Self> {
        if buf.remaining() < DIAMETER_HEADER_SIZE {
            return Err(DiameterError::BufferTooSmall {
                needed: DIAMETER_HEADER_SIZE,
                available: buf.remaining(),
            });
        }

        let version = buf.get_u8();
        if version != DIAMETER_VERSION {
            return Err(DiameterError::Protocol(format!(
                "unsupported Diameter version {version}"
            )));
        }
        let length = buf.get_uint(3) as u32;
        if (length as usize) < DIAMETER_HEADER_SIZE {
            return Err(DiameterError::InvalidMessage(format!(
                "message length {length} is shorter than the header"
            )));
        }
        let flags = buf.get_u8();
        let command_code = buf.get_uint(3) as u32;

        Ok(Self {
            version,
            length,
            flags,
            command_code,
            application_id: buf.get_u32(),
            hop_by_hop_id: buf.get_u32(),
            end_to_end_id: buf.get_u32(),
        })
    }
}

/// Diameter message (header + AVPs)
#[derive(Debug, Clone)]
pub struct DiameterMessage {
    /// Message header
    pub header: DiameterHeader,
    /// AVPs
    pub avps: Vec<Avp>,
}

impl DiameterMessage {
    /// Create a new request message
    pub fn new_request(command_code: u32, application_id: u32) -> Self {
        Self {
            header: DiameterHeader::new_request(command_code, application_id),
            avps: Vec::new(),
        }
    }

    /// Create a new answer message from a request
    pub fn new_answer(request: &DiameterMessage) -> Self {
        Self {
            header: DiameterHeader::new_answer(&request.header),
            avps: Vec::new(),
        }
    }

    /// Add an AVP to the message
    pub fn add_avp(&mut self, avp: Avp) {
        self.avps.push(avp);
    }

    /// Find an AVP by code
    pub fn find_avp(&self, code: u32) -> Option<&Avp> {
        crate::avp::find_avp(&self.avps, code)
    }

    /// Find an AVP by code and vendor ID
    pub fn find_vendor_avp(&self, code: u32, vendor_id: u32) -> Option<&Avp> {
        crate::avp::find_vendor_avp(&self.avps, code, vendor_id)
    }

    /// Calculate the total message length
    pub fn calculate_length(&self) -> u32 {
        let avp_len: usize = self.avps.iter().map(|a| a.encoded_len()).sum();
        (DIAMETER_HEADER_SIZE + avp_len) as u32
    }

    /// Encode message to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.calculate_length() as usize);

        let mut header = self.header.clone();
        header.length = self.calculate_length();
        header.encode(&mut buf);

        for avp in &self.avps {
            avp.encode(&mut buf);
        }

        buf
    }

    /// Decode message from bytes
    pub fn decode(buf: &mut Bytes) -> DiameterResult<Self> {
        let header = DiameterHeader::decode(buf)?;

        let avp_len = header.length as usize - DIAMETER_HEADER_SIZE;
        if buf.remaining() < avp_len {
            return Err(DiameterError::BufferTooSmall {
                needed: avp_len,
                available: buf.remaining(),
            });
        }

        let mut avp_buf = buf.copy_to_bytes(avp_len);
        let mut avps = Vec::new();
        while avp_buf.has_remaining() {
            avps.push(Avp::decode(&mut avp_buf)?);
        }

        Ok(Self { header, avps })
    }

    /// Get Session-Id AVP value
    pub fn session_id(&self) -> Option<&str> {
        self.find_avp(avp_code::SESSION_ID)?.as_utf8_string()
    }

    /// Get Origin-Host AVP value
    pub fn origin_host(&self) -> Option<&str> {
        self.find_avp(avp_code::ORIGIN_HOST)?.as_utf8_string()
    }

    /// Get Origin-Realm AVP value
    pub fn origin_realm(&self) -> Option<&str> {
        self.find_avp(avp_code::ORIGIN_REALM)?.as_utf8_string()
    }

    /// Get Result-Code AVP value
    pub fn result_code(&self) -> Option<u32> {
        self.find_avp(avp_code::RESULT_CODE)?.as_u32()
    }

    /// Get User-Name AVP value
    pub fn user_name(&self) -> Option<&str> {
        self.find_avp(avp_code::USER_NAME)?.as_utf8_string()
    }

    /// Get the grouped Experimental-Result AVP, if present
    pub fn experimental_result(&self) -> DiameterResult<Option<ExperimentalResult>> {
        let Some(avp) = self.find_avp(avp_code::EXPERIMENTAL_RESULT) else {
            return Ok(None);
        };
        let children = avp.children()?;
        let code = crate::avp::find_avp(&children, avp_code::EXPERIMENTAL_RESULT_CODE)
            .and_then(|a| a.as_u32())
            .ok_or_else(|| DiameterError::MissingAvp("Experimental-Result-Code".into()))?;
        let vendor_id = crate::avp::find_avp(&children, avp_code::VENDOR_ID)
            .and_then(|a| a.as_u32())
            .unwrap_or(0);
        Ok(Some(ExperimentalResult {
            vendor_id,
            experimental_result_code: code,
        }))
    }
}

/// Base Diameter command codes (RFC 6733)
pub mod base_cmd {
    /// Capabilities-Exchange-Request/Answer
    pub const CAPABILITIES_EXCHANGE: u32 = 257;
    /// Device-Watchdog-Request/Answer
    pub const DEVICE_WATCHDOG: u32 = 280;
    /// Disconnect-Peer-Request/Answer
    pub const DISCONNECT_PEER: u32 = 282;
}

/// Base Diameter application ID
pub const BASE_APPLICATION_ID: u32 = 0;
