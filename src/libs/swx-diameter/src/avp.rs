//! Diameter AVPs (RFC 6733 section 4)
//!
//! Header: code (32), flags (8), length (24), optional Vendor-Id (32) when
//! the V bit is set. Data is padded to a 4-byte boundary; the length field
//! excludes the padding.
//!
//! Decoding is lazy: received AVPs carry [`AvpData::Raw`] and are interpreted
//! by the typed accessors, so the decoder needs no dictionary. Grouped AVPs are
//! expanded on demand with [`Avp::children`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::IpAddr;

use crate::error::{DiameterError, DiameterResult};

/// AVP flag bits
pub mod avp_flags {
    pub const VENDOR: u8 = 0x80;
    pub const MANDATORY: u8 = 0x40;
}

/// AVP header size without vendor ID
pub const AVP_HEADER_SIZE: usize = 8;
/// AVP header size with vendor ID
pub const AVP_HEADER_SIZE_VENDOR: usize = 12;

fn header_len_for(flags: u8) -> usize {
    if flags & avp_flags::VENDOR != 0 {
        AVP_HEADER_SIZE_VENDOR
    } else {
        AVP_HEADER_SIZE
    }
}

/// Bytes of zero padding after `len` bytes of data
fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

#[derive(Debug, Clone)]
pub struct Avp {
    pub code: u32,
    pub flags: u8,
    /// Present iff the V bit is set
    pub vendor_id: Option<u32>,
    pub data: AvpData,
}

/// AVP data types used on the SWx interface
#[derive(Debug, Clone)]
pub enum AvpData {
    OctetString(Bytes),
    Unsigned32(u32),
    /// Integer32 on the wire
    Enumerated(i32),
    Address(IpAddr),
    Utf8String(String),
    DiameterIdentity(String),
    Grouped(Vec<Avp>),
    /// Undecoded payload of a received AVP
    Raw(Bytes),
}

impl Avp {
    pub fn new(code: u32, flags: u8, vendor_id: Option<u32>, data: AvpData) -> Self {
        Self {
            code,
            flags,
            vendor_id,
            data,
        }
    }

    /// Base protocol AVP with the M bit
    pub fn mandatory(code: u32, data: AvpData) -> Self {
        Self::new(code, avp_flags::MANDATORY, None, data)
    }

    /// Vendor AVP with the V and M bits
    pub fn vendor_mandatory(code: u32, vendor_id: u32, data: AvpData) -> Self {
        Self::new(code, avp_flags::VENDOR | avp_flags::MANDATORY, Some(vendor_id), data)
    }

    pub fn is_vendor_specific(&self) -> bool {
        self.flags & avp_flags::VENDOR != 0
    }

    pub fn is_mandatory(&self) -> bool {
        self.flags & avp_flags::MANDATORY != 0
    }

    /// Length on the wire, padding included
    pub fn encoded_len(&self) -> usize {
        let len = header_len_for(self.flags) + self.data.encoded_len();
        len + padding(len)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let data_len = self.data.encoded_len();
        let avp_len = header_len_for(self.flags) + data_len;

        buf.put_u32(self.code);
        buf.put_u8(self.flags);
        buf.put_uint(avp_len as u64, 3);
        if let Some(vendor_id) = self.vendor_id {
            buf.put_u32(vendor_id);
        }
        self.data.encode(buf);
        buf.put_bytes(0, padding(data_len));
    }

    pub fn decode(buf: &mut Bytes) -> DiameterResult<Self> {
        let need = |needed: usize, buf: &Bytes| -> DiameterResult<()> {
            if buf.remaining() < needed {
                return Err(DiameterError::BufferTooSmall {
                    needed,
                    available: buf.remaining(),
                });
            }
            Ok(())
        };

        need(AVP_HEADER_SIZE, buf)?;
        let code = buf.get_u32();
        let flags = buf.get_u8();
        let avp_len = buf.get_uint(3) as usize;

        let header_len = header_len_for(flags);
        if avp_len < header_len {
            return Err(DiameterError::InvalidAvp(format!(
                "AVP {code} length {avp_len} is shorter than its {header_len} byte header"
            )));
        }

        let vendor_id = if header_len == AVP_HEADER_SIZE_VENDOR {
            need(4, buf)?;
            Some(buf.get_u32())
        } else {
            None
        };

        let data_len = avp_len - header_len;
        need(data_len, buf)?;
        let data = buf.copy_to_bytes(data_len);

        // The last AVP of a message may omit its padding
        buf.advance(padding(data_len).min(buf.remaining()));

        Ok(Self {
            code,
            flags,
            vendor_id,
            data: AvpData::Raw(data),
        })
    }

    /// OctetString view; raw payloads are returned unchanged
    pub fn as_octet_string(&self) -> Option<&Bytes> {
        match &self.data {
            AvpData::OctetString(b) | AvpData::Raw(b) => Some(b),
            _ => None,
        }
    }

    /// Unsigned32 view (Enumerated values are reinterpreted)
    pub fn as_u32(&self) -> Option<u32> {
        match &self.data {
            AvpData::Unsigned32(v) => Some(*v),
            AvpData::Enumerated(v) => Some(*v as u32),
            AvpData::Raw(b) if b.len() == 4 => {
                let mut buf = b.clone();
                Some(buf.get_u32())
            }
            _ => None,
        }
    }

    /// Get data as Enumerated / Integer32
    pub fn as_i32(&self) -> Option<i32> {
        match &self.data {
            AvpData::Enumerated(v) => Some(*v),
            AvpData::Unsigned32(v) => Some(*v as i32),
            AvpData::Raw(b) if b.len() == 4 => {
                let mut buf = b.clone();
                Some(buf.get_i32())
            }
            _ => None,
        }
    }

    pub fn as_utf8_string(&self) -> Option<&str> {
        match &self.data {
            AvpData::Utf8String(s) | AvpData::DiameterIdentity(s) => Some(s),
            AvpData::Raw(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Expand a Grouped AVP into its members.
    ///
    /// Locally built AVPs are returned as-is; received AVPs are decoded from
    /// their raw payload.
    pub fn children(&self) -> DiameterResult<Vec<Avp>> {
        match &self.data {
            AvpData::Grouped(avps) => Ok(avps.clone()),
            AvpData::Raw(b) => {
                let mut buf = b.clone();
                let mut avps = Vec::new();
                while buf.has_remaining() {
                    avps.push(Avp::decode(&mut buf)?);
                }
                Ok(avps)
            }
            _ => Err(DiameterError::InvalidAvpValue(format!(
                "AVP {} is not grouped",
                self.code
            ))),
        }
    }
}

impl AvpData {
    /// Data length, padding excluded
    pub fn encoded_len(&self) -> usize {
        match self {
            AvpData::OctetString(b) | AvpData::Raw(b) => b.len(),
            AvpData::Unsigned32(_) | AvpData::Enumerated(_) => 4,
            AvpData::Address(IpAddr::V4(_)) => 6,
            AvpData::Address(IpAddr::V6(_)) => 18,
            AvpData::Utf8String(s) | AvpData::DiameterIdentity(s) => s.len(),
            AvpData::Grouped(avps) => avps.iter().map(|a| a.encoded_len()).sum(),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            AvpData::OctetString(b) | AvpData::Raw(b) => buf.put_slice(b),
            AvpData::Unsigned32(v) => buf.put_u32(*v),
            AvpData::Enumerated(v) => buf.put_i32(*v),
            AvpData::Address(IpAddr::V4(v4)) => {
                buf.put_u16(1);
                buf.put_slice(&v4.octets());
            }
            AvpData::Address(IpAddr::V6(v6)) => {
                buf.put_u16(2);
                buf.put_slice(&v6.octets());
            }
            AvpData::Utf8String(s) | AvpData::DiameterIdentity(s) => buf.put_slice(s.as_bytes()),
            AvpData::Grouped(avps) => {
                for avp in avps {
                    avp.encode(buf);
                }
            }
        }
    }
}

/// First AVP with `code`
pub fn find_avp(avps: &[Avp], code: u32) -> Option<&Avp> {
    avps.iter().find(|a| a.code == code)
}

fn is_vendor_avp(avp: &Avp, code: u32, vendor_id: u32) -> bool {
    avp.code == code && avp.vendor_id == Some(vendor_id)
}

/// First vendor AVP with `code`
pub fn find_vendor_avp(avps: &[Avp], code: u32, vendor_id: u32) -> Option<&Avp> {
    avps.iter().find(|a| is_vendor_avp(a, code, vendor_id))
}

/// Every vendor AVP with `code`, in message order
pub fn find_all_vendor_avps(avps: &[Avp], code: u32, vendor_id: u32) -> Vec<&Avp> {
    avps.iter().filter(|a| is_vendor_avp(a, code, vendor_id)).collect()
}
