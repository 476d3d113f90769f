//! RTP packet codec (RFC 3550)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            contributing source (CSRC) identifiers             |
//! |                             ....                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Parsing never fails loudly: a datagram that does not hold a well-formed
//! packet yields `None` and the caller drops it. Loss is normal on UDP.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::PacketError;

/// RTP protocol version
pub const RTP_VERSION: u8 = 2;

/// Size of the fixed RTP header in bytes
pub const RTP_HEADER_LEN: usize = 12;

/// Maximum number of CSRC identifiers (4-bit count)
pub const MAX_CSRC_COUNT: usize = 15;

/// RTP header extension (profile-defined block following the CSRC list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpExtension {
    /// Profile-specific identifier (e.g. 0xBEDE for one-byte headers)
    pub profile: u16,
    /// Extension body, a whole number of 32-bit words
    pub data: Bytes,
}

/// A single RTP packet
///
/// Immutable once built. Build outgoing packets with [`RtpPacket::new`] and
/// the `with_*` methods; inbound packets come from [`RtpPacket::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    version: u8,
    padding: bool,
    marker: bool,
    payload_type: u8,
    sequence: u16,
    timestamp: u32,
    ssrc: u32,
    csrc: Vec<u32>,
    extension: Option<RtpExtension>,
    payload: Bytes,
}

impl RtpPacket {
    /// Create a version 2 packet without padding, extension or CSRCs.
    ///
    /// Only the low 7 bits of `payload_type` are kept.
    pub fn new(
        payload_type: u8,
        sequence: u16,
        timestamp: u32,
        ssrc: u32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            marker: false,
            payload_type: payload_type & 0x7f,
            sequence,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            extension: None,
            payload: payload.into(),
        }
    }

    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    /// Request padding to the next 32-bit boundary on serialization
    pub fn with_padding(mut self, padding: bool) -> Self {
        self.padding = padding;
        self
    }

    /// Override the emitted version field (2 bits)
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version & 0x03;
        self
    }

    pub fn with_csrc(mut self, csrc: Vec<u32>) -> Result<Self, PacketError> {
        if csrc.len() > MAX_CSRC_COUNT {
            return Err(PacketError::TooManyCsrcs(csrc.len()));
        }
        self.csrc = csrc;
        Ok(self)
    }

    pub fn with_extension(
        mut self,
        profile: u16,
        data: impl Into<Bytes>,
    ) -> Result<Self, PacketError> {
        let data = data.into();
        if data.len() % 4 != 0 || data.len() / 4 > u16::MAX as usize {
            return Err(PacketError::UnalignedExtension(data.len()));
        }
        self.extension = Some(RtpExtension { profile, data });
        Ok(self)
    }

    /// Parse a datagram into a packet.
    ///
    /// Returns `None` for anything shorter than the fixed header, a version
    /// other than 2, a truncated CSRC list or extension, or an impossible
    /// padding length.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < RTP_HEADER_LEN {
            return None;
        }

        let mut buf = raw;

        let b0 = buf.get_u8();
        let version = b0 >> 6;
        if version != RTP_VERSION {
            return None;
        }
        let padding = b0 & 0x20 != 0;
        let has_extension = b0 & 0x10 != 0;
        let csrc_count = (b0 & 0x0f) as usize;

        let b1 = buf.get_u8();
        let marker = b1 & 0x80 != 0;
        let payload_type = b1 & 0x7f;

        let sequence = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        if buf.remaining() < csrc_count * 4 {
            return None;
        }
        let csrc = (0..csrc_count).map(|_| buf.get_u32()).collect();

        let extension = if has_extension {
            if buf.remaining() < 4 {
                return None;
            }
            let profile = buf.get_u16();
            let len = buf.get_u16() as usize * 4;
            if buf.remaining() < len {
                return None;
            }
            let data = Bytes::copy_from_slice(&buf[..len]);
            buf.advance(len);
            Some(RtpExtension { profile, data })
        } else {
            None
        };

        let mut payload = buf;
        if padding {
            let pad = *payload.last()? as usize;
            if pad == 0 || pad > payload.len() {
                return None;
            }
            payload = &payload[..payload.len() - pad];
        }

        Some(Self {
            version,
            padding,
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            csrc,
            extension,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Serialize into wire format
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        let mut b0 = (self.version & 0x03) << 6 | self.csrc.len() as u8;
        if self.padding {
            b0 |= 0x20;
        }
        if self.extension.is_some() {
            b0 |= 0x10;
        }
        buf.put_u8(b0);
        buf.put_u8((self.marker as u8) << 7 | self.payload_type);
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);

        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if let Some(ext) = &self.extension {
            buf.put_u16(ext.profile);
            buf.put_u16((ext.data.len() / 4) as u16);
            buf.put_slice(&ext.data);
        }

        buf.put_slice(&self.payload);

        let pad = self.padding_len();
        if pad > 0 {
            buf.put_bytes(0, pad - 1);
            buf.put_u8(pad as u8);
        }

        buf.freeze()
    }

    /// Length of the serialized packet in bytes
    pub fn encoded_len(&self) -> usize {
        self.unpadded_len() + self.padding_len()
    }

    fn unpadded_len(&self) -> usize {
        let ext_len = self
            .extension
            .as_ref()
            .map_or(0, |ext| 4 + ext.data.len());
        RTP_HEADER_LEN + self.csrc.len() * 4 + ext_len + self.payload.len()
    }

    // Padding always has at least one byte, the count itself.
    fn padding_len(&self) -> usize {
        if self.padding {
            4 - self.unpadded_len() % 4
        } else {
            0
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn has_padding(&self) -> bool {
        self.padding
    }

    pub fn has_extension(&self) -> bool {
        self.extension.is_some()
    }

    pub fn csrc_count(&self) -> u8 {
        self.csrc.len() as u8
    }

    pub fn marker(&self) -> bool {
        self.marker
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn csrc(&self) -> &[u32] {
        &self.csrc
    }

    pub fn extension(&self) -> Option<&RtpExtension> {
        self.extension.as_ref()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}
