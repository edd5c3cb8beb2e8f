//! Inbound device frame.
//!
//! Wire layout (all little-endian):
//!
//! ```text
//! [u32 timestamp][u16 message id][u8 length][length bytes payload]
//! ```
//!
//! Only the header length is validated. A payload shorter than the declared
//! length is returned as-is; trailing bytes past the declared length are
//! ignored.

use bytes::{BufMut, Bytes, BytesMut};

use crate::errors::DecodeError;

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 7;

/// A decoded device frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Device timestamp.
    pub timestamp: u32,
    /// CAN message identifier.
    pub message_id: u16,
    /// Raw payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Parse a raw binary device message.
    ///
    /// The payload is a zero-copy slice of `raw`.
    pub fn decode(raw: &Bytes) -> Result<Self, DecodeError> {
        if raw.len() < HEADER_LEN {
            return Err(DecodeError::Truncated {
                len: raw.len(),
                min: HEADER_LEN,
            });
        }
        let timestamp = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let message_id = u16::from_le_bytes([raw[4], raw[5]]);
        let declared = usize::from(raw[6]);
        let end = (HEADER_LEN + declared).min(raw.len());
        Ok(Self {
            timestamp,
            message_id,
            payload: raw.slice(HEADER_LEN..end),
        })
    }

    /// Serialize back to the wire layout.
    ///
    /// Payloads longer than 255 bytes are cut at 255, the maximum the length
    /// byte can declare.
    pub fn encode(&self) -> Bytes {
        let len = self.payload.len().min(usize::from(u8::MAX));
        let mut buf = BytesMut::with_capacity(HEADER_LEN + len);
        buf.put_u32_le(self.timestamp);
        buf.put_u16_le(self.message_id);
        buf.put_u8(len as u8);
        buf.put_slice(&self.payload[..len]);
        buf.freeze()
    }
}
