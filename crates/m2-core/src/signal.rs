//! Signal descriptors and bit-level value extraction.
//!
//! Bits are numbered LSB-first: bit `n` of the payload is bit `n % 8` of byte
//! `n / 8`. A signal occupies `length` consecutive bits starting at `start`,
//! with the first bit as the least significant bit of the raw value.

use serde::{Deserialize, Serialize};

/// Maximum supported signal width.
pub const MAX_SIGNAL_BITS: u32 = 64;

/// Bit layout and scaling of a single named signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    /// Unique signal name.
    pub mnemonic: String,
    /// Owning message id. Filled in by the dictionary when loaded.
    #[serde(default)]
    pub message_id: u16,
    /// First bit of the field.
    pub start: u32,
    /// Field width in bits.
    pub length: u32,
    /// Two's complement interpretation.
    #[serde(default)]
    pub signed: bool,
    /// Multiplier applied to the raw value.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Constant added after scaling.
    #[serde(default)]
    pub offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl SignalDescriptor {
    /// Create an unscaled unsigned descriptor.
    pub fn new(mnemonic: impl Into<String>, message_id: u16, start: u32, length: u32) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            message_id,
            start,
            length,
            signed: false,
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// Builder: interpret as two's complement.
    #[must_use]
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Builder: set scale and offset.
    #[must_use]
    pub fn scaled(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Decode the physical value from a payload.
    ///
    /// Returns `NaN` when the bit window does not fit in the payload. Callers
    /// treat `NaN` as "value unavailable".
    pub fn decode(&self, payload: &[u8]) -> f64 {
        match extract_raw(payload, self.start, self.length, self.signed) {
            Some(raw) => self.offset + self.scale * raw,
            None => f64::NAN,
        }
    }
}

/// Extract a raw integer field as `f64`.
///
/// Returns `None` for a zero or over-wide length, or a window that extends
/// past the end of `data`.
pub fn extract_raw(data: &[u8], start: u32, length: u32, signed: bool) -> Option<f64> {
    if length == 0 || length > MAX_SIGNAL_BITS {
        return None;
    }
    let end = u64::from(start) + u64::from(length);
    if end > data.len() as u64 * 8 {
        return None;
    }

    let mut bits: u64 = 0;
    for i in 0..length {
        let pos = (start + i) as usize;
        let bit = (data[pos / 8] >> (pos % 8)) & 0x01;
        bits |= u64::from(bit) << i;
    }

    if signed {
        Some(sign_extend(bits, length) as f64)
    } else {
        Some(bits as f64)
    }
}

/// Sign-extend the low `length` bits of `value`.
fn sign_extend(value: u64, length: u32) -> i64 {
    if length >= 64 {
        return value as i64;
    }
    let sign_bit = 1u64 << (length - 1);
    if value & sign_bit == 0 {
        value as i64
    } else {
        (value | (!0u64 << length)) as i64
    }
}
