//! Message descriptors and multiplexed signal resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::signal::SignalDescriptor;

/// Decode layout of one CAN message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    /// CAN message identifier.
    pub id: u16,
    /// Message name.
    pub mnemonic: String,
    /// Signals present in every frame of this message.
    #[serde(default)]
    pub signals: Vec<SignalDescriptor>,
    /// Selector signal for multiplexed messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplexor: Option<SignalDescriptor>,
    /// Additional signal sets keyed by multiplexor value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub multiplexed: BTreeMap<i64, Vec<SignalDescriptor>>,
}

/// One named engineering value decoded from a frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignalValue {
    /// Signal name.
    pub mnemonic: String,
    /// Physical value; `NaN` (serialized as `null`) when unavailable.
    pub value: f64,
}

/// Result of decoding a payload against a [`MessageDescriptor`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedMessage {
    /// Values in decode order: base signals, multiplexor, multiplexed set.
    pub values: Vec<SignalValue>,
    /// Multiplexor value that had no signal set in the descriptor.
    pub unmapped_multiplexor: Option<f64>,
}

impl MessageDescriptor {
    /// Create a plain (non-multiplexed) descriptor.
    pub fn new(id: u16, mnemonic: impl Into<String>, signals: Vec<SignalDescriptor>) -> Self {
        Self {
            id,
            mnemonic: mnemonic.into(),
            signals,
            multiplexor: None,
            multiplexed: BTreeMap::new(),
        }
    }

    /// Every signal this message can produce, including all multiplexed sets.
    pub fn all_signals(&self) -> impl Iterator<Item = &SignalDescriptor> {
        self.signals
            .iter()
            .chain(self.multiplexor.iter())
            .chain(self.multiplexed.values().flatten())
    }

    /// Decode all applicable signals from a payload.
    ///
    /// Base signals are always decoded. For multiplexed messages the
    /// multiplexor is decoded and emitted, then used to pick the additional
    /// set. An unmapped or non-integral selector leaves only the base signals
    /// and the multiplexor, and is reported in
    /// [`DecodedMessage::unmapped_multiplexor`].
    pub fn decode(&self, payload: &[u8]) -> DecodedMessage {
        let mut decoded = DecodedMessage {
            values: self.signals.iter().map(|s| decode_one(s, payload)).collect(),
            unmapped_multiplexor: None,
        };

        let Some(mux) = &self.multiplexor else {
            return decoded;
        };
        let selector = mux.decode(payload);
        decoded.values.push(SignalValue {
            mnemonic: mux.mnemonic.clone(),
            value: selector,
        });

        match multiplex_key(selector).and_then(|key| self.multiplexed.get(&key)) {
            Some(set) => decoded
                .values
                .extend(set.iter().map(|s| decode_one(s, payload))),
            None => decoded.unmapped_multiplexor = Some(selector),
        }
        decoded
    }
}

fn decode_one(signal: &SignalDescriptor, payload: &[u8]) -> SignalValue {
    SignalValue {
        mnemonic: signal.mnemonic.clone(),
        value: signal.decode(payload),
    }
}

/// Map a decoded selector onto a table key; only finite integral values match.
fn multiplex_key(selector: f64) -> Option<i64> {
    (selector.is_finite() && selector.fract() == 0.0).then_some(selector as i64)
}
