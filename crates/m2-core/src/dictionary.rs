//! Signal dictionary: message layouts by id, signal layouts by name.
//!
//! The gateway only depends on [`SignalDictionary`]. [`JsonDictionary`] is the
//! bundled implementation, loaded once at startup from a JSON file:
//!
//! ```json
//! {
//!   "messages": [
//!     {
//!       "id": 10,
//!       "mnemonic": "VCFRONT_status",
//!       "signals": [{ "mnemonic": "VCFRONT_speed", "start": 0, "length": 16, "scale": 0.1 }],
//!       "multiplexor": { "mnemonic": "VCFRONT_mux", "start": 16, "length": 2 },
//!       "multiplexed": { "0": [{ "mnemonic": "VCFRONT_temp", "start": 24, "length": 8, "signed": true }] }
//!     }
//!   ]
//! }
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::errors::{DictionaryError, Result};
use crate::message::MessageDescriptor;
use crate::signal::SignalDescriptor;

/// Lookup service for decode layouts.
pub trait SignalDictionary: Send + Sync {
    /// Layout of a message, by CAN id.
    fn message(&self, id: u16) -> Option<&MessageDescriptor>;

    /// Layout of a signal, by mnemonic. The descriptor's `message_id` names
    /// its owning message.
    fn signal(&self, mnemonic: &str) -> Option<&SignalDescriptor>;
}

#[derive(Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    messages: Vec<MessageDescriptor>,
}

/// In-memory dictionary built from JSON.
#[derive(Clone, Debug, Default)]
pub struct JsonDictionary {
    messages: HashMap<u16, MessageDescriptor>,
    signals: HashMap<String, SignalDescriptor>,
}

impl JsonDictionary {
    /// A dictionary with no messages.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(?path, "loading signal dictionary");
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: DictionaryFile = serde_json::from_str(json)?;
        Self::from_messages(file.messages)
    }

    /// Build from message descriptors.
    ///
    /// Every signal's `message_id` is set to its owning message. Duplicate
    /// message ids or signal mnemonics are rejected.
    pub fn from_messages(messages: Vec<MessageDescriptor>) -> Result<Self> {
        let mut dict = Self::default();
        for mut message in messages {
            let id = message.id;
            for signal in message
                .signals
                .iter_mut()
                .chain(message.multiplexor.iter_mut())
                .chain(message.multiplexed.values_mut().flatten())
            {
                signal.message_id = id;
            }

            for signal in message.all_signals() {
                match dict.signals.entry(signal.mnemonic.clone()) {
                    Entry::Occupied(_) => {
                        return Err(DictionaryError::DuplicateSignal(signal.mnemonic.clone()));
                    }
                    Entry::Vacant(slot) => {
                        let _ = slot.insert(signal.clone());
                    }
                }
            }

            if dict.messages.insert(id, message).is_some() {
                return Err(DictionaryError::Invalid(format!("duplicate message id {id}")));
            }
        }
        debug!(
            messages = dict.messages.len(),
            signals = dict.signals.len(),
            "signal dictionary ready"
        );
        Ok(dict)
    }

    /// Number of messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Number of addressable signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }
}

impl SignalDictionary for JsonDictionary {
    fn message(&self, id: u16) -> Option<&MessageDescriptor> {
        self.messages.get(&id)
    }

    fn signal(&self, mnemonic: &str) -> Option<&SignalDescriptor> {
        self.signals.get(mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "messages": [
            {
                "id": 10,
                "mnemonic": "VCFRONT_status",
                "signals": [
                    {"mnemonic": "A", "start": 0, "length": 8},
                    {"mnemonic": "B", "start": 8, "length": 8, "scale": 0.5}
                ]
            },
            {
                "id": 20,
                "mnemonic": "BMS_info",
                "multiplexor": {"mnemonic": "BMS_mux", "start": 0, "length": 2},
                "multiplexed": {
                    "0": [{"mnemonic": "BMS_voltage", "start": 8, "length": 16}],
                    "1": [{"mnemonic": "BMS_temp", "start": 8, "length": 8, "signed": true}]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_messages_and_signals() {
        let dict = JsonDictionary::from_json_str(SAMPLE).unwrap();
        assert_eq!(dict.message_count(), 2);
        assert_eq!(dict.signal_count(), 5);
        assert_eq!(dict.message(10).unwrap().mnemonic, "VCFRONT_status");
        assert!(dict.message(99).is_none());
    }

    #[test]
    fn signals_carry_owning_message_id() {
        let dict = JsonDictionary::from_json_str(SAMPLE).unwrap();
        assert_eq!(dict.signal("A").unwrap().message_id, 10);
        assert_eq!(dict.signal("B").unwrap().message_id, 10);
        assert_eq!(dict.signal("BMS_mux").unwrap().message_id, 20);
        assert_eq!(dict.signal("BMS_temp").unwrap().message_id, 20);
        assert!(dict.signal("nope").is_none());
    }

    #[test]
    fn message_signals_are_stamped_too() {
        let dict = JsonDictionary::from_json_str(SAMPLE).unwrap();
        let msg = dict.message(20).unwrap();
        assert!(msg.all_signals().all(|s| s.message_id == 20));
    }

    #[test]
    fn duplicate_signal_rejected() {
        let json = r#"{"messages": [
            {"id": 1, "mnemonic": "M1", "signals": [{"mnemonic": "X", "start": 0, "length": 8}]},
            {"id": 2, "mnemonic": "M2", "signals": [{"mnemonic": "X", "start": 0, "length": 8}]}
        ]}"#;
        let err = JsonDictionary::from_json_str(json).unwrap_err();
        assert!(matches!(err, DictionaryError::DuplicateSignal(name) if name == "X"));
    }

    #[test]
    fn duplicate_message_rejected() {
        let json = r#"{"messages": [
            {"id": 1, "mnemonic": "M1"},
            {"id": 1, "mnemonic": "M1b"}
        ]}"#;
        let err = JsonDictionary::from_json_str(json).unwrap_err();
        assert!(matches!(err, DictionaryError::Invalid(_)));
    }

    #[test]
    fn invalid_json_rejected() {
        let err = JsonDictionary::from_json_str("not json").unwrap_err();
        assert!(matches!(err, DictionaryError::Json(_)));
    }

    #[test]
    fn empty_object_is_empty_dictionary() {
        let dict = JsonDictionary::from_json_str("{}").unwrap();
        assert_eq!(dict.message_count(), 0);
        assert!(dict.message(10).is_none());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("definitions.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let dict = JsonDictionary::load(&path).unwrap();
        assert_eq!(dict.message_count(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = JsonDictionary::load(Path::new("/nonexistent/definitions.json")).unwrap_err();
        assert!(matches!(err, DictionaryError::Io(_)));
    }
}
