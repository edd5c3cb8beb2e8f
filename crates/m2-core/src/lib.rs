//! # m2-core
//!
//! Protocol building blocks for the M2 gateway, free of any transport:
//!
//! - [`frame`]: the `[u32 ts][u16 id][u8 len][payload]` device frame
//! - [`signal`]: bit-level signal extraction with scale/offset
//! - [`message`]: message descriptors and multiplexed signal resolution
//! - [`dictionary`]: signal dictionary lookup (trait + JSON-backed store)
//! - [`command`]: binary control commands sent to the device
//! - [`ledger`]: per-message reference counting of subscriptions

#![deny(unsafe_code)]

pub mod command;
pub mod dictionary;
pub mod errors;
pub mod frame;
pub mod ledger;
pub mod message;
pub mod signal;

pub use command::{Command, DISABLE_ALL_MESSAGES};
pub use dictionary::{JsonDictionary, SignalDictionary};
pub use errors::{DecodeError, DictionaryError};
pub use frame::Frame;
pub use ledger::SubscriptionLedger;
pub use message::{DecodedMessage, MessageDescriptor, SignalValue};
pub use signal::SignalDescriptor;
