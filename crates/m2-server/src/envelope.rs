//! Client wire format: JSON `{event, data}` in both directions.

use std::sync::Arc;

use m2_core::SignalValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::ConnId;
use crate::errors::EnvelopeError;

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// An inbound client request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    /// Application-level ping; answered with `pong`.
    Ping,
    /// Start receiving a signal.
    Subscribe(String),
    /// Stop receiving a signal.
    Unsubscribe(String),
    /// Any other event name.
    Unrecognized(String),
}

impl ClientCommand {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let Envelope { event, data } = serde_json::from_str(text)?;
        match event.as_str() {
            "ping" => Ok(Self::Ping),
            "subscribe" | "unsubscribe" => {
                let Value::String(name) = data else {
                    return Err(EnvelopeError::MissingSignalName { event });
                };
                if event == "subscribe" {
                    Ok(Self::Subscribe(name))
                } else {
                    Ok(Self::Unsubscribe(name))
                }
            }
            _ => Ok(Self::Unrecognized(event)),
        }
    }
}

/// Device status carried by `status` events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Whether a device is connected.
    pub online: bool,
    /// Device round-trip latency in milliseconds, `0` when offline.
    pub latency: u64,
    /// Device messages in the last rate window.
    pub rate: usize,
}

/// An outbound event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Sent once on connect.
    Hello {
        /// Assigned session id.
        session: ConnId,
    },
    /// Device status.
    Status(StatusReport),
    /// Reply to `ping`; carries no data.
    Pong,
    /// One decoded value; `NaN` is sent as `null`.
    Signal(SignalValue),
}

impl ServerEvent {
    /// Serialize once for sharing across a broadcast.
    pub fn to_frame(&self) -> Option<Arc<String>> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Arc::new(json)),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize server event");
                None
            }
        }
    }
}
