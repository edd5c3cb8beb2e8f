//! Per-connection state owned by the reactor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::metrics::SEND_DROPS_TOTAL;

/// Session id, assigned after authorization and strictly increasing.
pub type ConnId = u64;

/// Which session an upgrade path selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The M2 transceiver.
    Device,
    /// A live-data subscriber.
    Client,
}

impl Role {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frame queued for the socket writer task.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    /// JSON event, shared across a broadcast.
    Text(Arc<String>),
    /// Device command bytes.
    Binary(Bytes),
    /// WebSocket ping control frame.
    Ping,
}

/// A connected WebSocket, device or client.
pub struct Connection {
    /// Session id.
    pub id: ConnId,
    /// Session role.
    pub role: Role,
    tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
    connected_at: Instant,
    ping_sent_at: Option<Instant>,
    latency: Duration,
    dropped: u64,
}

impl Connection {
    /// Wrap the writer queue and termination token of a socket.
    pub fn new(
        id: ConnId,
        role: Role,
        tx: mpsc::Sender<Outbound>,
        cancel: CancellationToken,
        now: Instant,
    ) -> Self {
        Self {
            id,
            role,
            tx,
            cancel,
            connected_at: now,
            ping_sent_at: None,
            latency: Duration::ZERO,
            dropped: 0,
        }
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `false` if the queue is full or the writer is gone; the frame
    /// is dropped and counted.
    pub fn send(&mut self, frame: Outbound) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                metrics::counter!(SEND_DROPS_TOTAL).increment(1);
                warn!(
                    conn_id = self.id,
                    role = %self.role,
                    dropped = self.dropped,
                    "send queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped += 1;
                metrics::counter!(SEND_DROPS_TOTAL).increment(1);
                false
            }
        }
    }

    /// Queue a JSON text frame.
    pub fn send_text(&mut self, text: Arc<String>) -> bool {
        self.send(Outbound::Text(text))
    }

    /// Whether the socket is still open and not terminated.
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }

    /// Drop the socket without a close handshake.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Ping sent at `now`, if none is outstanding. Returns whether one was sent.
    pub fn begin_ping(&mut self, now: Instant) -> bool {
        if self.ping_sent_at.is_some() {
            return false;
        }
        self.ping_sent_at = Some(now);
        let _ = self.send(Outbound::Ping);
        true
    }

    /// Age of the outstanding ping, refreshing the latency estimate.
    pub fn refresh_latency(&mut self, now: Instant) -> Option<Duration> {
        let sent = self.ping_sent_at?;
        self.latency = now.saturating_duration_since(sent);
        Some(self.latency)
    }

    /// Record a pong: latency is the round trip and the ping is cleared.
    ///
    /// An unsolicited pong leaves the latency unchanged.
    pub fn record_pong(&mut self, now: Instant) -> Option<Duration> {
        let sent = self.ping_sent_at.take()?;
        self.latency = now.saturating_duration_since(sent);
        Some(self.latency)
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Last measured latency (zero before the first measurement).
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("live", &self.is_live())
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}
