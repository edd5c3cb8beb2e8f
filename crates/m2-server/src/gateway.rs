//! Gateway state and event handlers.
//!
//! One [`Gateway`] holds the connection table, the device slot, the
//! subscription ledger and the rate window. It is owned by the reactor task,
//! so every handler runs to completion before the next event is looked at and
//! none of this state needs a lock. Handlers take the current time as an
//! argument.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use m2_core::command::{disable_message, enable_message};
use m2_core::{
    Command, DecodeError, Frame, SignalDictionary, SubscriptionLedger, DISABLE_ALL_MESSAGES,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::connection::{ConnId, Connection, Outbound, Role};
use crate::envelope::{ClientCommand, ServerEvent, StatusReport};
use crate::metrics::{
    CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DEVICE_COMMANDS_TOTAL, DEVICE_RATE,
    FRAMES_DROPPED_TOTAL, FRAMES_RECEIVED_TOTAL, LIVENESS_TERMINATIONS_TOTAL,
    SIGNALS_BROADCAST_TOTAL,
};
use crate::rate::RateWindow;

/// Counters published by the reactor for the HTTP side (`/health`).
#[derive(Debug, Default)]
pub struct GatewayStats {
    connections: AtomicUsize,
    device_online: AtomicBool,
    rate: AtomicUsize,
}

impl GatewayStats {
    /// Open connections, device included.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Whether the device slot is filled.
    pub fn device_online(&self) -> bool {
        self.device_online.load(Ordering::Relaxed)
    }

    /// Device messages in the last rate window.
    pub fn rate(&self) -> usize {
        self.rate.load(Ordering::Relaxed)
    }
}

/// All mutable gateway state.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    dictionary: Arc<dyn SignalDictionary>,
    connections: BTreeMap<ConnId, Connection>,
    device: Option<ConnId>,
    ledger: SubscriptionLedger,
    rate: RateWindow,
    stats: Arc<GatewayStats>,
}

impl Gateway {
    /// Empty gateway: no connections, no device.
    pub fn new(
        config: Arc<GatewayConfig>,
        dictionary: Arc<dyn SignalDictionary>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        let rate = RateWindow::new(config.rate_window);
        Self {
            config,
            dictionary,
            connections: BTreeMap::new(),
            device: None,
            ledger: SubscriptionLedger::new(),
            rate,
            stats,
        }
    }

    // ── Connection lifecycle ────────────────────────────────────────────

    /// Register a freshly upgraded connection.
    pub fn open(&mut self, conn: Connection) {
        metrics::counter!(CONNECTIONS_TOTAL, "role" => conn.role.as_str()).increment(1);
        match conn.role {
            Role::Device => self.open_device(conn),
            Role::Client => self.open_client(conn),
        }
        metrics::gauge!(CONNECTIONS_ACTIVE).set(self.connections.len() as f64);
    }

    fn open_device(&mut self, conn: Connection) {
        let id = conn.id;
        info!(conn_id = id, "new device connection");
        let _ = self.connections.insert(id, conn);

        match self.device.replace(id) {
            Some(prev) => {
                warn!(conn_id = prev, replaced_by = id, "terminating device due to new connection");
                if let Some(old) = self.connections.get(&prev) {
                    old.terminate();
                }
            }
            None => {
                let status = ServerEvent::Status(self.status());
                let _ = self.broadcast(&status);
            }
        }
    }

    fn open_client(&mut self, mut conn: Connection) {
        let id = conn.id;
        info!(conn_id = id, "new client connection");
        if let Some(hello) = (ServerEvent::Hello { session: id }).to_frame() {
            let _ = conn.send_text(hello);
        }
        let _ = self.connections.insert(id, conn);
    }

    /// Remove a closed connection.
    pub fn on_close(&mut self, id: ConnId) {
        let Some(conn) = self.connections.remove(&id) else {
            return;
        };
        metrics::gauge!(CONNECTIONS_ACTIVE).set(self.connections.len() as f64);
        info!(
            conn_id = id,
            role = %conn.role,
            age_secs = conn.age().as_secs(),
            dropped = conn.drop_count(),
            "connection closed"
        );

        match conn.role {
            Role::Device => {
                if self.device == Some(id) {
                    self.device = None;
                    let status = ServerEvent::Status(self.status());
                    let _ = self.broadcast(&status);
                }
            }
            Role::Client => {
                if self.device.is_some() && self.connections.len() == 1 {
                    info!("last client gone, disabling all device messages");
                    let _ = self.send_to_device(
                        Bytes::from_static(&DISABLE_ALL_MESSAGES),
                        Command::disable_all().name(),
                    );
                    self.ledger.clear();
                }
            }
        }
    }

    // ── Inbound traffic ─────────────────────────────────────────────────

    /// Binary message from a socket.
    pub fn on_binary(&mut self, id: ConnId, data: &Bytes, now: Instant) {
        match self.connections.get(&id) {
            Some(conn) if conn.role == Role::Device && conn.is_live() => {
                self.on_device_frame(data, now);
            }
            Some(conn) => {
                debug!(conn_id = id, role = %conn.role, len = data.len(), "ignoring binary message");
            }
            None => {}
        }
    }

    fn on_device_frame(&mut self, data: &Bytes, now: Instant) {
        self.rate.record(now);
        metrics::counter!(FRAMES_RECEIVED_TOTAL).increment(1);

        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(e) => return drop_frame(&e),
        };
        let Some(message) = self.dictionary.message(frame.message_id) else {
            return drop_frame(&DecodeError::UnknownMessage(frame.message_id));
        };

        let decoded = message.decode(&frame.payload);
        if let Some(selector) = decoded.unmapped_multiplexor {
            warn!(
                message_id = frame.message_id,
                mnemonic = %message.mnemonic,
                selector,
                "no multiplexed signals for selector"
            );
        }

        metrics::counter!(SIGNALS_BROADCAST_TOTAL).increment(decoded.values.len() as u64);
        for value in decoded.values {
            let _ = self.broadcast(&ServerEvent::Signal(value));
        }
    }

    /// Text message from a socket.
    pub fn on_text(&mut self, id: ConnId, text: &str) {
        match self.connections.get(&id).map(|c| c.role) {
            Some(Role::Client) => self.on_client_text(id, text),
            Some(Role::Device) => debug!(conn_id = id, "ignoring text from device"),
            None => {}
        }
    }

    fn on_client_text(&mut self, id: ConnId, text: &str) {
        let command = match ClientCommand::parse(text) {
            Ok(command) => command,
            Err(e) => {
                warn!(conn_id = id, error = %e, payload = text, "cannot parse client message");
                return;
            }
        };

        match command {
            ClientCommand::Ping => {
                if let Some(pong) = ServerEvent::Pong.to_frame() {
                    if let Some(conn) = self.connections.get_mut(&id) {
                        let _ = conn.send_text(pong);
                    }
                }
            }
            ClientCommand::Subscribe(name) => {
                info!(conn_id = id, signal = %name, "subscribe");
                self.subscribe(&name);
            }
            ClientCommand::Unsubscribe(name) => {
                info!(conn_id = id, signal = %name, "unsubscribe");
                self.unsubscribe(&name);
            }
            ClientCommand::Unrecognized(event) => {
                warn!(conn_id = id, event = %event, "unknown event from client");
            }
        }
    }

    /// Pong control frame from a socket.
    pub fn on_pong(&mut self, id: ConnId, now: Instant) {
        if let Some(conn) = self.connections.get_mut(&id) {
            if let Some(latency) = conn.record_pong(now) {
                debug!(conn_id = id, latency_ms = latency.as_millis() as u64, "pong");
            }
        }
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    /// Reference a signal's owning message, enabling it on first use.
    pub fn subscribe(&mut self, name: &str) {
        let Some(message_id) = self.dictionary.signal(name).map(|s| s.message_id) else {
            warn!(signal = name, "subscribe to unknown signal");
            return;
        };
        if self.ledger.acquire(message_id) {
            debug!(message_id, "enabling message");
            for command in enable_message(message_id) {
                let _ = self.send_command(command);
            }
        }
    }

    /// Release a signal's owning message, disabling it on last release.
    pub fn unsubscribe(&mut self, name: &str) {
        let Some(message_id) = self.dictionary.signal(name).map(|s| s.message_id) else {
            warn!(signal = name, "unsubscribe from unknown signal");
            return;
        };
        if self.ledger.release(message_id) {
            debug!(message_id, "disabling message");
            for command in disable_message(message_id) {
                let _ = self.send_command(command);
            }
        }
    }

    // ── Outbound traffic ────────────────────────────────────────────────

    /// Send a control command to the device, if one is connected.
    pub fn send_command(&mut self, command: Command) -> bool {
        self.send_to_device(command.encode(), command.name())
    }

    fn send_to_device(&mut self, bytes: Bytes, name: &'static str) -> bool {
        let Some(device) = self.device.and_then(|id| self.connections.get_mut(&id)) else {
            debug!(command = name, "no device connected, command dropped");
            return false;
        };
        metrics::counter!(DEVICE_COMMANDS_TOTAL, "command" => name).increment(1);
        device.send(Outbound::Binary(bytes))
    }

    /// Send an event to every live non-device connection.
    pub fn broadcast(&mut self, event: &ServerEvent) -> usize {
        let Some(frame) = event.to_frame() else {
            return 0;
        };
        let device = self.device;
        let mut sent = 0;
        for conn in self.connections.values_mut() {
            if Some(conn.id) != device && conn.is_live() && conn.send_text(Arc::clone(&frame)) {
                sent += 1;
            }
        }
        sent
    }

    // ── Periodic sweeps ─────────────────────────────────────────────────

    /// Liveness sweep: terminate unresponsive connections, ping idle ones and
    /// send the device status to every survivor.
    pub fn liveness_sweep(&mut self, now: Instant) {
        let Some(status) = ServerEvent::Status(self.status()).to_frame() else {
            return;
        };
        let threshold = self.config.unresponsive_latency;

        for conn in self.connections.values_mut() {
            if !conn.is_live() {
                continue;
            }
            match conn.refresh_latency(now) {
                Some(latency) if latency >= threshold => {
                    warn!(
                        conn_id = conn.id,
                        role = %conn.role,
                        latency_ms = latency.as_millis() as u64,
                        "terminating unresponsive connection"
                    );
                    metrics::counter!(LIVENESS_TERMINATIONS_TOTAL).increment(1);
                    conn.terminate();
                    continue;
                }
                Some(_) => {}
                None => {
                    let _ = conn.begin_ping(now);
                }
            }
            let _ = conn.send_text(Arc::clone(&status));
        }
    }

    /// Rate sweep: prune the window and publish the current rate.
    pub fn rate_sweep(&mut self, now: Instant) -> usize {
        let rate = self.rate.sweep(now);
        metrics::gauge!(DEVICE_RATE).set(rate as f64);
        rate
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Current device status.
    pub fn status(&self) -> StatusReport {
        match self.device.and_then(|id| self.connections.get(&id)) {
            Some(device) => StatusReport {
                online: true,
                latency: device.latency().as_millis() as u64,
                rate: self.rate.rate(),
            },
            None => StatusReport {
                online: false,
                latency: 0,
                rate: self.rate.rate(),
            },
        }
    }

    /// Id occupying the device slot.
    pub fn device(&self) -> Option<ConnId> {
        self.device
    }

    /// Open connections, device included.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Subscription ledger (read-only).
    pub fn ledger(&self) -> &SubscriptionLedger {
        &self.ledger
    }

    /// Copy counters into the shared [`GatewayStats`].
    pub fn publish_stats(&self) {
        self.stats
            .connections
            .store(self.connections.len(), Ordering::Relaxed);
        self.stats
            .device_online
            .store(self.device.is_some(), Ordering::Relaxed);
        self.stats.rate.store(self.rate.rate(), Ordering::Relaxed);
    }
}

fn drop_frame(error: &DecodeError) {
    metrics::counter!(FRAMES_DROPPED_TOTAL, "reason" => error.reason()).increment(1);
    warn!(error = %error, "dropping device frame");
}
