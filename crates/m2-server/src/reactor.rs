//! The single task that owns the [`Gateway`].
//!
//! Socket tasks forward [`ReactorEvent`]s over an mpsc channel; the reactor
//! interleaves them with the liveness and rate timers until shutdown.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::{ConnId, Connection};
use crate::gateway::Gateway;

/// Something a socket task observed.
#[derive(Debug)]
pub enum ReactorEvent {
    /// Upgrade completed.
    Opened(Connection),
    /// Text frame received.
    Text {
        /// Source connection.
        id: ConnId,
        /// Frame contents.
        text: String,
    },
    /// Binary frame received.
    Binary {
        /// Source connection.
        id: ConnId,
        /// Frame contents.
        data: Bytes,
    },
    /// Pong control frame received.
    Pong {
        /// Source connection.
        id: ConnId,
    },
    /// Socket closed or terminated.
    Closed {
        /// Source connection.
        id: ConnId,
    },
}

/// Event loop around a [`Gateway`].
pub struct Reactor {
    gateway: Gateway,
    events: mpsc::Receiver<ReactorEvent>,
    ping_interval: Duration,
    rate_interval: Duration,
    shutdown: CancellationToken,
}

impl Reactor {
    /// Create a reactor; nothing runs until [`Reactor::run`].
    pub fn new(
        gateway: Gateway,
        events: mpsc::Receiver<ReactorEvent>,
        ping_interval: Duration,
        rate_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            events,
            ping_interval,
            rate_interval,
            shutdown,
        }
    }

    /// Process events and timers until shutdown or until every sender is gone.
    pub async fn run(mut self) -> Gateway {
        let start = Instant::now();
        let mut liveness = tokio::time::interval_at(start + self.ping_interval, self.ping_interval);
        let mut rate = tokio::time::interval_at(start + self.rate_interval, self.rate_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        rate.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("reactor started");
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("reactor shutting down");
                    break;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("event channel closed");
                        break;
                    };
                    self.dispatch(event, Instant::now());
                }
                now = liveness.tick() => self.gateway.liveness_sweep(now),
                now = rate.tick() => {
                    let _ = self.gateway.rate_sweep(now);
                }
            }
            self.gateway.publish_stats();
        }
        self.gateway
    }

    fn dispatch(&mut self, event: ReactorEvent, now: Instant) {
        match event {
            ReactorEvent::Opened(conn) => self.gateway.open(conn),
            ReactorEvent::Text { id, text } => self.gateway.on_text(id, &text),
            ReactorEvent::Binary { id, data } => self.gateway.on_binary(id, &data, now),
            ReactorEvent::Pong { id } => self.gateway.on_pong(id, now),
            ReactorEvent::Closed { id } => self.gateway.on_close(id),
        }
    }
}
