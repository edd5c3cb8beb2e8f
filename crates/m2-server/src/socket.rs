//! Per-socket reader/writer tasks bridging a WebSocket to the reactor.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::connection::{ConnId, Connection, Outbound, Role};
use crate::reactor::ReactorEvent;

/// Drive an upgraded socket until it closes or is terminated.
///
/// Registers the connection with the reactor, then runs a writer task that
/// drains the outbound queue and a reader task that forwards inbound frames.
/// When either side ends, or `cancel` fires, the socket is dropped without a
/// close handshake and the reactor is told the connection is gone.
pub async fn run_socket(
    socket: WebSocket,
    id: ConnId,
    role: Role,
    events: mpsc::Sender<ReactorEvent>,
    cancel: CancellationToken,
    queue_depth: usize,
) {
    let (tx, mut rx) = mpsc::channel::<Outbound>(queue_depth);
    let conn = Connection::new(id, role, tx, cancel.clone(), Instant::now());
    if events.send(ReactorEvent::Opened(conn)).await.is_err() {
        debug!(conn_id = id, "reactor gone, dropping socket");
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued frames to the WebSocket
    let writer_cancel = cancel.clone();
    let mut writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                () = writer_cancel.cancelled() => break,
                frame = rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            let msg = match frame {
                Outbound::Text(text) => WsMessage::Text(text.as_str().into()),
                Outbound::Binary(bytes) => WsMessage::Binary(bytes),
                Outbound::Ping => WsMessage::Ping(Bytes::new()),
            };
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Reader task: forward inbound frames to the reactor
    let reader_events = events.clone();
    let reader_cancel = cancel.clone();
    let mut reader = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                () = reader_cancel.cancelled() => break,
                msg = ws_rx.next() => match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        debug!(conn_id = id, error = %e, "socket read failed");
                        break;
                    }
                    None => break,
                },
            };
            let event = match msg {
                WsMessage::Text(text) => ReactorEvent::Text {
                    id,
                    text: text.to_string(),
                },
                WsMessage::Binary(data) => ReactorEvent::Binary { id, data },
                WsMessage::Pong(_) => ReactorEvent::Pong { id },
                WsMessage::Close(_) => break,
                // axum answers pings itself
                WsMessage::Ping(_) => continue,
            };
            if reader_events.send(event).await.is_err() {
                break;
            }
        }
    });

    // Wait for either task to finish, then tear down the other
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
    cancel.cancel();
    trace!(conn_id = id, role = %role, "socket tasks finished");

    let _ = events.send(ReactorEvent::Closed { id }).await;
}
