//! End-to-end integration tests using real WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use m2_core::{Frame, JsonDictionary, MessageDescriptor, SignalDescriptor};
use m2_server::{GatewayConfig, GatewayServer};

const TIMEOUT: Duration = Duration::from_secs(5);
const PIN: &str = "1234";

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn dictionary() -> Arc<JsonDictionary> {
    Arc::new(
        JsonDictionary::from_messages(vec![MessageDescriptor::new(
            10,
            "DI_speed",
            vec![
                SignalDescriptor::new("DI_vehicleSpeed", 0, 0, 8),
                SignalDescriptor::new("DI_gear", 0, 8, 8),
            ],
        )])
        .unwrap(),
    )
}

/// Boot a test server on an ephemeral port.
async fn boot_server() -> (SocketAddr, GatewayServer) {
    let config = GatewayConfig {
        secret: Some(PIN.into()),
        ..GatewayConfig::default()
    };
    let server = GatewayServer::new(config, dictionary());
    let handle = server.listen().await.unwrap();
    (handle.local_addr(), server)
}

async fn connect(addr: SocketAddr, path: &str) -> WsStream {
    let url = format!("ws://{addr}{path}?pin={PIN}");
    let (ws, _) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

/// Next JSON event with the given name, skipping everything else.
async fn next_event(ws: &mut WsStream, name: &str) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = msg {
            let event: Value = serde_json::from_str(text.as_str()).unwrap();
            if event["event"] == name {
                return event;
            }
        }
    }
}

/// Next binary message, skipping text and control frames.
async fn next_binary(ws: &mut WsStream) -> Vec<u8> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for binary")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Binary(data) = msg {
            return data.to_vec();
        }
    }
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Connect a client and wait for its hello so it is registered.
async fn connect_client(addr: SocketAddr) -> (WsStream, u64) {
    let mut ws = connect(addr, "/live").await;
    let hello = next_event(&mut ws, "hello").await;
    let session = hello["data"]["session"].as_u64().unwrap();
    (ws, session)
}

#[tokio::test]
async fn wrong_pin_rejected_with_401() {
    let (addr, _server) = boot_server().await;
    let err = connect_async(format!("ws://{addr}/m2device?pin=0000"))
        .await
        .unwrap_err();
    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP 401, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_upgrade_closes_socket() {
    let (addr, _server) = boot_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /m2device?pin=0000 HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let read = timeout(TIMEOUT, stream.read_to_end(&mut response)).await;
    assert!(read.is_ok(), "socket still open after 401");
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 401"), "{response}");

    let mut buf = [0u8; 16];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn client_receives_hello_with_increasing_sessions() {
    let (addr, _server) = boot_server().await;
    let (_a, first) = connect_client(addr).await;
    let (_b, second) = connect_client(addr).await;
    assert!(second > first);
}

#[tokio::test]
async fn app_level_ping_gets_pong() {
    let (addr, _server) = boot_server().await;
    let (mut client, _) = connect_client(addr).await;
    send_json(&mut client, json!({"event": "ping"})).await;
    let pong = next_event(&mut client, "pong").await;
    assert_eq!(pong, json!({"event": "pong"}));
}

#[tokio::test]
async fn device_online_status_reaches_client() {
    let (addr, _server) = boot_server().await;
    let (mut client, _) = connect_client(addr).await;
    let _device = connect(addr, "/m2device").await;

    loop {
        let status = next_event(&mut client, "status").await;
        if status["data"]["online"] == true {
            break;
        }
    }
}

#[tokio::test]
async fn subscribe_enables_message_on_device() {
    let (addr, server) = boot_server().await;
    let mut device = connect(addr, "/m2device").await;
    let (mut client, _) = connect_client(addr).await;
    while !server.stats().device_online() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    send_json(&mut client, json!({"event": "subscribe", "data": "DI_vehicleSpeed"})).await;
    assert_eq!(next_binary(&mut device).await, vec![0x03, 0x02, 10, 0]);
    assert_eq!(next_binary(&mut device).await, vec![0x02, 0x03, 10, 0, 0x01]);

    send_json(&mut client, json!({"event": "subscribe", "data": "DI_gear"})).await;
    send_json(&mut client, json!({"event": "unsubscribe", "data": "DI_vehicleSpeed"})).await;
    send_json(&mut client, json!({"event": "unsubscribe", "data": "DI_gear"})).await;
    assert_eq!(next_binary(&mut device).await, vec![0x02, 0x03, 10, 0, 0x00]);
}

#[tokio::test]
async fn device_frame_broadcast_as_signals() {
    let (addr, _server) = boot_server().await;
    let (mut a, _) = connect_client(addr).await;
    let (mut b, _) = connect_client(addr).await;
    let mut device = connect(addr, "/m2device").await;

    // undefined message: dropped, no fault
    let unknown = Frame {
        timestamp: 1,
        message_id: 999,
        payload: Bytes::from_static(&[1, 2]),
    };
    device.send(Message::binary(unknown.encode())).await.unwrap();

    let frame = Frame {
        timestamp: 2,
        message_id: 10,
        payload: Bytes::from_static(&[88, 3]),
    };
    device.send(Message::binary(frame.encode())).await.unwrap();

    for client in [&mut a, &mut b] {
        let speed = next_event(client, "signal").await;
        assert_eq!(
            speed["data"],
            json!({"mnemonic": "DI_vehicleSpeed", "value": 88.0})
        );
        let gear = next_event(client, "signal").await;
        assert_eq!(gear["data"]["mnemonic"], "DI_gear");
    }
}

#[tokio::test]
async fn last_client_close_disables_all_messages() {
    let (addr, server) = boot_server().await;
    let mut device = connect(addr, "/m2device").await;
    let (mut client, _) = connect_client(addr).await;
    while server.stats().connections() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    client.close(None).await.unwrap();
    drop(client);
    assert_eq!(next_binary(&mut device).await, vec![0x01, 0x01, 0x00]);
}

#[tokio::test]
async fn new_device_replaces_previous() {
    let (addr, server) = boot_server().await;
    let mut first = connect(addr, "/m2device").await;
    while !server.stats().device_online() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let _second = connect(addr, "/m2device").await;

    // the first socket is dropped without a close handshake
    let ended = timeout(TIMEOUT, async {
        loop {
            match first.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
    assert!(server.stats().device_online());
}

#[tokio::test]
async fn shutdown_closes_open_sockets() {
    let (addr, server) = boot_server().await;
    let (mut client, _) = connect_client(addr).await;
    server.shutdown().shutdown();

    let ended = timeout(TIMEOUT, async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
}
