//! Integration tests for WebSocket connection and messaging over a real socket.

mod helpers;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use helpers::{TestRelay, spawn_server};
use relay_core::protocol::{Message, MessageType};
use relay_core::types::{Role, UserId};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn open(addr: SocketAddr, query: &str) -> Client {
    let url = format!("ws://{addr}/ws{query}");
    let (ws, _) = connect_async(url).await.expect("WebSocket handshake failed");
    ws
}

/// Next relay message, skipping control frames.
async fn next_message(ws: &mut Client) -> Message {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        match frame {
            WsMessage::Text(text) => return Message::from_json(text.as_str()).expect("Bad message"),
            WsMessage::Close(frame) => panic!("Unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Waits for the close frame and returns its code and reason.
async fn next_close(ws: &mut Client) -> (u16, String) {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for close")
            .expect("Stream ended without a close frame")
            .expect("WebSocket error");
        if let WsMessage::Close(Some(frame)) = frame {
            return (u16::from(frame.code), frame.reason.to_string());
        }
    }
}

/// Heartbeat round trip; returns once the connection is authenticated.
async fn ping(ws: &mut Client) {
    ws.send(WsMessage::text(r#"{"type":7}"#))
        .await
        .expect("Send failed");
    loop {
        let msg = next_message(ws).await;
        if msg.kind() == MessageType::Heartbeat {
            assert_eq!(msg.content(), "pong");
            return;
        }
    }
}

#[tokio::test]
async fn test_query_and_first_frame_credentials() {
    let relay = TestRelay::new();
    let addr = spawn_server(&relay).await;

    let mut alice = open(addr, &format!("?token={}", relay.token("alice", Role::User))).await;
    ping(&mut alice).await;

    let mut bob = open(addr, "").await;
    let auth = serde_json::json!({ "token": relay.token("bob", Role::User) });
    bob.send(WsMessage::text(auth.to_string()))
        .await
        .expect("Send failed");
    ping(&mut bob).await;

    let join = next_message(&mut alice).await;
    assert_eq!(join.kind(), MessageType::Join);
    assert_eq!(join.sender(), "bob");

    bob.send(WsMessage::text(r#"{"type":1,"content":"hi"}"#))
        .await
        .expect("Send failed");

    for ws in [&mut alice, &mut bob] {
        let msg = next_message(ws).await;
        assert_eq!(msg.kind(), MessageType::Text);
        assert_eq!(msg.content(), "hi");
        assert_eq!(msg.sender(), "bob");
    }
}

#[tokio::test]
async fn test_bearer_header_credential() {
    let relay = TestRelay::new();
    let addr = spawn_server(&relay).await;

    let mut request = format!("ws://{addr}/ws")
        .into_client_request()
        .expect("Bad request");
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", relay.token("carol", Role::User))
            .parse()
            .expect("Bad header"),
    );
    let (mut ws, _) = connect_async(request).await.expect("Handshake failed");

    ping(&mut ws).await;
    assert!(relay.engine.sessions.is_online(&UserId::from("carol")));
}

#[tokio::test]
async fn test_invalid_token_closes_with_policy_violation() {
    let relay = TestRelay::new();
    let addr = spawn_server(&relay).await;

    let mut ws = open(addr, "?token=not-a-jwt").await;
    let (code, reason) = next_close(&mut ws).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "INVALID_TOKEN");

    let status = relay.engine.status().await;
    assert_eq!(status.metrics.auth_failures, 1);
}

#[tokio::test]
async fn test_force_disconnect_closes_socket_and_announces_leave() {
    let relay = TestRelay::new();
    let addr = spawn_server(&relay).await;

    let mut alice = open(addr, &format!("?token={}", relay.token("alice", Role::User))).await;
    ping(&mut alice).await;
    let mut bob = open(addr, &format!("?token={}", relay.token("bob", Role::User))).await;
    ping(&mut bob).await;
    assert_eq!(next_message(&mut alice).await.kind(), MessageType::Join);

    let closed = relay
        .engine
        .sessions
        .force_disconnect(&UserId::from("bob"), "flooding");
    assert_eq!(closed, 1);

    assert_eq!(next_close(&mut bob).await, (4001, "Kicked: flooding".to_string()));
    let leave = next_message(&mut alice).await;
    assert_eq!(leave.kind(), MessageType::Leave);
    assert_eq!(leave.sender(), "bob");
}

#[tokio::test]
async fn test_client_close_ends_session() {
    let relay = TestRelay::new();
    let addr = spawn_server(&relay).await;

    let mut alice = open(addr, &format!("?token={}", relay.token("alice", Role::User))).await;
    ping(&mut alice).await;
    let mut bob = open(addr, &format!("?token={}", relay.token("bob", Role::User))).await;
    ping(&mut bob).await;
    next_message(&mut alice).await;

    bob.close(None).await.expect("Close failed");

    let leave = next_message(&mut alice).await;
    assert_eq!(leave.kind(), MessageType::Leave);
    assert!(!relay.engine.sessions.is_online(&UserId::from("bob")));
}
