//! WebSocket upgrade handler.
//!
//! Each socket gets a writer task draining the connection's outbound queue
//! and a reader loop feeding frames to the router. Whichever way the reader
//! ends, it finishes with `router.disconnect`, so session bookkeeping and
//! disconnect hooks run exactly once.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use relay_realtime::{ConnectError, ConnectionHandle, Frame, RouteOutcome, close_code};

use crate::dto::request::AuthFrame;
use crate::extractors::{bearer_token, cookie_token};
use crate::state::AppState;

/// How long the writer may take to flush after the reader has finished.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Bearer token.
    pub token: Option<String>,
}

/// GET /ws — WebSocket upgrade.
///
/// The credential is looked up in `?token=`, then the `Authorization`
/// header, then the `authToken` cookie. Without one, the first frame
/// must carry it.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = query
        .token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| bearer_token(&headers).map(str::to_string))
        .or_else(|| cookie_token(&headers).map(str::to_string));

    ws.on_upgrade(move |socket| handle_socket(state, socket, remote.to_string(), credential))
}

async fn handle_socket(
    state: AppState,
    socket: WebSocket,
    remote: String,
    credential: Option<String>,
) {
    let router = state.engine.router.clone();
    let (mut sink, mut stream) = socket.split();

    let handle = match router.accept(Some(remote)).await {
        Ok(handle) => handle,
        Err(ConnectError::Rejected { reason, .. }) => {
            let frame = close_frame(close_code::REJECTED, &format!("Connection rejected: {reason}"));
            let _ = sink.send(frame).await;
            return;
        }
        Err(e) => {
            debug!(error = %e, "Connection dropped before accept completed");
            return;
        }
    };

    let writer = spawn_writer(handle.clone(), sink);
    let auth_timeout = Duration::from_secs(state.config().auth.auth_timeout_seconds);

    let credential = match credential {
        Some(token) => Some(token),
        None => first_frame_credential(&handle, &mut stream, auth_timeout).await,
    };

    let authenticated = match credential {
        Some(token) => match router.authenticate(&handle, &token).await {
            Ok(claim) => {
                debug!(conn_id = %handle.id(), user_id = %claim.user_id, "Socket authenticated");
                true
            }
            Err(e) => {
                debug!(conn_id = %handle.id(), error = %e, "Socket authentication failed");
                false
            }
        },
        None => {
            router
                .disconnect(&handle, close_code::POLICY_VIOLATION, "AUTH_TIMEOUT")
                .await;
            false
        }
    };

    if authenticated {
        read_loop(&state, &handle, &mut stream).await;
    }

    router
        .disconnect(&handle, close_code::NORMAL, "Client disconnected")
        .await;

    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        debug!(conn_id = %handle.id(), "Writer did not drain in time");
    }
    info!(conn_id = %handle.id(), "WebSocket closed");
}

fn spawn_writer(
    handle: Arc<ConnectionHandle>,
    mut sink: SplitSink<WebSocket, Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = handle.queue().recv().await {
            let (message, last) = match frame {
                Frame::Text(text) => (Message::Text(text.as_ref().into()), false),
                Frame::Close { code, reason } => (close_frame(code, &reason), true),
            };
            if sink.send(message).await.is_err() {
                // Peer gone; let the reader notice and clean up.
                handle.cancellation().cancel();
                break;
            }
            if last {
                break;
            }
        }
    })
}

async fn first_frame_credential(
    handle: &ConnectionHandle,
    stream: &mut SplitStream<WebSocket>,
    wait: Duration,
) -> Option<String> {
    let first = tokio::select! {
        _ = handle.cancellation().cancelled() => return None,
        next = tokio::time::timeout(wait, stream.next()) => next,
    };

    match first {
        Ok(Some(Ok(Message::Text(text)))) => parse_credential(text.as_str()),
        Ok(Some(Ok(_))) => None,
        Ok(Some(Err(e))) => {
            debug!(conn_id = %handle.id(), error = %e, "Socket error before authentication");
            None
        }
        Ok(None) => None,
        Err(_) => {
            warn!(conn_id = %handle.id(), "No credential within auth timeout");
            None
        }
    }
}

/// A first-frame credential is a raw token or `{"token": "..."}`.
fn parse_credential(text: &str) -> Option<String> {
    let text = text.trim();
    let token = if text.starts_with('{') {
        serde_json::from_str::<AuthFrame>(text).ok()?.token
    } else {
        text.to_string()
    };
    Some(token).filter(|t| !t.is_empty())
}

async fn read_loop(
    state: &AppState,
    handle: &Arc<ConnectionHandle>,
    stream: &mut SplitStream<WebSocket>,
) {
    let router = &state.engine.router;
    loop {
        let next = tokio::select! {
            _ = handle.cancellation().cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                if router.handle_inbound(handle, text.as_str()).await == RouteOutcome::Closed {
                    break;
                }
            }
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    if router.handle_inbound(handle, text).await == RouteOutcome::Closed {
                        break;
                    }
                }
                Err(_) => debug!(conn_id = %handle.id(), "Ignoring non UTF-8 binary frame"),
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => handle.touch(),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                warn!(conn_id = %handle.id(), error = %e, "WebSocket error");
                break;
            }
        }
    }
}

fn close_frame(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
