//! WebSocket push endpoint
//!
//! Each connection registers one subscriber, forwards every broadcast batch
//! as a JSON text frame, and deregisters when the peer leaves or a write
//! fails. Inbound application messages are ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use telemetry_core::{Payload, SubscriberId};
use tokio::sync::mpsc;

use super::AppState;

/// Upgrade to a push subscription
///
/// GET /ws/
pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state))
}

async fn serve_subscriber(socket: WebSocket, state: AppState) {
    let (id, queue) = state.registry.add(state.config.broadcast.subscriber_buffer);
    tracing::info!(subscriber_id = %id, "Push subscriber connected");

    let reason = pump(socket, id, queue, state.config.broadcast.send_timeout()).await;

    state.registry.remove(id);
    tracing::info!(subscriber_id = %id, reason, "Push subscriber disconnected");
}

async fn pump(
    socket: WebSocket,
    id: SubscriberId,
    mut queue: mpsc::Receiver<Payload>,
    send_timeout: Duration,
) -> &'static str {
    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            payload = queue.recv() => {
                let Some(payload) = payload else {
                    // Registry dropped us after a failed broadcast
                    break "evicted";
                };
                match tokio::time::timeout(send_timeout, sink.send(Message::Text(payload.to_string()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(subscriber_id = %id, error = %e, "Push write failed");
                        break "write_error";
                    }
                    Err(_) => {
                        tracing::warn!(subscriber_id = %id, "Push write timed out");
                        break "write_timeout";
                    }
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break "peer_closed",
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber_id = %id, error = %e, "Push read failed");
                    break "read_error";
                }
            }
        }
    };

    let _ = tokio::time::timeout(send_timeout, sink.close()).await;
    reason
}
