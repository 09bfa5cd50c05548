//! Per-connection task.
//!
//! Owns the socket for the life of one admitted client: registers it,
//! forwards inbound data frames to the broadcast engine, and writes whatever
//! other senders enqueue for it. Any close or transport error ends the task
//! and removes the client from the registry.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use futures::SinkExt;
use tokio::sync::mpsc;

use crate::broadcast::{Origin, Payload};
use crate::registry::{ConnectionHandle, ConnectionId, ConnectionState};
use crate::state::AppState;

/// Serve one upgraded WebSocket until either side goes away.
pub async fn run(state: AppState, socket: WebSocket, remote: SocketAddr) {
    let id = ConnectionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<Payload>();
    let handle = ConnectionHandle::new(id.clone(), remote, tx);
    let cell = handle.state_cell();

    state.registry().add(handle);
    tracing::info!(
        conn_id = %id,
        remote = %remote,
        connections = state.registry().len(),
        "client connected"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Frames FROM this client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(msg)) => {
                        if let Some(payload) = Payload::from_message(msg) {
                            tracing::debug!(conn_id = %id, bytes = payload.len(), "message from client");
                            state.relay(Origin::Connection(&id), payload);
                        }
                        // Ping/Pong handled by axum
                    }
                    Some(Err(e)) => {
                        tracing::debug!(conn_id = %id, error = %e, "read failed");
                        break;
                    }
                }
            }

            // Frames TO this client (from other clients or the console)
            out = rx.recv() => {
                match out {
                    Some(payload) => {
                        if let Err(e) = ws_tx.send(Message::from(payload)).await {
                            tracing::debug!(conn_id = %id, error = %e, "write failed");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    // Cleanup
    cell.advance(ConnectionState::Closing);
    state.registry().remove(&id);
    cell.advance(ConnectionState::Closed);

    tracing::info!(
        conn_id = %id,
        remote = %remote,
        connections = state.registry().len(),
        "client disconnected"
    );
}
