//! Live set of admitted connections.
//!
//! The registry only holds *handles*: the outbound queue sender, the shared
//! state cell and the remote address. The socket itself is owned by the
//! connection's own task (see [`crate::session`]).

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::broadcast::Payload;

// ── Identity ────────────────────────────────────────────────────────

/// Unique identity of one physical connection (`conn_<uuid7>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(relay_common::ids::connection_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Lifecycle ───────────────────────────────────────────────────────

/// Per-connection lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// State cell shared between the registry handle and the connection task.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConnectionState::Connecting as u8)))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless the cell is already at or past it.
    /// Returns the state observed before the call.
    pub fn advance(&self, next: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.fetch_max(next as u8, Ordering::AcqRel))
    }
}

// ── Handles ─────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection is not open")]
    NotOpen,
    #[error("outbound queue is closed")]
    Closed,
}

/// Registry-side handle to a connected client.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    remote: SocketAddr,
    tx: mpsc::UnboundedSender<Payload>,
    state: StateCell,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, remote: SocketAddr, tx: mpsc::UnboundedSender<Payload>) -> Self {
        Self {
            id,
            remote,
            tx,
            state: StateCell::new(),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Shared state cell, for the task that owns the socket.
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    /// Enqueue a payload for this connection without waiting. The queue is
    /// unbounded; only a closing or torn-down connection refuses it.
    pub fn deliver(&self, payload: Payload) -> Result<(), DeliveryError> {
        if self.state() != ConnectionState::Open {
            return Err(DeliveryError::NotOpen);
        }
        self.tx.send(payload).map_err(|_| DeliveryError::Closed)
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Concurrent set of open connections, keyed by [`ConnectionId`].
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle and mark it `Open`.
    pub fn add(&self, handle: ConnectionHandle) {
        handle.state.advance(ConnectionState::Open);
        self.connections.insert(handle.id.clone(), handle);
    }

    /// Remove a connection. Removing an unknown or already-removed id is a
    /// no-op.
    pub fn remove(&self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Remote addresses of every registered connection, unordered.
    pub fn remotes(&self) -> Vec<SocketAddr> {
        self.connections
            .iter()
            .map(|entry| entry.value().remote())
            .collect()
    }

    /// Call `f` once for every connection that is `Open` when it is reached.
    ///
    /// Iterates over a snapshot, so `f` may itself add or remove entries
    /// without deadlocking on the map's shard locks.
    pub fn for_each_open(&self, mut f: impl FnMut(&ConnectionHandle)) {
        let snapshot: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for handle in &snapshot {
            if handle.state() == ConnectionState::Open {
                f(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_from(addr: &str) -> (ConnectionHandle, mpsc::UnboundedReceiver<Payload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = addr.parse().unwrap();
        (ConnectionHandle::new(ConnectionId::new(), addr, tx), rx)
    }

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<Payload>) {
        handle_from("127.0.0.1:9000")
    }

    #[test]
    fn state_only_moves_forward() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Connecting);

        cell.advance(ConnectionState::Closing);
        assert_eq!(cell.advance(ConnectionState::Open), ConnectionState::Closing);
        assert_eq!(cell.get(), ConnectionState::Closing);

        cell.advance(ConnectionState::Closed);
        assert_eq!(cell.get(), ConnectionState::Closed);
    }

    #[test]
    fn add_marks_open() {
        let registry = ConnectionRegistry::new();
        let (h, _rx) = handle();
        let id = h.id().clone();
        let cell = h.state_cell();

        assert_eq!(cell.get(), ConnectionState::Connecting);
        registry.add(h);
        assert_eq!(cell.get(), ConnectionState::Open);
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (h, _rx) = handle();
        let id = h.id().clone();
        registry.add(h);

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.remove(&ConnectionId::new()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn for_each_open_skips_closing() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = handle();
        let (b, _rb) = handle();
        let a_id = a.id().clone();
        let b_cell = b.state_cell();
        registry.add(a);
        registry.add(b);

        b_cell.advance(ConnectionState::Closing);

        let mut seen = Vec::new();
        registry.for_each_open(|h| seen.push(h.id().clone()));
        assert_eq!(seen, vec![a_id]);
    }

    #[test]
    fn for_each_open_tolerates_removal_mid_iteration() {
        let registry = ConnectionRegistry::new();
        let handles: Vec<_> = (0..5).map(|_| handle()).collect();
        let ids: Vec<_> = handles.iter().map(|(h, _)| h.id().clone()).collect();
        let cells: Vec<_> = handles.iter().map(|(h, _)| h.state_cell()).collect();
        let mut receivers = Vec::new();
        for (h, rx) in handles {
            registry.add(h);
            receivers.push(rx);
        }

        // Whoever is visited first closes every other entry, the way a
        // concurrent teardown would.
        let mut visited = 0;
        registry.for_each_open(|h| {
            visited += 1;
            for (id, cell) in ids.iter().zip(&cells) {
                if id != h.id() {
                    cell.advance(ConnectionState::Closing);
                    registry.remove(id);
                }
            }
        });

        assert_eq!(visited, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn deliver_reports_connection_conditions() {
        let (h, mut rx) = handle();
        assert_eq!(
            h.deliver(Payload::text("early")),
            Err(DeliveryError::NotOpen)
        );

        let registry = ConnectionRegistry::new();
        registry.add(h.clone());

        assert_eq!(h.deliver(Payload::text("one")), Ok(()));
        assert_eq!(rx.try_recv().unwrap(), Payload::text("one"));

        drop(rx);
        assert_eq!(h.deliver(Payload::text("two")), Err(DeliveryError::Closed));
    }

    #[test]
    fn deliver_never_drops_a_burst() {
        let (h, mut rx) = handle();
        let registry = ConnectionRegistry::new();
        registry.add(h.clone());

        for i in 0..5000 {
            assert_eq!(h.deliver(Payload::text(i.to_string())), Ok(()));
        }
        for i in 0..5000 {
            assert_eq!(rx.try_recv().unwrap(), Payload::text(i.to_string()));
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn remotes_lists_registered_peers() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = handle_from("10.0.0.1:5000");
        let (b, _rb) = handle_from("10.0.0.2:6000");
        let b_id = b.id().clone();
        registry.add(a);
        registry.add(b);

        let mut remotes = registry.remotes();
        remotes.sort();
        assert_eq!(
            remotes,
            vec![
                "10.0.0.1:5000".parse::<SocketAddr>().unwrap(),
                "10.0.0.2:6000".parse().unwrap(),
            ]
        );

        registry.remove(&b_id);
        assert_eq!(registry.remotes(), vec!["10.0.0.1:5000".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn concurrent_membership_changes() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();

        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (h, _rx) = handle();
                let id = h.id().clone();
                registry.add(h);
                tokio::task::yield_now().await;
                registry.for_each_open(|_| {});
                registry.remove(&id);
                registry.remove(&id);
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.is_empty());
    }
}
