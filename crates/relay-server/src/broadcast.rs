//! Broadcast fanout.
//!
//! A message from a connection goes to every *other* open connection; a
//! message from the operator console goes to all of them. Delivery is a
//! non-blocking push onto each recipient's unbounded queue, so one slow or
//! dead peer never holds up the rest of the loop and a peer that is keeping
//! up never loses a message.

use std::fmt;

use axum::extract::ws::{Message, Utf8Bytes};
use bytes::Bytes;

use crate::registry::{ConnectionId, ConnectionRegistry};

/// An opaque message body. The frame kind is preserved; content never is
/// inspected.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(Utf8Bytes),
    Binary(Bytes),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(Utf8Bytes::from(text.into()))
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.as_str().len(),
            Self::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Data frames become payloads; control frames (ping, pong, close) don't.
    pub fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(Self::Text(text)),
            Message::Binary(data) => Some(Self::Binary(data)),
            _ => None,
        }
    }
}

impl From<Payload> for Message {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(data) => Message::Binary(data),
        }
    }
}

/// Who a message came from.
#[derive(Debug, Clone, Copy)]
pub enum Origin<'a> {
    /// A registered client; excluded from its own fanout.
    Connection(&'a ConnectionId),
    /// The operator console. Not a registry member, so nobody is excluded.
    Console,
}

impl fmt::Display for Origin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Connection(id) => write!(f, "{id}"),
            Origin::Console => f.write_str("console"),
        }
    }
}

/// Per-fanout outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Enqueued for the recipient's writer.
    pub delivered: usize,
    /// Recipient was closing or already gone.
    pub skipped: usize,
}

/// Deliver `payload` to every open connection except the origin.
pub fn relay(registry: &ConnectionRegistry, origin: Origin<'_>, payload: Payload) -> FanoutReport {
    let mut report = FanoutReport::default();

    registry.for_each_open(|peer| {
        if let Origin::Connection(sender) = origin {
            if peer.id() == sender {
                return;
            }
        }

        match peer.deliver(payload.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::debug!(conn_id = %peer.id(), error = %e, "skipping peer");
                report.skipped += 1;
            }
        }
    });

    tracing::debug!(
        origin = %origin,
        bytes = payload.len(),
        delivered = report.delivered,
        skipped = report.skipped,
        "message relayed"
    );

    report
}
