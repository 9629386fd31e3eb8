// ── Per-camera connection bookkeeping ──

use std::fmt;

use strum::Display;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Identifies one connection attempt. Never reused within a process, so
/// messages from a superseded reader can be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Where a camera's connection is in its lifecycle.
///
/// The loop is `Connecting → Connected → Disconnected → PendingReconnect →
/// Connecting`, forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    PendingReconnect { at: Instant },
}

impl ConnectionStatus {
    pub fn reconnect_at(&self) -> Option<Instant> {
        match self {
            Self::PendingReconnect { at } => Some(*at),
            _ => None,
        }
    }
}

/// Connection state for one camera, owned by the multiplexer loop.
#[derive(Debug)]
pub struct ConnectionState {
    status: ConnectionStatus,
    current: Option<ConnectionId>,
    reader: Option<AbortHandle>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            current: None,
            reader: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Id of the connection whose messages are currently accepted.
    pub fn current(&self) -> Option<ConnectionId> {
        self.current
    }

    /// Begin a new attempt. Any previous reader is aborted first so at most
    /// one attempt per camera is ever live.
    pub fn begin(&mut self, id: ConnectionId, reader: Option<AbortHandle>) -> Option<ConnectionId> {
        let stale = self.detach();
        self.status = ConnectionStatus::Connecting;
        self.current = Some(id);
        self.reader = reader;
        stale
    }

    /// Stream is up. Returns `false` if it already was.
    pub fn mark_connected(&mut self) -> bool {
        if self.status == ConnectionStatus::Connecting {
            self.status = ConnectionStatus::Connected;
            true
        } else {
            false
        }
    }

    /// The current connection ended. Returns `false` when this drop was
    /// already handled.
    pub fn mark_dropped(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {
                self.status = ConnectionStatus::Disconnected;
                true
            }
            ConnectionStatus::Disconnected | ConnectionStatus::PendingReconnect { .. } => false,
        }
    }

    pub(crate) fn set_pending(&mut self, at: Instant) {
        self.status = ConnectionStatus::PendingReconnect { at };
    }

    /// Stop reading from the current connection, if any, and forget it.
    /// Returns the id that was detached.
    pub fn detach(&mut self) -> Option<ConnectionId> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.current.take()
    }
}
