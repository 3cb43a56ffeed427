//! Connection lifecycle state.

use std::fmt;
use tokio::sync::watch;

/// Lifecycle state of a [`Connection`](super::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket; waiting for a reconnect request
    Disconnected,
    /// Waiting out the reconnect delay or dialing
    Connecting,
    /// Socket open, drain tasks running
    Connected,
    /// Terminal; reached only through `close()`
    Closed,
}

impl ConnectionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Move to `next` unless the connection is already closed.
///
/// Returns false when the state is `Closed`; callers stop on false.
pub(crate) fn transition(state: &watch::Sender<ConnectionState>, next: ConnectionState) -> bool {
    let mut open = true;
    state.send_if_modified(|current| {
        if current.is_closed() {
            open = false;
            return false;
        }
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
    open
}

/// Resolves once the state becomes `Closed` (or the sender is gone).
pub(crate) async fn closed(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state.wait_for(ConnectionState::is_closed).await;
}
