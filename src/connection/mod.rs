//! Resilient connection to the time-series backend
//!
//! A [`Connection`] owns one TCP socket to a fixed address and keeps it alive
//! on its own: callers only enqueue payloads, never touch the socket.
//!
//! # Tasks
//!
//! ```text
//!            write()                       reconnect queue (cap 10)
//!               │                                  │
//!               ▼                                  ▼
//!   outbound queue (cap 100)            ┌────────────────────┐
//!               │                       │     supervisor     │ wait, dial
//!               ▼                       └─────────┬──────────┘
//!   ┌────────────────────┐   stop      ┌──────────▼─────────┐
//!   │    write drain     │◄────────────┤     read drain     │
//!   │ (write half)       │  half back  │ (read half)        │
//!   └────────────────────┘────────────►└──────────┬─────────┘
//!                                                 │ EOF / error
//!                                                 ▼
//!                                     Attempt(0) → reconnect queue
//! ```
//!
//! # Failure handling
//!
//! - Dial failures are retried forever, waiting the [`ReconnectPolicy`]
//!   delay before each attempt.
//! - A write failure ends the write drain only. Reconnection is re-armed by
//!   the read drain once it sees EOF or a read error.
//! - Nothing is reported to `write()` callers; delivery is best effort and
//!   the payload in flight when a socket dies is lost.

pub mod config;
pub mod metrics;
mod session;
pub mod state;
mod supervisor;

pub use config::{
    ConnectionConfig, ReconnectPolicy, OUTBOUND_QUEUE_CAPACITY, RECONNECT_QUEUE_CAPACITY,
};
pub use metrics::{ConnectionMetrics, MetricsSnapshot};
pub use state::ConnectionState;

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::error::{Result, TsdbError};

/// Item on the outbound queue.
#[derive(Debug)]
pub(crate) enum Outbound {
    Payload(Bytes),
    /// Sentinel: the write drain stops when it dequeues this
    Shutdown,
}

/// Item on the reconnect-request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconnectRequest {
    /// Dial, carrying the count of consecutive failed attempts
    Attempt(u32),
    /// Stop the supervisor permanently
    Stop,
}

/// State shared by the supervisor and session tasks.
pub(crate) struct Shared {
    address: String,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    /// Held by the active write drain for its whole lifetime
    outbound: Mutex<mpsc::Receiver<Outbound>>,
    reconnect_tx: mpsc::Sender<ReconnectRequest>,
    metrics: ConnectionMetrics,
}

/// A self-healing, ordered, fire-and-forget writer to one backend address.
pub struct Connection {
    shared: Arc<Shared>,
    outbound_tx: mpsc::Sender<Outbound>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Create a connection and start connecting in the background.
    ///
    /// Returns immediately; the first dial happens after the reconnect delay.
    /// Must be called from within a tokio runtime.
    pub fn spawn(address: impl Into<String>, config: ConnectionConfig) -> Result<Self> {
        Self::spawn_labeled(address, None, config)
    }

    /// Like [`spawn`](Self::spawn), tagging log output with a source key.
    pub fn spawn_labeled(
        address: impl Into<String>,
        source: Option<&str>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::start(address.into(), source, config))
    }

    /// Spawn the supervisor for an already validated configuration.
    pub(crate) fn start(address: String, source: Option<&str>, config: ConnectionConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);
        let (reconnect_tx, reconnect_rx) = mpsc::channel(config.reconnect_capacity);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        if let Err(e) = reconnect_tx.try_send(ReconnectRequest::Attempt(0)) {
            warn!(error = %e, "Failed to seed reconnect queue");
        }

        let span = tracing::info_span!(
            "connection",
            address = %address,
            source = source.unwrap_or("-"),
        );
        let shared = Arc::new(Shared {
            address,
            config,
            state,
            outbound: Mutex::new(outbound_rx),
            reconnect_tx,
            metrics: ConnectionMetrics::default(),
        });

        let supervisor =
            tokio::spawn(supervisor::run(Arc::clone(&shared), reconnect_rx).instrument(span));

        Self {
            shared,
            outbound_tx,
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    /// Queue `payload` for delivery.
    ///
    /// Suspends only while the outbound queue is full. Payloads written after
    /// close are dropped.
    pub async fn write(&self, payload: impl Into<Bytes>) {
        let mut lifecycle = self.subscribe();
        let sent = tokio::select! {
            biased;
            sent = self.outbound_tx.send(Outbound::Payload(payload.into())) => sent.is_ok(),
            _ = state::closed(&mut lifecycle) => false,
        };
        // Once closed, nothing drains the queue, so a payload that got in
        // anyway is lost.
        if !sent || self.state().is_closed() {
            self.drop_payload("connection closed");
        }
    }

    /// Queue `payload` without waiting.
    ///
    /// # Errors
    /// - [`TsdbError::QueueFull`] when the outbound queue is at capacity
    /// - [`TsdbError::Closed`] after [`close`](Self::close)
    pub fn try_write(&self, payload: impl Into<Bytes>) -> Result<()> {
        if self.state().is_closed() {
            return Err(TsdbError::Closed);
        }
        self.outbound_tx
            .try_send(Outbound::Payload(payload.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TsdbError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TsdbError::Closed,
            })
    }

    /// Stop all tasks and close the socket. Does not wait for them.
    ///
    /// Calling it again is a no-op.
    pub fn close(&self) {
        if self.shared.state.send_replace(ConnectionState::Closed).is_closed() {
            return;
        }
        if let Err(e) = self.shared.reconnect_tx.try_send(ReconnectRequest::Stop) {
            debug!(error = %e, "Stop request not queued");
        }
        if let Err(e) = self.outbound_tx.try_send(Outbound::Shutdown) {
            debug!(error = %e, "Shutdown sentinel not queued");
        }
        info!(address = %self.shared.address, "Connection closed");
    }

    /// Close and wait until the supervisor and the current session have exited.
    pub async fn shutdown(&self) {
        self.close();
        if let Some(handle) = self.supervisor.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Supervisor task failed");
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Destination address.
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Payloads waiting on the outbound queue.
    pub fn pending(&self) -> usize {
        self.outbound_tx.max_capacity() - self.outbound_tx.capacity()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn drop_payload(&self, reason: &str) {
        self.shared.metrics.record_dropped();
        warn!(address = %self.shared.address, reason, "Dropping payload");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.shared.address)
            .field("state", &self.state())
            .finish()
    }
}
