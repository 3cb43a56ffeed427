//! Per-source connection pool
//!
//! Maps source keys to their dedicated [`Connection`]. Every write for a key
//! goes through the same connection, so per-source ordering is preserved.
//! Connections are created lazily on first use and are never evicted.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionConfig, ConnectionState, MetricsSnapshot};
use crate::error::Result;

/// Summary of one source's connection
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    /// Source key
    pub source: String,
    /// Lifecycle state
    pub state: ConnectionState,
    /// Payloads waiting on the outbound queue
    pub pending: usize,
    /// Connection counters
    pub metrics: MetricsSnapshot,
}

/// Connection pool with source affinity
pub struct ConnectionPool {
    /// source key → Connection
    connections: DashMap<String, Arc<Connection>>,
    /// Backend address shared by every connection
    target: String,
    config: ConnectionConfig,
}

impl ConnectionPool {
    /// Create an empty pool for `target`.
    pub fn new(target: impl Into<String>, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connections: DashMap::new(),
            target: target.into(),
            config,
        })
    }

    /// Queue `payload` on the connection for `source`, creating it if needed.
    ///
    /// Never fails; see [`Connection::write`] for delivery semantics.
    pub async fn write(&self, source: &str, payload: impl Into<Bytes>) {
        let connection = self.connection(source);
        connection.write(payload).await;
    }

    /// Get the connection for `source`, creating it if needed.
    ///
    /// Lookup and insert happen under the map's shard lock, so concurrent
    /// callers for the same new key all get the same connection.
    pub fn connection(&self, source: &str) -> Arc<Connection> {
        if let Some(existing) = self.connections.get(source) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .connections
            .entry(source.to_string())
            .or_insert_with(|| {
                debug!(source, target = %self.target, "Creating connection");
                Arc::new(Connection::start(
                    self.target.clone(),
                    Some(source),
                    self.config.clone(),
                ))
            });
        Arc::clone(entry.value())
    }

    /// Get the connection for `source` if one exists
    pub fn get(&self, source: &str) -> Option<Arc<Connection>> {
        self.connections.get(source).map(|c| c.value().clone())
    }

    /// Number of sources with a connection
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// All source keys with a connection
    pub fn source_keys(&self) -> Vec<String> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    /// Backend address
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Count how many connections are currently connected
    pub fn connected_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().state().is_connected())
            .count()
    }

    /// Get status for every connection
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.connections
            .iter()
            .map(|entry| {
                let connection = entry.value();
                ConnectionStatus {
                    source: entry.key().clone(),
                    state: connection.state(),
                    pending: connection.pending(),
                    metrics: connection.metrics(),
                }
            })
            .collect()
    }

    /// Close every connection and wait for their tasks to exit.
    ///
    /// Connections stay registered; writes to them are dropped afterwards.
    pub async fn shutdown(&self) {
        let connections: Vec<Arc<Connection>> =
            self.connections.iter().map(|e| e.value().clone()).collect();
        info!(count = connections.len(), "Shutting down connection pool");
        for connection in &connections {
            connection.close();
        }
        for connection in connections {
            connection.shutdown().await;
        }
    }
}
