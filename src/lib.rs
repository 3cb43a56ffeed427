//! tsdb-link - resilient TCP writer for time-series backends
//!
//! Producers hand opaque, already encoded payloads to a [`ConnectionPool`]
//! together with a source key. Each source key gets its own
//! [`Connection`], which keeps one socket to the backend open, reconnects on
//! its own after failures, and writes payloads in the order they were queued.
//!
//! ## Components
//!
//! - **Connection**: one socket, a bounded outbound queue, and three tasks
//!   (reconnect supervisor, write drain, read drain)
//! - **ConnectionPool**: source key → Connection, created lazily, never evicted
//! - **Encoder**: formats samples in the backend's line protocol
//!
//! Delivery is best effort: writes never fail, and payloads queued when a
//! socket dies may be lost.

pub mod config;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod pool;

pub use config::Args;
pub use connection::{Connection, ConnectionConfig, ConnectionState, ReconnectPolicy};
pub use error::{Result, TsdbError};
pub use pool::{ConnectionPool, ConnectionStatus};
