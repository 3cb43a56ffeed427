//! Configuration for the tsdb-link binary
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::time::Duration;

use crate::connection::{ConnectionConfig, ReconnectPolicy};
use crate::error::{Result, TsdbError};

/// tsdb-link - resilient writer for time-series backends
#[derive(Parser, Debug, Clone)]
#[command(name = "tsdb-link")]
#[command(about = "Write payloads to a time-series backend over self-healing TCP connections")]
pub struct Args {
    /// Backend address (host:port)
    #[arg(long, env = "TSDB_ADDR", default_value = "127.0.0.1:8282")]
    pub target: String,

    /// Delay before every dial attempt, in milliseconds
    #[arg(long, env = "CONNECT_DELAY_MS", default_value = "2000")]
    pub connect_delay_ms: u64,

    /// Upper bound for the reconnect delay, in milliseconds.
    /// When set, the delay doubles per consecutive failure (with jitter)
    /// up to this value instead of staying fixed.
    #[arg(long, env = "RECONNECT_MAX_DELAY_MS")]
    pub reconnect_max_delay_ms: Option<u64>,

    /// Deadline for a single socket write, in milliseconds
    #[arg(long, env = "WRITE_TIMEOUT_MS", default_value = "10000")]
    pub write_timeout_ms: u64,

    /// Deadline for a single dial, in milliseconds
    #[arg(long, env = "DIAL_TIMEOUT_MS", default_value = "5000")]
    pub dial_timeout_ms: u64,

    /// Source key the payload is written under
    #[arg(long, env = "SOURCE", default_value = "default")]
    pub source: String,

    /// Payload to write (sent verbatim)
    #[arg(long, env = "PAYLOAD", default_value = "hello")]
    pub payload: String,

    /// Seconds to keep running after writing, so the payload can be delivered
    #[arg(long, env = "LINGER_SECS", default_value = "1000")]
    pub linger_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Build the connection configuration from the arguments
    pub fn connection_config(&self) -> ConnectionConfig {
        let connect_delay = Duration::from_millis(self.connect_delay_ms);
        let config = ConnectionConfig::new(
            connect_delay,
            Duration::from_millis(self.write_timeout_ms),
        )
        .with_dial_timeout(Duration::from_millis(self.dial_timeout_ms));

        match self.reconnect_max_delay_ms {
            Some(max) => config.with_reconnect(ReconnectPolicy::Exponential {
                initial: connect_delay,
                max: Duration::from_millis(max),
                jitter: true,
            }),
            None => config,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.target.rsplit_once(':').is_none() {
            return Err(TsdbError::Config(format!(
                "target must be host:port, got {:?}",
                self.target
            )));
        }
        if self.source.is_empty() {
            return Err(TsdbError::Config("source must not be empty".into()));
        }
        self.connection_config().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["tsdb-link"]);
        assert_eq!(args.target, "127.0.0.1:8282");
        assert_eq!(args.connect_delay_ms, 2000);
        assert_eq!(args.write_timeout_ms, 10000);
        assert!(args.validate().is_ok());

        let config = args.connection_config();
        assert_eq!(
            config.reconnect,
            ReconnectPolicy::Fixed(Duration::from_secs(2))
        );
        assert_eq!(config.write_deadline, Duration::from_secs(10));
    }

    #[test]
    fn test_max_delay_enables_backoff() {
        let args = Args::parse_from([
            "tsdb-link",
            "--connect-delay-ms",
            "100",
            "--reconnect-max-delay-ms",
            "5000",
        ]);
        match args.connection_config().reconnect {
            ReconnectPolicy::Exponential { initial, max, jitter } => {
                assert_eq!(initial, Duration::from_millis(100));
                assert_eq!(max, Duration::from_secs(5));
                assert!(jitter);
            }
            other => panic!("expected exponential policy, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_target() {
        let args = Args::parse_from(["tsdb-link", "--target", "localhost"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_write_timeout() {
        let args = Args::parse_from(["tsdb-link", "--write-timeout-ms", "0"]);
        assert!(args.validate().is_err());
    }
}
