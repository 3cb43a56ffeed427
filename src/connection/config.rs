//! Connection configuration and reconnect policy.

use rand::Rng;
use std::time::Duration;

use crate::error::{Result, TsdbError};

/// Capacity of the outbound payload queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// Capacity of the reconnect-request queue.
pub const RECONNECT_QUEUE_CAPACITY: usize = 10;

/// How long the supervisor waits before each dial attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt, regardless of how many failed before.
    Fixed(Duration),
    /// Delay doubles per consecutive failure, capped at `max`.
    ///
    /// With `jitter`, the actual delay is drawn uniformly from
    /// `[delay / 2, delay]`.
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl ReconnectPolicy {
    /// Delay to wait before dial attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Exponential {
                initial,
                max,
                jitter,
            } => {
                let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let delay = initial.saturating_mul(factor).min(max);
                if jitter && !delay.is_zero() {
                    let millis = delay.as_millis() as u64;
                    let jittered = rand::thread_rng().gen_range(millis / 2..=millis);
                    Duration::from_millis(jittered)
                } else {
                    delay
                }
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(Duration::from_secs(2))
    }
}

/// Configuration for a single backend connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Write deadline applied to every socket write
    pub write_deadline: Duration,
    /// Maximum time a single dial may take before it counts as failed
    pub dial_timeout: Duration,
    /// Delay schedule before dial attempts
    pub reconnect: ReconnectPolicy,
    /// Outbound queue capacity; `write()` suspends once this many are pending
    pub queue_capacity: usize,
    /// Reconnect-request queue capacity
    pub reconnect_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            write_deadline: Duration::from_secs(10),
            dial_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
            queue_capacity: OUTBOUND_QUEUE_CAPACITY,
            reconnect_capacity: RECONNECT_QUEUE_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration with a fixed connect delay and a write deadline.
    pub fn new(connect_delay: Duration, write_deadline: Duration) -> Self {
        Self {
            write_deadline,
            reconnect: ReconnectPolicy::Fixed(connect_delay),
            ..Default::default()
        }
    }

    /// Set the delay before the first dial attempt.
    ///
    /// A fixed policy uses it before every attempt. An exponential policy
    /// keeps its cap and jitter and starts from `delay`.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.reconnect = match self.reconnect {
            ReconnectPolicy::Fixed(_) => ReconnectPolicy::Fixed(delay),
            ReconnectPolicy::Exponential { max, jitter, .. } => ReconnectPolicy::Exponential {
                initial: delay,
                max,
                jitter,
            },
        };
        self
    }

    /// Set the reconnect policy.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the write deadline.
    pub fn with_write_deadline(mut self, deadline: Duration) -> Self {
        self.write_deadline = deadline;
        self
    }

    /// Set the dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the outbound queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Check the configuration before spawning a connection.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(TsdbError::Config("queue_capacity must be > 0".into()));
        }
        if self.reconnect_capacity == 0 {
            return Err(TsdbError::Config("reconnect_capacity must be > 0".into()));
        }
        if self.write_deadline.is_zero() {
            return Err(TsdbError::Config("write_deadline must be > 0".into()));
        }
        if self.dial_timeout.is_zero() {
            return Err(TsdbError::Config("dial_timeout must be > 0".into()));
        }
        if let ReconnectPolicy::Exponential { initial, max, .. } = self.reconnect {
            if initial > max {
                return Err(TsdbError::Config(format!(
                    "reconnect initial delay {:?} exceeds max {:?}",
                    initial, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.reconnect_capacity, 10);
        assert_eq!(config.write_deadline, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_sets_delay_and_deadline() {
        let config = ConnectionConfig::new(Duration::from_millis(500), Duration::from_secs(3));
        assert_eq!(
            config.reconnect,
            ReconnectPolicy::Fixed(Duration::from_millis(500))
        );
        assert_eq!(config.write_deadline, Duration::from_secs(3));
        assert_eq!(config.dial_timeout, Duration::from_secs(5));
        assert_eq!(config.queue_capacity, OUTBOUND_QUEUE_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connect_delay_keeps_exponential_policy() {
        let policy = ReconnectPolicy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: true,
        };
        let config = ConnectionConfig::default()
            .with_reconnect(policy)
            .with_connect_delay(Duration::from_millis(250));
        assert_eq!(
            config.reconnect,
            ReconnectPolicy::Exponential {
                initial: Duration::from_millis(250),
                max: Duration::from_secs(30),
                jitter: true,
            }
        );

        let fixed = ConnectionConfig::default().with_connect_delay(Duration::from_millis(250));
        assert_eq!(fixed.reconnect, ReconnectPolicy::Fixed(Duration::from_millis(250)));
    }

    #[test]
    fn test_fixed_delay_ignores_attempt() {
        let policy = ReconnectPolicy::Fixed(Duration::from_millis(250));
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(7), Duration::from_millis(250));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(250));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = ReconnectPolicy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter: false,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(40), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_jitter_stays_in_range() {
        let policy = ReconnectPolicy::Exponential {
            initial: Duration::from_millis(400),
            max: Duration::from_secs(10),
            jitter: true,
        };
        for _ in 0..100 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(800));
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ConnectionConfig::default()
            .with_queue_capacity(0)
            .validate()
            .is_err());
        assert!(ConnectionConfig::default()
            .with_write_deadline(Duration::ZERO)
            .validate()
            .is_err());

        let inverted = ConnectionConfig::default().with_reconnect(ReconnectPolicy::Exponential {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(1),
            jitter: false,
        });
        assert!(matches!(inverted.validate(), Err(TsdbError::Config(_))));
    }
}
