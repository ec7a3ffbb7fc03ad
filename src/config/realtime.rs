//! Realtime hub configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Queue sizes, deadlines and limits for the hub and its sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Events buffered per session before it is evicted as a slow consumer
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,

    #[serde(default = "default_register_queue_capacity")]
    pub register_queue_capacity: usize,

    #[serde(default = "default_unregister_queue_capacity")]
    pub unregister_queue_capacity: usize,

    #[serde(default = "default_dispatch_queue_capacity")]
    pub dispatch_queue_capacity: usize,

    /// Largest accepted inbound text frame
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Idle-read deadline, renewed by each pong
    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,

    /// Keepalive ping interval
    #[serde(default = "default_ping_period")]
    pub ping_period_secs: u64,

    /// Bound on each write
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,

    /// Bound on each chat history append
    #[serde(default = "default_history_timeout")]
    pub history_timeout_secs: u64,
}

impl RealtimeConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.ping_period_secs)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.history_timeout_secs)
    }

    /// Validate realtime configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let sizes = [
            (self.session_queue_capacity, "session_queue_capacity"),
            (self.register_queue_capacity, "register_queue_capacity"),
            (self.unregister_queue_capacity, "unregister_queue_capacity"),
            (self.dispatch_queue_capacity, "dispatch_queue_capacity"),
            (self.max_message_bytes, "max_message_bytes"),
        ];
        if let Some((_, name)) = sizes.iter().find(|(value, _)| *value == 0) {
            return Err(ValidationError::ZeroRealtimeSetting(name));
        }

        let durations = [
            (self.pong_wait_secs, "pong_wait_secs"),
            (self.ping_period_secs, "ping_period_secs"),
            (self.write_wait_secs, "write_wait_secs"),
            (self.history_timeout_secs, "history_timeout_secs"),
        ];
        if let Some((_, name)) = durations.iter().find(|(value, _)| *value == 0) {
            return Err(ValidationError::ZeroRealtimeSetting(name));
        }

        if self.ping_period_secs >= self.pong_wait_secs {
            return Err(ValidationError::PingPeriodTooLong);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            session_queue_capacity: default_session_queue_capacity(),
            register_queue_capacity: default_register_queue_capacity(),
            unregister_queue_capacity: default_unregister_queue_capacity(),
            dispatch_queue_capacity: default_dispatch_queue_capacity(),
            max_message_bytes: default_max_message_bytes(),
            pong_wait_secs: default_pong_wait(),
            ping_period_secs: default_ping_period(),
            write_wait_secs: default_write_wait(),
            history_timeout_secs: default_history_timeout(),
        }
    }
}

fn default_session_queue_capacity() -> usize {
    256
}

fn default_register_queue_capacity() -> usize {
    100
}

fn default_unregister_queue_capacity() -> usize {
    100
}

fn default_dispatch_queue_capacity() -> usize {
    1000
}

fn default_max_message_bytes() -> usize {
    64 * 1024
}

fn default_pong_wait() -> u64 {
    60
}

// 9/10 of pong wait
fn default_ping_period() -> u64 {
    54
}

fn default_write_wait() -> u64 {
    10
}

fn default_history_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.session_queue_capacity, 256);
        assert_eq!(config.dispatch_queue_capacity, 1000);
        assert_eq!(config.ping_period(), Duration::from_secs(54));
        assert_eq!(config.pong_wait(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ping_must_be_shorter_than_pong() {
        let config = RealtimeConfig {
            ping_period_secs: 60,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::PingPeriodTooLong));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RealtimeConfig {
            session_queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroRealtimeSetting("session_queue_capacity"))
        );
    }

    #[test]
    fn test_zero_write_wait_rejected() {
        let config = RealtimeConfig {
            write_wait_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
