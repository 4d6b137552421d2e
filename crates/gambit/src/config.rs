use std::time::Duration;

use crate::error::MatchError;
use crate::types::TimeControl;

/// Configuration for the match registry.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// How long a finished match stays queryable before eviction. Default: 300s.
    pub finished_retention: Duration,
    /// Grace period after a player disconnects before the game is forfeited. Default: 30s.
    pub abandonment_grace: Duration,
    /// How long a draw offer stays open for the opponent. Default: 60s.
    pub draw_offer_window: Duration,
    /// Time control used when a client does not name one. Default: 10+0.
    pub default_time_control: TimeControl,
    /// Capacity of the outbound event channel. Default: 1024.
    pub event_capacity: usize,
    /// Finish idle games when the side to move runs out of time, without
    /// waiting for a move attempt. Default: true.
    pub flag_fall_timers: bool,
}

impl ArenaConfig {
    /// Validate configuration values.
    ///
    /// Checks:
    /// - all durations are non-zero
    /// - `event_capacity >= 1`
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.finished_retention.is_zero() {
            return Err(MatchError::InvalidConfig {
                reason: "finished_retention must be > 0".to_string(),
            });
        }
        if self.abandonment_grace.is_zero() {
            return Err(MatchError::InvalidConfig {
                reason: "abandonment_grace must be > 0".to_string(),
            });
        }
        if self.draw_offer_window.is_zero() {
            return Err(MatchError::InvalidConfig {
                reason: "draw_offer_window must be > 0".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(MatchError::InvalidConfig {
                reason: "event_capacity must be >= 1".to_string(),
            });
        }
        if self.default_time_control.initial_seconds == 0 {
            return Err(MatchError::InvalidConfig {
                reason: format!(
                    "default_time_control must have initial time, got {}",
                    self.default_time_control
                ),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            finished_retention: Duration::from_secs(300),
            abandonment_grace: Duration::from_secs(30),
            draw_offer_window: Duration::from_secs(60),
            default_time_control: TimeControl::RAPID,
            event_capacity: 1024,
            flag_fall_timers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ArenaConfig::default();
        assert_eq!(config.finished_retention, Duration::from_secs(300));
        assert_eq!(config.abandonment_grace, Duration::from_secs(30));
        assert_eq!(config.draw_offer_window, Duration::from_secs(60));
        assert_eq!(config.default_time_control.to_string(), "10+0");
        assert_eq!(config.event_capacity, 1024);
        assert!(config.flag_fall_timers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_zero_retention() {
        let config = ArenaConfig {
            finished_retention: Duration::ZERO,
            ..Default::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("finished_retention"), "got: {msg}");
    }

    #[test]
    fn validate_zero_grace() {
        let config = ArenaConfig {
            abandonment_grace: Duration::ZERO,
            ..Default::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("abandonment_grace"), "got: {msg}");
    }

    #[test]
    fn validate_zero_capacity() {
        let config = ArenaConfig {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MatchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn validate_untimed_default_control() {
        let config = ArenaConfig {
            default_time_control: TimeControl::new(0, 5),
            ..Default::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("default_time_control"), "got: {msg}");
    }
}
