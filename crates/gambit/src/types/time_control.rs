//! Time control settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Initial thinking time and per-move increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    /// Initial time in seconds.
    pub initial_seconds: u32,
    /// Increment per move in seconds.
    pub increment_seconds: u32,
}

impl TimeControl {
    /// Bullet: 1 minute, no increment.
    pub const BULLET: Self = Self::new(60, 0);

    /// Blitz: 5 minutes + 3 second increment.
    pub const BLITZ: Self = Self::new(300, 3);

    /// Rapid: 10 minutes, no increment. Used when a client omits the control.
    pub const RAPID: Self = Self::new(600, 0);

    #[must_use]
    pub const fn new(initial_seconds: u32, increment_seconds: u32) -> Self {
        Self {
            initial_seconds,
            increment_seconds,
        }
    }

    #[must_use]
    pub const fn initial_time(&self) -> Duration {
        Duration::from_secs(self.initial_seconds as u64)
    }

    #[must_use]
    pub const fn increment(&self) -> Duration {
        Duration::from_secs(self.increment_seconds as u64)
    }

    /// Initial clock value in milliseconds.
    #[must_use]
    pub const fn initial_ms(&self) -> i64 {
        self.initial_seconds as i64 * 1000
    }

    /// Increment in milliseconds.
    #[must_use]
    pub const fn increment_ms(&self) -> i64 {
        self.increment_seconds as i64 * 1000
    }

    /// Parse the compact `"minutes+increment"` form (e.g. `"5+3"`).
    ///
    /// A bare `"5"` means no increment.
    pub fn parse(s: &str) -> Result<Self, MatchError> {
        let invalid = |reason: &str| MatchError::InvalidTimeControl {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split('+');
        let minutes = parts.next().unwrap_or_default().trim();
        let increment = parts.next().map(str::trim);
        if parts.next().is_some() {
            return Err(invalid("expected minutes+increment"));
        }

        let minutes: u32 = minutes
            .parse()
            .map_err(|_| invalid("minutes must be a whole number"))?;
        let increment: u32 = match increment {
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid("increment must be a whole number of seconds"))?,
            None => 0,
        };
        if minutes == 0 {
            return Err(invalid("initial time must be positive"));
        }
        let initial = minutes
            .checked_mul(60)
            .ok_or_else(|| invalid("initial time is too large"))?;

        Ok(Self::new(initial, increment))
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::RAPID
    }
}

impl std::str::FromStr for TimeControl {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for TimeControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}+{}",
            self.initial_seconds / 60,
            self.increment_seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minutes_and_increment() {
        let tc = TimeControl::parse("5+3").unwrap();
        assert_eq!(tc.initial_seconds, 300);
        assert_eq!(tc.increment_seconds, 3);
        assert_eq!(tc.initial_ms(), 300_000);
        assert_eq!(tc.increment_ms(), 3_000);

        let tc = TimeControl::parse(" 15 + 10 ").unwrap();
        assert_eq!(tc, TimeControl::new(900, 10));
    }

    #[test]
    fn bare_minutes_mean_no_increment() {
        assert_eq!(TimeControl::parse("5").unwrap(), TimeControl::new(300, 0));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "+3", "0+5", "five+0", "5+x", "5+3+1", "-1+0"] {
            let err = TimeControl::parse(bad).unwrap_err();
            assert!(
                matches!(err, MatchError::InvalidTimeControl { .. }),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(TimeControl::BLITZ.to_string(), "5+3");
        assert_eq!(TimeControl::default().to_string(), "10+0");
        let tc: TimeControl = "3+2".parse().unwrap();
        assert_eq!(tc.to_string(), "3+2");
    }
}
