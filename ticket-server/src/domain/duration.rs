//! Ride durations as printed on left-ticket records.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration: {reason}")]
pub struct DurationError {
    reason: &'static str,
}

impl DurationError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A ride duration in whole minutes.
///
/// Records print durations as `H:MM` where the hour part may exceed 23
/// (`26:30` for a long sleeper). Some older pages use `N天H:MM`.
///
/// # Examples
///
/// ```
/// use ticket_server::domain::RideDuration;
///
/// let d = RideDuration::parse("04:28").unwrap();
/// assert_eq!(d.minutes(), 268);
/// assert_eq!(d.to_string(), "4:28");
///
/// let long = RideDuration::parse("1天02:05").unwrap();
/// assert_eq!(long.minutes(), 26 * 60 + 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RideDuration(u32);

impl RideDuration {
    pub fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    /// Parse `H:MM` or `N天H:MM`.
    pub fn parse(s: &str) -> Result<Self, DurationError> {
        let s = s.trim();
        let (days, rest) = match s.split_once('天') {
            Some((days, rest)) => {
                let days: u32 = days
                    .trim()
                    .parse()
                    .map_err(|_| DurationError::new("invalid day count"))?;
                (days, rest.trim())
            }
            None => (0, s),
        };

        let (hours, minutes) = rest
            .split_once(':')
            .ok_or_else(|| DurationError::new("expected H:MM"))?;

        if hours.is_empty() || !hours.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DurationError::new("invalid hour digits"));
        }
        if minutes.len() != 2 || !minutes.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DurationError::new("invalid minute digits"));
        }

        let hours: u32 = hours
            .parse()
            .map_err(|_| DurationError::new("hour out of range"))?;
        let minutes: u32 = minutes
            .parse()
            .map_err(|_| DurationError::new("invalid minute digits"))?;
        if minutes > 59 {
            return Err(DurationError::new("minute must be 0-59"));
        }

        days.checked_mul(24 * 60)
            .and_then(|d| hours.checked_mul(60).and_then(|h| d.checked_add(h)))
            .and_then(|m| m.checked_add(minutes))
            .map(Self)
            .ok_or_else(|| DurationError::new("duration out of range"))
    }
}

impl Add for RideDuration {
    type Output = RideDuration;

    fn add(self, rhs: RideDuration) -> RideDuration {
        RideDuration(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for RideDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.0 / 60, self.0 % 60)
    }
}
