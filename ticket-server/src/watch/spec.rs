//! What a watch looks for.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

use crate::domain::{SeatClass, StationCode, Ticket, TrainFilter, TrainNumber};

/// Shortest allowed polling interval.
pub const MIN_INTERVAL_SECS: u64 = 30;

/// Polling interval when none is given.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Errors from creating or managing watches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    #[error("origin and destination are the same station ({0})")]
    SameStation(StationCode),

    #[error("interval of {secs}s is below the minimum of {min}s", min = MIN_INTERVAL_SECS)]
    IntervalTooShort { secs: u64 },

    #[error("invalid alert email address: {0}")]
    InvalidEmail(String),

    #[error("no watch with id {0}")]
    NotFound(WatchId),
}

/// Identifier of a running watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WatchId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(WatchId)
    }
}

/// A polling job: one route on one date, plus what counts as a hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSpec {
    pub from: StationCode,
    pub to: StationCode,
    pub date: NaiveDate,

    #[serde(default)]
    pub train_filter: TrainFilter,

    /// Seat classes of interest; empty means any class.
    #[serde(default)]
    pub seats: Vec<SeatClass>,

    /// Only these trains; empty means every train.
    #[serde(default)]
    pub trains: Vec<TrainNumber>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Where to email alerts, if anywhere.
    #[serde(default)]
    pub email: Option<String>,
}

impl WatchSpec {
    pub fn new(from: StationCode, to: StationCode, date: NaiveDate) -> Self {
        Self {
            from,
            to,
            date,
            train_filter: TrainFilter::All,
            seats: Vec::new(),
            trains: Vec::new(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            email: None,
        }
    }

    pub fn with_filter(mut self, filter: TrainFilter) -> Self {
        self.train_filter = filter;
        self
    }

    pub fn with_seats(mut self, seats: Vec<SeatClass>) -> Self {
        self.seats = seats;
        self
    }

    pub fn with_trains(mut self, trains: Vec<TrainNumber>) -> Self {
        self.trains = trains;
        self
    }

    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Check the spec before it is scheduled.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.from == self.to {
            return Err(WatchError::SameStation(self.from));
        }
        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(WatchError::IntervalTooShort {
                secs: self.interval_secs,
            });
        }
        if let Some(email) = self.email.as_deref() {
            email
                .parse::<Mailbox>()
                .map_err(|_| WatchError::InvalidEmail(email.to_string()))?;
        }
        Ok(())
    }

    /// Whether a train is one this watch cares about (ignoring seats).
    pub fn wants_train(&self, ticket: &Ticket) -> bool {
        self.train_filter.matches(&ticket.train_number)
            && (self.trains.is_empty() || self.trains.contains(&ticket.train_number))
    }
}

impl fmt::Display for WatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{} {}", self.from, self.to, self.date)?;
        if self.train_filter != TrainFilter::All {
            write!(f, " [{}]", self.train_filter.label())?;
        }
        if !self.seats.is_empty() {
            let labels: Vec<&str> = self.seats.iter().map(|s| s.label()).collect();
            write!(f, " ({})", labels.join("/"))?;
        }
        Ok(())
    }
}
