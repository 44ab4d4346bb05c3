//! Deciding when a watch should raise an alert.
//!
//! Alerts are edge-triggered: a (train, seat class) pair is reported when it
//! becomes available, not on every poll while it stays available. If it
//! sells out and comes back, it is reported again.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::Serialize;

use crate::domain::{Availability, SeatClass, Ticket, TrainNumber};

use super::spec::{WatchId, WatchSpec};

type AlertKey = (TrainNumber, SeatClass);

/// One seat class on one train that just became available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAlert {
    pub train: TrainNumber,
    pub class: SeatClass,
    pub availability: Availability,
    pub from_name: String,
    pub to_name: String,
    pub depart_time: String,
    pub arrive_time: String,
}

/// Everything a notifier needs to tell the user.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub watch_id: WatchId,
    pub spec: WatchSpec,
    pub seats: Vec<SeatAlert>,
}

impl Alert {
    pub fn subject(&self) -> String {
        let route = self
            .seats
            .first()
            .map(|s| format!("{}→{}", s.from_name, s.to_name))
            .unwrap_or_else(|| format!("{}→{}", self.spec.from, self.spec.to));
        format!("余票提醒: {} {}", route, self.spec.date)
    }

    /// Plain-text body, one line per seat.
    pub fn body(&self) -> String {
        let mut out = format!("{} 有新的余票:\n\n", self.spec);
        for seat in &self.seats {
            let _ = writeln!(
                out,
                "{} {} {}-{} {}: {}",
                seat.train,
                seat.from_name,
                seat.depart_time,
                seat.arrive_time,
                seat.class.label(),
                seat.availability
            );
        }
        out
    }
}

/// Trains the watch cares about, in upstream order.
pub fn matching<'a>(spec: &WatchSpec, tickets: &'a [Ticket]) -> Vec<&'a Ticket> {
    tickets
        .iter()
        .filter(|t| spec.wants_train(t) && t.has_any(&spec.seats))
        .collect()
}

fn available_now(spec: &WatchSpec, tickets: &[Ticket]) -> BTreeMap<AlertKey, SeatAlert> {
    let mut found = BTreeMap::new();
    for ticket in tickets.iter().filter(|t| spec.wants_train(t)) {
        for class in ticket.available_classes(&spec.seats) {
            found.insert(
                (ticket.train_number.clone(), class),
                SeatAlert {
                    train: ticket.train_number.clone(),
                    class,
                    availability: ticket.seat(class).clone(),
                    from_name: ticket.from_name.clone(),
                    to_name: ticket.to_name.clone(),
                    depart_time: ticket.depart_time.clone(),
                    arrive_time: ticket.arrive_time.clone(),
                },
            );
        }
    }
    found
}

/// What was available on the previous poll.
#[derive(Debug, Default)]
pub struct AlertState {
    previous: BTreeSet<AlertKey>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this poll's tickets and return the newly available seats.
    pub fn update(&mut self, spec: &WatchSpec, tickets: &[Ticket]) -> Vec<SeatAlert> {
        let now = available_now(spec, tickets);
        let fresh = now
            .iter()
            .filter(|(key, _)| !self.previous.contains(*key))
            .map(|(_, alert)| alert.clone())
            .collect();
        self.previous = now.into_keys().collect();
        fresh
    }
}
