//! A single train's remaining tickets between two stations.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::duration::RideDuration;
use super::seat::{Availability, SeatClass};
use super::station::StationCode;
use super::train::TrainNumber;

/// One train between the queried stations on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Public train number (e.g. `G1`).
    pub train_number: TrainNumber,
    /// Upstream internal train id (e.g. `240000G10115`).
    pub train_id: String,
    pub from_code: StationCode,
    pub from_name: String,
    pub to_code: StationCode,
    pub to_name: String,
    /// Departure time as printed (`HH:MM`).
    pub depart_time: String,
    /// Arrival time as printed (`HH:MM`).
    pub arrive_time: String,
    /// Ride duration as printed (`H:MM`).
    pub duration: String,
    /// Whether the site offers the train for sale right now.
    pub bookable: bool,
    /// Button text or status shown by the site (`预订`, `列车停运`, ...).
    pub note: String,
    pub date: NaiveDate,
    pub seats: BTreeMap<SeatClass, Availability>,
}

impl Ticket {
    pub fn depart(&self) -> Option<NaiveTime> {
        parse_clock(&self.depart_time)
    }

    pub fn arrive(&self) -> Option<NaiveTime> {
        parse_clock(&self.arrive_time)
    }

    pub fn ride_duration(&self) -> Option<RideDuration> {
        RideDuration::parse(&self.duration).ok()
    }

    /// Availability for a class; classes missing from the record read as `None`.
    pub fn seat(&self, class: SeatClass) -> &Availability {
        self.seats.get(&class).unwrap_or(&Availability::None)
    }

    /// Classes among `classes` with at least one ticket left.
    /// An empty `classes` slice means every class.
    pub fn available_classes(&self, classes: &[SeatClass]) -> Vec<SeatClass> {
        SeatClass::ALL
            .into_iter()
            .filter(|c| classes.is_empty() || classes.contains(c))
            .filter(|c| self.seat(*c).is_available())
            .collect()
    }

    /// Whether any of `classes` (or any class at all, if empty) has tickets.
    pub fn has_any(&self, classes: &[SeatClass]) -> bool {
        !self.available_classes(classes).is_empty()
    }
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}
