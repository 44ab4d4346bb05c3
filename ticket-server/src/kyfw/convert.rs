//! Conversion from positional left-ticket records to [`Ticket`]s.
//!
//! Each record is a single string of `|`-separated fields. The layout is
//! undocumented; the offsets below are the ones the booking page itself
//! reads. Records too short to contain every seat field are skipped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::{Availability, SeatClass, StationCode, Ticket, TrainNumber};

use super::types::LeftTicketPage;

/// A record must reach the business-class field (offset 32).
pub const MIN_FIELDS: usize = 33;

const NOTE: usize = 1;
const TRAIN_ID: usize = 2;
const TRAIN_NUMBER: usize = 3;
const FROM_CODE: usize = 6;
const TO_CODE: usize = 7;
const DEPART: usize = 8;
const ARRIVE: usize = 9;
const DURATION: usize = 10;
const CAN_BUY: usize = 11;

/// Why a single record could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("record has {found} fields, need at least {min}", min = MIN_FIELDS)]
    TooFewFields { found: usize },

    #[error("invalid train number {0:?}")]
    TrainNumber(String),

    #[error("invalid station code {value:?} at field {field}")]
    StationCode { field: usize, value: String },
}

/// Convert one record. Station names are left equal to the codes.
pub fn parse_record(raw: &str, date: NaiveDate) -> Result<Ticket, ConversionError> {
    let fields: Vec<&str> = raw.split('|').collect();
    if fields.len() < MIN_FIELDS {
        return Err(ConversionError::TooFewFields {
            found: fields.len(),
        });
    }

    let train_number = TrainNumber::parse(fields[TRAIN_NUMBER].trim())
        .map_err(|_| ConversionError::TrainNumber(fields[TRAIN_NUMBER].to_string()))?;
    let from_code = station_field(&fields, FROM_CODE)?;
    let to_code = station_field(&fields, TO_CODE)?;

    let seats: BTreeMap<SeatClass, Availability> = SeatClass::ALL
        .into_iter()
        .map(|class| (class, Availability::parse(fields[class.field_index()])))
        .collect();

    Ok(Ticket {
        train_number,
        train_id: fields[TRAIN_ID].to_string(),
        from_code,
        from_name: from_code.to_string(),
        to_code,
        to_name: to_code.to_string(),
        depart_time: fields[DEPART].to_string(),
        arrive_time: fields[ARRIVE].to_string(),
        duration: fields[DURATION].to_string(),
        bookable: fields[CAN_BUY] == "Y",
        note: fields[NOTE].to_string(),
        date,
        seats,
    })
}

fn station_field(fields: &[&str], field: usize) -> Result<StationCode, ConversionError> {
    StationCode::parse(fields[field].trim()).map_err(|_| ConversionError::StationCode {
        field,
        value: fields[field].to_string(),
    })
}

/// Convert every usable record on a page, resolving station names.
///
/// Names come from `names` first, then the page's own map, then fall back
/// to the code. Unusable records are logged and skipped.
pub fn parse_page<F>(page: &LeftTicketPage, date: NaiveDate, names: F) -> Vec<Ticket>
where
    F: Fn(&StationCode) -> Option<String>,
{
    let resolve = |code: &StationCode| {
        names(code)
            .or_else(|| page.station_map.get(code.as_str()).cloned())
            .unwrap_or_else(|| code.to_string())
    };

    let mut tickets = Vec::with_capacity(page.records.len());
    for (i, raw) in page.records.iter().enumerate() {
        match parse_record(raw, date) {
            Ok(mut ticket) => {
                ticket.from_name = resolve(&ticket.from_code);
                ticket.to_name = resolve(&ticket.to_code);
                tickets.push(ticket);
            }
            Err(e) => warn!(record = i, error = %e, "skipping left-ticket record"),
        }
    }
    debug!(
        parsed = tickets.len(),
        total = page.records.len(),
        "converted left-ticket page"
    );
    tickets
}
