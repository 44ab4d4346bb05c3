//! Data transfer objects for web requests and responses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{SeatClass, StationCode, Ticket, TrainFilter, TrainNumber};
use crate::stations::StationEntry;
use crate::transfer::TransferPlan;
use crate::watch::{WatchId, WatchSnapshot};

/// Request to search stations.
#[derive(Debug, Deserialize)]
pub struct StationSearchRequest {
    /// Name, telecode or pinyin fragment
    pub q: String,

    /// Maximum number of results (default 10, capped at 50)
    pub limit: Option<usize>,
}

/// A station in search results.
#[derive(Debug, Serialize)]
pub struct StationResult {
    pub code: StationCode,
    pub name: String,
    pub pinyin: String,
    pub city: String,
}

impl From<StationEntry> for StationResult {
    fn from(entry: StationEntry) -> Self {
        Self {
            code: entry.code,
            name: entry.name,
            pinyin: entry.pinyin,
            city: entry.city,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StationSearchResponse {
    pub stations: Vec<StationResult>,
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub cities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CityRequest {
    pub name: String,
}

/// Query string shared by the ticket, transfer and export endpoints.
///
/// Everything is a string so bad values produce a readable 400.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketQueryRequest {
    /// Origin name or telecode
    pub from: String,

    /// Destination name or telecode
    pub to: String,

    /// Travel date, YYYY-MM-DD (defaults to today)
    pub date: Option<String>,

    /// all, gc, d or other
    pub train_type: Option<String>,

    /// Comma-separated seat classes; only trains with one of them left
    pub seats: Option<String>,
}

/// Results of a ticket query.
#[derive(Debug, Serialize)]
pub struct TicketQueryResponse {
    pub from: StationCode,
    pub to: StationCode,
    pub date: NaiveDate,
    pub train_type: TrainFilter,
    pub count: usize,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub from: StationCode,
    pub to: StationCode,
    pub date: NaiveDate,
    pub plans: Vec<TransferPlan>,
}

/// Body of `POST /watches`.
#[derive(Debug, Deserialize)]
pub struct CreateWatchRequest {
    /// Origin name or telecode
    pub from: String,

    /// Destination name or telecode
    pub to: String,

    pub date: NaiveDate,

    #[serde(default)]
    pub train_type: TrainFilter,

    #[serde(default)]
    pub seats: Vec<SeatClass>,

    #[serde(default)]
    pub trains: Vec<TrainNumber>,

    /// Seconds between polls (defaults to the saved setting)
    pub interval_secs: Option<u64>,

    /// Alert recipient (defaults to the saved setting)
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateWatchResponse {
    pub id: WatchId,
}

#[derive(Debug, Serialize)]
pub struct WatchListResponse {
    pub watches: Vec<WatchSnapshot>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
