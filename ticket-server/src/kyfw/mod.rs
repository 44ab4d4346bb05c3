//! Client for the 12306 ticketing site (`kyfw.12306.cn`).
//!
//! Key characteristics of the upstream:
//! - Queries only succeed inside a cookie session that has visited the
//!   landing pages first
//! - Aggressive clients get an HTML "network problem" page instead of JSON,
//!   so requests are spaced out and retried with a fresh session
//! - The left-ticket endpoint path moves occasionally; the API says where
//!   via `c_url`
//! - Each train is a `|`-separated record read by fixed field offsets

mod agents;
mod client;
mod convert;
mod error;
mod throttle;
mod types;

pub use agents::{USER_AGENTS, random_user_agent};
pub use client::{
    Connectivity, DEFAULT_BASE_URL, DEFAULT_QUERY_PATH, KyfwClient, KyfwConfig,
    STATION_SCRIPT_PATH, backoff_delay,
};
pub use convert::{ConversionError, MIN_FIELDS, parse_page, parse_record};
pub use error::KyfwError;
pub use throttle::Throttle;
pub use types::{Decoded, LeftTicketPage, decode_left_ticket_body, looks_like_html};

#[cfg(test)]
pub(crate) use convert::sample;
