//! Station directory.
//!
//! Maps station names to 12306 telecodes and back. The list comes from the
//! site's `station_name.js` script, is cached on disk, and is refreshed
//! daily while the server runs.

mod cache;
mod directory;
mod error;
mod parse;

pub use cache::{StationCache, StationCacheConfig};
pub use directory::{StationDirectory, StationIndex};
pub use error::StationError;
pub use parse::{StationEntry, parse_station_script};

#[cfg(test)]
pub(crate) use parse::sample;
