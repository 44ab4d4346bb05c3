//! Station directory error types.

use crate::kyfw::KyfwError;

/// Errors that can occur when loading or querying the station directory.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// Fetching the station script failed
    #[error("failed to fetch station list: {0}")]
    Fetch(#[from] KyfwError),

    /// The station script could not be parsed
    #[error("station list parse error: {0}")]
    Parse(String),

    /// Cache operation failed
    #[error("cache error: {message}")]
    Cache { message: String },

    /// No station matches the given name or code
    #[error("unknown station: {0}")]
    Unknown(String),
}
