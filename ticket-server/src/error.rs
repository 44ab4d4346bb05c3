//! Crate-level error for the command line.

use crate::export::ExportError;
use crate::kyfw::KyfwError;
use crate::settings::SettingsError;
use crate::stations::StationError;
use crate::watch::{NotifyError, WatchError};

/// Any failure a subcommand can end with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Kyfw(#[from] KyfwError),

    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ticketing site unreachable: {0}")]
    Unreachable(String),
}
