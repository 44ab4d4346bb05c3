//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::TicketService;
use crate::settings::SettingsStore;
use crate::stations::StationDirectory;
use crate::transfer::TransferConfig;
use crate::watch::Scheduler;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Cached ticket queries
    pub tickets: Arc<TicketService>,

    /// Station names, codes and cities
    pub stations: StationDirectory,

    /// Running watches
    pub scheduler: Arc<Scheduler>,

    /// Last query and alert preferences
    pub settings: SettingsStore,

    /// Hubs and layover bounds for transfer search
    pub transfer: Arc<TransferConfig>,
}

impl AppState {
    pub fn new(
        tickets: Arc<TicketService>,
        scheduler: Arc<Scheduler>,
        settings: SettingsStore,
        transfer: TransferConfig,
    ) -> Self {
        Self {
            stations: tickets.stations().clone(),
            tickets,
            scheduler,
            settings,
            transfer: Arc::new(transfer),
        }
    }
}
