//! One-change itineraries.
//!
//! When no direct train has seats, a common workaround is to change at a
//! large hub. For each configured hub this queries origin → hub and
//! hub → destination, pairs the legs whose layover is sensible, and ranks
//! the pairs by total journey time.

mod config;
mod search;

pub use config::{DEFAULT_HUBS, TransferConfig};
pub use search::{TransferPlan, connect, plan_transfers, rank_plans};
