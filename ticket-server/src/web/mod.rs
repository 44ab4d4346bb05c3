//! Web layer for the ticket checker.
//!
//! Serves the query page, HTML fragments for it, a JSON API and file exports.

mod dto;
mod routes;
mod state;
pub mod templates;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
pub use templates::*;
