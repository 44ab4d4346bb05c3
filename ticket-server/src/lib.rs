//! 12306 remaining-ticket checker.
//!
//! Queries the ticketing site for trains between two stations, searches
//! one-change itineraries through hub stations, and watches routes in the
//! background, alerting when seats appear. Serves a web UI and a CLI.

pub mod cache;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod kyfw;
pub mod logging;
pub mod settings;
pub mod stations;
pub mod transfer;
pub mod watch;
pub mod web;
