//! Domain types for the ticket watcher.
//!
//! These are the validated value types that the rest of the crate passes
//! around. All types enforce their invariants at construction time, so code
//! that receives them can trust their validity.

mod duration;
mod seat;
mod station;
mod ticket;
mod train;

pub use duration::{DurationError, RideDuration};
pub use seat::{Availability, SeatClass, UnknownSeatClass, parse_seat_list};
pub use station::{InvalidStationCode, StationCode};
pub use ticket::Ticket;
pub use train::{InvalidTrainNumber, TrainFilter, TrainKind, TrainNumber, UnknownTrainFilter};

#[cfg(test)]
pub(crate) use ticket::fixtures;
