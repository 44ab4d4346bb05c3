//! Scheduled seat watching.
//!
//! A watch polls one route on one date at a fixed interval and raises an
//! alert whenever seats of interest become available. Alerts go to every
//! configured [`Notifier`]: the log always, email when SMTP is configured
//! and the watch names a recipient.

mod alert;
mod notify;
mod scheduler;
mod spec;

pub use alert::{Alert, AlertState, SeatAlert, matching};
pub use notify::{EmailNotifier, LogNotifier, Notifier, NotifyError, SmtpConfig, dispatch};
pub use scheduler::{Scheduler, WatchSnapshot, WatchStatus};
pub use spec::{DEFAULT_INTERVAL_SECS, MIN_INTERVAL_SECS, WatchError, WatchId, WatchSpec};
