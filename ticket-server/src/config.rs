//! Command line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{SeatClass, TrainFilter, TrainNumber};
use crate::kyfw::{DEFAULT_BASE_URL, KyfwConfig};
use crate::stations::StationCacheConfig;
use crate::watch::{DEFAULT_INTERVAL_SECS, SmtpConfig};

/// Station cache file inside the data directory.
pub const STATION_CACHE_FILE: &str = "stations.json";

/// 12306 remaining-ticket checker.
#[derive(Parser, Debug)]
#[command(name = "ticket-server", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory for the station cache and settings
    #[arg(long, env = "TICKET_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Upstream base URL
    #[arg(long, env = "KYFW_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Minimum gap between upstream requests, in milliseconds
    #[arg(long, env = "KYFW_MIN_INTERVAL_MS", default_value_t = 2000, global = true)]
    pub min_interval_ms: u64,

    /// Attempts per upstream request, including the first
    #[arg(long, env = "KYFW_MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Upstream request timeout, in seconds
    #[arg(long, env = "KYFW_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    #[command(flatten)]
    pub smtp: SmtpArgs,
}

impl GlobalArgs {
    pub fn kyfw_config(&self) -> KyfwConfig {
        KyfwConfig::new()
            .with_base_url(&self.base_url)
            .with_min_interval(Duration::from_millis(self.min_interval_ms))
            .with_max_retries(self.max_retries)
            .with_timeout(self.timeout_secs)
    }

    pub fn station_cache_config(&self) -> StationCacheConfig {
        StationCacheConfig::new(self.data_dir.join(STATION_CACHE_FILE))
    }
}

/// SMTP server for email alerts. Email is disabled without a host.
#[derive(Args, Debug, Clone)]
pub struct SmtpArgs {
    #[arg(long, env = "SMTP_HOST", global = true)]
    pub smtp_host: Option<String>,

    #[arg(long, env = "SMTP_PORT", default_value_t = 465, global = true)]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME", global = true)]
    pub smtp_username: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true, global = true)]
    pub smtp_password: Option<String>,

    /// Sender address; defaults to the username
    #[arg(long, env = "SMTP_FROM", global = true)]
    pub smtp_from: Option<String>,
}

impl SmtpArgs {
    /// SMTP settings, if a host and a sender are known.
    pub fn smtp_config(&self) -> Option<SmtpConfig> {
        let host = self.smtp_host.as_deref().filter(|h| !h.is_empty())?;
        let from = self
            .smtp_from
            .as_deref()
            .or(self.smtp_username.as_deref())?;

        let mut config = SmtpConfig::new(host, from).with_port(self.smtp_port);
        if let (Some(user), Some(pass)) = (&self.smtp_username, &self.smtp_password) {
            config = config.with_credentials(user, pass);
        }
        Some(config)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the web UI (default)
    Serve(ServeArgs),
    /// Query remaining tickets once
    Query(QueryArgs),
    /// Search one-change itineraries through hub stations
    Transfers(TransferArgs),
    /// Poll a route until interrupted, alerting when seats appear
    Watch(WatchArgs),
    /// Look up stations
    #[command(subcommand)]
    Stations(StationsCommand),
    /// Check that the ticketing site is reachable
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "TICKET_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory of static assets
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Origin, destination and date, as given on the command line.
#[derive(Args, Debug, Clone)]
pub struct RouteArgs {
    /// Origin station name or telecode
    #[arg(long)]
    pub from: String,

    /// Destination station name or telecode
    #[arg(long)]
    pub to: String,

    /// Travel date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

impl RouteArgs {
    pub fn date_or_today(&self) -> NaiveDate {
        self.date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub route: RouteArgs,

    /// Train type: all, gc, d, other
    #[arg(long, default_value = "all")]
    pub train_type: TrainFilter,

    /// Only show trains with seats left in these classes
    #[arg(long, value_delimiter = ',')]
    pub seats: Vec<SeatClass>,

    /// Also write the results to this file (.csv or .xlsx)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    #[command(flatten)]
    pub route: RouteArgs,

    /// Also write the plans to this CSV file
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub route: RouteArgs,

    #[arg(long, default_value = "all")]
    pub train_type: TrainFilter,

    /// Seat classes to watch; all when omitted
    #[arg(long, value_delimiter = ',')]
    pub seats: Vec<SeatClass>,

    /// Train numbers to watch; all when omitted
    #[arg(long, value_delimiter = ',', value_parser = TrainNumber::parse)]
    pub trains: Vec<TrainNumber>,

    /// Seconds between polls
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval: u64,

    /// Email alerts to this address (needs SMTP settings)
    #[arg(long)]
    pub email: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StationsCommand {
    /// Search stations by name, telecode or pinyin
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List cities
    Cities,
    /// List the stations of a city
    City { name: String },
    /// Re-download the station list
    Refresh,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ticket-server").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        assert_eq!(cli.global.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn query_arguments() {
        let cli = parse(&[
            "query",
            "--from",
            "南宁",
            "--to",
            "桂林",
            "--date",
            "2025-01-20",
            "--train-type",
            "d",
            "--seats",
            "second,hard-sleeper",
        ]);
        let Some(Command::Query(q)) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(q.route.from, "南宁");
        assert_eq!(q.route.date, NaiveDate::from_ymd_opt(2025, 1, 20));
        assert_eq!(q.train_type, TrainFilter::Emu);
        assert_eq!(q.seats, vec![SeatClass::SecondClass, SeatClass::HardSleeper]);
    }

    #[test]
    fn watch_arguments() {
        let cli = parse(&[
            "watch", "--from", "NNZ", "--to", "GLZ", "--trains", "D8201,G1502", "--interval", "60",
        ]);
        let Some(Command::Watch(w)) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(w.trains.len(), 2);
        assert_eq!(w.interval, 60);
        assert!(w.seats.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        let bad = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("ticket-server").chain(args.iter().copied()))
                .is_err()
        };
        assert!(bad(&["query", "--from", "a", "--to", "b", "--date", "20250120"]));
        assert!(bad(&["query", "--from", "a", "--to", "b", "--seats", "deluxe"]));
        assert!(bad(&["watch", "--from", "a", "--to", "b", "--trains", "g1"]));
    }

    #[test]
    fn global_args_build_configs() {
        let cli = parse(&["--min-interval-ms", "500", "--max-retries", "5", "check"]);
        let config = cli.global.kyfw_config();
        assert_eq!(config.min_interval, Duration::from_millis(500));
        assert_eq!(config.max_retries, 5);
        assert!(
            cli.global
                .station_cache_config()
                .path
                .ends_with("data/stations.json")
        );
    }

    #[test]
    fn smtp_needs_host_and_sender() {
        let smtp = SmtpArgs {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_port: 587,
            smtp_username: Some("me@example.com".to_string()),
            smtp_password: Some("secret".to_string()),
            smtp_from: None,
        };
        let config = smtp.smtp_config().unwrap();
        assert_eq!(config.from, "me@example.com");
        assert_eq!(config.port, 587);
        assert!(config.password.is_some());

        let no_host = SmtpArgs {
            smtp_host: None,
            ..smtp
        };
        assert!(no_host.smtp_config().is_none());
    }
}
