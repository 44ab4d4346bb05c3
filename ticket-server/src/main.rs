use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use ticket_server::commands::{self, Services};
use ticket_server::config::{Cli, Command, GlobalArgs, ServeArgs};
use ticket_server::error::Error;
use ticket_server::logging;
use ticket_server::settings::SettingsStore;
use ticket_server::transfer::TransferConfig;
use ticket_server::watch::{EmailNotifier, LogNotifier, Scheduler};
use ticket_server::web::{AppState, create_router};

/// How often to refresh the station list (24 hours).
const STATION_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(&cli.global.data_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_stdout();
            warn!(error = %e, "file logging disabled");
            None
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let global = cli.global;
    match cli.command.unwrap_or_else(|| Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(&global, &args).await,
        Command::Query(args) => commands::query(&Services::open(&global).await?, &args).await,
        Command::Transfers(args) => {
            commands::transfers(&Services::open(&global).await?, &args).await
        }
        Command::Watch(args) => {
            commands::watch(&Services::open(&global).await?, &global, &args).await
        }
        Command::Stations(command) => {
            commands::stations(&Services::open(&global).await?, &command).await
        }
        Command::Check => commands::check(&global).await,
    }
}

async fn serve(global: &GlobalArgs, args: &ServeArgs) -> Result<(), Error> {
    let services = Services::open(global).await?;
    info!(stations = services.stations.len().await, "station list loaded");

    let mut scheduler = Scheduler::new(services.tickets.clone()).with_notifier(Arc::new(LogNotifier));
    match global.smtp.smtp_config() {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "email alerts enabled");
            scheduler = scheduler.with_notifier(Arc::new(EmailNotifier::new(&smtp)?));
        }
        None => info!("SMTP not configured, email alerts disabled"),
    }

    // Spawn background task to refresh the station list daily
    let tickets = services.tickets.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATION_REFRESH_INTERVAL);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            match tickets.stations().refresh().await {
                Ok(count) => {
                    // Cached tickets carry the old station names
                    info!(
                        count,
                        dropped_queries = tickets.cache_entry_count(),
                        "refreshed station list"
                    );
                    tickets.invalidate_cache();
                }
                Err(e) => error!(error = %e, "failed to refresh station list"),
            }
        }
    });

    let state = AppState::new(
        services.tickets,
        Arc::new(scheduler),
        SettingsStore::in_dir(&global.data_dir),
        TransferConfig::default(),
    );
    let app = create_router(state, &args.static_dir);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("ticket checker listening on http://{}", args.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
