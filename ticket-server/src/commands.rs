//! Command line subcommands other than `serve`.

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheConfig, TicketService};
use crate::config::{GlobalArgs, QueryArgs, RouteArgs, StationsCommand, TransferArgs, WatchArgs};
use crate::domain::{SeatClass, StationCode, Ticket};
use crate::error::Error;
use crate::export;
use crate::kyfw::KyfwClient;
use crate::stations::{StationCache, StationDirectory};
use crate::transfer::{TransferConfig, TransferPlan, plan_transfers};
use crate::watch::{EmailNotifier, LogNotifier, Scheduler, WatchSpec};

/// Everything a subcommand needs to talk to the site.
pub struct Services {
    pub client: KyfwClient,
    pub stations: StationDirectory,
    pub tickets: Arc<TicketService>,
}

impl Services {
    /// Build the client and open the station directory.
    pub async fn open(global: &GlobalArgs) -> Result<Self, Error> {
        let client = KyfwClient::new(global.kyfw_config())?;
        let cache = StationCache::new(global.station_cache_config());
        let stations = StationDirectory::open(client.clone(), cache).await?;
        let tickets = Arc::new(TicketService::new(
            client.clone(),
            stations.clone(),
            &CacheConfig::default(),
        ));
        Ok(Self {
            client,
            stations,
            tickets,
        })
    }

    async fn resolve(&self, route: &RouteArgs) -> Result<(StationCode, StationCode), Error> {
        let from = self.stations.resolve(&route.from).await?;
        let to = self.stations.resolve(&route.to).await?;
        Ok((from, to))
    }
}

/// One line per train: number, times, duration, then each seat class.
pub fn format_ticket(ticket: &Ticket) -> String {
    let seats: Vec<String> = SeatClass::ALL
        .iter()
        .map(|c| format!("{}:{}", c.label(), ticket.seat(*c)))
        .collect();
    format!(
        "{:<7} {} {} → {} {} ({}) {}",
        ticket.train_number.as_str(),
        ticket.from_name,
        ticket.depart_time,
        ticket.to_name,
        ticket.arrive_time,
        ticket.duration,
        seats.join(" ")
    )
}

pub fn format_plan(plan: &TransferPlan) -> String {
    format!(
        "{} {} {} → {} {} | 换乘 {} @ {}{} | {} {} {} → {} {} | 总历时 {}",
        plan.first.train_number,
        plan.first.from_name,
        plan.first.depart_time,
        plan.first.to_name,
        plan.first.arrive_time,
        plan.layover,
        plan.hub_name,
        if plan.cross_station { " (跨站)" } else { "" },
        plan.second.train_number,
        plan.second.from_name,
        plan.second.depart_time,
        plan.second.to_name,
        plan.second.arrive_time,
        plan.total,
    )
}

pub async fn query(services: &Services, args: &QueryArgs) -> Result<(), Error> {
    let (from, to) = services.resolve(&args.route).await?;
    let date = args.route.date_or_today();

    let tickets: Vec<Ticket> = services
        .tickets
        .query(&from, &to, date, args.train_type)
        .await?
        .into_iter()
        .filter(|t| args.seats.is_empty() || t.has_any(&args.seats))
        .collect();

    println!("{} → {} {} ({} trains)", args.route.from, args.route.to, date, tickets.len());
    for ticket in &tickets {
        println!("{}", format_ticket(ticket));
    }

    if let Some(path) = &args.output {
        export::export_tickets(path, &tickets)?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

pub async fn transfers(services: &Services, args: &TransferArgs) -> Result<(), Error> {
    let (from, to) = services.resolve(&args.route).await?;
    let date = args.route.date_or_today();

    let plans = plan_transfers(
        services.tickets.as_ref(),
        &TransferConfig::default(),
        &from,
        &to,
        date,
    )
    .await;

    println!("{} → {} {} ({} plans)", args.route.from, args.route.to, date, plans.len());
    for plan in &plans {
        println!("{}", format_plan(plan));
    }

    if let Some(path) = &args.output {
        let file = std::fs::File::create(path)?;
        export::write_transfers_csv(std::io::BufWriter::new(file), &plans)?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

/// Poll until Ctrl-C.
pub async fn watch(services: &Services, global: &GlobalArgs, args: &WatchArgs) -> Result<(), Error> {
    let (from, to) = services.resolve(&args.route).await?;

    let mut spec = WatchSpec::new(from, to, args.route.date_or_today())
        .with_filter(args.train_type)
        .with_seats(args.seats.clone())
        .with_trains(args.trains.clone())
        .with_interval_secs(args.interval);
    if let Some(email) = &args.email {
        spec = spec.with_email(email);
    }

    let mut scheduler = Scheduler::new(services.tickets.clone()).with_notifier(Arc::new(LogNotifier));
    if let Some(smtp) = global.smtp.smtp_config() {
        scheduler = scheduler.with_notifier(Arc::new(EmailNotifier::new(&smtp)?));
    }

    let id = scheduler.add(spec).await?;
    println!("Watching (id {id}); press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    scheduler.stop_all().await;
    info!("watch interrupted");
    Ok(())
}

pub async fn stations(services: &Services, command: &StationsCommand) -> Result<(), Error> {
    match command {
        StationsCommand::Search { query, limit } => {
            for entry in services.stations.search(query, *limit).await {
                println!("{} {} {} {}", entry.code, entry.name, entry.pinyin, entry.city);
            }
        }
        StationsCommand::Cities => {
            for city in services.stations.cities().await {
                println!("{city}");
            }
        }
        StationsCommand::City { name } => {
            for entry in services.stations.stations_in_city(name).await {
                println!("{} {}", entry.code, entry.name);
            }
        }
        StationsCommand::Refresh => {
            let count = services.stations.refresh().await?;
            println!("Refreshed {count} stations");
        }
    }
    Ok(())
}

/// Check the site is reachable; fails when it is not.
pub async fn check(global: &GlobalArgs) -> Result<(), Error> {
    let client = KyfwClient::new(global.kyfw_config())?;
    let result = client.check_connectivity().await;
    if result.reachable {
        println!("{} reachable in {} ms", result.url, result.latency_ms);
        Ok(())
    } else {
        Err(Error::Unreachable(
            result.error.unwrap_or_else(|| "no response".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Availability, RideDuration, fixtures::ticket};

    #[test]
    fn ticket_line() {
        let t = ticket("G1", "BJP", "SHH", "09:00", "13:28", "04:28", Availability::Count(5));
        let line = format_ticket(&t);
        assert!(line.starts_with("G1      BJP 09:00 → SHH 13:28 (04:28)"));
        assert!(line.contains("二等座:5"));
        assert!(line.ends_with("无座:无"));
    }

    #[test]
    fn plan_line() {
        let plan = TransferPlan {
            first: ticket("D1", "NNZ", "GLZ", "08:00", "10:00", "02:00", Availability::Plenty),
            second: ticket("G2", "GBZ", "SHH", "11:30", "19:30", "08:00", Availability::Plenty),
            hub: StationCode::parse("GLZ").unwrap(),
            hub_name: "GLZ".to_string(),
            cross_station: true,
            layover: RideDuration::from_minutes(90),
            total: RideDuration::from_minutes(690),
        };
        let line = format_plan(&plan);
        assert!(line.contains("换乘 1:30 @ GLZ (跨站)"));
        assert!(line.ends_with("总历时 11:30"));
    }
}
