//! One-change itinerary search through hub stations.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::TicketSource;
use crate::domain::{RideDuration, StationCode, Ticket};

use super::config::TransferConfig;

/// Two trains joined at a hub.
#[derive(Debug, Clone, Serialize)]
pub struct TransferPlan {
    pub first: Ticket,
    pub second: Ticket,
    /// The hub that was queried.
    pub hub: StationCode,
    /// Name of the station the first train arrives at.
    pub hub_name: String,
    /// The second train leaves from a different station than the first
    /// arrives at (same city).
    pub cross_station: bool,
    pub layover: RideDuration,
    pub total: RideDuration,
}

impl TransferPlan {
    pub fn depart(&self) -> Option<NaiveTime> {
        self.first.depart()
    }
}

/// Find one-change itineraries from `from` to `to` on `date`.
///
/// Each hub costs up to two upstream queries. A hub whose queries fail is
/// logged and skipped; the search itself never fails.
pub async fn plan_transfers<S>(
    source: &S,
    config: &TransferConfig,
    from: &StationCode,
    to: &StationCode,
    date: NaiveDate,
) -> Vec<TransferPlan>
where
    S: TicketSource + ?Sized,
{
    let hubs: Vec<StationCode> = config
        .hubs
        .iter()
        .filter(|hub| *hub != from && *hub != to)
        .copied()
        .collect();
    info!(%from, %to, %date, hubs = hubs.len(), "searching transfers");

    let per_hub = join_all(
        hubs.iter()
            .map(|hub| plans_via_hub(source, config, from, to, hub, date)),
    )
    .await;

    let mut plans: Vec<TransferPlan> = per_hub.into_iter().flatten().collect();
    rank_plans(&mut plans);
    dedup_by_trains(&mut plans);
    plans.truncate(config.max_results);

    info!(%from, %to, plans = plans.len(), "transfer search finished");
    plans
}

async fn plans_via_hub<S>(
    source: &S,
    config: &TransferConfig,
    from: &StationCode,
    to: &StationCode,
    hub: &StationCode,
    date: NaiveDate,
) -> Vec<TransferPlan>
where
    S: TicketSource + ?Sized,
{
    let first_legs = match source.tickets(from, hub, date).await {
        Ok(legs) => legs,
        Err(e) => {
            warn!(%hub, error = %e, "first leg query failed, skipping hub");
            return Vec::new();
        }
    };
    if first_legs.is_empty() {
        debug!(%from, %hub, "no trains to hub");
        return Vec::new();
    }

    let second_legs = match source.tickets(hub, to, date).await {
        Ok(legs) => legs,
        Err(e) => {
            warn!(%hub, error = %e, "second leg query failed, skipping hub");
            return Vec::new();
        }
    };
    if second_legs.is_empty() {
        debug!(%hub, %to, "no trains from hub");
        return Vec::new();
    }

    debug!(
        %hub,
        first = first_legs.len(),
        second = second_legs.len(),
        "pairing legs"
    );

    let mut plans = Vec::new();
    for first in first_legs.iter() {
        for second in second_legs.iter() {
            if let Some(plan) = connect(config, hub, first, second) {
                plans.push(plan);
            }
        }
    }
    plans
}

/// Join two legs if the layover is acceptable.
///
/// Only clock times are known, so a second train departing "before" the
/// first arrives is taken to leave the next day.
pub fn connect(
    config: &TransferConfig,
    hub: &StationCode,
    first: &Ticket,
    second: &Ticket,
) -> Option<TransferPlan> {
    let arrive = first.arrive()?;
    let depart = second.depart()?;
    let d1 = first.ride_duration()?;
    let d2 = second.ride_duration()?;

    let layover = layover_minutes(arrive, depart);
    let cross_station = first.to_code != second.from_code;
    if !config.accepts_layover(layover, cross_station) {
        return None;
    }

    let layover = RideDuration::from_minutes(layover);
    Some(TransferPlan {
        first: first.clone(),
        second: second.clone(),
        hub: *hub,
        hub_name: first.to_name.clone(),
        cross_station,
        layover,
        total: d1 + layover + d2,
    })
}

/// Minutes from `arrive` to `depart`, wrapping past midnight.
fn layover_minutes(arrive: NaiveTime, depart: NaiveTime) -> u32 {
    let diff = (depart - arrive).num_minutes();
    let wrapped = if diff < 0 { diff + 24 * 60 } else { diff };
    wrapped as u32
}

/// Keep one plan per pair of trains.
///
/// Hubs in the same city (GZQ, IZQ) return the same legs, so the same
/// itinerary turns up once per hub. Runs after ranking, so the survivor is
/// the best-ranked variant.
fn dedup_by_trains(plans: &mut Vec<TransferPlan>) {
    let mut seen = HashSet::new();
    plans.retain(|plan| {
        seen.insert((
            plan.first.train_number.clone(),
            plan.second.train_number.clone(),
        ))
    });
}

/// Shortest total first, then earliest departure.
pub fn rank_plans(plans: &mut [TransferPlan]) {
    plans.sort_by(|a, b| {
        a.total
            .cmp(&b.total)
            .then_with(|| a.depart().cmp(&b.depart()))
            .then_with(|| a.first.train_number.cmp(&b.first.train_number))
    });
}
