//! Cached ticket queries.
//!
//! The upstream throttles hard, and the web UI tends to ask for the same
//! (from, to, date) several times in a row (query, then export, then a
//! transfer search through the same hubs). Responses are cached for a short
//! TTL so repeated requests never reach the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::{StationCode, Ticket, TrainFilter};
use crate::kyfw::{KyfwClient, KyfwError, parse_page};
use crate::stations::StationDirectory;

/// Cache key: (from, to, travel date).
type QueryKey = (StationCode, StationCode, NaiveDate);

/// Cached query result.
pub type Tickets = Arc<Vec<Ticket>>;

/// Anything that can answer "which trains run from A to B on this date".
///
/// The scheduler and the transfer planner depend on this rather than on the
/// concrete client, so both can be tested without a network.
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn tickets(
        &self,
        from: &StationCode,
        to: &StationCode,
        date: NaiveDate,
    ) -> Result<Tickets, KyfwError>;
}

/// Configuration for the query cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 500,
        }
    }
}

/// Short-lived cache of left-ticket query results.
pub struct QueryCache {
    entries: MokaCache<QueryKey, Tickets>,
}

impl QueryCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();
        Self { entries }
    }

    pub async fn get(&self, key: &QueryKey) -> Option<Tickets> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: QueryKey, tickets: Tickets) {
        self.entries.insert(key, tickets).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}

/// kyfw client plus station names plus the query cache.
pub struct TicketService {
    client: KyfwClient,
    stations: StationDirectory,
    cache: QueryCache,
}

impl TicketService {
    pub fn new(client: KyfwClient, stations: StationDirectory, cache_config: &CacheConfig) -> Self {
        Self {
            client,
            stations,
            cache: QueryCache::new(cache_config),
        }
    }

    pub fn client(&self) -> &KyfwClient {
        &self.client
    }

    pub fn stations(&self) -> &StationDirectory {
        &self.stations
    }

    /// Query the upstream directly, bypassing the cache.
    pub async fn fetch(
        &self,
        from: &StationCode,
        to: &StationCode,
        date: NaiveDate,
    ) -> Result<Vec<Ticket>, KyfwError> {
        let page = self.client.query_left_tickets(from, to, date).await?;
        let index = self.stations.snapshot().await;
        Ok(parse_page(&page, date, |code| {
            index.name_for(code).map(str::to_string)
        }))
    }

    /// Tickets for a query, keeping only trains that pass `filter`.
    pub async fn query(
        &self,
        from: &StationCode,
        to: &StationCode,
        date: NaiveDate,
        filter: TrainFilter,
    ) -> Result<Vec<Ticket>, KyfwError> {
        let all = self.tickets(from, to, date).await?;
        Ok(filter_tickets(&all, filter))
    }

    pub fn cache_entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl TicketSource for TicketService {
    async fn tickets(
        &self,
        from: &StationCode,
        to: &StationCode,
        date: NaiveDate,
    ) -> Result<Tickets, KyfwError> {
        let key = (*from, *to, date);

        if let Some(cached) = self.cache.get(&key).await {
            debug!(%from, %to, %date, "query cache hit");
            return Ok(cached);
        }

        let tickets = Arc::new(self.fetch(from, to, date).await?);
        self.cache.insert(key, tickets.clone()).await;
        Ok(tickets)
    }
}

/// Trains from `tickets` that pass `filter`, in their original order.
pub fn filter_tickets(tickets: &[Ticket], filter: TrainFilter) -> Vec<Ticket> {
    tickets
        .iter()
        .filter(|t| filter.matches(&t.train_number))
        .cloned()
        .collect()
}
