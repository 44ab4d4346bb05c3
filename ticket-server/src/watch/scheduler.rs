//! Background polling of watches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::TicketSource;

use super::alert::{Alert, AlertState, matching};
use super::notify::{Notifier, dispatch};
use super::spec::{WatchError, WatchId, WatchSpec};

/// Outcome of the most recent polls of one watch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchStatus {
    pub runs: u64,
    pub last_run: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    /// Trains that had seats of interest on the last successful poll.
    pub last_matches: usize,
    pub alerts_sent: u64,
}

/// A watch as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct WatchSnapshot {
    pub id: WatchId,
    pub spec: WatchSpec,
    pub status: WatchStatus,
}

struct WatchHandle {
    spec: WatchSpec,
    status: Arc<Mutex<WatchStatus>>,
    task: JoinHandle<()>,
}

/// Runs each watch as its own tokio task.
///
/// Tasks poll on their interval until removed; errors are recorded in the
/// watch status and never end the task.
pub struct Scheduler {
    source: Arc<dyn TicketSource>,
    notifiers: Vec<Arc<dyn Notifier>>,
    watches: RwLock<HashMap<WatchId, WatchHandle>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new(source: Arc<dyn TicketSource>) -> Self {
        Self {
            source,
            notifiers: Vec::new(),
            watches: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Validate and start a watch. The first poll happens immediately.
    pub async fn add(&self, spec: WatchSpec) -> Result<WatchId, WatchError> {
        spec.validate()?;

        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let status = Arc::new(Mutex::new(WatchStatus::default()));
        let task = tokio::spawn(run_watch(
            id,
            spec.clone(),
            self.source.clone(),
            self.notifiers.clone(),
            status.clone(),
        ));

        info!(watch = %id, spec = %spec, interval_secs = spec.interval_secs, "watch added");
        self.watches
            .write()
            .await
            .insert(id, WatchHandle { spec, status, task });
        Ok(id)
    }

    /// Stop and forget a watch. Returns whether it existed.
    pub async fn remove(&self, id: WatchId) -> bool {
        match self.watches.write().await.remove(&id) {
            Some(handle) => {
                handle.task.abort();
                info!(watch = %id, "watch removed");
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, id: WatchId) -> Option<WatchSnapshot> {
        let watches = self.watches.read().await;
        let handle = watches.get(&id)?;
        Some(WatchSnapshot {
            id,
            spec: handle.spec.clone(),
            status: handle.status.lock().await.clone(),
        })
    }

    /// All watches, oldest first.
    pub async fn list(&self) -> Vec<WatchSnapshot> {
        let watches = self.watches.read().await;
        let mut snapshots = Vec::with_capacity(watches.len());
        for (id, handle) in watches.iter() {
            snapshots.push(WatchSnapshot {
                id: *id,
                spec: handle.spec.clone(),
                status: handle.status.lock().await.clone(),
            });
        }
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.watches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.watches.read().await.is_empty()
    }

    /// Stop every watch.
    pub async fn stop_all(&self) {
        let mut watches = self.watches.write().await;
        for (_, handle) in watches.drain() {
            handle.task.abort();
        }
        info!("all watches stopped");
    }
}

async fn run_watch(
    id: WatchId,
    spec: WatchSpec,
    source: Arc<dyn TicketSource>,
    notifiers: Vec<Arc<dyn Notifier>>,
    status: Arc<Mutex<WatchStatus>>,
) {
    let mut ticker = tokio::time::interval(spec.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut alerts = AlertState::new();

    loop {
        ticker.tick().await;
        debug!(watch = %id, "polling");

        let result = source.tickets(&spec.from, &spec.to, spec.date).await;
        let fresh = match result {
            Ok(tickets) => {
                let matches = matching(&spec, &tickets).len();
                let fresh = alerts.update(&spec, &tickets);
                let mut s = status.lock().await;
                s.runs += 1;
                s.last_run = Some(Local::now());
                s.last_error = None;
                s.last_matches = matches;
                fresh
            }
            Err(e) => {
                warn!(watch = %id, error = %e, "watch poll failed");
                let mut s = status.lock().await;
                s.runs += 1;
                s.last_run = Some(Local::now());
                s.last_error = Some(e.to_string());
                continue;
            }
        };

        if fresh.is_empty() {
            continue;
        }

        let alert = Alert {
            watch_id: id,
            spec: spec.clone(),
            seats: fresh,
        };
        dispatch(&notifiers, &alert).await;
        status.lock().await.alerts_sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::cache::fake::FakeSource;
    use crate::domain::{Availability, StationCode, fixtures::ticket};
    use crate::watch::notify::recording::RecordingNotifier;

    fn spec() -> WatchSpec {
        WatchSpec::new(
            StationCode::parse("NNZ").unwrap(),
            StationCode::parse("GLZ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
        )
        .with_interval_secs(60)
    }

    fn set_seats(source: &FakeSource, second: Availability) {
        source.route(
            "NNZ",
            "GLZ",
            vec![ticket("D8201", "NNZ", "GLZ", "08:00", "10:00", "02:00", second)],
        );
    }

    fn scheduler() -> (Arc<FakeSource>, Arc<RecordingNotifier>, Scheduler) {
        let source = Arc::new(FakeSource::new());
        let recorder = Arc::new(RecordingNotifier::default());
        let scheduler = Scheduler::new(source.clone()).with_notifier(recorder.clone());
        (source, recorder, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_and_alerts_on_edges() {
        let (source, recorder, scheduler) = scheduler();
        set_seats(&source, Availability::Count(4));

        let id = scheduler.add(spec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let alerts = recorder.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].watch_id, id);
        assert_eq!(alerts[0].seats[0].train.as_str(), "D8201");

        // Still available: no new alert
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(recorder.alerts().len(), 1);

        // Sold out, then back
        set_seats(&source, Availability::None);
        tokio::time::sleep(Duration::from_secs(60)).await;
        set_seats(&source, Availability::Plenty);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(recorder.alerts().len(), 2);

        let snapshot = scheduler.get(id).await.unwrap();
        assert_eq!(snapshot.status.runs, 4);
        assert_eq!(snapshot.status.alerts_sent, 2);
        assert_eq!(snapshot.status.last_matches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_recorded_and_polling_continues() {
        let (source, recorder, scheduler) = scheduler();
        source.fail("NNZ", "GLZ", "blocked");

        let id = scheduler.add(spec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let status = scheduler.get(id).await.unwrap().status;
        assert_eq!(status.runs, 1);
        assert!(status.last_error.unwrap().contains("blocked"));

        set_seats(&source, Availability::Plenty);
        tokio::time::sleep(Duration::from_secs(60)).await;

        let status = scheduler.get(id).await.unwrap().status;
        assert_eq!(status.runs, 2);
        assert!(status.last_error.is_none());
        assert_eq!(recorder.alerts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn add_remove_list_and_stop() {
        let (source, _recorder, scheduler) = scheduler();

        assert!(matches!(
            scheduler.add(spec().with_interval_secs(5)).await,
            Err(WatchError::IntervalTooShort { secs: 5 })
        ));

        let a = scheduler.add(spec()).await.unwrap();
        let b = scheduler.add(spec().with_interval_secs(120)).await.unwrap();
        assert_ne!(a, b);

        let listed: Vec<WatchId> = scheduler.list().await.into_iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![a, b]);

        assert!(scheduler.remove(a).await);
        assert!(!scheduler.remove(a).await);
        assert_eq!(scheduler.len().await, 1);

        // A removed watch stops polling
        tokio::time::sleep(Duration::from_millis(10)).await;
        let calls_before = source.calls().len();
        scheduler.stop_all().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls().len(), calls_before);
        assert!(scheduler.is_empty().await);
    }
}
