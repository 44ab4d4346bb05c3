//! Station name ↔ telecode lookup.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::StationCode;
use crate::kyfw::KyfwClient;

use super::cache::StationCache;
use super::error::StationError;
use super::parse::{StationEntry, parse_station_script};

/// An immutable snapshot of the station list with lookup indexes.
#[derive(Debug, Default)]
pub struct StationIndex {
    entries: Vec<StationEntry>,
    by_name: HashMap<String, usize>,
    by_code: HashMap<StationCode, usize>,
}

impl StationIndex {
    pub fn new(entries: Vec<StationEntry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_code = HashMap::with_capacity(entries.len());
        for (i, e) in entries.iter().enumerate() {
            by_name.entry(e.name.clone()).or_insert(i);
            by_code.entry(e.code).or_insert(i);
        }
        Self {
            entries,
            by_name,
            by_code,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StationEntry] {
        &self.entries
    }

    /// Telecode for a station name or a known telecode.
    ///
    /// A trailing `站` is ignored, so `北京站` finds `北京`.
    pub fn code_for(&self, input: &str) -> Option<StationCode> {
        let input = input.trim();
        if let Some(&i) = self.by_name.get(input) {
            return Some(self.entries[i].code);
        }
        if let Some(&i) = input
            .strip_suffix('站')
            .and_then(|name| self.by_name.get(name))
        {
            return Some(self.entries[i].code);
        }
        StationCode::parse_normalized(input)
            .ok()
            .filter(|code| self.by_code.contains_key(code))
    }

    pub fn name_for(&self, code: &StationCode) -> Option<&str> {
        self.by_code
            .get(code)
            .map(|&i| self.entries[i].name.as_str())
    }

    /// Stations matching `query`, best matches first.
    ///
    /// Ranking: exact name or telecode, name prefix, name substring,
    /// then pinyin or abbreviation prefix (case-insensitive).
    pub fn search(&self, query: &str, limit: usize) -> Vec<StationEntry> {
        let q = query.trim();
        if q.is_empty() || limit == 0 {
            return Vec::new();
        }
        let q_lower = q.to_lowercase();

        let mut scored: Vec<(u8, &StationEntry)> = self
            .entries
            .iter()
            .filter_map(|e| {
                let rank = if e.name == q || e.code.as_str().eq_ignore_ascii_case(q) {
                    0
                } else if e.name.starts_with(q) {
                    1
                } else if e.name.contains(q) {
                    2
                } else if e.pinyin.to_lowercase().starts_with(&q_lower)
                    || e.abbr.to_lowercase().starts_with(&q_lower)
                {
                    3
                } else {
                    return None;
                };
                Some((rank, e))
            })
            .collect();

        scored.sort_by(|(ra, a), (rb, b)| {
            ra.cmp(rb)
                .then(a.name.chars().count().cmp(&b.name.chars().count()))
                .then(a.name.cmp(&b.name))
        });
        scored
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Distinct city names, sorted.
    pub fn cities(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.city.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Stations belonging to a city, sorted by name.
    pub fn stations_in_city(&self, city: &str) -> Vec<StationEntry> {
        let city = city.trim();
        if city.is_empty() {
            return Vec::new();
        }
        let mut found: Vec<StationEntry> = self
            .entries
            .iter()
            .filter(|e| e.city == city)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}

/// Thread-safe station directory.
///
/// Loaded from the disk cache when fresh, otherwise from the network; the
/// network copy is written back to the cache. Supports background refresh.
#[derive(Clone)]
pub struct StationDirectory {
    inner: Arc<RwLock<Arc<StationIndex>>>,
    client: KyfwClient,
    cache: StationCache,
}

impl StationDirectory {
    /// Open the directory.
    ///
    /// Order: fresh cache, network (saved to cache), stale cache. Fails only
    /// if all three are unavailable.
    pub async fn open(client: KyfwClient, cache: StationCache) -> Result<Self, StationError> {
        if let Some(entries) = cache.load() {
            info!(
                stations = entries.len(),
                path = %cache.path().display(),
                "loaded station list from cache"
            );
            return Ok(Self::from_entries(client, cache, entries));
        }

        match fetch_entries(&client).await {
            Ok(entries) => {
                if let Err(e) = cache.save(&entries) {
                    warn!(error = %e, "failed to save station cache");
                }
                info!(stations = entries.len(), "fetched station list");
                Ok(Self::from_entries(client, cache, entries))
            }
            Err(e) => match cache.load_stale() {
                Some(entries) => {
                    warn!(
                        error = %e,
                        stations = entries.len(),
                        "station fetch failed, using stale cache"
                    );
                    Ok(Self::from_entries(client, cache, entries))
                }
                None => Err(e),
            },
        }
    }

    /// Build a directory from known entries without touching disk or network.
    pub fn from_entries(
        client: KyfwClient,
        cache: StationCache,
        entries: Vec<StationEntry>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(StationIndex::new(entries)))),
            client,
            cache,
        }
    }

    /// Current snapshot; cheap, and unaffected by later refreshes.
    pub async fn snapshot(&self) -> Arc<StationIndex> {
        self.inner.read().await.clone()
    }

    /// Resolve user input (a name or a telecode) to a telecode.
    pub async fn resolve(&self, input: &str) -> Result<StationCode, StationError> {
        self.snapshot()
            .await
            .code_for(input)
            .ok_or_else(|| StationError::Unknown(input.trim().to_string()))
    }

    pub async fn name_for(&self, code: &StationCode) -> Option<String> {
        self.snapshot().await.name_for(code).map(str::to_string)
    }

    pub async fn search(&self, query: &str, limit: usize) -> Vec<StationEntry> {
        self.snapshot().await.search(query, limit)
    }

    pub async fn cities(&self) -> Vec<String> {
        self.snapshot().await.cities()
    }

    pub async fn stations_in_city(&self, city: &str) -> Vec<StationEntry> {
        self.snapshot().await.stations_in_city(city)
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }

    /// Refresh the station data from the network.
    ///
    /// On success, replaces the current index and rewrites the cache. On
    /// failure, the existing index is preserved and the error is returned.
    pub async fn refresh(&self) -> Result<usize, StationError> {
        let entries = fetch_entries(&self.client).await?;
        if let Err(e) = self.cache.save(&entries) {
            warn!(error = %e, "failed to save station cache");
        }
        let index = Arc::new(StationIndex::new(entries));
        let count = index.len();

        *self.inner.write().await = index;

        Ok(count)
    }
}

async fn fetch_entries(client: &KyfwClient) -> Result<Vec<StationEntry>, StationError> {
    let script = client.fetch_station_script().await?;
    parse_station_script(&script)
}

#[cfg(test)]
mod tests {
    use super::super::parse::sample::SCRIPT;
    use super::*;

    fn index() -> StationIndex {
        StationIndex::new(parse_station_script(SCRIPT).unwrap())
    }

    fn code(s: &str) -> StationCode {
        StationCode::parse(s).unwrap()
    }

    #[test]
    fn code_for_names_and_codes() {
        let idx = index();
        assert_eq!(idx.code_for("北京南"), Some(code("VNP")));
        assert_eq!(idx.code_for(" 上海虹桥 "), Some(code("AOH")));
        assert_eq!(idx.code_for("北京站"), Some(code("BJP")));
        assert_eq!(idx.code_for("nnz"), Some(code("NNZ")));
        // Well-formed but unknown code
        assert_eq!(idx.code_for("XYZ"), None);
        assert_eq!(idx.code_for("不存在"), None);
    }

    #[test]
    fn name_for_code() {
        let idx = index();
        assert_eq!(idx.name_for(&code("GBZ")), Some("桂林北"));
        assert_eq!(idx.name_for(&code("XYZ")), None);
    }

    #[test]
    fn search_ranks_exact_then_prefix_then_contains() {
        let idx = index();

        let hits = idx.search("北京", 10);
        let names: Vec<&str> = hits.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["北京", "北京北", "北京南"]);

        let hits = idx.search("虹桥", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code.as_str(), "AOH");

        let hits = idx.search("guilin", 10);
        let names: Vec<&str> = hits.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["桂林", "桂林北"]);

        let hits = idx.search("shhq", 10);
        assert_eq!(hits[0].name, "上海虹桥");
    }

    #[test]
    fn search_respects_limit_and_blank_query() {
        let idx = index();
        assert_eq!(idx.search("北京", 2).len(), 2);
        assert!(idx.search("  ", 10).is_empty());
        assert!(idx.search("北京", 0).is_empty());
    }

    #[test]
    fn cities_and_city_stations() {
        let idx = index();
        let cities = idx.cities();
        assert_eq!(cities.len(), 4);
        assert!(cities.contains(&"桂林".to_string()));

        let in_beijing: Vec<String> = idx
            .stations_in_city("北京")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(in_beijing.len(), 3);
        assert!(in_beijing.windows(2).all(|w| w[0] <= w[1]));
        assert!(idx.stations_in_city("").is_empty());
    }

    #[tokio::test]
    async fn directory_resolves_and_reports_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let client = KyfwClient::new(
            crate::kyfw::KyfwConfig::new().with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let cache = StationCache::new(super::super::StationCacheConfig::new(
            dir.path().join("stations.json"),
        ));
        let directory =
            StationDirectory::from_entries(client, cache, parse_station_script(SCRIPT).unwrap());

        assert_eq!(directory.len().await, 8);
        assert_eq!(directory.resolve("南宁").await.unwrap(), code("NNZ"));
        assert!(matches!(
            directory.resolve("火星").await,
            Err(StationError::Unknown(name)) if name == "火星"
        ));
        assert_eq!(directory.name_for(&code("SHH")).await.as_deref(), Some("上海"));
    }
}
