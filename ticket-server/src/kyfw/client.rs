//! kyfw HTTP client.
//!
//! Provides async methods for the 12306 left-ticket API and the station
//! script. Handles cookie sessions, user-agent rotation, request spacing
//! and retry with a fresh session after transport failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::domain::StationCode;

use super::agents::random_user_agent;
use super::error::KyfwError;
use super::throttle::Throttle;
use super::types::{Decoded, LeftTicketPage, decode_left_ticket_body};

/// Default base URL for the ticketing site.
pub const DEFAULT_BASE_URL: &str = "https://kyfw.12306.cn";

/// Default left-ticket query endpoint, relative to `/otn/`.
pub const DEFAULT_QUERY_PATH: &str = "leftTicket/query";

/// Station list script, relative to the base URL.
pub const STATION_SCRIPT_PATH: &str = "otn/resources/js/framework/station_name.js";

/// Pages fetched at the start of each session to pick up cookies.
const WARM_UP_PATHS: [&str; 2] = ["otn/", "otn/leftTicket/init"];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// Configuration for the kyfw client.
#[derive(Debug, Clone)]
pub struct KyfwConfig {
    /// Base URL (defaults to the production site)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Minimum gap between the start of two requests
    pub min_interval: Duration,
    /// Total attempts per request, including the first
    pub max_retries: u32,
    /// Backoff before the second attempt
    pub backoff_base: Duration,
    /// Extra backoff added per further attempt
    pub backoff_step: Duration,
    /// Upper bound of the random extra added to each backoff
    pub backoff_jitter: Duration,
    /// Left-ticket query endpoint, relative to `/otn/`
    pub query_path: String,
}

impl KyfwConfig {
    /// Create a config pointing at the production site.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            min_interval: Duration::from_secs(2),
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            backoff_step: Duration::from_secs(1),
            backoff_jitter: Duration::from_secs(2),
            query_path: DEFAULT_QUERY_PATH.to_string(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the minimum spacing between requests.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set the total number of attempts per request.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the backoff schedule: `base + step * attempt + uniform(0, jitter)`.
    pub fn with_backoff(mut self, base: Duration, step: Duration, jitter: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_step = step;
        self.backoff_jitter = jitter;
        self
    }

    /// Set the initial query endpoint path.
    pub fn with_query_path(mut self, path: impl Into<String>) -> Self {
        self.query_path = path.into();
        self
    }
}

impl Default for KyfwConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before retrying after failed attempt number `attempt` (0-based).
pub fn backoff_delay(config: &KyfwConfig, attempt: u32) -> Duration {
    let floor = config.backoff_base + config.backoff_step * attempt;
    let jitter_ms = config.backoff_jitter.as_millis() as u64;
    let extra = if jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_ms)
    };
    floor + Duration::from_millis(extra)
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize)]
pub struct Connectivity {
    pub url: String,
    pub reachable: bool,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// A cookie session: the HTTP client plus its one-time warm-up.
#[derive(Debug, Clone)]
struct Session {
    http: reqwest::Client,
    warm_up: Arc<OnceCell<()>>,
}

impl Session {
    fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            warm_up: Arc::new(OnceCell::new()),
        }
    }
}

#[derive(Debug)]
struct Inner {
    config: KyfwConfig,
    session: Mutex<Session>,
    throttle: Throttle,
    query_path: RwLock<String>,
}

/// 12306 ticketing client.
///
/// Cheap to clone; clones share the session, throttle and endpoint path.
#[derive(Debug, Clone)]
pub struct KyfwClient {
    inner: Arc<Inner>,
}

impl KyfwClient {
    /// Create a new client with the given configuration.
    ///
    /// No request is sent until the first call.
    pub fn new(config: KyfwConfig) -> Result<Self, KyfwError> {
        let http = build_http(&config)?;
        let throttle = Throttle::new(config.min_interval);
        let query_path = RwLock::new(config.query_path.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                session: Mutex::new(Session::new(http)),
                throttle,
                query_path,
            }),
        })
    }

    pub fn config(&self) -> &KyfwConfig {
        &self.inner.config
    }

    /// The query endpoint currently in use, relative to `/otn/`.
    pub async fn query_path(&self) -> String {
        self.inner.query_path.read().await.clone()
    }

    /// Resolve a path against the base URL; absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.inner.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET a page and return its body, retrying transport failures.
    ///
    /// Each failed attempt except the last sleeps for [`backoff_delay`] and
    /// replaces the session (new cookies, new warm-up) before trying again.
    pub async fn get_text(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<String, KyfwError> {
        let url = self.url(path);
        let max_attempts = self.inner.config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            let http = self.session().await;
            debug!(%url, attempt = attempt + 1, max_attempts, "GET");

            match self.send_once(&http, &url, query, headers).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = backoff_delay(&self.inner.config, attempt);
                    warn!(
                        %url,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "request failed, retrying with a fresh session"
                    );
                    tokio::time::sleep(delay).await;
                    self.reset_session().await?;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(%url, error = %e, attempt = attempt + 1, "request failed");
                    return Err(e);
                }
            }
        }
    }

    /// Query remaining tickets between two stations on a date.
    ///
    /// Follows one endpoint move (`c_url`) and remembers the new path.
    pub async fn query_left_tickets(
        &self,
        from: &StationCode,
        to: &StationCode,
        date: NaiveDate,
    ) -> Result<LeftTicketPage, KyfwError> {
        let referer = self.url("otn/leftTicket/init");
        let headers = [
            ("Referer", referer.as_str()),
            ("X-Requested-With", "XMLHttpRequest"),
            ("Accept", "application/json, text/javascript, */*; q=0.01"),
            ("Sec-Fetch-Dest", "empty"),
            ("Sec-Fetch-Mode", "cors"),
            ("Sec-Fetch-Site", "same-origin"),
        ];
        let query = [
            ("leftTicketDTO.train_date", date.format("%Y-%m-%d").to_string()),
            ("leftTicketDTO.from_station", from.to_string()),
            ("leftTicketDTO.to_station", to.to_string()),
            ("purpose_codes", "ADULT".to_string()),
        ];

        let mut followed_move = false;
        loop {
            let path = format!("otn/{}", self.query_path().await);
            let body = self.get_text(&path, &query, &headers).await?;

            match decode_left_ticket_body(&body)? {
                Decoded::Page(page) => {
                    info!(
                        %from, %to, %date,
                        records = page.records.len(),
                        "left-ticket query answered"
                    );
                    return Ok(page);
                }
                Decoded::Moved(new_path) if !followed_move => {
                    info!(%new_path, "query endpoint moved");
                    *self.inner.query_path.write().await = new_path;
                    followed_move = true;
                }
                Decoded::Moved(new_path) => {
                    return Err(KyfwError::InvalidResponse(format!(
                        "query endpoint moved twice (last to {new_path})"
                    )));
                }
            }
        }
    }

    /// Fetch the station list script.
    pub async fn fetch_station_script(&self) -> Result<String, KyfwError> {
        self.get_text(STATION_SCRIPT_PATH, &[], &[]).await
    }

    /// Request the site root once, without retry or warm-up.
    pub async fn check_connectivity(&self) -> Connectivity {
        let url = self.url("");
        let http = self.inner.session.lock().await.http.clone();
        let started = Instant::now();
        let result = self.send_once(&http, &url, &[], &[]).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(_) => Connectivity {
                url,
                reachable: true,
                status: Some(200),
                latency_ms,
                error: None,
            },
            Err(KyfwError::Status { status, .. }) => Connectivity {
                url,
                reachable: false,
                status: Some(status),
                latency_ms,
                error: Some(format!("HTTP status {status}")),
            },
            Err(e) => Connectivity {
                url,
                reachable: false,
                status: None,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }

    /// Current HTTP client, warming the session up first if needed.
    ///
    /// The session lock is released before warming up. Callers sharing a
    /// session wait on its one warm-up; everyone else goes straight through.
    async fn session(&self) -> reqwest::Client {
        let session = self.inner.session.lock().await.clone();
        session
            .warm_up
            .get_or_init(|| self.warm_up(&session.http))
            .await;
        session.http
    }

    /// Visit the landing pages so the session carries the site's cookies.
    ///
    /// Failures are logged and ignored; the real request will surface them.
    async fn warm_up(&self, http: &reqwest::Client) {
        for path in WARM_UP_PATHS {
            let url = self.url(path);
            match self.send_once(http, &url, &[], &[]).await {
                Ok(_) => debug!(%url, "session warm-up page fetched"),
                Err(e) => {
                    warn!(%url, error = %e, "session warm-up failed");
                    return;
                }
            }
        }
    }

    /// Drop the current session and start a new one on the next request.
    async fn reset_session(&self) -> Result<(), KyfwError> {
        let http = build_http(&self.inner.config)?;
        *self.inner.session.lock().await = Session::new(http);
        Ok(())
    }

    /// One throttled GET with a random user agent.
    async fn send_once(
        &self,
        http: &reqwest::Client,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<String, KyfwError> {
        self.inner.throttle.wait().await;

        let mut request = http
            .get(url)
            .header(header::USER_AGENT, random_user_agent())
            .query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KyfwError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

fn build_http(config: &KyfwConfig) -> Result<reqwest::Client, KyfwError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));

    let http = reqwest::Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .gzip(true)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(http)
}
