//! The web API end to end, backed by a fake upstream.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

use common::{Behaviour, FakeUpstream};
use ticket_server::cache::{CacheConfig, TicketService};
use ticket_server::kyfw::KyfwClient;
use ticket_server::settings::SettingsStore;
use ticket_server::stations::{StationCache, StationCacheConfig, StationDirectory};
use ticket_server::transfer::TransferConfig;
use ticket_server::watch::Scheduler;
use ticket_server::web::{AppState, create_router};

struct TestApp {
    addr: SocketAddr,
    http: reqwest::Client,
    data_dir: TempDir,
    _upstream: FakeUpstream,
}

impl TestApp {
    async fn start() -> Self {
        let upstream = FakeUpstream::start(Behaviour::default()).await;
        let data_dir = tempfile::tempdir().unwrap();

        let client = KyfwClient::new(upstream.config()).unwrap();
        let cache = StationCache::new(StationCacheConfig::new(
            data_dir.path().join("stations.json"),
        ));
        let stations = StationDirectory::open(client.clone(), cache).await.unwrap();
        let tickets = Arc::new(TicketService::new(client, stations, &CacheConfig::default()));
        let scheduler = Arc::new(Scheduler::new(tickets.clone()));

        let state = AppState::new(
            tickets,
            scheduler,
            SettingsStore::in_dir(data_dir.path()),
            TransferConfig::default(),
        );
        let app = create_router(state, data_dir.path().join("static"));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            http: reqwest::Client::new(),
            data_dir,
            _upstream: upstream,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http.get(self.url(path)).send().await.unwrap()
    }
}

#[tokio::test]
async fn health() {
    let app = TestApp::start().await;
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn station_lookup() {
    let app = TestApp::start().await;

    let body: Value = app.get("/api/stations/search?q=guilin").await.json().await.unwrap();
    let names: Vec<&str> = body["stations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["桂林", "桂林北"]);

    let body: Value = app.get("/api/stations/cities").await.json().await.unwrap();
    assert_eq!(body["cities"].as_array().unwrap().len(), 4);

    let body: Value = app
        .http
        .get(app.url("/api/stations/city"))
        .query(&[("name", "桂林")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["stations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn ticket_query_json_and_html() {
    let app = TestApp::start().await;
    let params = [("from", "南宁"), ("to", "桂林"), ("date", "2025-01-20")];

    let body: Value = app
        .http
        .get(app.url("/tickets"))
        .query(&params)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["from"], "NNZ");
    assert_eq!(body["tickets"][0]["train_number"], "D8201");

    let html = app
        .http
        .get(app.url("/tickets"))
        .query(&params)
        .query(&[("train_type", "gc")])
        .header(ACCEPT, "text/html")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("G1502"));
    assert!(!html.contains("D8201"));

    // The query is remembered for the index page
    let settings = SettingsStore::in_dir(app.data_dir.path()).load().await;
    let saved = settings.last_query.unwrap();
    assert_eq!(saved.from, "南宁");
    assert_eq!(saved.to, "桂林");
}

#[tokio::test]
async fn seat_filter_keeps_trains_with_seats() {
    let app = TestApp::start().await;
    let body: Value = app
        .get("/tickets?from=NNZ&to=GLZ&date=2025-01-20&seats=second")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["tickets"][0]["train_number"], "D8201");
}

#[tokio::test]
async fn bad_queries_are_rejected() {
    let app = TestApp::start().await;

    let response = app
        .http
        .get(app.url("/tickets"))
        .query(&[("from", "火星"), ("to", "桂林")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("火星"));

    let response = app.get("/tickets?from=NNZ&to=GLZ&date=tomorrow").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/tickets?from=NNZ&to=NNZ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/no/such/page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn csv_export_is_an_attachment() {
    let app = TestApp::start().await;
    let response = app.get("/export/tickets.csv?from=NNZ&to=GLZ&date=2025-01-20").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        "attachment; filename=\"tickets-NNZ-GLZ-20250120.csv\""
    );
    let text = response.text().await.unwrap();
    assert!(text.contains("车次"));
    assert!(text.contains("D8201"));

    // Nothing runs between these two, so there is nothing to export
    let response = app.get("/export/tickets.csv?from=BJP&to=SHH&date=2025-01-20").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn watch_lifecycle() {
    let app = TestApp::start().await;

    let response = app
        .http
        .post(app.url("/watches"))
        .json(&json!({"from": "南宁", "to": "桂林", "date": "2025-01-20", "interval_secs": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .http
        .post(app.url("/watches"))
        .json(&json!({
            "from": "南宁",
            "to": "桂林",
            "date": "2025-01-20",
            "train_type": "d",
            "seats": ["second-class"],
            "interval_secs": 60
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = response.json::<Value>().await.unwrap()["id"].as_u64().unwrap();

    let body: Value = app.get("/watches").await.json().await.unwrap();
    assert_eq!(body["watches"].as_array().unwrap().len(), 1);
    assert_eq!(body["watches"][0]["spec"]["interval_secs"], 60);

    // The explicit interval becomes the default
    let settings = SettingsStore::in_dir(app.data_dir.path()).load().await;
    assert_eq!(settings.watch_interval_secs, 60);

    let delete = |id: u64| app.http.delete(app.url(&format!("/watches/{id}"))).send();
    assert_eq!(delete(id).await.unwrap().status(), StatusCode::NO_CONTENT);
    assert_eq!(delete(id).await.unwrap().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn network_check_reports_upstream() {
    let app = TestApp::start().await;
    let body: Value = app.get("/network/check").await.json().await.unwrap();
    assert_eq!(body["reachable"], true);
}
