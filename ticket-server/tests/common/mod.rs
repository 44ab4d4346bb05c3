//! A fake ticketing site on an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;

use ticket_server::kyfw::KyfwConfig;

pub const STATION_SCRIPT: &str = "var station_names ='@bjp|北京|BJP|beijing|bj|0|0357|北京|||@shh|上海|SHH|shanghai|sh|1|0712|上海|||@nnz|南宁|NNZ|nanning|nn|2|1345|南宁|||@glz|桂林|GLZ|guilin|gl|3|1346|桂林|||@gbz|桂林北|GBZ|guilinbei|glb|4|1346|桂林|||';";

/// Second-class seat field.
pub const SECOND_CLASS: usize = 30;

/// How the fake behaves. Counters record what it saw.
#[derive(Default)]
pub struct Behaviour {
    /// Answer this many query requests with 503 before succeeding.
    pub failures: AtomicUsize,
    /// Answer the original query path with a `c_url` move.
    pub moved: bool,
    /// Answer queries with the "network problem" page.
    pub anti_crawl: bool,
    /// Stall landing pages this long.
    pub landing_delay: Duration,

    pub landing_hits: AtomicUsize,
    pub query_hits: AtomicUsize,
    pub moved_hits: AtomicUsize,
    pub script_hits: AtomicUsize,
}

pub struct FakeUpstream {
    pub addr: SocketAddr,
    pub behaviour: Arc<Behaviour>,
}

impl FakeUpstream {
    pub async fn start(behaviour: Behaviour) -> Self {
        let behaviour = Arc::new(behaviour);
        let app = Router::new()
            .route("/", get(|| async { "<html>12306</html>" }))
            .route("/otn/", get(landing))
            .route("/otn/leftTicket/init", get(landing))
            .route("/otn/leftTicket/query", get(query))
            .route("/otn/leftTicket/queryZ", get(moved_query))
            .route("/otn/resources/js/framework/station_name.js", get(script))
            .with_state(behaviour.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, behaviour }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client settings with no throttling or backoff.
    pub fn config(&self) -> KyfwConfig {
        KyfwConfig::new()
            .with_base_url(self.base_url())
            .with_timeout(5)
            .with_min_interval(Duration::ZERO)
            .with_backoff(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }
}

async fn landing(State(b): State<Arc<Behaviour>>) -> &'static str {
    b.landing_hits.fetch_add(1, Ordering::SeqCst);
    if !b.landing_delay.is_zero() {
        tokio::time::sleep(b.landing_delay).await;
    }
    "<html><body>welcome</body></html>"
}

async fn script(State(b): State<Arc<Behaviour>>) -> &'static str {
    b.script_hits.fetch_add(1, Ordering::SeqCst);
    STATION_SCRIPT
}

async fn query(
    State(b): State<Arc<Behaviour>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    b.query_hits.fetch_add(1, Ordering::SeqCst);

    let remaining = b.failures.load(Ordering::SeqCst);
    if remaining > 0 {
        b.failures.store(remaining - 1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if b.anti_crawl {
        return "<!DOCTYPE html><html><body>网络可能存在问题，请您重试一下！</body></html>"
            .into_response();
    }
    if b.moved {
        return r#"{"status":false,"c_url":"leftTicket/queryZ","c_name":"CLeftTicketUrl"}"#
            .into_response();
    }
    page(&params).into_response()
}

async fn moved_query(
    State(b): State<Arc<Behaviour>>,
    Query(params): Query<HashMap<String, String>>,
) -> String {
    b.moved_hits.fetch_add(1, Ordering::SeqCst);
    page(&params)
}

/// Two direct trains for NNZ→GLZ, nothing for any other pair.
fn page(params: &HashMap<String, String>) -> String {
    let from = params
        .get("leftTicketDTO.from_station")
        .map(String::as_str)
        .unwrap_or("");
    let to = params
        .get("leftTicketDTO.to_station")
        .map(String::as_str)
        .unwrap_or("");

    let records: Vec<String> = if (from, to) == ("NNZ", "GLZ") {
        vec![
            record("D8201", "NNZ", "GLZ", "08:00", "10:05", "02:05", &[(SECOND_CLASS, "有")]),
            record("G1502", "NNZ", "GLZ", "12:30", "14:20", "01:50", &[(SECOND_CLASS, "无")]),
        ]
    } else {
        Vec::new()
    };

    serde_json::json!({
        "httpstatus": 200,
        "status": true,
        "messages": "",
        "data": {
            "flag": "1",
            "map": { "NNZ": "南宁", "GLZ": "桂林" },
            "result": records,
        }
    })
    .to_string()
}

pub fn record(
    train: &str,
    from: &str,
    to: &str,
    depart: &str,
    arrive: &str,
    duration: &str,
    seats: &[(usize, &str)],
) -> String {
    let mut fields = vec![String::new(); 36];
    fields[1] = "预订".to_string();
    fields[2] = format!("5l000{train}0B");
    fields[3] = train.to_string();
    fields[4] = from.to_string();
    fields[5] = to.to_string();
    fields[6] = from.to_string();
    fields[7] = to.to_string();
    fields[8] = depart.to_string();
    fields[9] = arrive.to_string();
    fields[10] = duration.to_string();
    fields[11] = "Y".to_string();
    for (idx, value) in seats {
        fields[*idx] = value.to_string();
    }
    fields.join("|")
}
