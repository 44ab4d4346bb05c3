//! HTTP route handlers.

use std::path::Path as FsPath;

use askama::Template;
use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{delete, get},
};
use chrono::{Local, NaiveDate};
use tower_http::services::ServeDir;
use tracing::{error, warn};

use crate::domain::{SeatClass, StationCode, Ticket, TrainFilter, parse_seat_list};
use crate::export::{self, ExportError};
use crate::kyfw::{Connectivity, KyfwError};
use crate::settings::SavedQuery;
use crate::stations::StationError;
use crate::transfer::{TransferPlan, plan_transfers};
use crate::watch::{WatchError, WatchId, WatchSpec};

use super::dto::*;
use super::state::AppState;
use super::templates::*;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Create the application router.
///
/// `static_dir` is the path to the static assets directory.
pub fn create_router(state: AppState, static_dir: impl AsRef<FsPath>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/health", get(health))
        .route("/api/stations/search", get(search_stations))
        .route("/api/stations/cities", get(list_cities))
        .route("/api/stations/city", get(city_stations))
        .route("/tickets", get(query_tickets))
        .route("/transfers", get(query_transfers))
        .route("/export/tickets.csv", get(export_tickets_csv))
        .route("/export/tickets.xlsx", get(export_tickets_xlsx))
        .route("/export/transfers.csv", get(export_transfers_csv))
        .route("/watches", get(list_watches).post(create_watch))
        .route("/watches/:id", delete(delete_watch))
        .route("/network/check", get(network_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found_page)
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    template.render().map(Html).map_err(|e| AppError::Internal {
        message: format!("Template error: {e}"),
    })
}

/// Index page, pre-filled with the last query.
async fn index_page(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.settings.load().await;
    let today = Local::now().date_naive();

    let (from, to, date, train_type) = match settings.last_query {
        // Past dates roll forward to today.
        Some(q) => (q.from, q.to, q.date.max(today), q.train_type),
        None => (String::new(), String::new(), today, TrainFilter::All),
    };

    let template = IndexTemplate {
        from,
        to,
        date: date.format("%Y-%m-%d").to_string(),
        train_type: train_type.slug().to_string(),
        filters: OptionView::train_filters(train_type),
        seat_classes: OptionView::seat_classes(),
        alert_email: settings.alert_email.unwrap_or_default(),
        watch_interval_secs: settings.watch_interval_secs,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|e| format!("Template error: {}", e)),
    )
}

async fn not_found_page() -> impl IntoResponse {
    let template = ErrorTemplate {
        title: "页面不存在".to_string(),
        message: "请检查地址是否正确。".to_string(),
    };
    (
        StatusCode::NOT_FOUND,
        Html(
            template
                .render()
                .unwrap_or_else(|e| format!("Template error: {}", e)),
        ),
    )
}

/// Search stations by name, telecode or pinyin.
async fn search_stations(
    State(state): State<AppState>,
    Query(req): Query<StationSearchRequest>,
) -> Json<StationSearchResponse> {
    let limit = req.limit.unwrap_or(10).min(50);
    let stations = state
        .stations
        .search(&req.q, limit)
        .await
        .into_iter()
        .map(StationResult::from)
        .collect();

    Json(StationSearchResponse { stations })
}

async fn list_cities(State(state): State<AppState>) -> Json<CitiesResponse> {
    Json(CitiesResponse {
        cities: state.stations.cities().await,
    })
}

async fn city_stations(
    State(state): State<AppState>,
    Query(req): Query<CityRequest>,
) -> Json<StationSearchResponse> {
    let stations = state
        .stations
        .stations_in_city(&req.name)
        .await
        .into_iter()
        .map(StationResult::from)
        .collect();

    Json(StationSearchResponse { stations })
}

/// Check if request accepts HTML.
fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// A ticket query with every parameter validated.
#[derive(Debug, Clone)]
struct ParsedQuery {
    from: StationCode,
    to: StationCode,
    date: NaiveDate,
    filter: TrainFilter,
    seats: Vec<SeatClass>,
}

impl ParsedQuery {
    async fn from_request(state: &AppState, req: &TicketQueryRequest) -> Result<Self, AppError> {
        let from = state.stations.resolve(&req.from).await?;
        let to = state.stations.resolve(&req.to).await?;
        if from == to {
            return Err(AppError::BadRequest {
                message: "出发站和到达站相同".to_string(),
            });
        }

        let date = parse_date(req.date.as_deref())?;

        let filter = match req.train_type.as_deref() {
            Some(raw) => raw.parse::<TrainFilter>().map_err(|e| AppError::BadRequest {
                message: format!("{e}"),
            })?,
            None => TrainFilter::All,
        };

        let seats = parse_seat_list(req.seats.as_deref().unwrap_or("")).map_err(|e| {
            AppError::BadRequest {
                message: format!("{e}"),
            }
        })?;

        Ok(Self {
            from,
            to,
            date,
            filter,
            seats,
        })
    }

    /// Query string that reproduces this query on the export endpoints.
    ///
    /// Every part is ASCII (telecodes, ISO date, slugs) so nothing needs escaping.
    fn export_query(&self) -> String {
        let seats: Vec<&str> = self.seats.iter().map(|s| s.slug()).collect();
        let mut query = format!(
            "from={}&to={}&date={}&train_type={}",
            self.from,
            self.to,
            self.date.format("%Y-%m-%d"),
            self.filter.slug()
        );
        if !seats.is_empty() {
            query.push_str("&seats=");
            query.push_str(&seats.join(","));
        }
        query
    }

    /// Base name for downloaded files.
    fn file_stem(&self, kind: &str) -> String {
        format!(
            "{kind}-{}-{}-{}",
            self.from,
            self.to,
            self.date.format("%Y%m%d")
        )
    }

    async fn summary(&self, state: &AppState, count: usize, unit: &str) -> String {
        let from = station_label(state, &self.from).await;
        let to = station_label(state, &self.to).await;
        format!("{from} → {to} {} · {count} {unit}", self.date)
    }
}

/// Empty means today.
fn parse_date(raw: Option<&str>) -> Result<NaiveDate, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AppError::BadRequest {
            message: format!("Invalid date: {s} (expected YYYY-MM-DD)"),
        }),
    }
}

async fn station_label(state: &AppState, code: &StationCode) -> String {
    state
        .stations
        .name_for(code)
        .await
        .unwrap_or_else(|| code.to_string())
}

/// Direct trains for a parsed query, with the seat filter applied.
async fn fetch_tickets(state: &AppState, query: &ParsedQuery) -> Result<Vec<Ticket>, AppError> {
    let tickets = state
        .tickets
        .query(&query.from, &query.to, query.date, query.filter)
        .await?;

    Ok(tickets
        .into_iter()
        .filter(|t| query.seats.is_empty() || t.has_any(&query.seats))
        .collect())
}

async fn fetch_plans(state: &AppState, query: &ParsedQuery) -> Vec<TransferPlan> {
    plan_transfers(
        state.tickets.as_ref(),
        &state.transfer,
        &query.from,
        &query.to,
        query.date,
    )
    .await
}

/// Remember the query the user typed, for the next visit.
async fn remember_query(state: &AppState, req: &TicketQueryRequest, query: &ParsedQuery) {
    let saved = SavedQuery {
        from: req.from.trim().to_string(),
        to: req.to.trim().to_string(),
        date: query.date,
        train_type: query.filter,
    };
    if let Err(e) = state.settings.update(|s| s.last_query = Some(saved)).await {
        warn!(error = %e, "failed to save last query");
    }
}

/// Remaining tickets between two stations.
async fn query_tickets(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(req): Query<TicketQueryRequest>,
) -> Result<Response, AppError> {
    let query = ParsedQuery::from_request(&state, &req).await?;
    let tickets = fetch_tickets(&state, &query).await?;
    remember_query(&state, &req, &query).await;

    if accepts_html(&headers) {
        let template = TicketListTemplate {
            summary: query.summary(&state, tickets.len(), "趟").await,
            seat_labels: SeatClass::ALL.iter().map(|c| c.label()).collect(),
            tickets: tickets.iter().map(TicketView::from_ticket).collect(),
            export_query: query.export_query(),
        };
        Ok(render(&template)?.into_response())
    } else {
        Ok(Json(TicketQueryResponse {
            from: query.from,
            to: query.to,
            date: query.date,
            train_type: query.filter,
            count: tickets.len(),
            tickets,
        })
        .into_response())
    }
}

/// One-change itineraries through the configured hubs.
async fn query_transfers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(req): Query<TicketQueryRequest>,
) -> Result<Response, AppError> {
    let query = ParsedQuery::from_request(&state, &req).await?;
    let plans = fetch_plans(&state, &query).await;

    if accepts_html(&headers) {
        let template = TransferListTemplate {
            summary: query.summary(&state, plans.len(), "个中转方案").await,
            plans: plans.iter().map(TransferView::from_plan).collect(),
            export_query: query.export_query(),
        };
        Ok(render(&template)?.into_response())
    } else {
        Ok(Json(TransferResponse {
            from: query.from,
            to: query.to,
            date: query.date,
            plans,
        })
        .into_response())
    }
}

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_tickets_csv(
    State(state): State<AppState>,
    Query(req): Query<TicketQueryRequest>,
) -> Result<Response, AppError> {
    let query = ParsedQuery::from_request(&state, &req).await?;
    let tickets = fetch_tickets(&state, &query).await?;
    let body = export::csv_bytes(&tickets)?;
    Ok(attachment(
        "text/csv; charset=utf-8",
        format!("{}.csv", query.file_stem("tickets")),
        body,
    ))
}

async fn export_tickets_xlsx(
    State(state): State<AppState>,
    Query(req): Query<TicketQueryRequest>,
) -> Result<Response, AppError> {
    let query = ParsedQuery::from_request(&state, &req).await?;
    let tickets = fetch_tickets(&state, &query).await?;
    let body = export::xlsx_bytes(&tickets)?;
    Ok(attachment(
        XLSX_CONTENT_TYPE,
        format!("{}.xlsx", query.file_stem("tickets")),
        body,
    ))
}

async fn export_transfers_csv(
    State(state): State<AppState>,
    Query(req): Query<TicketQueryRequest>,
) -> Result<Response, AppError> {
    let query = ParsedQuery::from_request(&state, &req).await?;
    let plans = fetch_plans(&state, &query).await;
    let body = export::transfers_csv_bytes(&plans)?;
    Ok(attachment(
        "text/csv; charset=utf-8",
        format!("{}.csv", query.file_stem("transfers")),
        body,
    ))
}

async fn list_watches(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let watches = state.scheduler.list().await;

    if accepts_html(&headers) {
        let template = WatchListTemplate {
            watches: watches.iter().map(WatchView::from_snapshot).collect(),
        };
        Ok(render(&template)?.into_response())
    } else {
        Ok(Json(WatchListResponse { watches }).into_response())
    }
}

/// Start a watch. Interval and email fall back to the saved settings, and
/// explicit values become the new saved settings.
async fn create_watch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateWatchResponse>), AppError> {
    // Parse JSON manually so we can log the body on failure
    let req: CreateWatchRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, body = %String::from_utf8_lossy(&body), "invalid watch request");
        AppError::BadRequest {
            message: format!("Invalid JSON: {e}"),
        }
    })?;

    let from = state.stations.resolve(&req.from).await?;
    let to = state.stations.resolve(&req.to).await?;

    let settings = state.settings.load().await;
    let interval = req.interval_secs.unwrap_or(settings.watch_interval_secs);
    let email = match req.email.as_deref().map(str::trim) {
        Some("") => None,
        Some(e) => Some(e.to_string()),
        None => settings.alert_email.clone(),
    };

    let mut spec = WatchSpec::new(from, to, req.date)
        .with_filter(req.train_type)
        .with_seats(req.seats)
        .with_trains(req.trains)
        .with_interval_secs(interval);
    if let Some(email) = &email {
        spec = spec.with_email(email.as_str());
    }

    let id = state.scheduler.add(spec).await?;

    if req.interval_secs.is_some() || req.email.is_some() {
        let saved = state.settings.update(|s| {
            s.watch_interval_secs = interval;
            s.alert_email = email;
        })
        .await;
        if let Err(e) = saved {
            warn!(error = %e, "failed to save watch preferences");
        }
    }

    Ok((StatusCode::CREATED, Json(CreateWatchResponse { id })))
}

async fn delete_watch(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    let id = WatchId(id);
    if state.scheduler.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WatchError::NotFound(id).into())
    }
}

async fn network_check(State(state): State<AppState>) -> Json<Connectivity> {
    Json(state.tickets.client().check_connectivity().await)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Upstream { message: String },
    Internal { message: String },
}

impl From<KyfwError> for AppError {
    fn from(e: KyfwError) -> Self {
        AppError::Upstream {
            message: e.to_string(),
        }
    }
}

impl From<StationError> for AppError {
    fn from(e: StationError) -> Self {
        match e {
            StationError::Unknown(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            StationError::Fetch(inner) => inner.into(),
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Empty => AppError::NotFound {
                message: e.to_string(),
            },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<WatchError> for AppError {
    fn from(e: WatchError) -> Self {
        match e {
            WatchError::NotFound(_) => AppError::NotFound {
                message: e.to_string(),
            },
            _ => AppError::BadRequest {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
