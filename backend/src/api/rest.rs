// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Domain errors map onto status codes:
//   InvalidArgument -> 400, NotFound -> 404, Uninitialized -> 503.
//
// CORS is configured permissively for the dashboard dev server; tighten
// `allow_origin` in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::error::DeskError;
use crate::portfolio::currency::Currency;
use crate::portfolio::sort::SortDescriptor;
use crate::portfolio::store::Transfer;
use crate::types::TimeRange;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        // ── Portfolio table ─────────────────────────────────────────
        .route("/api/v1/portfolio", get(portfolio))
        .route("/api/v1/portfolio/query", post(query_portfolio))
        .route("/api/v1/portfolio/add", post(add_to_portfolio))
        .route("/api/v1/portfolio/remove", post(remove_from_portfolio))
        .route("/api/v1/uncategorized/symbols", get(uncategorized_symbols))
        .route("/api/v1/heatmap", get(heatmap))
        // ── Currency ────────────────────────────────────────────────
        .route("/api/v1/currency", get(get_currency).post(set_currency))
        // ── Charting ────────────────────────────────────────────────
        .route("/api/v1/stocks/:symbol/intervals", get(stock_intervals))
        // ── WebSocket push feed ─────────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

type ApiError = (StatusCode, Json<serde_json::Value>);

fn status_for(err: &DeskError) -> StatusCode {
    match err {
        DeskError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        DeskError::NotFound { .. } => StatusCode::NOT_FOUND,
        DeskError::Uninitialized { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn api_error(err: DeskError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, "request rejected");
    }
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
}

// =============================================================================
// Health / state
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    ready: bool,
    state_version: u64,
    portfolio_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ready = state.store.readiness().all_ready();
    Json(HealthResponse {
        status: if ready { "ok" } else { "loading" },
        ready,
        state_version: state.current_state_version(),
        portfolio_version: state.store.version(),
        server_time: Utc::now().timestamp_millis(),
    })
}

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Portfolio table
// =============================================================================

async fn portfolio(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let rows = state.store.portfolio().map_err(api_error)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    sort: Vec<SortDescriptor>,
}

async fn query_portfolio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.store.query(&req.sort).map_err(api_error)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
struct SymbolRequest {
    symbol: String,
}

fn transfer_response(transfer: Transfer) -> impl IntoResponse {
    let status = match transfer {
        Transfer::Moved { .. } => StatusCode::OK,
        Transfer::NotFound { .. } => StatusCode::NOT_FOUND,
    };
    (status, Json(transfer))
}

async fn add_to_portfolio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SymbolRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer = state
        .store
        .add_to_portfolio(req.symbol.trim())
        .map_err(api_error)?;
    Ok(transfer_response(transfer))
}

async fn remove_from_portfolio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SymbolRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer = state
        .store
        .remove_from_portfolio(req.symbol.trim())
        .map_err(api_error)?;
    Ok(transfer_response(transfer))
}

async fn uncategorized_symbols(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let symbols = state.store.uncategorized_symbols().map_err(api_error)?;
    Ok(Json(symbols))
}

async fn heatmap(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stocks = state.store.heatmap_stocks().map_err(api_error)?;
    Ok(Json(stocks))
}

// =============================================================================
// Currency
// =============================================================================

#[derive(Serialize)]
struct CurrencyResponse {
    currency: Currency,
    rate: f64,
}

async fn get_currency(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let currency = state.store.currency();
    Json(CurrencyResponse {
        currency,
        rate: currency.rate(),
    })
}

#[derive(Deserialize)]
struct CurrencyRequest {
    code: String,
}

async fn set_currency(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CurrencyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let currency = state.store.change_currency(&req.code).map_err(api_error)?;
    info!(%currency, "display currency changed via API");

    // Save to disk (best-effort).
    if let Err(e) = state.persist_config() {
        warn!(error = %e, "Failed to save display currency to disk");
    }
    Ok(Json(CurrencyResponse {
        currency,
        rate: currency.rate(),
    }))
}

// =============================================================================
// Charting
// =============================================================================

#[derive(Deserialize)]
struct IntervalQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_minutes: u32,
}

async fn stock_intervals(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<IntervalQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = TimeRange::new(query.start, query.end);
    let bars = state
        .store
        .stock_interval_details(&symbol, range, query.interval_minutes)
        .map_err(api_error)?;
    Ok(Json(bars))
}
