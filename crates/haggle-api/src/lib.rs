//! # haggle-api: Axum API Services
//!
//! HTTP surface for the negotiation engine, built on Axum/Tower/Tokio.
//!
//! ## Routes
//!
//! - `/v1/deliveries/*`: open, read, cancel, poll, consultations
//! - `/v1/deliveries/{id}/bids/*`: submit, list, accept, decline, counter
//! - `/v1/couriers/{id}/position`: courier position reports
//! - `/openapi.json`: generated OpenAPI document
//! - `/health/*`, `/metrics`: probes and Prometheus scrape
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsMiddleware → Handler
//!
//! ## Crate Policy
//!
//! - No negotiation logic in handlers; they validate, delegate to the
//!   engine, and map the result.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod views;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` sit outside the request counters so scrapes
/// do not inflate them.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::deliveries::router())
        .merge(routes::bids::router())
        .merge(routes::couriers::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .with_state(state.clone());

    let probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    Router::new().merge(probes).merge(api)
}

/// GET /metrics: Prometheus scrape endpoint.
///
/// Engine and request counters both come from the installed recorder.
/// Without one there is nothing to scrape.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let Some(handle) = state.prometheus.as_ref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response();
    };
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
        .into_response()
}

/// Liveness probe: the process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: the engine answers a configuration read.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.engine.config().validate().is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, "engine misconfigured").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}
