//! # Request Metrics
//!
//! HTTP request counters recorded through the `metrics` facade. Whatever
//! recorder is installed collects them; in the server that is the Prometheus
//! recorder rendered at `/metrics`, next to the engine's counters.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, describe_counter};

pub const REQUESTS_TOTAL: &str = "haggle_http_requests_total";
pub const CLIENT_ERRORS_TOTAL: &str = "haggle_http_client_errors_total";
pub const SERVER_ERRORS_TOTAL: &str = "haggle_http_server_errors_total";

/// Register help text for the request counters with the current recorder.
pub fn describe() {
    describe_counter!(REQUESTS_TOTAL, "HTTP requests served.");
    describe_counter!(CLIENT_ERRORS_TOTAL, "HTTP responses with a 4xx status.");
    describe_counter!(SERVER_ERRORS_TOTAL, "HTTP responses with a 5xx status.");
}

/// Middleware that counts requests and error responses.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    record(response.status());
    response
}

fn record(status: StatusCode) {
    counter!(REQUESTS_TOTAL).increment(1);
    if status.is_client_error() {
        counter!(CLIENT_ERRORS_TOTAL).increment(1);
    } else if status.is_server_error() {
        counter!(SERVER_ERRORS_TOTAL).increment(1);
    }
}
