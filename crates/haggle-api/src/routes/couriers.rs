//! # Courier Routes
//!
//! Couriers report their position so snapshots can rank bids by distance.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use haggle_core::{CourierId, GeoPoint};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Build the couriers router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/couriers/{id}/position", put(report_position))
}

/// A courier's current position.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PositionRequest {
    pub lat: f64,
    pub lng: f64,
}

impl Validate for PositionRequest {
    fn validate(&self) -> Result<(), String> {
        GeoPoint::new(self.lat, self.lng)
            .map(drop)
            .map_err(|e| e.to_string())
    }
}

/// PUT /v1/couriers/{id}/position: Report a courier's position.
#[utoipa::path(
    put,
    path = "/v1/couriers/{id}/position",
    params(("id" = Uuid, Path, description = "Courier ID")),
    request_body = PositionRequest,
    responses(
        (status = 204, description = "Position recorded"),
        (status = 422, description = "Coordinates out of range", body = crate::error::ErrorBody),
    ),
    tag = "couriers"
)]
pub(crate) async fn report_position(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<PositionRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let req = extract_validated_json(body)?;
    let point = GeoPoint::new(req.lat, req.lng)?;
    state.locator.report(CourierId::from_uuid(id), point);
    tracing::debug!(courier_id = %id, "courier position reported");
    Ok(StatusCode::NO_CONTENT)
}
