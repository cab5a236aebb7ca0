//! # Delivery Routes
//!
//! Opening, reading, cancelling and polling a delivery's negotiation, plus
//! courier consultation signals.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use haggle_core::{Amount, CourierId, DeliveryId, GeoPoint, ValidationError};
use haggle_negotiation::BidOrdering;
use haggle_state::{ConsultationStatus, DeliveryRequest, Location};

use crate::error::AppError;
use crate::extractors::{
    check_note, extract_optional_validated_json, extract_validated_json, Validate,
};
use crate::state::AppState;
use crate::views::{CancellationView, ConsultationView, DeliveryView, PurgeView, SnapshotView};

/// Maximum length of a cancellation reason.
const MAX_REASON_LEN: usize = 512;

/// Build the deliveries router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/deliveries", post(create_delivery))
        .route("/v1/deliveries/{id}", get(get_delivery))
        .route("/v1/deliveries/{id}/cancel", post(cancel_delivery))
        .route("/v1/deliveries/{id}/snapshot", get(snapshot))
        .route(
            "/v1/deliveries/{id}/consultations",
            post(record_consultation).delete(purge_consultations),
        )
}

/// A pickup or drop-off in a create request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationInput {
    pub address: String,
    /// Latitude in degrees; give both coordinates or neither.
    pub lat: Option<f64>,
    /// Longitude in degrees.
    pub lng: Option<f64>,
}

impl LocationInput {
    fn to_location(&self, field: &'static str) -> Result<Location, ValidationError> {
        let point = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)?),
            (None, None) => None,
            (lat, lng) => {
                return Err(ValidationError::InvalidCoordinates {
                    lat: lat.unwrap_or(f64::NAN),
                    lng: lng.unwrap_or(f64::NAN),
                })
            }
        };
        Location::new(field, self.address.as_str(), point)
    }
}

/// Request to open a delivery.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDeliveryRequest {
    pub pickup: LocationInput,
    pub dropoff: LocationInput,
    /// The client's opening price in minor currency units.
    pub requested_price: u64,
}

impl CreateDeliveryRequest {
    fn to_domain(&self) -> Result<DeliveryRequest, ValidationError> {
        Ok(DeliveryRequest {
            pickup: self.pickup.to_location("pickup")?,
            dropoff: self.dropoff.to_location("dropoff")?,
            requested_price: Amount::new(self.requested_price)?,
        })
    }
}

impl Validate for CreateDeliveryRequest {
    fn validate(&self) -> Result<(), String> {
        self.to_domain().map(drop).map_err(|e| e.to_string())
    }
}

/// Request to cancel a delivery.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelDeliveryRequest {
    pub reason: Option<String>,
}

impl Validate for CancelDeliveryRequest {
    fn validate(&self) -> Result<(), String> {
        check_note("reason", self.reason.as_deref(), MAX_REASON_LEN)
    }
}

/// A courier's engagement level.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatusInput {
    Viewing,
    Interested,
    NotInterested,
}

impl From<ConsultationStatusInput> for ConsultationStatus {
    fn from(s: ConsultationStatusInput) -> Self {
        match s {
            ConsultationStatusInput::Viewing => Self::Viewing,
            ConsultationStatusInput::Interested => Self::Interested,
            ConsultationStatusInput::NotInterested => Self::NotInterested,
        }
    }
}

/// Request to record a consultation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordConsultationRequest {
    pub courier_id: Uuid,
    pub status: ConsultationStatusInput,
}

impl Validate for RecordConsultationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.courier_id.is_nil() {
            return Err("courier_id must not be the nil UUID".to_string());
        }
        Ok(())
    }
}

/// Snapshot query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SnapshotParams {
    /// `submission` (default) or `distance`.
    pub order: Option<BidOrdering>,
}

/// POST /v1/deliveries: Open a delivery for bidding.
#[utoipa::path(
    post,
    path = "/v1/deliveries",
    request_body = CreateDeliveryRequest,
    responses(
        (status = 201, description = "Delivery opened", body = DeliveryView),
        (status = 400, description = "Malformed JSON", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "deliveries"
)]
pub(crate) async fn create_delivery(
    State(state): State<AppState>,
    body: Result<Json<CreateDeliveryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeliveryView>), AppError> {
    let req = extract_validated_json(body)?;
    let delivery = state.engine.create_delivery(req.to_domain()?)?;
    Ok((StatusCode::CREATED, Json(DeliveryView::from(&delivery))))
}

/// GET /v1/deliveries/{id}: Fetch a delivery.
#[utoipa::path(
    get,
    path = "/v1/deliveries/{id}",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery found", body = DeliveryView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "deliveries"
)]
pub(crate) async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryView>, AppError> {
    let delivery = state.engine.get_delivery(DeliveryId::from_uuid(id))?;
    Ok(Json(DeliveryView::from(&delivery)))
}

/// POST /v1/deliveries/{id}/cancel: Withdraw an open delivery.
///
/// The body is optional; without one no reason is recorded.
#[utoipa::path(
    post,
    path = "/v1/deliveries/{id}/cancel",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body(content = Option<CancelDeliveryRequest>, description = "Optional cancellation reason"),
    responses(
        (status = 200, description = "Delivery cancelled", body = CancellationView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Delivery already closed", body = crate::error::ErrorBody),
    ),
    tag = "deliveries"
)]
pub(crate) async fn cancel_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<CancellationView>, AppError> {
    let req: CancelDeliveryRequest = extract_optional_validated_json(&body)?;
    let cancellation = state
        .engine
        .cancel_delivery(DeliveryId::from_uuid(id), req.reason)?;
    Ok(Json(CancellationView::from(&cancellation)))
}

/// GET /v1/deliveries/{id}/snapshot: Poll the negotiation.
///
/// The response carries an `ETag` over the revision and the ranked bids with
/// their distances; a request whose `If-None-Match` matches gets
/// `304 Not Modified` with no body.
#[utoipa::path(
    get,
    path = "/v1/deliveries/{id}/snapshot",
    params(
        ("id" = Uuid, Path, description = "Delivery ID"),
        ("order" = Option<String>, Query, description = "`submission` (default) or `distance`"),
        ("If-None-Match" = Option<String>, Header, description = "ETag from a previous snapshot"),
    ),
    responses(
        (status = 200, description = "Current snapshot", body = SnapshotView),
        (status = 304, description = "Unchanged since the given ETag"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "deliveries"
)]
pub(crate) async fn snapshot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<SnapshotParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ordering = params.order.unwrap_or_default();
    let snapshot = state
        .gateway
        .snapshot(DeliveryId::from_uuid(id), ordering)?;

    let etag = snapshot.etag();
    let etag_value = HeaderValue::from_str(&etag)
        .map_err(|e| AppError::Internal(format!("etag header: {e}")))?;
    let unchanged = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|tags| tags.split(',').any(|t| t.trim() == etag));

    let mut response = if unchanged {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Json(SnapshotView::from(&snapshot)).into_response()
    };
    let headers = response.headers_mut();
    headers.insert(ETAG, etag_value);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

/// POST /v1/deliveries/{id}/consultations: Record a courier's interest.
#[utoipa::path(
    post,
    path = "/v1/deliveries/{id}/consultations",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = RecordConsultationRequest,
    responses(
        (status = 200, description = "Signal recorded", body = ConsultationView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "deliveries"
)]
pub(crate) async fn record_consultation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<RecordConsultationRequest>, JsonRejection>,
) -> Result<Json<ConsultationView>, AppError> {
    let req = extract_validated_json(body)?;
    let consultation = state.engine.record_consultation(
        DeliveryId::from_uuid(id),
        CourierId::from_uuid(req.courier_id),
        req.status.into(),
    )?;
    Ok(Json(ConsultationView::from(&consultation)))
}

/// DELETE /v1/deliveries/{id}/consultations: Drop a closed delivery's signals.
#[utoipa::path(
    delete,
    path = "/v1/deliveries/{id}/consultations",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Signals purged (none while open)", body = PurgeView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "deliveries"
)]
pub(crate) async fn purge_consultations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PurgeView>, AppError> {
    let purged = state
        .engine
        .purge_consultations(DeliveryId::from_uuid(id))?;
    Ok(Json(PurgeView { purged }))
}
