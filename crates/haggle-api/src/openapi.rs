//! # OpenAPI Specification Assembly
//!
//! Assembles every utoipa-documented route into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the whole API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Haggle API",
        description = "Delivery bid negotiation: clients open deliveries, couriers bid, both sides counter, one bid wins or the window lapses.\n\nClients poll `/v1/deliveries/{id}/snapshot` and may send `If-None-Match` to skip unchanged snapshots.",
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // ── Deliveries ──────────────────────────────────────────────────
        crate::routes::deliveries::create_delivery,
        crate::routes::deliveries::get_delivery,
        crate::routes::deliveries::cancel_delivery,
        crate::routes::deliveries::snapshot,
        crate::routes::deliveries::record_consultation,
        crate::routes::deliveries::purge_consultations,
        // ── Bids ────────────────────────────────────────────────────────
        crate::routes::bids::submit_bid,
        crate::routes::bids::list_bids,
        crate::routes::bids::accept_bid,
        crate::routes::bids::decline_bid,
        crate::routes::bids::counter_offer,
        // ── Couriers ────────────────────────────────────────────────────
        crate::routes::couriers::report_position,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::deliveries::LocationInput,
        crate::routes::deliveries::CreateDeliveryRequest,
        crate::routes::deliveries::CancelDeliveryRequest,
        crate::routes::deliveries::ConsultationStatusInput,
        crate::routes::deliveries::RecordConsultationRequest,
        crate::routes::bids::SubmitBidRequest,
        crate::routes::bids::DeclineBidRequest,
        crate::routes::bids::IssuerParam,
        crate::routes::bids::CounterOfferRequest,
        crate::routes::couriers::PositionRequest,
        crate::views::LocationView,
        crate::views::DeliveryView,
        crate::views::CounterOfferView,
        crate::views::BidTransitionView,
        crate::views::BidView,
        crate::views::ConsultationView,
        crate::views::SnapshotView,
        crate::views::AssignmentView,
        crate::views::CancellationView,
        crate::views::PurgeView,
    )),
    tags(
        (name = "deliveries", description = "Delivery lifecycle and negotiation snapshots"),
        (name = "bids", description = "Courier bids and the moves on them"),
        (name = "couriers", description = "Courier position reports"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
