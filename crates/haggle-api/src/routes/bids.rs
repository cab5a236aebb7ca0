//! # Bid Routes
//!
//! Courier bids against a delivery and the client/courier moves on them:
//! accept, decline, counter.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use haggle_core::{Amount, BidId, CourierId, DeliveryId, EtaMinutes};
use haggle_state::Party;

use crate::error::AppError;
use crate::extractors::{
    check_note, extract_optional_validated_json, extract_validated_json, Validate,
};
use crate::state::AppState;
use crate::views::{AssignmentView, BidView};

/// Maximum length of a decline reason or counter-offer message.
const MAX_NOTE_LEN: usize = 512;

/// Build the bids router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/deliveries/{id}/bids",
            post(submit_bid).get(list_bids),
        )
        .route(
            "/v1/deliveries/{id}/bids/{bid_id}/accept",
            post(accept_bid),
        )
        .route(
            "/v1/deliveries/{id}/bids/{bid_id}/decline",
            post(decline_bid),
        )
        .route(
            "/v1/deliveries/{id}/bids/{bid_id}/counter",
            post(counter_offer),
        )
}

/// Request to place a bid.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitBidRequest {
    pub courier_id: Uuid,
    /// Price in minor currency units.
    pub amount: u64,
    pub eta_minutes: u32,
}

impl Validate for SubmitBidRequest {
    fn validate(&self) -> Result<(), String> {
        if self.courier_id.is_nil() {
            return Err("courier_id must not be the nil UUID".to_string());
        }
        Amount::new(self.amount).map_err(|e| e.to_string())?;
        EtaMinutes::new(self.eta_minutes).map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Request to decline a bid.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeclineBidRequest {
    pub reason: Option<String>,
}

impl Validate for DeclineBidRequest {
    fn validate(&self) -> Result<(), String> {
        check_note("reason", self.reason.as_deref(), MAX_NOTE_LEN)
    }
}

/// Which side is countering.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssuerParam {
    Client,
    Courier,
}

impl From<IssuerParam> for Party {
    fn from(p: IssuerParam) -> Self {
        match p {
            IssuerParam::Client => Self::Client,
            IssuerParam::Courier => Self::Courier,
        }
    }
}

/// Request to counter a bid's price.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CounterOfferRequest {
    /// Proposed price in minor currency units.
    pub amount: u64,
    pub issuer: IssuerParam,
    pub message: Option<String>,
}

impl Validate for CounterOfferRequest {
    fn validate(&self) -> Result<(), String> {
        Amount::new(self.amount).map_err(|e| e.to_string())?;
        check_note("message", self.message.as_deref(), MAX_NOTE_LEN)
    }
}

/// POST /v1/deliveries/{id}/bids: Place a bid.
#[utoipa::path(
    post,
    path = "/v1/deliveries/{id}/bids",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = SubmitBidRequest,
    responses(
        (status = 201, description = "Bid placed", body = BidView),
        (status = 404, description = "Delivery not found", body = crate::error::ErrorBody),
        (status = 409, description = "Delivery closed", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn submit_bid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<SubmitBidRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BidView>), AppError> {
    let req = extract_validated_json(body)?;
    let bid = state.engine.submit_bid(
        DeliveryId::from_uuid(id),
        CourierId::from_uuid(req.courier_id),
        Amount::new(req.amount)?,
        EtaMinutes::new(req.eta_minutes)?,
    )?;
    Ok((StatusCode::CREATED, Json(BidView::from(&bid))))
}

/// GET /v1/deliveries/{id}/bids: List bids in submission order.
#[utoipa::path(
    get,
    path = "/v1/deliveries/{id}/bids",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Bids on the delivery", body = Vec<BidView>),
        (status = 404, description = "Delivery not found", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn list_bids(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BidView>>, AppError> {
    let bids = state.engine.list_bids(DeliveryId::from_uuid(id))?;
    Ok(Json(bids.iter().map(BidView::from).collect()))
}

/// POST /v1/deliveries/{id}/bids/{bid_id}/accept: Accept a bid.
///
/// Assigns the delivery and declines every other open bid in one step.
#[utoipa::path(
    post,
    path = "/v1/deliveries/{id}/bids/{bid_id}/accept",
    params(
        ("id" = Uuid, Path, description = "Delivery ID"),
        ("bid_id" = Uuid, Path, description = "Bid ID"),
    ),
    responses(
        (status = 200, description = "Bid accepted, delivery assigned", body = AssignmentView),
        (status = 404, description = "Delivery or bid not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already assigned, closed, or bid not open", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn accept_bid(
    State(state): State<AppState>,
    Path((id, bid_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AssignmentView>, AppError> {
    let assignment = state
        .engine
        .accept_bid(DeliveryId::from_uuid(id), BidId::from_uuid(bid_id))?;
    Ok(Json(AssignmentView::from(&assignment)))
}

/// POST /v1/deliveries/{id}/bids/{bid_id}/decline: Decline a bid.
///
/// Declining an already-declined bid returns it unchanged. The body is
/// optional; without one the bid is declined with no reason.
#[utoipa::path(
    post,
    path = "/v1/deliveries/{id}/bids/{bid_id}/decline",
    params(
        ("id" = Uuid, Path, description = "Delivery ID"),
        ("bid_id" = Uuid, Path, description = "Bid ID"),
    ),
    request_body(content = Option<DeclineBidRequest>, description = "Optional decline reason"),
    responses(
        (status = 200, description = "Bid declined", body = BidView),
        (status = 404, description = "Delivery or bid not found", body = crate::error::ErrorBody),
        (status = 409, description = "Bid accepted or delivery closed", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn decline_bid(
    State(state): State<AppState>,
    Path((id, bid_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<Json<BidView>, AppError> {
    let req: DeclineBidRequest = extract_optional_validated_json(&body)?;
    let bid = state.engine.decline_bid(
        DeliveryId::from_uuid(id),
        BidId::from_uuid(bid_id),
        req.reason,
    )?;
    Ok(Json(BidView::from(&bid)))
}

/// POST /v1/deliveries/{id}/bids/{bid_id}/counter: Counter a bid's price.
#[utoipa::path(
    post,
    path = "/v1/deliveries/{id}/bids/{bid_id}/counter",
    params(
        ("id" = Uuid, Path, description = "Delivery ID"),
        ("bid_id" = Uuid, Path, description = "Bid ID"),
    ),
    request_body = CounterOfferRequest,
    responses(
        (status = 200, description = "Counter-offer recorded", body = BidView),
        (status = 404, description = "Delivery or bid not found", body = crate::error::ErrorBody),
        (status = 409, description = "Out of turn, bid closed, or delivery closed", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn counter_offer(
    State(state): State<AppState>,
    Path((id, bid_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<CounterOfferRequest>, JsonRejection>,
) -> Result<Json<BidView>, AppError> {
    let req = extract_validated_json(body)?;
    let bid = state.engine.counter_offer(
        DeliveryId::from_uuid(id),
        BidId::from_uuid(bid_id),
        Amount::new(req.amount)?,
        req.issuer.into(),
        req.message,
    )?;
    Ok(Json(BidView::from(&bid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_rules() {
        let ok = SubmitBidRequest {
            courier_id: Uuid::new_v4(),
            amount: 900,
            eta_minutes: 20,
        };
        assert!(ok.validate().is_ok());

        let nil = SubmitBidRequest {
            courier_id: Uuid::nil(),
            ..ok
        };
        assert!(nil.validate().unwrap_err().contains("courier_id"));

        let zero = SubmitBidRequest {
            courier_id: Uuid::new_v4(),
            amount: 0,
            eta_minutes: 20,
        };
        assert!(zero.validate().is_err());

        let slow = SubmitBidRequest {
            courier_id: Uuid::new_v4(),
            amount: 900,
            eta_minutes: 0,
        };
        assert!(slow.validate().is_err());
    }

    #[test]
    fn counter_request_parses_issuer() {
        let req: CounterOfferRequest =
            serde_json::from_str(r#"{"amount": 1100, "issuer": "client"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(Party::from(req.issuer), Party::Client);

        let bad = serde_json::from_str::<CounterOfferRequest>(
            r#"{"amount": 1100, "issuer": "dispatcher"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn long_notes_are_rejected() {
        let req = CounterOfferRequest {
            amount: 1000,
            issuer: IssuerParam::Courier,
            message: Some("m".repeat(MAX_NOTE_LEN + 1)),
        };
        assert!(req.validate().is_err());
        assert!(DeclineBidRequest::default().validate().is_ok());
    }
}
