//! # Integration Tests for haggle-api
//!
//! Drives the assembled router with `tower::ServiceExt::oneshot`: health
//! probes, a full negotiation over HTTP, conflict codes, snapshot caching,
//! expiry under a manual clock, distance ordering, metrics and OpenAPI.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use haggle_api::{AppConfig, AppState};
use haggle_core::Timestamp;
use haggle_negotiation::{ManualClock, NegotiationEngine};

fn test_state() -> AppState {
    AppState::new()
}

fn manual_state() -> (AppState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Timestamp::parse("2026-03-01T09:00:00Z").unwrap(),
    ));
    let config = AppConfig::default();
    let engine = NegotiationEngine::new(config.negotiation()).with_clock(clock.clone());
    (AppState::with_engine(config, engine), clock)
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = haggle_api::app(state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
    send(
        state,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn post(state: &AppState, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        state,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn put(state: &AppState, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        state,
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn open_delivery(state: &AppState) -> String {
    let (status, body) = post(
        state,
        "/v1/deliveries",
        json!({
            "pickup": {"address": "Westminster Bridge", "lat": 51.5007, "lng": -0.1246},
            "dropoff": {"address": "Tower Bridge"},
            "requested_price": 1500
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn place_bid(state: &AppState, delivery: &str, courier: Uuid, amount: u64) -> String {
    let (status, body) = post(
        state,
        &format!("/v1/deliveries/{delivery}/bids"),
        json!({"courier_id": courier, "amount": amount, "eta_minutes": 20}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let (status, body) = get(&test_state(), "/health/liveness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_readiness_probe() {
    let (status, body) = get(&test_state(), "/health/readiness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

// -- Negotiation --------------------------------------------------------------

#[tokio::test]
async fn test_full_negotiation_over_http() {
    let state = test_state();
    let delivery = open_delivery(&state).await;

    let (status, body) = get(&state, &format!("/v1/deliveries/{delivery}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "open");
    assert_eq!(body["requested_price"], 1500);

    let winner = place_bid(&state, &delivery, Uuid::new_v4(), 1800).await;
    let loser = place_bid(&state, &delivery, Uuid::new_v4(), 1700).await;

    let (status, body) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{winner}/counter"),
        json!({"amount": 1600, "issuer": "client", "message": "meet me halfway?"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "counter_offer");
    assert_eq!(body["amount"], 1600);
    assert_eq!(body["initial_amount"], 1800);
    assert_eq!(body["last_counter_by"], "client");

    let (status, body) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{winner}/counter"),
        json!({"amount": 1650, "issuer": "courier"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["counters"].as_array().unwrap().len(), 2);

    let (status, body) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{winner}/accept"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["delivery"]["status"], "assigned");
    assert_eq!(body["delivery"]["assigned_bid"], winner.as_str());
    assert_eq!(body["accepted"]["status"], "accepted");
    assert_eq!(body["accepted"]["amount"], 1650);
    let declined = body["declined"].as_array().unwrap();
    assert_eq!(declined.len(), 1);
    assert_eq!(declined[0]["id"], loser.as_str());
    assert_eq!(declined[0]["status"], "declined");

    let (status, body) = get(&state, &format!("/v1/deliveries/{delivery}/bids")).await;
    assert_eq!(status, StatusCode::OK);
    let bids = body.as_array().unwrap();
    assert_eq!(bids.len(), 2);
    assert_eq!(bids[0]["id"], winner.as_str());
}

#[tokio::test]
async fn test_conflict_codes() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let first = place_bid(&state, &delivery, Uuid::new_v4(), 1400).await;
    let second = place_bid(&state, &delivery, Uuid::new_v4(), 1450).await;

    // Same party twice in a row.
    let counter_uri = format!("/v1/deliveries/{delivery}/bids/{first}/counter");
    let (status, _) = post(&state, &counter_uri, json!({"amount": 1300, "issuer": "client"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) =
        post(&state, &counter_uri, json!({"amount": 1250, "issuer": "client"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_COUNTER_SEQUENCE");
    assert_eq!(body["error"]["details"]["last_counter_by"], "client");

    let (status, _) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{first}/accept"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The other bid was auto-declined and the delivery is assigned.
    let (status, body) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{second}/accept"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_ASSIGNED");

    let (status, body) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{first}/decline"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, body) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids"),
        json!({"courier_id": Uuid::new_v4(), "amount": 1000, "eta_minutes": 10}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DELIVERY_CLOSED");
    assert_eq!(body["error"]["details"]["status"], "assigned");
}

#[tokio::test]
async fn test_decline_is_idempotent() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let bid = place_bid(&state, &delivery, Uuid::new_v4(), 1400).await;
    let uri = format!("/v1/deliveries/{delivery}/bids/{bid}/decline");

    let (status, body) = post(&state, &uri, json!({"reason": "too slow"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "declined");
    assert_eq!(body["decline_reason"], "too slow");

    let (status, again) = post(&state, &uri, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["transitions"], body["transitions"]);
}

#[tokio::test]
async fn test_cancel_declines_open_bids() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    place_bid(&state, &delivery, Uuid::new_v4(), 1400).await;

    let uri = format!("/v1/deliveries/{delivery}/cancel");
    let (status, body) = post(&state, &uri, json!({"reason": "changed my mind"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["delivery"]["status"], "cancelled");
    assert_eq!(body["declined"].as_array().unwrap().len(), 1);

    let (status, body) = post(&state, &uri, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DELIVERY_CLOSED");
}

#[tokio::test]
async fn test_decline_and_cancel_without_body() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let bid = place_bid(&state, &delivery, Uuid::new_v4(), 1400).await;
    place_bid(&state, &delivery, Uuid::new_v4(), 1500).await;

    let bare = |uri: String| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(
        &state,
        bare(format!("/v1/deliveries/{delivery}/bids/{bid}/decline")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "declined");

    let (status, body) = send(&state, bare(format!("/v1/deliveries/{delivery}/cancel"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["delivery"]["status"], "cancelled");
    assert_eq!(body["declined"].as_array().unwrap().len(), 1);

    // A body that is present must still parse.
    let other = open_delivery(&state).await;
    let (status, body) = send(
        &state,
        Request::builder()
            .method("POST")
            .uri(format!("/v1/deliveries/{other}/cancel"))
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// -- Not Found / Bad Input ----------------------------------------------------

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let state = test_state();
    let missing = Uuid::new_v4();
    let (status, body) = get(&state, &format!("/v1/deliveries/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let delivery = open_delivery(&state).await;
    let (status, _) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{missing}/accept"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A bid addressed through the wrong delivery is not found either.
    let other = open_delivery(&state).await;
    let bid = place_bid(&state, &other, Uuid::new_v4(), 1400).await;
    let (status, _) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids/{bid}/accept"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_and_malformed_bodies() {
    let state = test_state();
    let (status, body) = post(
        &state,
        "/v1/deliveries",
        json!({
            "pickup": {"address": "A"},
            "dropoff": {"address": "B"},
            "requested_price": 0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &state,
        Request::builder()
            .method("POST")
            .uri("/v1/deliveries")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let delivery = open_delivery(&state).await;
    let (status, _) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids"),
        json!({"courier_id": Uuid::new_v4(), "amount": 1000, "eta_minutes": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Snapshots ----------------------------------------------------------------

#[tokio::test]
async fn test_snapshot_etag_and_not_modified() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let uri = format!("/v1/deliveries/{delivery}/snapshot");

    let response = haggle_api::app(state.clone())
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-cache");
    let etag = response.headers()["etag"].to_str().unwrap().to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["ordering"], "submission");
    assert_eq!(body["poll_interval_secs"], 10);
    assert!(body["bids"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &state,
        Request::builder()
            .uri(&uri)
            .header("if-none-match", &etag)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert_eq!(body, Value::Null);

    // Any change invalidates the tag.
    place_bid(&state, &delivery, Uuid::new_v4(), 1400).await;
    let (status, body) = send(
        &state,
        Request::builder()
            .uri(&uri)
            .header("if-none-match", &etag)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bids"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshot_reports_expiry() {
    let (state, clock) = manual_state();
    let delivery = open_delivery(&state).await;
    let uri = format!("/v1/deliveries/{delivery}/snapshot");

    clock.advance(Duration::seconds(119));
    let (_, body) = get(&state, &uri).await;
    assert_eq!(body["delivery"]["status"], "open");

    clock.advance(Duration::seconds(6));
    let (status, body) = get(&state, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivery"]["status"], "expired");

    let (status, body) = post(
        &state,
        &format!("/v1/deliveries/{delivery}/bids"),
        json!({"courier_id": Uuid::new_v4(), "amount": 1000, "eta_minutes": 10}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["details"]["status"], "expired");
}

#[tokio::test]
async fn test_snapshot_distance_ordering() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let far_courier = Uuid::new_v4();
    let near_courier = Uuid::new_v4();
    let far = place_bid(&state, &delivery, far_courier, 1400).await;
    let near = place_bid(&state, &delivery, near_courier, 1500).await;

    let (status, _) = put(
        &state,
        &format!("/v1/couriers/{far_courier}/position"),
        json!({"lat": 51.7520, "lng": -1.2577}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = put(
        &state,
        &format!("/v1/couriers/{near_courier}/position"),
        json!({"lat": 51.5033, "lng": -0.1195}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = get(
        &state,
        &format!("/v1/deliveries/{delivery}/snapshot?order=distance"),
    )
    .await;
    assert_eq!(body["ordering"], "distance");
    let bids = body["bids"].as_array().unwrap();
    assert_eq!(bids[0]["id"], near.as_str());
    assert_eq!(bids[1]["id"], far.as_str());
    assert!(bids[0]["distance_km"].as_f64().unwrap() < 1.0);

    let (_, body) = get(&state, &format!("/v1/deliveries/{delivery}/snapshot")).await;
    assert_eq!(body["bids"][0]["id"], far.as_str());
}

#[tokio::test]
async fn test_distance_snapshot_etag_tracks_courier_moves() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let first_bid = place_bid(&state, &delivery, first, 1400).await;
    let second_bid = place_bid(&state, &delivery, second, 1500).await;
    let near = json!({"lat": 51.5033, "lng": -0.1195});
    let far = json!({"lat": 51.7520, "lng": -1.2577});

    put(&state, &format!("/v1/couriers/{first}/position"), near.clone()).await;
    put(&state, &format!("/v1/couriers/{second}/position"), far.clone()).await;

    let uri = format!("/v1/deliveries/{delivery}/snapshot?order=distance");
    let conditional = |etag: &str| {
        Request::builder()
            .uri(&uri)
            .header("if-none-match", etag)
            .body(Body::empty())
            .unwrap()
    };

    let response = haggle_api::app(state.clone())
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let stale = response.headers()["etag"].to_str().unwrap().to_string();
    let (status, _) = send(&state, conditional(&stale)).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);

    // Both couriers move; the order flips without any negotiation change.
    put(&state, &format!("/v1/couriers/{first}/position"), far).await;
    put(&state, &format!("/v1/couriers/{second}/position"), near).await;

    let response = haggle_api::app(state.clone())
        .oneshot(conditional(&stale))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fresh = response.headers()["etag"].to_str().unwrap().to_string();
    assert_ne!(fresh, stale);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["bids"][0]["id"], second_bid.as_str());
    assert_eq!(body["bids"][1]["id"], first_bid.as_str());

    let (status, _) = send(&state, conditional(&fresh)).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_out_of_range_position_is_rejected() {
    let state = test_state();
    let (status, body) = put(
        &state,
        &format!("/v1/couriers/{}/position", Uuid::new_v4()),
        json!({"lat": 123.0, "lng": 0.0}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_consultations_appear_in_snapshot() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let courier = Uuid::new_v4();
    let uri = format!("/v1/deliveries/{delivery}/consultations");

    let (status, first) = post(
        &state,
        &uri,
        json!({"courier_id": courier, "status": "viewing"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    let (_, second) = post(
        &state,
        &uri,
        json!({"courier_id": courier, "status": "interested"}),
    )
    .await;
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["status"], "interested");

    let (_, body) = get(&state, &format!("/v1/deliveries/{delivery}/snapshot")).await;
    let consultations = body["consultations"].as_array().unwrap();
    assert_eq!(consultations.len(), 1);
    assert_eq!(consultations[0]["status"], "interested");
}

#[tokio::test]
async fn test_purge_only_clears_closed_deliveries() {
    let state = test_state();
    let delivery = open_delivery(&state).await;
    let uri = format!("/v1/deliveries/{delivery}/consultations");
    post(
        &state,
        &uri,
        json!({"courier_id": Uuid::new_v4(), "status": "viewing"}),
    )
    .await;

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };
    let (status, body) = send(&state, delete(uri.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged"], 0);

    post(&state, &format!("/v1/deliveries/{delivery}/cancel"), json!({})).await;
    let (_, body) = send(&state, delete(uri)).await;
    assert_eq!(body["purged"], 1);
}

// -- Metrics & OpenAPI --------------------------------------------------------

#[tokio::test]
async fn test_metrics_count_requests_and_errors() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let state = test_state().with_prometheus(recorder.handle());
    let _guard = metrics::set_default_local_recorder(&recorder);

    let delivery = open_delivery(&state).await;
    get(&state, &format!("/v1/deliveries/{}", Uuid::new_v4())).await;
    place_bid(&state, &delivery, Uuid::new_v4(), 1400).await;

    let (status, body) = get(&state, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("haggle_http_requests_total 3"), "{text}");
    assert!(text.contains("haggle_http_client_errors_total 1"), "{text}");
    assert!(!text.contains("haggle_http_server_errors_total"), "{text}");
    // Engine counters share the same recorder.
    assert!(text.contains("haggle_bids_submitted_total 1"), "{text}");
}

#[tokio::test]
async fn test_metrics_without_recorder_is_unavailable() {
    let (status, _) = get(&test_state(), "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_json_served() {
    let (status, body) = get(&test_state(), "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["openapi"].as_str().unwrap().starts_with("3."));
    assert!(body["paths"]["/v1/deliveries/{id}/snapshot"].is_object());
}
