//! # Response Views
//!
//! Wire representations of engine records. Identifiers are bare UUIDs,
//! amounts are integers in minor currency units, timestamps are RFC 3339
//! UTC, and statuses use their snake_case names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use haggle_negotiation::{Assignment, Cancellation, NegotiationSnapshot, RankedBid};
use haggle_state::{
    Bid, BidTransitionRecord, Consultation, CounterOffer, Delivery, Location,
};

/// A pickup or drop-off point.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LocationView {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl From<&Location> for LocationView {
    fn from(l: &Location) -> Self {
        Self {
            address: l.address.clone(),
            lat: l.point.map(|p| p.lat()),
            lng: l.point.map(|p| p.lng()),
        }
    }
}

/// A delivery under negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryView {
    pub id: Uuid,
    pub pickup: LocationView,
    pub dropoff: LocationView,
    pub requested_price: u64,
    /// `open`, `assigned`, `cancelled` or `expired`.
    pub status: String,
    pub assigned_bid: Option<Uuid>,
    pub closed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Delivery> for DeliveryView {
    fn from(d: &Delivery) -> Self {
        Self {
            id: *d.id.as_uuid(),
            pickup: LocationView::from(&d.pickup),
            dropoff: LocationView::from(&d.dropoff),
            requested_price: d.requested_price.value(),
            status: d.status.name().to_string(),
            assigned_bid: d.assigned_bid.map(|b| *b.as_uuid()),
            closed_reason: d.closed_reason.clone(),
            created_at: *d.created_at.as_datetime(),
            updated_at: *d.updated_at.as_datetime(),
        }
    }
}

/// One counter-offer in a bid's history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CounterOfferView {
    pub amount: u64,
    /// `client` or `courier`.
    pub issuer: String,
    pub message: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl From<&CounterOffer> for CounterOfferView {
    fn from(c: &CounterOffer) -> Self {
        Self {
            amount: c.amount.value(),
            issuer: c.issuer.name().to_string(),
            message: c.message.clone(),
            issued_at: *c.issued_at.as_datetime(),
        }
    }
}

/// One status change in a bid's history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BidTransitionView {
    pub from: String,
    pub to: String,
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl From<&BidTransitionRecord> for BidTransitionView {
    fn from(r: &BidTransitionRecord) -> Self {
        Self {
            from: r.from.name().to_string(),
            to: r.to.name().to_string(),
            actor: r.actor.map(|a| a.name().to_string()),
            at: *r.at.as_datetime(),
            reason: r.reason.clone(),
        }
    }
}

/// A courier's bid.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BidView {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub courier_id: Uuid,
    /// Current price on the table.
    pub amount: u64,
    /// The courier's opening price.
    pub initial_amount: u64,
    pub eta_minutes: u32,
    /// `pending`, `counter_offer`, `accepted` or `declined`.
    pub status: String,
    pub sequence: u64,
    pub last_counter_by: Option<String>,
    pub counters: Vec<CounterOfferView>,
    pub decline_reason: Option<String>,
    pub transitions: Vec<BidTransitionView>,
    /// Courier distance to pickup, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BidView {
    fn build(b: &Bid, distance_km: Option<f64>) -> Self {
        Self {
            id: *b.id.as_uuid(),
            delivery_id: *b.delivery_id.as_uuid(),
            courier_id: *b.courier_id.as_uuid(),
            amount: b.amount.value(),
            initial_amount: b.initial_amount.value(),
            eta_minutes: b.eta.minutes(),
            status: b.status.name().to_string(),
            sequence: b.sequence,
            last_counter_by: b.last_counter_by.map(|p| p.name().to_string()),
            counters: b.counters.iter().map(CounterOfferView::from).collect(),
            decline_reason: b.decline_reason.clone(),
            transitions: b.transition_log.iter().map(BidTransitionView::from).collect(),
            distance_km,
            created_at: *b.created_at.as_datetime(),
            updated_at: *b.updated_at.as_datetime(),
        }
    }
}

impl From<&Bid> for BidView {
    fn from(b: &Bid) -> Self {
        Self::build(b, None)
    }
}

impl From<&RankedBid> for BidView {
    fn from(r: &RankedBid) -> Self {
        Self::build(&r.bid, r.distance_km)
    }
}

/// A courier's engagement signal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsultationView {
    pub id: Uuid,
    pub courier_id: Uuid,
    /// `viewing`, `interested` or `not_interested`.
    pub status: String,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Consultation> for ConsultationView {
    fn from(c: &Consultation) -> Self {
        Self {
            id: *c.id.as_uuid(),
            courier_id: *c.courier_id.as_uuid(),
            status: c.status.name().to_string(),
            first_seen_at: *c.first_seen_at.as_datetime(),
            updated_at: *c.timestamp.as_datetime(),
        }
    }
}

/// A consistent point-in-time view of a negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SnapshotView {
    pub delivery: DeliveryView,
    pub bids: Vec<BidView>,
    pub consultations: Vec<ConsultationView>,
    /// Changes whenever anything in the snapshot changes.
    pub revision: u64,
    pub taken_at: DateTime<Utc>,
    pub poll_interval_secs: u64,
    /// `submission` or `distance`.
    pub ordering: String,
}

impl From<&NegotiationSnapshot> for SnapshotView {
    fn from(s: &NegotiationSnapshot) -> Self {
        Self {
            delivery: DeliveryView::from(&s.delivery),
            bids: s.bids.iter().map(BidView::from).collect(),
            consultations: s.consultations.iter().map(ConsultationView::from).collect(),
            revision: s.revision,
            taken_at: *s.taken_at.as_datetime(),
            poll_interval_secs: s.poll_interval_secs,
            ordering: s.ordering.name().to_string(),
        }
    }
}

/// Result of accepting a bid.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignmentView {
    pub delivery: DeliveryView,
    pub accepted: BidView,
    /// Bids closed by this accept.
    pub declined: Vec<BidView>,
}

impl From<&Assignment> for AssignmentView {
    fn from(a: &Assignment) -> Self {
        Self {
            delivery: DeliveryView::from(&a.delivery),
            accepted: BidView::from(&a.accepted),
            declined: a.declined.iter().map(BidView::from).collect(),
        }
    }
}

/// Result of cancelling a delivery.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancellationView {
    pub delivery: DeliveryView,
    /// Bids closed by this cancellation.
    pub declined: Vec<BidView>,
}

impl From<&Cancellation> for CancellationView {
    fn from(c: &Cancellation) -> Self {
        Self {
            delivery: DeliveryView::from(&c.delivery),
            declined: c.declined.iter().map(BidView::from).collect(),
        }
    }
}

/// Result of purging a closed delivery's consultations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurgeView {
    /// Signals removed. Always 0 while the delivery is open.
    pub purged: usize,
}
