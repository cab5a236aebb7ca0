//! # Negotiation Events
//!
//! Committed state changes are published to a [`NegotiationObserver`] after
//! the delivery's gate is released. Delivery is fire-and-forget: observers
//! return nothing and cannot veto or fail an operation.

use serde::Serialize;

use haggle_core::{Amount, BidId, CourierId, DeliveryId, Timestamp};
use haggle_state::Party;

/// A committed change worth telling someone about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NegotiationEvent {
    /// A client opened a delivery.
    DeliveryOpened {
        /// The delivery.
        delivery_id: DeliveryId,
        /// When.
        at: Timestamp,
    },
    /// A courier placed a bid.
    BidSubmitted {
        /// The delivery.
        delivery_id: DeliveryId,
        /// The new bid.
        bid_id: BidId,
        /// Its courier.
        courier_id: CourierId,
        /// Opening price.
        amount: Amount,
        /// When.
        at: Timestamp,
    },
    /// One party revised a bid's price.
    CounterOffered {
        /// The delivery.
        delivery_id: DeliveryId,
        /// The bid.
        bid_id: BidId,
        /// Who countered.
        issuer: Party,
        /// New price.
        amount: Amount,
        /// When.
        at: Timestamp,
    },
    /// The client accepted a bid.
    BidAccepted {
        /// The delivery.
        delivery_id: DeliveryId,
        /// The winning bid.
        bid_id: BidId,
        /// Its courier.
        courier_id: CourierId,
        /// When.
        at: Timestamp,
    },
    /// A bid was declined, explicitly or because the delivery closed.
    BidDeclined {
        /// The delivery.
        delivery_id: DeliveryId,
        /// The bid.
        bid_id: BidId,
        /// Its courier.
        courier_id: CourierId,
        /// Reason, when one was given.
        reason: Option<String>,
        /// When.
        at: Timestamp,
    },
    /// The delivery was assigned to a bid.
    DeliveryAssigned {
        /// The delivery.
        delivery_id: DeliveryId,
        /// The winning bid.
        bid_id: BidId,
        /// When.
        at: Timestamp,
    },
    /// The negotiation window lapsed with no bids.
    DeliveryExpired {
        /// The delivery.
        delivery_id: DeliveryId,
        /// When.
        at: Timestamp,
    },
    /// The client withdrew the delivery.
    DeliveryCancelled {
        /// The delivery.
        delivery_id: DeliveryId,
        /// Reason, when one was given.
        reason: Option<String>,
        /// When.
        at: Timestamp,
    },
}

impl NegotiationEvent {
    /// Short event name, used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeliveryOpened { .. } => "delivery_opened",
            Self::BidSubmitted { .. } => "bid_submitted",
            Self::CounterOffered { .. } => "counter_offered",
            Self::BidAccepted { .. } => "bid_accepted",
            Self::BidDeclined { .. } => "bid_declined",
            Self::DeliveryAssigned { .. } => "delivery_assigned",
            Self::DeliveryExpired { .. } => "delivery_expired",
            Self::DeliveryCancelled { .. } => "delivery_cancelled",
        }
    }

    /// The delivery the event concerns.
    pub fn delivery_id(&self) -> DeliveryId {
        match self {
            Self::DeliveryOpened { delivery_id, .. }
            | Self::BidSubmitted { delivery_id, .. }
            | Self::CounterOffered { delivery_id, .. }
            | Self::BidAccepted { delivery_id, .. }
            | Self::BidDeclined { delivery_id, .. }
            | Self::DeliveryAssigned { delivery_id, .. }
            | Self::DeliveryExpired { delivery_id, .. }
            | Self::DeliveryCancelled { delivery_id, .. } => *delivery_id,
        }
    }
}

/// Receiver of committed negotiation events.
///
/// Called outside any lock. Implementations must not block for long; hand
/// work to a queue if dispatch is slow.
pub trait NegotiationObserver: Send + Sync {
    /// Handle one event.
    fn notify(&self, event: &NegotiationEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl NegotiationObserver for TracingObserver {
    fn notify(&self, event: &NegotiationEvent) {
        tracing::info!(
            event = event.name(),
            delivery_id = %event.delivery_id(),
            "negotiation event"
        );
    }
}
