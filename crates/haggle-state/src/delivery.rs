//! # Delivery Lifecycle
//!
//! ```text
//! Open ──assign──▶ Assigned   (one bid accepted)
//!   │
//!   ├──expire───▶ Expired    (zero bids after the negotiation window)
//!   └──cancel───▶ Cancelled  (client withdrew the request)
//! ```
//!
//! A delivery is only mutable while `Open`. Once it leaves `Open` every
//! further transition is rejected.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use haggle_core::{Amount, BidId, DeliveryId, GeoPoint, Timestamp, ValidationError};

/// Maximum length of a free-text address descriptor.
const MAX_ADDRESS_LEN: usize = 512;

/// Delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepting bids and counter-offers.
    Open,
    /// Exactly one bid was accepted.
    Assigned,
    /// Withdrawn by the client.
    Cancelled,
    /// Negotiation window elapsed with zero bids.
    Expired,
}

impl DeliveryStatus {
    /// Returns the canonical status name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Statuses reachable from this one.
    pub fn valid_transitions(&self) -> &'static [DeliveryStatus] {
        match self {
            Self::Open => &[Self::Assigned, Self::Cancelled, Self::Expired],
            Self::Assigned | Self::Cancelled | Self::Expired => &[],
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from delivery transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Attempted transition is not allowed by the state machine.
    #[error("invalid delivery transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: DeliveryStatus,
        /// Attempted target status.
        to: DeliveryStatus,
    },
}

/// A pickup or drop-off descriptor.
///
/// The address is free text supplied by the client; the point, when present,
/// is used for read-side distance ordering only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human-readable address.
    pub address: String,
    /// Geocoded position, if the client resolved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,
}

impl Location {
    /// Create a validated location. `field` names the descriptor in errors.
    pub fn new(
        field: &'static str,
        address: impl Into<String>,
        point: Option<GeoPoint>,
    ) -> Result<Self, ValidationError> {
        let address = address.into().trim().to_string();
        if address.is_empty() {
            return Err(ValidationError::EmptyField { field });
        }
        if address.chars().count() > MAX_ADDRESS_LEN {
            return Err(ValidationError::FieldTooLong {
                field,
                max: MAX_ADDRESS_LEN,
            });
        }
        Ok(Self { address, point })
    }
}

/// Everything a client supplies to open a negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// Where the courier collects the parcel.
    pub pickup: Location,
    /// Where the courier drops the parcel.
    pub dropoff: Location,
    /// The client's opening price.
    pub requested_price: Amount,
}

/// The negotiation subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// Unique delivery identifier.
    pub id: DeliveryId,
    /// Pickup descriptor.
    pub pickup: Location,
    /// Drop-off descriptor.
    pub dropoff: Location,
    /// The client's opening price.
    pub requested_price: Amount,
    /// Current status.
    pub status: DeliveryStatus,
    /// The accepted bid, once `Assigned`.
    pub assigned_bid: Option<BidId>,
    /// Why the delivery left `Open`, when a reason was given.
    pub closed_reason: Option<String>,
    /// When the client opened the negotiation.
    pub created_at: Timestamp,
    /// Last status change.
    pub updated_at: Timestamp,
}

impl Delivery {
    /// Open a new delivery at `now`.
    pub fn open(request: DeliveryRequest, now: Timestamp) -> Self {
        Self {
            id: DeliveryId::new(),
            pickup: request.pickup,
            dropoff: request.dropoff,
            requested_price: request.requested_price,
            status: DeliveryStatus::Open,
            assigned_bid: None,
            closed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the delivery still accepts mutations.
    pub fn is_open(&self) -> bool {
        self.status == DeliveryStatus::Open
    }

    /// Whether `window` has fully elapsed between creation and `now`.
    ///
    /// This is only the clock half of the expiry rule; whether any bid
    /// exists is the caller's concern.
    pub fn window_elapsed(&self, now: &Timestamp, window: Duration) -> bool {
        now.since(&self.created_at) >= window
    }

    /// Attempt a status transition with runtime validation.
    pub fn try_transition(
        &mut self,
        to: DeliveryStatus,
        reason: Option<String>,
        at: Timestamp,
    ) -> Result<(), DeliveryError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(DeliveryError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.closed_reason = reason;
        self.updated_at = at;
        Ok(())
    }

    /// `Open → Assigned`, recording the winning bid.
    pub fn assign(&mut self, bid_id: BidId, at: Timestamp) -> Result<(), DeliveryError> {
        self.try_transition(DeliveryStatus::Assigned, None, at)?;
        self.assigned_bid = Some(bid_id);
        Ok(())
    }
}
