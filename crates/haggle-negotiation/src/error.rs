//! # Negotiation Errors
//!
//! Every rejected operation surfaces as one of these, synchronously, to the
//! caller. The engine never retries and never swallows a rejection.

use thiserror::Error;

use haggle_core::{BidId, DeliveryId};
use haggle_state::{BidError, BidStatus, DeliveryStatus, Party};

/// The record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Unknown delivery id.
    Delivery(DeliveryId),
    /// Unknown bid id, or a bid that belongs to another delivery.
    Bid(BidId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery(id) => write!(f, "delivery {id}"),
            Self::Bid(id) => write!(f, "bid {id}"),
        }
    }
}

/// Errors from the bid store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with that id.
    #[error("{0} not found")]
    NotFound(Missing),

    /// A record with that id already exists.
    #[error("{0} already exists")]
    Duplicate(String),

    /// Compare-and-set lost: the stored status is not the expected one.
    #[error("status changed underneath the caller: expected {expected}, found {actual}")]
    StatusMismatch {
        /// The status the caller read.
        expected: String,
        /// The status actually stored.
        actual: String,
    },
}

/// Errors from negotiation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// Mutation attempted on a delivery that is no longer `open`.
    #[error("delivery {delivery_id} is {status} and no longer accepts changes")]
    DeliveryClosed {
        /// The delivery.
        delivery_id: DeliveryId,
        /// Its terminal status.
        status: DeliveryStatus,
    },

    /// Another bid on this delivery was accepted first.
    #[error("delivery {delivery_id} has already been assigned")]
    AlreadyAssigned {
        /// The delivery.
        delivery_id: DeliveryId,
    },

    /// The bid's status does not permit the requested action.
    #[error("cannot {action} bid {bid_id} while it is {from}")]
    InvalidTransition {
        /// The bid.
        bid_id: BidId,
        /// Its current status.
        from: BidStatus,
        /// The rejected action.
        action: &'static str,
    },

    /// The same party countered twice in a row.
    #[error("{issuer} issued the previous counter-offer on bid {bid_id}; the other party must respond first")]
    InvalidCounterSequence {
        /// The bid.
        bid_id: BidId,
        /// The repeating issuer.
        issuer: Party,
    },

    /// Unknown delivery or bid.
    #[error("{0} not found")]
    NotFound(Missing),

    /// Storage backend fault that is not a negotiation outcome.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl NegotiationError {
    /// Stable machine-readable code, also used as the metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeliveryClosed { .. } => "DELIVERY_CLOSED",
            Self::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidCounterSequence { .. } => "INVALID_COUNTER_SEQUENCE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Translate a bid state-machine rejection for `bid_id`.
    pub(crate) fn from_bid(bid_id: BidId, action: &'static str, err: BidError) -> Self {
        match err {
            BidError::InvalidTransition { from, .. } => Self::InvalidTransition {
                bid_id,
                from,
                action,
            },
            BidError::InvalidCounterSequence { issuer } => {
                Self::InvalidCounterSequence { bid_id, issuer }
            }
        }
    }
}

impl From<StoreError> for NegotiationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(missing) => Self::NotFound(missing),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_negotiation_not_found() {
        let id = BidId::new();
        let err = NegotiationError::from(StoreError::NotFound(Missing::Bid(id)));
        assert_eq!(err, NegotiationError::NotFound(Missing::Bid(id)));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn store_mismatch_stays_a_store_error() {
        let err = NegotiationError::from(StoreError::StatusMismatch {
            expected: "pending".into(),
            actual: "accepted".into(),
        });
        assert!(matches!(err, NegotiationError::Store(_)));
        assert_eq!(err.code(), "STORE_ERROR");
    }

    #[test]
    fn bid_errors_translate_with_context() {
        let id = BidId::new();
        let err = NegotiationError::from_bid(
            id,
            "decline",
            BidError::InvalidTransition {
                from: BidStatus::Accepted,
                to: BidStatus::Declined,
            },
        );
        assert_eq!(
            err,
            NegotiationError::InvalidTransition {
                bid_id: id,
                from: BidStatus::Accepted,
                action: "decline"
            }
        );
        assert!(err.to_string().contains("cannot decline"));
        assert!(err.to_string().contains("accepted"));

        let err = NegotiationError::from_bid(
            id,
            "counter",
            BidError::InvalidCounterSequence {
                issuer: Party::Client,
            },
        );
        assert_eq!(err.code(), "INVALID_COUNTER_SEQUENCE");
    }

    #[test]
    fn display_messages() {
        let d = DeliveryId::new();
        let closed = NegotiationError::DeliveryClosed {
            delivery_id: d,
            status: DeliveryStatus::Expired,
        };
        assert!(closed.to_string().contains("expired"));
        let assigned = NegotiationError::AlreadyAssigned { delivery_id: d };
        assert!(assigned.to_string().contains("already been assigned"));
        let missing = NegotiationError::NotFound(Missing::Delivery(d));
        assert_eq!(missing.to_string(), format!("delivery {d} not found"));
    }
}
