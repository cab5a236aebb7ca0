//! # Bid Lifecycle
//!
//! A bid is a courier's price/time offer against a delivery. Both parties
//! may revise the price with counter-offers until one side accepts or
//! declines.
//!
//! ## Allowed Transitions
//!
//! | From           | To                                        |
//! |----------------|-------------------------------------------|
//! | `pending`      | `accepted`, `declined`, `counter_offer`   |
//! | `counter_offer`| `accepted`, `declined`, `counter_offer`   |
//! | `accepted`     | none                                      |
//! | `declined`     | none                                      |
//!
//! ## Counter Alternation
//!
//! The issuer of a counter-offer must differ from the issuer of the
//! immediately preceding counter on the same bid. The first counter may come
//! from either party.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use haggle_core::{Amount, BidId, CourierId, DeliveryId, EtaMinutes, Timestamp};

/// Bid status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    /// Submitted, awaiting a response.
    Pending,
    /// Accepted by the client. Terminal.
    Accepted,
    /// Declined, or closed because another bid won. Terminal.
    Declined,
    /// Price revised by a counter-offer, awaiting a response.
    CounterOffer,
}

impl BidStatus {
    /// Returns the canonical status name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::CounterOffer => "counter_offer",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }

    /// Whether the bid is still negotiable (`pending` or `counter_offer`).
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Statuses reachable from this one.
    pub fn valid_transitions(&self) -> &'static [BidStatus] {
        match self {
            Self::Pending | Self::CounterOffer => {
                &[Self::Accepted, Self::Declined, Self::CounterOffer]
            }
            Self::Accepted | Self::Declined => &[],
        }
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A negotiating party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// The delivery owner.
    Client,
    /// The courier who placed the bid.
    Courier,
}

impl Party {
    /// Returns the canonical party name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Courier => "courier",
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A revision of a bid's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOffer {
    /// The newly proposed amount.
    pub amount: Amount,
    /// Who proposed it.
    pub issuer: Party,
    /// Optional note to the other party.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When it was proposed.
    pub issued_at: Timestamp,
}

/// Record of a single bid status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidTransitionRecord {
    /// Status before the transition.
    pub from: BidStatus,
    /// Status after the transition.
    pub to: BidStatus,
    /// The party that caused it, when attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Party>,
    /// When it happened.
    pub at: Timestamp,
    /// Free-text reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Errors from bid transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BidError {
    /// Attempted transition is not allowed by the state machine.
    #[error("invalid bid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: BidStatus,
        /// Attempted target status.
        to: BidStatus,
    },

    /// The same party tried to counter its own counter.
    #[error("{issuer} issued the previous counter-offer; the other party must respond first")]
    InvalidCounterSequence {
        /// The party that tried to counter twice.
        issuer: Party,
    },
}

/// A courier's offer against a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Unique bid identifier.
    pub id: BidId,
    /// The owning delivery.
    pub delivery_id: DeliveryId,
    /// The courier who placed the bid.
    pub courier_id: CourierId,
    /// Current price on the table (latest counter, or the opening offer).
    pub amount: Amount,
    /// The courier's opening price.
    pub initial_amount: Amount,
    /// Courier's estimated time.
    pub eta: EtaMinutes,
    /// Current status.
    pub status: BidStatus,
    /// Submission order within the delivery, starting at 1.
    pub sequence: u64,
    /// Issuer of the most recent counter-offer.
    pub last_counter_by: Option<Party>,
    /// Every counter-offer, oldest first.
    pub counters: Vec<CounterOffer>,
    /// Reason given when the bid was declined.
    pub decline_reason: Option<String>,
    /// Every status change, oldest first.
    pub transition_log: Vec<BidTransitionRecord>,
    /// Submission time.
    pub created_at: Timestamp,
    /// Last change.
    pub updated_at: Timestamp,
}

impl Bid {
    /// Create a new bid in `pending`.
    pub fn submit(
        delivery_id: DeliveryId,
        courier_id: CourierId,
        amount: Amount,
        eta: EtaMinutes,
        sequence: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            id: BidId::new(),
            delivery_id,
            courier_id,
            amount,
            initial_amount: amount,
            eta,
            status: BidStatus::Pending,
            sequence,
            last_counter_by: None,
            counters: Vec::new(),
            decline_reason: None,
            transition_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attempt a status transition with runtime validation.
    ///
    /// Records the transition in the log on success.
    pub fn try_transition(
        &mut self,
        to: BidStatus,
        actor: Option<Party>,
        reason: Option<String>,
        at: Timestamp,
    ) -> Result<(), BidError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(BidError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.transition_log.push(BidTransitionRecord {
            from: self.status,
            to,
            actor,
            at,
            reason,
        });
        self.status = to;
        self.updated_at = at;
        Ok(())
    }

    /// Accept this bid.
    pub fn accept(&mut self, at: Timestamp) -> Result<(), BidError> {
        self.try_transition(BidStatus::Accepted, Some(Party::Client), None, at)
    }

    /// Decline this bid.
    ///
    /// Returns `Ok(false)` without touching the bid when it is already
    /// declined, so repeated declines are harmless.
    pub fn decline(
        &mut self,
        actor: Option<Party>,
        reason: Option<String>,
        at: Timestamp,
    ) -> Result<bool, BidError> {
        if self.status == BidStatus::Declined {
            return Ok(false);
        }
        self.try_transition(BidStatus::Declined, actor, reason.clone(), at)?;
        self.decline_reason = reason;
        Ok(true)
    }

    /// Apply a counter-offer: new amount, status `counter_offer`.
    ///
    /// The status check runs first, so countering a closed bid reports
    /// `InvalidTransition` even when the issuer would also repeat.
    pub fn counter(&mut self, offer: CounterOffer) -> Result<(), BidError> {
        if !self.status.is_open() {
            return Err(BidError::InvalidTransition {
                from: self.status,
                to: BidStatus::CounterOffer,
            });
        }
        if self.last_counter_by == Some(offer.issuer) {
            return Err(BidError::InvalidCounterSequence {
                issuer: offer.issuer,
            });
        }
        self.try_transition(
            BidStatus::CounterOffer,
            Some(offer.issuer),
            offer.message.clone(),
            offer.issued_at,
        )?;
        self.amount = offer.amount;
        self.last_counter_by = Some(offer.issuer);
        self.counters.push(offer);
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn party() -> impl Strategy<Value = Party> {
        prop_oneof![Just(Party::Client), Just(Party::Courier)]
    }

    proptest! {
        /// Whatever sequence of issuers is attempted, the accepted counters
        /// never contain two consecutive entries from the same party.
        #[test]
        fn accepted_counters_alternate(issuers in prop::collection::vec(party(), 1..20)) {
            let now = Timestamp::now();
            let mut bid = Bid::submit(
                DeliveryId::new(),
                CourierId::new(),
                Amount::new(1000).unwrap(),
                EtaMinutes::new(30).unwrap(),
                1,
                now,
            );
            let mut previous: Option<Party> = None;
            for (i, issuer) in issuers.into_iter().enumerate() {
                let result = bid.counter(CounterOffer {
                    amount: Amount::new(1000 + i as u64).unwrap(),
                    issuer,
                    message: None,
                    issued_at: now,
                });
                if previous == Some(issuer) {
                    prop_assert_eq!(result, Err(BidError::InvalidCounterSequence { issuer }));
                } else {
                    prop_assert!(result.is_ok());
                    previous = Some(issuer);
                }
            }
            for pair in bid.counters.windows(2) {
                prop_assert_ne!(pair[0].issuer, pair[1].issuer);
            }
        }
    }
}
