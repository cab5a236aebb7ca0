//! # Negotiation Engine
//!
//! The state machine governing each delivery's negotiation. Every operation
//! takes the delivery's gate, settles lazy expiry, checks its preconditions,
//! and commits through the [`BidStore`]. Events are published once the gate
//! is released.
//!
//! ## Check order
//!
//! Each operation reports the first failing check:
//!
//! 1. the delivery exists (`NotFound`)
//! 2. lazy expiry is applied
//! 3. the bid exists and belongs to the delivery (`NotFound`)
//! 4. delivery and bid status permit the action
//!
//! For `accept_bid`, an assigned delivery reports `AlreadyAssigned` ahead of
//! any bid status error, so every accept that loses a race sees the same
//! error. `decline_bid` on an already-declined bid succeeds without change.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use haggle_core::{Amount, BidId, CourierId, DeliveryId, EtaMinutes, Timestamp};
use haggle_state::{
    Bid, BidStatus, Consultation, ConsultationStatus, CounterOffer, Delivery, DeliveryRequest,
    DeliveryStatus, Party,
};

use crate::clock::{Clock, SystemClock};
use crate::config::NegotiationConfig;
use crate::consultation::ConsultationTracker;
use crate::error::{Missing, NegotiationError};
use crate::observer::{NegotiationEvent, NegotiationObserver, TracingObserver};
use crate::store::{BidStore, InMemoryBidStore};

/// Reason recorded on bids closed because another bid won.
const SUPERSEDED_REASON: &str = "another bid was accepted";

/// Per-delivery serialization point.
#[derive(Debug, Default)]
struct DeliveryGate {
    /// Bumped on every committed mutation.
    revision: u64,
    /// Bids ever placed on the delivery; also the last sequence number used.
    bids_submitted: u64,
}

/// The outcome of a successful accept.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// The delivery, now `assigned`.
    pub delivery: Delivery,
    /// The winning bid, now `accepted`.
    pub accepted: Bid,
    /// Every other bid that was still open, now `declined`.
    pub declined: Vec<Bid>,
}

/// The outcome of a successful cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    /// The delivery, now `cancelled`.
    pub delivery: Delivery,
    /// Bids that were still open, now `declined`.
    pub declined: Vec<Bid>,
}

/// Everything a snapshot needs, read under one gate acquisition.
#[derive(Debug, Clone)]
pub(crate) struct SettledView {
    pub delivery: Delivery,
    pub bids: Vec<Bid>,
    pub consultations: Vec<Consultation>,
    pub revision: u64,
    pub taken_at: Timestamp,
}

/// State held while an operation runs under a delivery's gate.
struct Session<'a> {
    gate: &'a mut DeliveryGate,
    store: &'a dyn BidStore,
    now: Timestamp,
    delivery: Delivery,
    events: &'a mut Vec<NegotiationEvent>,
}

impl Session<'_> {
    /// Load a bid and check it belongs to this delivery.
    fn bid(&self, bid_id: BidId) -> Result<Bid, NegotiationError> {
        self.store
            .get_by_id(&bid_id)
            .filter(|bid| bid.delivery_id == self.delivery.id)
            .ok_or(NegotiationError::NotFound(Missing::Bid(bid_id)))
    }

    fn ensure_open(&self) -> Result<(), NegotiationError> {
        if self.delivery.is_open() {
            Ok(())
        } else {
            Err(NegotiationError::DeliveryClosed {
                delivery_id: self.delivery.id,
                status: self.delivery.status,
            })
        }
    }

    fn commit(&mut self) {
        self.gate.revision += 1;
    }

    /// Stage a decline for every open bid except `keep`. Nothing is written.
    fn stage_declines(
        &self,
        keep: Option<BidId>,
        actor: Option<Party>,
        reason: &str,
    ) -> Result<Vec<Staged<Bid>>, NegotiationError> {
        self.store
            .list_by_delivery(&self.delivery.id)
            .into_iter()
            .filter(|bid| Some(bid.id) != keep && bid.status.is_open())
            .map(|before| -> Result<Staged<Bid>, NegotiationError> {
                let mut after = before.clone();
                after
                    .decline(actor, Some(reason.to_string()), self.now)
                    .map_err(|e| NegotiationError::from_bid(before.id, "decline", e))?;
                Ok(Staged { before, after })
            })
            .collect()
    }

    /// Write staged bids, then the staged delivery, as one step.
    ///
    /// If any write fails, every record already written is put back and the
    /// error is returned. Nothing is committed in that case.
    fn write_all(
        &mut self,
        bids: &[Staged<Bid>],
        delivery: Staged<Delivery>,
    ) -> Result<(Vec<Bid>, Delivery), NegotiationError> {
        let mut written = Vec::with_capacity(bids.len());
        for change in bids {
            match self
                .store
                .update_status(change.after.clone(), change.before.status)
            {
                Ok(bid) => written.push(bid),
                Err(err) => {
                    self.restore_bids(&bids[..written.len()]);
                    return Err(err.into());
                }
            }
        }
        match self
            .store
            .update_delivery(delivery.after, delivery.before.status)
        {
            Ok(delivery) => {
                self.delivery = delivery.clone();
                Ok((written, delivery))
            }
            Err(err) => {
                self.restore_bids(bids);
                Err(err.into())
            }
        }
    }

    fn restore_bids(&self, written: &[Staged<Bid>]) {
        for change in written.iter().rev() {
            if let Err(err) = self
                .store
                .update_status(change.before.clone(), change.after.status)
            {
                tracing::error!(
                    delivery_id = %self.delivery.id,
                    bid_id = %change.before.id,
                    error = %err,
                    "failed to restore bid after an aborted write"
                );
            }
        }
    }

    /// Count and announce bids declined as a side effect of another step.
    fn record_declines(&mut self, declined: &[Bid], reason: &str) {
        for bid in declined {
            metrics::counter!("haggle_bids_declined_total").increment(1);
            self.events.push(NegotiationEvent::BidDeclined {
                delivery_id: self.delivery.id,
                bid_id: bid.id,
                courier_id: bid.courier_id,
                reason: Some(reason.to_string()),
                at: self.now,
            });
        }
    }
}

/// A record as read and as it will be written.
struct Staged<T> {
    before: T,
    after: T,
}

/// Serializes negotiation per delivery and enforces the bid state machine.
pub struct NegotiationEngine {
    store: Arc<dyn BidStore>,
    consultations: ConsultationTracker,
    observer: Arc<dyn NegotiationObserver>,
    clock: Arc<dyn Clock>,
    config: NegotiationConfig,
    /// One gate per delivery seen since start-up or since its gate was last
    /// released by `purge_consultations`.
    gates: DashMap<DeliveryId, Arc<Mutex<DeliveryGate>>>,
}

impl std::fmt::Debug for NegotiationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiationEngine")
            .field("config", &self.config)
            .field("deliveries", &self.gates.len())
            .finish_non_exhaustive()
    }
}

impl NegotiationEngine {
    /// Engine over an in-memory store, logging observer and wall clock.
    pub fn new(config: NegotiationConfig) -> Self {
        Self {
            store: Arc::new(InMemoryBidStore::new()),
            consultations: ConsultationTracker::new(),
            observer: Arc::new(TracingObserver),
            clock: Arc::new(SystemClock),
            config,
            gates: DashMap::new(),
        }
    }

    /// Use a different bid store.
    pub fn with_store(mut self, store: Arc<dyn BidStore>) -> Self {
        self.store = store;
        self
    }

    /// Use a different event observer.
    pub fn with_observer(mut self, observer: Arc<dyn NegotiationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// The engine's current time.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // -- Operations ----------------------------------------------------------

    /// Open a new delivery for bidding.
    pub fn create_delivery(&self, request: DeliveryRequest) -> Result<Delivery, NegotiationError> {
        let now = self.clock.now();
        let delivery = Delivery::open(request, now);
        self.store.insert_delivery(delivery.clone())?;
        self.gates.entry(delivery.id).or_default();
        tracing::info!(
            delivery_id = %delivery.id,
            requested_price = delivery.requested_price.value(),
            "delivery opened"
        );
        self.observer.notify(&NegotiationEvent::DeliveryOpened {
            delivery_id: delivery.id,
            at: now,
        });
        Ok(delivery)
    }

    /// Place a new `pending` bid on an open delivery.
    pub fn submit_bid(
        &self,
        delivery_id: DeliveryId,
        courier_id: CourierId,
        amount: Amount,
        eta: EtaMinutes,
    ) -> Result<Bid, NegotiationError> {
        self.run(delivery_id, None, "submit", |s| {
            s.ensure_open()?;
            let sequence = s.gate.bids_submitted + 1;
            let bid = Bid::submit(delivery_id, courier_id, amount, eta, sequence, s.now);
            let bid = s.store.create(bid)?;
            s.gate.bids_submitted = sequence;
            s.commit();
            metrics::counter!("haggle_bids_submitted_total").increment(1);
            tracing::info!(
                delivery_id = %delivery_id,
                bid_id = %bid.id,
                courier_id = %courier_id,
                amount = amount.value(),
                eta_minutes = eta.minutes(),
                "bid submitted"
            );
            s.events.push(NegotiationEvent::BidSubmitted {
                delivery_id,
                bid_id: bid.id,
                courier_id,
                amount,
                at: s.now,
            });
            Ok(bid)
        })
    }

    /// Accept a bid: the bid wins, the delivery is assigned, and every other
    /// open bid is declined, all in one step.
    pub fn accept_bid(
        &self,
        delivery_id: DeliveryId,
        bid_id: BidId,
    ) -> Result<Assignment, NegotiationError> {
        self.run(delivery_id, None, "accept", |s| {
            let bid = s.bid(bid_id)?;
            match s.delivery.status {
                DeliveryStatus::Open => {}
                DeliveryStatus::Assigned => {
                    return Err(NegotiationError::AlreadyAssigned { delivery_id })
                }
                status => {
                    return Err(NegotiationError::DeliveryClosed {
                        delivery_id,
                        status,
                    })
                }
            }

            let mut accepted = bid.clone();
            accepted
                .accept(s.now)
                .map_err(|e| NegotiationError::from_bid(bid_id, "accept", e))?;
            let mut delivery = s.delivery.clone();
            delivery
                .assign(bid_id, s.now)
                .map_err(|_| NegotiationError::AlreadyAssigned { delivery_id })?;

            let mut staged = vec![Staged {
                before: bid,
                after: accepted,
            }];
            staged.extend(s.stage_declines(Some(bid_id), None, SUPERSEDED_REASON)?);
            let before = s.delivery.clone();
            let (mut written, delivery) = s.write_all(
                &staged,
                Staged {
                    before,
                    after: delivery,
                },
            )?;
            let accepted = written.remove(0);
            let declined = written;
            s.commit();

            metrics::counter!("haggle_bids_accepted_total").increment(1);
            s.events.push(NegotiationEvent::BidAccepted {
                delivery_id,
                bid_id,
                courier_id: accepted.courier_id,
                at: s.now,
            });
            s.events.push(NegotiationEvent::DeliveryAssigned {
                delivery_id,
                bid_id,
                at: s.now,
            });
            s.record_declines(&declined, SUPERSEDED_REASON);
            tracing::info!(
                delivery_id = %delivery_id,
                bid_id = %bid_id,
                amount = accepted.amount.value(),
                declined = declined.len(),
                "bid accepted, delivery assigned"
            );
            Ok(Assignment {
                delivery,
                accepted,
                declined,
            })
        })
    }

    /// Decline a bid. Declining an already-declined bid succeeds unchanged.
    pub fn decline_bid(
        &self,
        delivery_id: DeliveryId,
        bid_id: BidId,
        reason: Option<String>,
    ) -> Result<Bid, NegotiationError> {
        self.run(delivery_id, None, "decline", |s| {
            let mut bid = s.bid(bid_id)?;
            match bid.status {
                BidStatus::Declined => return Ok(bid),
                BidStatus::Accepted => {
                    return Err(NegotiationError::InvalidTransition {
                        bid_id,
                        from: bid.status,
                        action: "decline",
                    })
                }
                BidStatus::Pending | BidStatus::CounterOffer => {}
            }
            s.ensure_open()?;

            let prior = bid.status;
            bid.decline(None, reason.clone(), s.now)
                .map_err(|e| NegotiationError::from_bid(bid_id, "decline", e))?;
            let bid = s.store.update_status(bid, prior)?;
            s.commit();

            metrics::counter!("haggle_bids_declined_total").increment(1);
            tracing::info!(delivery_id = %delivery_id, bid_id = %bid_id, "bid declined");
            s.events.push(NegotiationEvent::BidDeclined {
                delivery_id,
                bid_id,
                courier_id: bid.courier_id,
                reason,
                at: s.now,
            });
            Ok(bid)
        })
    }

    /// Revise a bid's price. The issuer must differ from whoever issued the
    /// previous counter on the same bid.
    pub fn counter_offer(
        &self,
        delivery_id: DeliveryId,
        bid_id: BidId,
        amount: Amount,
        issuer: Party,
        message: Option<String>,
    ) -> Result<Bid, NegotiationError> {
        self.run(delivery_id, None, "counter", |s| {
            let mut bid = s.bid(bid_id)?;
            s.ensure_open()?;

            let prior = bid.status;
            bid.counter(CounterOffer {
                amount,
                issuer,
                message,
                issued_at: s.now,
            })
            .map_err(|e| NegotiationError::from_bid(bid_id, "counter", e))?;
            let bid = s.store.update_status(bid, prior)?;
            s.commit();

            metrics::counter!("haggle_counter_offers_total", "issuer" => issuer.name())
                .increment(1);
            tracing::info!(
                delivery_id = %delivery_id,
                bid_id = %bid_id,
                issuer = %issuer,
                amount = amount.value(),
                "counter-offer recorded"
            );
            s.events.push(NegotiationEvent::CounterOffered {
                delivery_id,
                bid_id,
                issuer,
                amount,
                at: s.now,
            });
            Ok(bid)
        })
    }

    /// Expire the delivery if it is open, has never received a bid, and the
    /// negotiation window has fully elapsed at `now`. Returns the delivery as
    /// it stands afterwards.
    pub fn expire_if_timed_out(
        &self,
        delivery_id: DeliveryId,
        now: Timestamp,
    ) -> Result<Delivery, NegotiationError> {
        self.run(delivery_id, Some(now), "expire", |s| Ok(s.delivery.clone()))
    }

    /// Withdraw an open delivery. Every open bid is declined in the same step.
    pub fn cancel_delivery(
        &self,
        delivery_id: DeliveryId,
        reason: Option<String>,
    ) -> Result<Cancellation, NegotiationError> {
        self.run(delivery_id, None, "cancel", |s| {
            s.ensure_open()?;
            let mut delivery = s.delivery.clone();
            delivery
                .try_transition(DeliveryStatus::Cancelled, reason.clone(), s.now)
                .map_err(|_| NegotiationError::DeliveryClosed {
                    delivery_id,
                    status: s.delivery.status,
                })?;
            let bid_reason = reason
                .clone()
                .unwrap_or_else(|| "delivery cancelled".to_string());

            let staged = s.stage_declines(None, Some(Party::Client), &bid_reason)?;
            let before = s.delivery.clone();
            let (declined, delivery) = s.write_all(
                &staged,
                Staged {
                    before,
                    after: delivery,
                },
            )?;
            s.commit();

            s.events.push(NegotiationEvent::DeliveryCancelled {
                delivery_id,
                reason,
                at: s.now,
            });
            s.record_declines(&declined, &bid_reason);
            tracing::info!(
                delivery_id = %delivery_id,
                declined = declined.len(),
                "delivery cancelled"
            );
            Ok(Cancellation { delivery, declined })
        })
    }

    /// Record a courier's engagement signal. Allowed in any delivery status.
    pub fn record_consultation(
        &self,
        delivery_id: DeliveryId,
        courier_id: CourierId,
        status: ConsultationStatus,
    ) -> Result<Consultation, NegotiationError> {
        self.run(delivery_id, None, "consult", |s| {
            let consultation = self
                .consultations
                .record(delivery_id, courier_id, status, s.now);
            s.commit();
            tracing::debug!(
                delivery_id = %delivery_id,
                courier_id = %courier_id,
                status = %status,
                "consultation recorded"
            );
            Ok(consultation)
        })
    }

    /// Drop the consultation log of a delivery that has left `open`.
    /// Open deliveries keep theirs and report zero.
    ///
    /// A closed delivery's gate is released as well, unless another caller
    /// holds it. Later calls recreate it from the store with the revision
    /// starting over.
    pub fn purge_consultations(&self, delivery_id: DeliveryId) -> Result<usize, NegotiationError> {
        let (purged, closed) = self.run(delivery_id, None, "purge", |s| {
            if s.delivery.is_open() {
                return Ok((0, false));
            }
            let purged = self.consultations.purge_delivery(&delivery_id);
            if purged > 0 {
                s.commit();
            }
            Ok((purged, true))
        })?;
        if closed && self.release_gate(&delivery_id) {
            tracing::debug!(delivery_id = %delivery_id, "gate released");
        }
        Ok(purged)
    }

    /// Fetch a delivery, applying lazy expiry first.
    pub fn get_delivery(&self, delivery_id: DeliveryId) -> Result<Delivery, NegotiationError> {
        self.run(delivery_id, None, "read", |s| Ok(s.delivery.clone()))
    }

    /// All bids on a delivery in submission order.
    pub fn list_bids(&self, delivery_id: DeliveryId) -> Result<Vec<Bid>, NegotiationError> {
        self.run(delivery_id, None, "read", |s| {
            Ok(s.store.list_by_delivery(&delivery_id))
        })
    }

    /// Delivery, bids and consultations read at a single logical instant.
    pub(crate) fn settled_view(&self, delivery_id: DeliveryId) -> Result<SettledView, NegotiationError> {
        self.run(delivery_id, None, "read", |s| {
            Ok(SettledView {
                delivery: s.delivery.clone(),
                bids: s.store.list_by_delivery(&delivery_id),
                consultations: self.consultations.list_by_delivery(&delivery_id),
                revision: s.gate.revision,
                taken_at: s.now,
            })
        })
    }

    // -- Internals -----------------------------------------------------------

    /// Find or lazily create the gate for a delivery known to the store.
    fn gate(&self, delivery_id: &DeliveryId) -> Result<Arc<Mutex<DeliveryGate>>, NegotiationError> {
        if let Some(gate) = self.gates.get(delivery_id) {
            return Ok(Arc::clone(gate.value()));
        }
        if self.store.get_delivery(delivery_id).is_none() {
            return Err(NegotiationError::NotFound(Missing::Delivery(*delivery_id)));
        }
        let gate = self.gates.entry(*delivery_id).or_insert_with(|| {
            Arc::new(Mutex::new(DeliveryGate {
                revision: 0,
                bids_submitted: self.store.count_by_delivery(delivery_id) as u64,
            }))
        });
        Ok(Arc::clone(gate.value()))
    }

    /// Remove a gate no operation is holding.
    fn release_gate(&self, delivery_id: &DeliveryId) -> bool {
        self.gates
            .remove_if(delivery_id, |_, gate| Arc::strong_count(gate) == 1)
            .is_some()
    }

    /// Run `op` under the delivery's gate after settling expiry.
    ///
    /// Events queued by the operation, including an expiry that committed
    /// before `op` failed, are published after the gate is released.
    fn run<R>(
        &self,
        delivery_id: DeliveryId,
        at: Option<Timestamp>,
        action: &'static str,
        op: impl FnOnce(&mut Session<'_>) -> Result<R, NegotiationError>,
    ) -> Result<R, NegotiationError> {
        let gate = self.gate(&delivery_id)?;
        let mut events = Vec::new();
        let result = {
            let mut guard = gate.lock();
            let now = at.unwrap_or_else(|| self.clock.now());
            match self.settle(&mut guard, delivery_id, now, &mut events) {
                Ok(delivery) => {
                    let mut session = Session {
                        gate: &mut guard,
                        store: self.store.as_ref(),
                        now,
                        delivery,
                        events: &mut events,
                    };
                    op(&mut session)
                }
                Err(err) => Err(err),
            }
        };

        if let Err(err) = &result {
            metrics::counter!("haggle_transitions_rejected_total", "reason" => err.code())
                .increment(1);
            tracing::debug!(
                delivery_id = %delivery_id,
                action,
                code = err.code(),
                error = %err,
                "operation rejected"
            );
        }
        for event in &events {
            self.observer.notify(event);
        }
        result
    }

    /// Load the delivery and apply the zero-bid timeout if it is due.
    fn settle(
        &self,
        gate: &mut DeliveryGate,
        delivery_id: DeliveryId,
        now: Timestamp,
        events: &mut Vec<NegotiationEvent>,
    ) -> Result<Delivery, NegotiationError> {
        let mut delivery = self
            .store
            .get_delivery(&delivery_id)
            .ok_or(NegotiationError::NotFound(Missing::Delivery(delivery_id)))?;

        let due = delivery.is_open()
            && gate.bids_submitted == 0
            && delivery.window_elapsed(&now, self.config.timeout_window());
        if !due {
            return Ok(delivery);
        }

        delivery
            .try_transition(
                DeliveryStatus::Expired,
                Some("no bids within the negotiation window".to_string()),
                now,
            )
            .map_err(|_| NegotiationError::DeliveryClosed {
                delivery_id,
                status: delivery.status,
            })?;
        let delivery = self.store.update_delivery(delivery, DeliveryStatus::Open)?;
        gate.revision += 1;

        metrics::counter!("haggle_deliveries_expired_total").increment(1);
        tracing::info!(
            delivery_id = %delivery_id,
            window_secs = self.config.timeout_secs,
            "delivery expired with no bids"
        );
        events.push(NegotiationEvent::DeliveryExpired {
            delivery_id,
            at: now,
        });
        Ok(delivery)
    }
}
