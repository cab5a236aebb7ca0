//! # Synchronization Gateway
//!
//! The poll-side read model. A snapshot is composed from the store and the
//! consultation tracker under the delivery's gate, after lazy expiry has been
//! applied, so its fields always describe one completed state.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;

use haggle_core::{DeliveryId, Timestamp};
use haggle_state::{Consultation, Delivery};

use crate::engine::NegotiationEngine;
use crate::error::NegotiationError;
use crate::locator::CourierLocator;
use crate::ordering::{rank_bids, BidOrdering, RankedBid};

/// A consistent point-in-time view of one delivery's negotiation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegotiationSnapshot {
    /// The delivery, with expiry applied.
    pub delivery: Delivery,
    /// Its bids, in the requested order.
    pub bids: Vec<RankedBid>,
    /// Courier engagement signals.
    pub consultations: Vec<Consultation>,
    /// Per-delivery change counter. Restarts if the delivery's gate was
    /// released after it closed.
    pub revision: u64,
    /// The instant the snapshot describes.
    pub taken_at: Timestamp,
    /// How often clients are expected to poll.
    pub poll_interval_secs: u64,
    /// The order `bids` is in.
    pub ordering: BidOrdering,
}

impl NegotiationSnapshot {
    /// Entity tag for conditional polls.
    ///
    /// Hashes everything a client sees except `taken_at`. Courier positions
    /// move without a revision bump, and a gate recreated after eviction
    /// restarts its revision, so the revision alone does not identify state.
    pub fn etag(&self) -> String {
        let content = serde_json::to_vec(&(&self.delivery, &self.bids, &self.consultations))
            .unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        format!(
            "\"{}-{}-{:016x}\"",
            self.revision,
            self.ordering.name(),
            hasher.finish()
        )
    }
}

/// Serves snapshots to polling clients.
#[derive(Clone)]
pub struct SyncGateway {
    engine: Arc<NegotiationEngine>,
    locator: Arc<dyn CourierLocator>,
}

impl std::fmt::Debug for SyncGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncGateway")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl SyncGateway {
    /// Create a gateway over `engine`, ranking by distance with `locator`.
    pub fn new(engine: Arc<NegotiationEngine>, locator: Arc<dyn CourierLocator>) -> Self {
        Self { engine, locator }
    }

    /// The engine this gateway reads from.
    pub fn engine(&self) -> &Arc<NegotiationEngine> {
        &self.engine
    }

    /// Snapshot a delivery.
    ///
    /// Distance ranking runs after the gate is released; it only reorders the
    /// bids already read.
    pub fn snapshot(
        &self,
        delivery_id: DeliveryId,
        ordering: BidOrdering,
    ) -> Result<NegotiationSnapshot, NegotiationError> {
        let view = self.engine.settled_view(delivery_id)?;
        let pickup = view.delivery.pickup.point;
        let bids = rank_bids(view.bids, ordering, pickup.as_ref(), self.locator.as_ref());
        tracing::trace!(
            delivery_id = %delivery_id,
            revision = view.revision,
            bids = bids.len(),
            "snapshot served"
        );
        Ok(NegotiationSnapshot {
            delivery: view.delivery,
            bids,
            consultations: view.consultations,
            revision: view.revision,
            taken_at: view.taken_at,
            poll_interval_secs: self.engine.config().poll_interval_secs,
            ordering,
        })
    }
}
