//! # Bid Store
//!
//! Keyed storage for deliveries and their bids. [`BidStore`] is the seam a
//! durable backend plugs into; [`InMemoryBidStore`] is the `DashMap`-backed
//! implementation used by the server and the tests.
//!
//! Status updates are compare-and-set on the status the caller last read, so
//! a writer that lost a race learns about it instead of overwriting.

use dashmap::DashMap;

use haggle_core::{BidId, DeliveryId};
use haggle_state::{Bid, BidStatus, Delivery, DeliveryStatus};

use crate::error::{Missing, StoreError};

/// Storage for deliveries and bids.
///
/// Implementations must keep reads of one delivery from blocking writers of
/// another. Multi-record atomicity is not required here: the engine
/// serializes all writes to a delivery before calling into the store, and
/// puts records back when a multi-record step fails partway.
pub trait BidStore: Send + Sync {
    /// Store a new delivery.
    fn insert_delivery(&self, delivery: Delivery) -> Result<(), StoreError>;

    /// Fetch a delivery by id.
    fn get_delivery(&self, id: &DeliveryId) -> Option<Delivery>;

    /// Replace a delivery if its stored status is still `expected`.
    fn update_delivery(
        &self,
        delivery: Delivery,
        expected: DeliveryStatus,
    ) -> Result<Delivery, StoreError>;

    /// Store a new bid. The owning delivery must exist.
    fn create(&self, bid: Bid) -> Result<Bid, StoreError>;

    /// Fetch a bid by id.
    fn get_by_id(&self, id: &BidId) -> Option<Bid>;

    /// All bids on a delivery, oldest submission first.
    fn list_by_delivery(&self, delivery_id: &DeliveryId) -> Vec<Bid>;

    /// Number of bids ever placed on a delivery, in any status.
    fn count_by_delivery(&self, delivery_id: &DeliveryId) -> usize {
        self.list_by_delivery(delivery_id).len()
    }

    /// Replace a bid if its stored status is still `expected`.
    fn update_status(&self, bid: Bid, expected: BidStatus) -> Result<Bid, StoreError>;
}

/// In-memory bid store.
///
/// Thread-safe via `DashMap`: each map is sharded, so touching one delivery
/// only locks the shards holding its records.
#[derive(Debug, Default)]
pub struct InMemoryBidStore {
    deliveries: DashMap<DeliveryId, Delivery>,
    bids: DashMap<BidId, Bid>,
    by_delivery: DashMap<DeliveryId, Vec<BidId>>,
}

impl InMemoryBidStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deliveries held.
    pub fn delivery_count(&self) -> usize {
        self.deliveries.len()
    }
}

impl BidStore for InMemoryBidStore {
    fn insert_delivery(&self, delivery: Delivery) -> Result<(), StoreError> {
        match self.deliveries.entry(delivery.id) {
            dashmap::Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "delivery {}",
                delivery.id
            ))),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(delivery);
                Ok(())
            }
        }
    }

    fn get_delivery(&self, id: &DeliveryId) -> Option<Delivery> {
        self.deliveries.get(id).map(|d| d.value().clone())
    }

    fn update_delivery(
        &self,
        delivery: Delivery,
        expected: DeliveryStatus,
    ) -> Result<Delivery, StoreError> {
        let mut entry = self
            .deliveries
            .get_mut(&delivery.id)
            .ok_or(StoreError::NotFound(Missing::Delivery(delivery.id)))?;
        if entry.status != expected {
            return Err(StoreError::StatusMismatch {
                expected: expected.to_string(),
                actual: entry.status.to_string(),
            });
        }
        *entry = delivery.clone();
        Ok(delivery)
    }

    fn create(&self, bid: Bid) -> Result<Bid, StoreError> {
        if !self.deliveries.contains_key(&bid.delivery_id) {
            return Err(StoreError::NotFound(Missing::Delivery(bid.delivery_id)));
        }
        match self.bids.entry(bid.id) {
            dashmap::Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(format!("bid {}", bid.id)));
            }
            dashmap::Entry::Vacant(slot) => {
                slot.insert(bid.clone());
            }
        }
        self.by_delivery
            .entry(bid.delivery_id)
            .or_default()
            .push(bid.id);
        Ok(bid)
    }

    fn get_by_id(&self, id: &BidId) -> Option<Bid> {
        self.bids.get(id).map(|b| b.value().clone())
    }

    fn list_by_delivery(&self, delivery_id: &DeliveryId) -> Vec<Bid> {
        let ids = match self.by_delivery.get(delivery_id) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        let mut bids: Vec<Bid> = ids.iter().filter_map(|id| self.get_by_id(id)).collect();
        bids.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        bids
    }

    fn count_by_delivery(&self, delivery_id: &DeliveryId) -> usize {
        self.by_delivery
            .get(delivery_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    fn update_status(&self, bid: Bid, expected: BidStatus) -> Result<Bid, StoreError> {
        let mut entry = self
            .bids
            .get_mut(&bid.id)
            .ok_or(StoreError::NotFound(Missing::Bid(bid.id)))?;
        if entry.status != expected {
            return Err(StoreError::StatusMismatch {
                expected: expected.to_string(),
                actual: entry.status.to_string(),
            });
        }
        *entry = bid.clone();
        Ok(bid)
    }
}
