//! # Consultation Tracker
//!
//! Per-delivery record of which couriers have looked at a delivery and how
//! interested they are. One entry per courier; a newer signal overwrites the
//! older one. Nothing here is consulted when validating bid transitions.

use dashmap::DashMap;

use haggle_core::{CourierId, DeliveryId, Timestamp};
use haggle_state::{Consultation, ConsultationStatus};

/// Courier engagement signals, keyed by delivery.
#[derive(Debug, Default)]
pub struct ConsultationTracker {
    entries: DashMap<DeliveryId, Vec<Consultation>>,
}

impl ConsultationTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a courier's signal on a delivery and return the stored entry.
    pub fn record(
        &self,
        delivery_id: DeliveryId,
        courier_id: CourierId,
        status: ConsultationStatus,
        now: Timestamp,
    ) -> Consultation {
        let mut list = self.entries.entry(delivery_id).or_default();
        if let Some(existing) = list.iter_mut().find(|c| c.courier_id == courier_id) {
            existing.update(status, now);
            return existing.clone();
        }
        let created = Consultation::new(delivery_id, courier_id, status, now);
        list.push(created.clone());
        created
    }

    /// All signals on a delivery, in the order couriers first appeared.
    pub fn list_by_delivery(&self, delivery_id: &DeliveryId) -> Vec<Consultation> {
        self.entries
            .get(delivery_id)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    /// Drop every signal for a delivery. Returns how many were removed.
    pub fn purge_delivery(&self, delivery_id: &DeliveryId) -> usize {
        self.entries
            .remove(delivery_id)
            .map(|(_, list)| list.len())
            .unwrap_or(0)
    }
}
