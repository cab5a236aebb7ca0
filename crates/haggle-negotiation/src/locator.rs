//! # Courier Locator
//!
//! Where couriers are, as far as the marketplace knows. Used only to sort
//! bids by distance for display; negotiation outcomes never depend on it.

use dashmap::DashMap;

use haggle_core::{CourierId, GeoPoint};

/// Source of courier positions.
pub trait CourierLocator: Send + Sync {
    /// Last known position of a courier, if any.
    fn position(&self, courier_id: &CourierId) -> Option<GeoPoint>;
}

/// Positions reported by the couriers themselves, kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryCourierLocator {
    positions: DashMap<CourierId, GeoPoint>,
}

impl InMemoryCourierLocator {
    /// Create an empty locator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a courier's latest position, replacing any earlier one.
    pub fn report(&self, courier_id: CourierId, point: GeoPoint) {
        self.positions.insert(courier_id, point);
    }

    /// Forget a courier's position. Returns whether one was held.
    pub fn forget(&self, courier_id: &CourierId) -> bool {
        self.positions.remove(courier_id).is_some()
    }
}

impl CourierLocator for InMemoryCourierLocator {
    fn position(&self, courier_id: &CourierId) -> Option<GeoPoint> {
        self.positions.get(courier_id).map(|p| *p.value())
    }
}
