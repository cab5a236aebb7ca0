//! # Courier Consultations
//!
//! A consultation records that a courier looked at a delivery and how
//! interested they are. It is an engagement signal for the client UI and is
//! never consulted when deciding whether a bid transition is legal.

use serde::{Deserialize, Serialize};

use haggle_core::{ConsultationId, CourierId, DeliveryId, Timestamp};

/// A courier's current engagement with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    /// Has the delivery open.
    Viewing,
    /// Signalled interest; a bid may follow.
    Interested,
    /// Looked and passed.
    NotInterested,
}

impl ConsultationStatus {
    /// Returns the canonical status name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Viewing => "viewing",
            Self::Interested => "interested",
            Self::NotInterested => "not_interested",
        }
    }
}

impl std::fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One courier's signal on one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    /// Unique consultation identifier.
    pub id: ConsultationId,
    /// The delivery being looked at.
    pub delivery_id: DeliveryId,
    /// The courier looking.
    pub courier_id: CourierId,
    /// Latest signal.
    pub status: ConsultationStatus,
    /// When the courier first looked.
    pub first_seen_at: Timestamp,
    /// When the latest signal arrived.
    pub timestamp: Timestamp,
}

impl Consultation {
    /// Start tracking a courier on a delivery.
    pub fn new(
        delivery_id: DeliveryId,
        courier_id: CourierId,
        status: ConsultationStatus,
        now: Timestamp,
    ) -> Self {
        Self {
            id: ConsultationId::new(),
            delivery_id,
            courier_id,
            status,
            first_seen_at: now,
            timestamp: now,
        }
    }

    /// Overwrite the signal. Any status may follow any other.
    pub fn update(&mut self, status: ConsultationStatus, now: Timestamp) {
        self.status = status;
        self.timestamp = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_overwrites_status_and_keeps_identity() {
        let t0 = Timestamp::parse("2026-03-01T09:00:00Z").unwrap();
        let t1 = Timestamp::parse("2026-03-01T09:00:30Z").unwrap();
        let mut c = Consultation::new(
            DeliveryId::new(),
            CourierId::new(),
            ConsultationStatus::Viewing,
            t0,
        );
        let id = c.id;
        c.update(ConsultationStatus::NotInterested, t1);
        c.update(ConsultationStatus::Interested, t1);
        assert_eq!(c.id, id);
        assert_eq!(c.status, ConsultationStatus::Interested);
        assert_eq!(c.first_seen_at, t0);
        assert_eq!(c.timestamp, t1);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ConsultationStatus::NotInterested).unwrap(),
            "\"not_interested\""
        );
    }
}
