//! # Bid Ordering
//!
//! Presentation order for bids. Ranking is a pure function of the bid set it
//! is handed and never feeds back into the negotiation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use haggle_core::GeoPoint;
use haggle_state::Bid;

use crate::locator::CourierLocator;

/// How to order bids in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidOrdering {
    /// Oldest submission first.
    #[default]
    Submission,
    /// Nearest courier to the pickup point first; unknown distances last.
    Distance,
}

impl BidOrdering {
    /// Returns the canonical ordering name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Distance => "distance",
        }
    }
}

/// A bid with the courier's distance to pickup, when it could be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBid {
    /// The bid, unmodified.
    #[serde(flatten)]
    pub bid: Bid,
    /// Kilometres from the courier's last known position to the pickup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

fn by_submission(a: &Bid, b: &Bid) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then(a.sequence.cmp(&b.sequence))
}

/// Rank `bids` for display.
///
/// Distances are attached whenever both the pickup point and the courier's
/// position are known, regardless of the requested ordering.
pub fn rank_bids(
    bids: Vec<Bid>,
    ordering: BidOrdering,
    pickup: Option<&GeoPoint>,
    locator: &dyn CourierLocator,
) -> Vec<RankedBid> {
    let mut ranked: Vec<RankedBid> = bids
        .into_iter()
        .map(|bid| {
            let distance_km = pickup.and_then(|p| {
                locator
                    .position(&bid.courier_id)
                    .map(|courier| courier.distance_km(p))
            });
            RankedBid { bid, distance_km }
        })
        .collect();

    match ordering {
        BidOrdering::Submission => ranked.sort_by(|a, b| by_submission(&a.bid, &b.bid)),
        BidOrdering::Distance => ranked.sort_by(|a, b| {
            let by_distance = match (a.distance_km, b.distance_km) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_distance.then_with(|| by_submission(&a.bid, &b.bid))
        }),
    }
    ranked
}
