#![deny(missing_docs)]

//! # haggle-core: Foundational Types for the Negotiation Engine
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies, only `serde`, `thiserror`,
//! `chrono`, and `uuid` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`BidId`] cannot be passed where
//!    a [`DeliveryId`] is expected.
//!
//! 2. **Validated value types.** [`Amount`] is a non-zero integer in minor
//!    currency units (no floats for money), [`EtaMinutes`] is bounded, and
//!    [`GeoPoint`] rejects out-of-range coordinates. Invalid values are
//!    unrepresentable past the API boundary.
//!
//! 3. **UTC-only [`Timestamp`].** Negotiation windows are measured on a
//!    single clock; local time is a presentation concern.
//!
//! 4. **[`HaggleError`] hierarchy.** Structured errors with `thiserror`, no
//!    `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod error;
pub mod geo;
pub mod identity;
pub mod money;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{HaggleError, ValidationError};
pub use geo::GeoPoint;
pub use identity::{BidId, ConsultationId, CourierId, DeliveryId};
pub use money::{Amount, EtaMinutes};
pub use temporal::Timestamp;
