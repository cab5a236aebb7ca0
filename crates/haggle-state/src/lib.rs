//! # haggle-state: Negotiation Lifecycle State Machines
//!
//! Runtime-checked state machines for the records the negotiation engine
//! mutates. Each record owns its transition rule: callers ask the record to
//! move (`try_transition`, `accept`, `decline`, `counter`) and the record
//! either moves and logs the transition, or returns an error and stays put.
//!
//! ## State Machines
//!
//! - **Delivery** (`delivery.rs`): `Open → Assigned | Expired | Cancelled`.
//!   Every non-open state is terminal.
//!
//! - **Bid** (`bid.rs`):
//!
//!   ```text
//!   Pending ──counter()──▶ CounterOffer ──counter()──▶ CounterOffer
//!      │                      │    (issuer must alternate)
//!      ├──accept()──▶ Accepted ◀──┤
//!      └──decline()─▶ Declined ◀──┘
//!   ```
//!
//!   `Accepted` and `Declined` are terminal.
//!
//! - **Consultation** (`consultation.rs`): free-form status overwrite, no
//!   transition rules. Advisory only.
//!
//! ## Crate Policy
//!
//! No locking and no I/O here. Serialization of concurrent callers is the
//! negotiation engine's job; this crate only answers "is this move legal".

pub mod bid;
pub mod consultation;
pub mod delivery;

pub use bid::{Bid, BidError, BidStatus, BidTransitionRecord, CounterOffer, Party};
pub use consultation::{Consultation, ConsultationStatus};
pub use delivery::{Delivery, DeliveryError, DeliveryRequest, DeliveryStatus, Location};
