//! # haggle-negotiation: Delivery Bid-Negotiation Engine
//!
//! The hard core of the delivery marketplace: couriers bid on a delivery,
//! both sides counter, one bid wins or the window lapses, and any number of
//! client sessions poll a consistent view of it all.
//!
//! ## Components
//!
//! | Module            | Role                                                     |
//! |-------------------|----------------------------------------------------------|
//! | [`store`]         | Keyed storage of deliveries and bids, CAS status updates |
//! | [`consultation`]  | Courier viewing/interest signals per delivery            |
//! | [`engine`]        | The negotiation state machine, serialized per delivery   |
//! | [`gateway`]       | Consistent snapshots for polling clients                 |
//! | [`ordering`]      | Read-side bid ranking (submission order or distance)     |
//! | [`locator`]       | Courier positions for distance ranking                   |
//! | [`observer`]      | Fire-and-forget notification hook                        |
//! | [`clock`]         | Time source, swappable for deterministic tests           |
//! | [`config`]        | Negotiation window and poll interval                     |
//!
//! ## Concurrency
//!
//! Each delivery has one gate (a `parking_lot::Mutex`) held in a sharded
//! `DashMap`. Every write *and* every snapshot for that delivery runs under
//! its gate, so a reader sees either the state before an accept or the
//! state after it, never a half-applied one. Unrelated deliveries never share
//! a gate. Nothing here spawns threads or timers: expiry is evaluated lazily
//! on each access.

pub mod clock;
pub mod config;
pub mod consultation;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod locator;
pub mod observer;
pub mod ordering;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::NegotiationConfig;
pub use consultation::ConsultationTracker;
pub use engine::{Assignment, Cancellation, NegotiationEngine};
pub use error::{Missing, NegotiationError, StoreError};
pub use gateway::{NegotiationSnapshot, SyncGateway};
pub use locator::{CourierLocator, InMemoryCourierLocator};
pub use observer::{NegotiationEvent, NegotiationObserver, TracingObserver};
pub use ordering::{rank_bids, BidOrdering, RankedBid};
pub use store::{BidStore, InMemoryBidStore};
