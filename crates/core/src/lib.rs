//! Kestrel core - the event model shared by every component.
//!
//! The engine is event-driven: market data, order submissions, fills and the
//! periodic order-status check all flow through the closed [`Event`] enum.
//! Everything here is plain data; behavior lives in the bus, book, strategy
//! and router crates.

pub mod events;
pub mod ids;
pub mod venue;

pub use events::{
    Event, EventKind, FillEvent, OrderEvent, OrderKind, Side, TickEvent, TimeInForce,
};
pub use ids::StrategyId;
pub use venue::{CompositeCode, ParseCodeError, VenueId};
