//! Strategy contract and per-strategy bookkeeping.
//!
//! A strategy is a [`Strategy`] impl embedding a [`StrategyCore`], which
//! carries the order and position ledgers every strategy needs. Strategies
//! react to events with [`Action`]s; order placement and venue access stay
//! behind the [`BrokerGateway`] trait so strategies never talk to a venue
//! directly.

pub mod broker;
pub mod contract;
pub mod naive;
pub mod orders;
pub mod positions;
pub mod registry;

pub use broker::{
    BrokerError, BrokerGateway, LimitOrderParams, MarketOrderParams, VenueOrder, VenueOrderStatus,
    VenueTicker,
};
pub use contract::{Action, Strategy, StrategyCore, poll_standing_orders};
pub use naive::NaiveTestStrategy;
pub use orders::OrderLedger;
pub use positions::PositionLedger;
pub use registry::StrategyRegistry;
