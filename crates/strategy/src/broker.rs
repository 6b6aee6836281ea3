//! Venue access seam.
//!
//! Strategies and the router talk to the venue only through
//! [`BrokerGateway`]. The live implementation wraps the venue's REST API;
//! tests and paper trading substitute their own.

use chrono::{DateTime, Utc};
use kestrel_core::{Side, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("venue rejected: {0}")]
    Rejected(String),
    #[error("unknown order: {0}")]
    UnknownOrder(String),
}

/// Order lifecycle as the venue reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VenueOrderStatus {
    /// Accepted but not yet resting.
    #[serde(rename = "AWAITING")]
    Awaiting,
    /// Resting on the book.
    #[serde(rename = "PENDING")]
    Pending,
    /// Fully filled or cancelled; terminal.
    #[serde(rename = "COMPLETE")]
    Complete,
}

/// Best bid/ask as returned by the venue's ticker endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueTicker {
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
}

/// Venue-side view of one order, keyed by the client order id we sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueOrder {
    pub venue_order_id: String,
    pub status: VenueOrderStatus,
    /// Executed volume in base currency units.
    pub base: Decimal,
    /// Executed volume in counter currency units.
    pub counter: Decimal,
    /// Fee charged, in base currency units.
    pub fee_base: Decimal,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Market order submission. Buys are quoted in counter volume, sells in
/// base volume; exactly one of the two is set.
#[derive(Debug, Clone)]
pub struct MarketOrderParams {
    pub pair: String,
    pub side: Side,
    pub client_order_id: String,
    pub base_volume: Option<Decimal>,
    pub counter_volume: Option<Decimal>,
}

/// Limit order submission.
#[derive(Debug, Clone)]
pub struct LimitOrderParams {
    pub pair: String,
    pub side: Side,
    pub client_order_id: String,
    pub price: Decimal,
    pub base_volume: Decimal,
    pub post_only: bool,
    pub time_in_force: TimeInForce,
}

/// Synchronous venue API. Calls run on bus handler threads, so
/// implementations block rather than spawn.
pub trait BrokerGateway: Send + Sync {
    fn get_ticker(&self, pair: &str) -> Result<VenueTicker, BrokerError>;

    /// Returns the venue order id.
    fn place_market_order(&self, params: MarketOrderParams) -> Result<String, BrokerError>;

    /// Returns the venue order id.
    fn place_limit_order(&self, params: LimitOrderParams) -> Result<String, BrokerError>;

    /// Look up an order by the client order id it was submitted with.
    fn get_order(&self, client_order_id: &str) -> Result<VenueOrder, BrokerError>;

    fn cancel_order(&self, venue_order_id: &str) -> Result<(), BrokerError>;
}
