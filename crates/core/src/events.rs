//! Event types flowing through the buses.
//!
//! `Tick`, `Order`, `Fill` and `CheckOrderStatus` form a closed set. Events
//! are immutable once published; the only fields written after construction
//! are the client order id, submission time and venue order id, which the
//! router populates exactly once before an `Order` event is published.

use crate::ids::StrategyId;
use crate::venue::{CompositeCode, VenueId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant used for handler dispatch on the event buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Tick,
    Order,
    Fill,
    CheckOrderStatus,
}

/// The closed event set routed by the buses.
#[derive(Debug, Clone)]
pub enum Event {
    Tick(TickEvent),
    Order(OrderEvent),
    Fill(FillEvent),
    /// Heartbeat marker: poll the venue for fills of standing orders.
    CheckOrderStatus,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Tick(_) => EventKind::Tick,
            Event::Order(_) => EventKind::Order,
            Event::Fill(_) => EventKind::Fill,
            Event::CheckOrderStatus => EventKind::CheckOrderStatus,
        }
    }
}

/// Order side. Buy lifts the ask, sell hits the bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit => "limit",
        }
    }
}

/// Time in force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        }
    }
}

/// Normalized best bid/ask snapshot for one instrument at one venue.
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub symbol: String,
    pub venue: VenueId,
    /// Composite routing key, `SYMBOL.venue`.
    pub code: CompositeCode,
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_size: Option<Decimal>,
    pub ask_size: Option<Decimal>,
}

impl TickEvent {
    pub fn new(code: CompositeCode, timestamp: DateTime<Utc>, bid: Decimal, ask: Decimal) -> Self {
        TickEvent {
            symbol: code.symbol.clone(),
            venue: code.venue.clone(),
            code,
            timestamp,
            bid,
            ask,
            bid_size: None,
            ask_size: None,
        }
    }

    pub fn with_sizes(mut self, bid_size: Decimal, ask_size: Decimal) -> Self {
        self.bid_size = Some(bid_size);
        self.ask_size = Some(ask_size);
        self
    }

    /// Mid price, (bid + ask) / 2.
    pub fn mid_price(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

impl fmt::Display for TickEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TICK {} - ts: {}, bid: {}, ask: {}",
            self.code, self.timestamp, self.bid, self.ask
        )
    }
}

/// An order submission, which doubles as the standing-order record.
///
/// `client_order_id`, `submitted_at` and `venue_order_id` start empty and
/// are stamped by the router during submission and acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    /// Router-generated id, unique across the process lifetime.
    pub client_order_id: Option<String>,
    /// Venue-assigned id, attached once the venue acknowledges the order.
    pub venue_order_id: Option<String>,
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub kind: OrderKind,
    pub side: Side,
    /// Volume in base currency units.
    pub base_volume: Decimal,
    /// Volume in counter currency units. Market buys are quoted in counter
    /// volume by the venue, so it is derived at construction for those.
    pub counter_volume: Option<Decimal>,
    /// Limit price, or the reference price used to size a market order.
    pub price: Decimal,
    pub time_in_force: TimeInForce,
    pub post_only: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl OrderEvent {
    /// Market order. For buys the counter volume is derived as
    /// `base_volume * reference_price`, matching what the venue expects.
    pub fn market(
        strategy_id: StrategyId,
        symbol: impl Into<String>,
        side: Side,
        base_volume: Decimal,
        reference_price: Decimal,
    ) -> Self {
        let counter_volume = match side {
            Side::Buy => Some(base_volume * reference_price),
            Side::Sell => None,
        };
        OrderEvent {
            client_order_id: None,
            venue_order_id: None,
            strategy_id,
            symbol: symbol.into(),
            kind: OrderKind::Market,
            side,
            base_volume,
            counter_volume,
            price: reference_price,
            time_in_force: TimeInForce::Ioc,
            post_only: false,
            submitted_at: None,
        }
    }

    /// Limit order, GTC by default.
    pub fn limit(
        strategy_id: StrategyId,
        symbol: impl Into<String>,
        side: Side,
        base_volume: Decimal,
        price: Decimal,
    ) -> Self {
        OrderEvent {
            client_order_id: None,
            venue_order_id: None,
            strategy_id,
            symbol: symbol.into(),
            kind: OrderKind::Limit,
            side,
            base_volume,
            counter_volume: None,
            price,
            time_in_force: TimeInForce::Gtc,
            post_only: true,
            submitted_at: None,
        }
    }

    pub fn post_only(mut self, post_only: bool) -> Self {
        self.post_only = post_only;
        self
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ORDER {}.{} - client_oid: {}, venue_oid: {}, kind: {}, side: {}, price: {}, base_vol: {}",
            self.symbol,
            self.strategy_id,
            self.client_order_id.as_deref().unwrap_or("-"),
            self.venue_order_id.as_deref().unwrap_or("-"),
            self.kind.as_str(),
            self.side.as_str(),
            self.price,
            self.base_volume
        )
    }
}

/// A completed execution reported by the venue.
#[derive(Debug, Clone, PartialEq)]
pub struct FillEvent {
    pub strategy_id: StrategyId,
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    /// Filled volume in base currency units.
    pub base_volume: Decimal,
    /// Filled volume in counter currency units.
    pub counter_volume: Decimal,
    /// Fee charged, in base currency units.
    pub fee_base: Decimal,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// counter / base, exact decimal division.
    pub execution_price: Decimal,
}

impl FillEvent {
    /// Build a fill from venue-reported volumes. `base_volume` must be
    /// positive; the execution price is counter / base.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy_id: StrategyId,
        client_order_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        base_volume: Decimal,
        counter_volume: Decimal,
        fee_base: Decimal,
        created_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        FillEvent {
            strategy_id,
            client_order_id: client_order_id.into(),
            symbol: symbol.into(),
            side,
            base_volume,
            counter_volume,
            fee_base,
            created_at,
            completed_at,
            execution_price: counter_volume / base_volume,
        }
    }
}

impl fmt::Display for FillEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FILL {}.{} - ts: {}, oid: {}, exec_price: {}, base_vol: {}, counter_vol: {}",
            self.symbol,
            self.strategy_id,
            self.completed_at,
            self.client_order_id,
            self.execution_price,
            self.base_volume,
            self.counter_volume
        )
    }
}
