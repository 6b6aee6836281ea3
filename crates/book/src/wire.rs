//! Streaming diff protocol messages.
//!
//! The first message after authentication is a full snapshot; every
//! subsequent message is an incremental update carrying at most one delete,
//! one create and a batch of trades. Prices and volumes arrive as strings
//! and are parsed into exact decimals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Authentication payload sent immediately after the socket opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub api_key_id: String,
    pub api_key_secret: String,
}

/// Book side as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireSide {
    #[serde(rename = "BID")]
    Bid,
    #[serde(rename = "ASK")]
    Ask,
}

/// A resting order as carried in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOrder {
    pub id: String,
    pub price: Decimal,
    pub volume: Decimal,
}

impl WireOrder {
    pub fn new(id: impl Into<String>, price: Decimal, volume: Decimal) -> Self {
        WireOrder {
            id: id.into(),
            price,
            volume,
        }
    }
}

/// Initial message: the complete book at a starting sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub sequence: u64,
    pub asks: Vec<WireOrder>,
    pub bids: Vec<WireOrder>,
}

/// Removes one resting order. The side is not given; both books are probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUpdate {
    pub order_id: String,
}

/// Inserts (or replaces) one resting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUpdate {
    pub order_id: String,
    #[serde(rename = "type")]
    pub side: WireSide,
    pub price: Decimal,
    pub volume: Decimal,
}

/// One executed trade against a resting maker order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeUpdate {
    pub maker_order_id: String,
    pub taker_order_id: String,
    pub order_id: String,
    /// Traded volume in base currency units.
    pub base: Decimal,
    /// Traded volume in counter currency units.
    pub counter: Decimal,
}

/// Incremental diff message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub sequence: u64,
    #[serde(default)]
    pub delete_update: Option<DeleteUpdate>,
    #[serde(default)]
    pub create_update: Option<CreateUpdate>,
    #[serde(default)]
    pub trade_updates: Option<Vec<TradeUpdate>>,
}

impl UpdateMessage {
    /// An update carrying nothing but a sequence number.
    pub fn empty(sequence: u64) -> Self {
        UpdateMessage {
            sequence,
            delete_update: None,
            create_update: None,
            trade_updates: None,
        }
    }
}
