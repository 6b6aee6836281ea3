//! Order book reconstruction.
//!
//! The venue streams a full snapshot on connect, then incremental diffs
//! identified by a strictly increasing sequence number. [`OrderBook`] holds
//! the per-order-id state and applies diffs; [`BookView`] aggregates it by
//! price and derives mid price, VAMP and order imbalance; [`BookEngine`]
//! owns the connection state machine (backoff, resynchronization) and
//! publishes derived ticks to the market-data bus.

pub mod book;
pub mod engine;
pub mod view;
pub mod wire;
pub mod ws;

pub use book::{BookTrade, OrderBook, SequenceGap, TradeOrigin};
pub use engine::{BookEngine, BookEngineConfig, BookTransport, ConnectionState, TransportError};
pub use view::{BookView, PriceLevel};
pub use wire::{AuthPayload, CreateUpdate, DeleteUpdate, SnapshotMessage, TradeUpdate, UpdateMessage, WireOrder, WireSide};
pub use ws::WsTransport;
