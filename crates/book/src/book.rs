//! Per-order-id book state and diff application.

use crate::view::BookView;
use crate::wire::{CreateUpdate, DeleteUpdate, SnapshotMessage, TradeUpdate, UpdateMessage, WireSide};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

/// The stream skipped or repeated a sequence number. The book can no longer
/// be trusted and must be rebuilt from a fresh snapshot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sequence gap: expected {expected}, got {got}")]
pub struct SequenceGap {
    pub expected: u64,
    pub got: u64,
}

/// One resting order: price and remaining volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelEntry {
    pub price: Decimal,
    pub volume: Decimal,
}

/// Which side initiated a trade, inferred from where the maker rested.
///
/// A maker found in the bid book was lifted by a seller; a maker in the ask
/// book was lifted by a buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOrigin {
    Buy,
    Sell,
}

/// A classified trade extracted from a diff message.
#[derive(Debug, Clone, PartialEq)]
pub struct BookTrade {
    pub maker_order_id: String,
    /// counter / base, exact decimal division.
    pub price: Decimal,
    pub base: Decimal,
    pub counter: Decimal,
    pub origin: TradeOrigin,
}

/// Reconstructed book for one instrument, keyed by venue order id.
///
/// Mutation is single-threaded (the engine owns the book inside its
/// connection task), so no locking here.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    sequence: u64,
    bids: HashMap<String, LevelEntry>,
    asks: HashMap<String, LevelEntry>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Drop all state. Used when the stream desynchronizes.
    pub fn clear(&mut self) {
        self.sequence = 0;
        self.bids.clear();
        self.asks.clear();
    }

    /// Replace the entire book with a snapshot. Atomic with respect to any
    /// reader of `&self`: the old state is gone once this returns.
    pub fn apply_snapshot(&mut self, snapshot: &SnapshotMessage) {
        self.sequence = snapshot.sequence;
        self.bids = snapshot
            .bids
            .iter()
            .map(|o| {
                (
                    o.id.clone(),
                    LevelEntry {
                        price: o.price,
                        volume: o.volume,
                    },
                )
            })
            .collect();
        self.asks = snapshot
            .asks
            .iter()
            .map(|o| {
                (
                    o.id.clone(),
                    LevelEntry {
                        price: o.price,
                        volume: o.volume,
                    },
                )
            })
            .collect();
    }

    /// Apply one diff message.
    ///
    /// The sequence must be exactly `current + 1`; otherwise the diff is
    /// discarded, nothing is mutated and a [`SequenceGap`] is returned so
    /// the caller can resynchronize. Updates are applied in the protocol's
    /// fixed order: delete, create, trades. Returns the classified trades.
    pub fn apply(&mut self, update: &UpdateMessage) -> Result<Vec<BookTrade>, SequenceGap> {
        let expected = self.sequence + 1;
        if update.sequence != expected {
            return Err(SequenceGap {
                expected,
                got: update.sequence,
            });
        }
        self.sequence = update.sequence;

        if let Some(delete) = &update.delete_update {
            self.apply_delete(delete);
        }
        if let Some(create) = &update.create_update {
            self.apply_create(create);
        }
        let mut trades = Vec::new();
        if let Some(updates) = &update.trade_updates {
            for trade in updates {
                if let Some(classified) = self.apply_trade(trade) {
                    trades.push(classified);
                }
            }
        }
        Ok(trades)
    }

    /// The delete carries only an order id, so both sides are probed.
    /// Absent from both: ignored.
    fn apply_delete(&mut self, delete: &DeleteUpdate) {
        self.bids.remove(&delete.order_id);
        self.asks.remove(&delete.order_id);
    }

    fn apply_create(&mut self, create: &CreateUpdate) {
        let book = match create.side {
            WireSide::Bid => &mut self.bids,
            WireSide::Ask => &mut self.asks,
        };
        book.insert(
            create.order_id.clone(),
            LevelEntry {
                price: create.price,
                volume: create.volume,
            },
        );
    }

    /// Decrement the maker's resting volume by the traded base amount,
    /// removing the order when it reaches exactly zero. A maker id found in
    /// neither book is silently ignored.
    fn apply_trade(&mut self, trade: &TradeUpdate) -> Option<BookTrade> {
        let price = trade.counter / trade.base;
        let origin = if self.bids.contains_key(&trade.maker_order_id) {
            Self::reduce(&mut self.bids, &trade.maker_order_id, trade.base);
            TradeOrigin::Sell
        } else if self.asks.contains_key(&trade.maker_order_id) {
            Self::reduce(&mut self.asks, &trade.maker_order_id, trade.base);
            TradeOrigin::Buy
        } else {
            return None;
        };
        Some(BookTrade {
            maker_order_id: trade.maker_order_id.clone(),
            price,
            base: trade.base,
            counter: trade.counter,
            origin,
        })
    }

    fn reduce(book: &mut HashMap<String, LevelEntry>, order_id: &str, base: Decimal) {
        if let Some(entry) = book.get_mut(order_id) {
            entry.volume -= base;
            if entry.volume == Decimal::ZERO {
                book.remove(order_id);
            }
        }
    }

    /// Price-aggregated view with derived signals.
    pub fn view(&self) -> BookView {
        BookView::from_entries(self.bids.values(), self.asks.values())
    }

    pub(crate) fn bid_entry(&self, order_id: &str) -> Option<&LevelEntry> {
        self.bids.get(order_id)
    }

    pub(crate) fn ask_entry(&self, order_id: &str) -> Option<&LevelEntry> {
        self.asks.get(order_id)
    }
}
