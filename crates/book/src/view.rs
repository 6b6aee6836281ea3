//! Price-aggregated book view and derived signals.

use crate::book::LevelEntry;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Number of fractional digits levels are rounded to for aggregation.
const LEVEL_PRECISION: u32 = 4;

/// Depth used by the derived signals unless the caller overrides it.
pub const DEFAULT_DEPTH: usize = 10;

/// One aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

/// Consolidated, sorted view of one instrument's book.
///
/// Bids are sorted descending, asks ascending, both rounded to four
/// fractional digits. Rebuilt after every applied message; the raw
/// per-order-id state stays in [`crate::OrderBook`].
#[derive(Debug, Clone, PartialEq)]
pub struct BookView {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl BookView {
    pub fn from_entries<'a>(
        bids: impl Iterator<Item = &'a LevelEntry>,
        asks: impl Iterator<Item = &'a LevelEntry>,
    ) -> Self {
        let mut bid_levels = consolidate(bids);
        bid_levels.reverse();
        BookView {
            bids: bid_levels,
            asks: consolidate(asks),
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// (best bid + best ask) / 2. None while either side is empty.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Volume-weighted average mid price: the mean of the two sides'
    /// volume-weighted average prices over the top `depth` levels.
    pub fn vamp(&self, depth: usize) -> Option<Decimal> {
        let bid_vwap = side_vwap(&self.bids, depth)?;
        let ask_vwap = side_vwap(&self.asks, depth)?;
        Some((bid_vwap + ask_vwap) / Decimal::TWO)
    }

    /// Bid share of total volume over the top `depth` levels, in [0, 1].
    /// Values above 0.5 indicate buy pressure. None on an empty book.
    pub fn imbalance(&self, depth: usize) -> Option<Decimal> {
        let bid_volume: Decimal = self.bids.iter().take(depth).map(|l| l.volume).sum();
        let ask_volume: Decimal = self.asks.iter().take(depth).map(|l| l.volume).sum();
        let total = bid_volume + ask_volume;
        if total == Decimal::ZERO {
            None
        } else {
            Some(bid_volume / total)
        }
    }
}

/// Aggregate per-order entries by rounded price, ascending.
fn consolidate<'a>(entries: impl Iterator<Item = &'a LevelEntry>) -> Vec<PriceLevel> {
    let mut by_price: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for entry in entries {
        *by_price
            .entry(entry.price.round_dp(LEVEL_PRECISION))
            .or_insert(Decimal::ZERO) += entry.volume;
    }
    by_price
        .into_iter()
        .map(|(price, volume)| PriceLevel {
            price,
            volume: volume.round_dp(LEVEL_PRECISION),
        })
        .collect()
}

fn side_vwap(levels: &[PriceLevel], depth: usize) -> Option<Decimal> {
    let mut notional = Decimal::ZERO;
    let mut volume = Decimal::ZERO;
    for level in levels.iter().take(depth) {
        notional += level.price * level.volume;
        volume += level.volume;
    }
    if volume == Decimal::ZERO {
        None
    } else {
        Some(notional / volume)
    }
}
