//! Cash, inventory and equity tracking, one ledger per strategy.

use kestrel_core::{CompositeCode, FillEvent, Side, TickEvent};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Position ledger denominated in the counter currency.
///
/// Fills move cash and inventory immediately; equity is only recomputed on
/// mark-to-market, so it lags fills until the next tick arrives.
#[derive(Debug, Default)]
pub struct PositionLedger {
    initial_capital: Decimal,
    cash: Decimal,
    /// Base-currency inventory per bare symbol.
    inventory: HashMap<String, Decimal>,
    /// Most recent mid price per bare symbol.
    last_price: HashMap<String, Decimal>,
    equity: Decimal,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking the given instruments with zero inventory.
    pub fn on_init(&mut self, codes: &[CompositeCode]) {
        for code in codes {
            self.inventory.entry(code.symbol.clone()).or_insert(Decimal::ZERO);
        }
    }

    /// Set the allocated capital. Called once at load time, before any fill.
    pub fn set_capital(&mut self, amount: Decimal) {
        self.initial_capital = amount;
        self.cash = amount;
        self.equity = amount;
    }

    /// Apply a fill. Returns true when a sell exceeded the held inventory;
    /// the fill is applied regardless and the position goes short.
    pub fn on_fill(&mut self, fill: &FillEvent) -> bool {
        let held = self
            .inventory
            .entry(fill.symbol.clone())
            .or_insert(Decimal::ZERO);
        match fill.side {
            Side::Buy => {
                *held += fill.base_volume;
                self.cash -= fill.counter_volume;
                false
            }
            Side::Sell => {
                let oversold = fill.base_volume > *held;
                if oversold {
                    tracing::warn!(
                        "selling {} {} with only {} held",
                        fill.base_volume,
                        fill.symbol,
                        held
                    );
                }
                *held -= fill.base_volume;
                self.cash += fill.counter_volume;
                oversold
            }
        }
    }

    /// Revalue equity at the tick's mid price. Ticks for untracked symbols
    /// are ignored. Symbols with no observed price yet contribute nothing.
    pub fn mark_to_market(&mut self, tick: &TickEvent) {
        if self.inventory.contains_key(&tick.symbol) {
            self.last_price.insert(tick.symbol.clone(), tick.mid_price());
        }
        let mut value = Decimal::ZERO;
        for (symbol, held) in &self.inventory {
            if let Some(price) = self.last_price.get(symbol) {
                value += held * price;
            }
        }
        self.equity = self.cash + value;
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn equity(&self) -> Decimal {
        self.equity
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn inventory(&self, symbol: &str) -> Decimal {
        self.inventory.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    /// Equity minus initial capital.
    pub fn total_pnl(&self) -> Decimal {
        self.equity - self.initial_capital
    }
}
