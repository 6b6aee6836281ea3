//! Exercise strategy for wiring checks and paper trading.

use crate::contract::{Action, Strategy, StrategyCore};
use kestrel_core::{OrderEvent, Side, TickEvent};
use rust_decimal_macros::dec;

/// Buys a small clip on the fifth tick and cancels everything still
/// standing on the twentieth. Exists to exercise the full order path, not
/// to make money.
pub struct NaiveTestStrategy {
    core: StrategyCore,
    ticks_seen: u64,
}

impl NaiveTestStrategy {
    pub const NAME: &'static str = "naive_test";

    const BUY_AT_TICK: u64 = 5;
    const CANCEL_AT_TICK: u64 = 20;

    pub fn new() -> Self {
        NaiveTestStrategy {
            core: StrategyCore::new(Self::NAME),
            ticks_seen: 0,
        }
    }

    pub fn ticks_seen(&self) -> u64 {
        self.ticks_seen
    }
}

impl Default for NaiveTestStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for NaiveTestStrategy {
    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn on_tick(&mut self, tick: &TickEvent) -> Vec<Action> {
        self.core.mark_to_market(tick);
        self.ticks_seen += 1;

        if self.ticks_seen == Self::BUY_AT_TICK {
            let volume = self.core.param_decimal("base_volume").unwrap_or(dec!(0.1));
            let order = OrderEvent::market(
                self.core.id,
                tick.symbol.clone(),
                Side::Buy,
                volume,
                tick.mid_price(),
            );
            tracing::info!("{}: placing test order: {}", self.core.name, order);
            return vec![Action::Submit(order)];
        }
        if self.ticks_seen == Self::CANCEL_AT_TICK && self.core.orders.standing_count() > 0 {
            return vec![Action::CancelAll];
        }
        Vec::new()
    }
}
