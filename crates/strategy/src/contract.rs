//! The strategy contract.

use crate::broker::{BrokerGateway, VenueOrderStatus};
use crate::orders::OrderLedger;
use crate::positions::PositionLedger;
use kestrel_core::{CompositeCode, FillEvent, OrderEvent, StrategyId, TickEvent};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// What a strategy wants done in response to an event. The router executes
/// actions in order; strategies never touch the venue themselves.
#[derive(Debug, Clone)]
pub enum Action {
    Submit(OrderEvent),
    Cancel { client_order_id: String },
    CancelAll,
}

/// State every strategy carries: identity, subscriptions and the two
/// ledgers. Embedded in each [`Strategy`] impl and exposed through
/// [`Strategy::core`].
#[derive(Debug, Default)]
pub struct StrategyCore {
    pub id: StrategyId,
    pub name: String,
    pub symbols: Vec<CompositeCode>,
    pub active: bool,
    pub initialized: bool,
    pub params: serde_json::Map<String, Value>,
    pub orders: OrderLedger,
    pub positions: PositionLedger,
}

impl StrategyCore {
    pub fn new(name: impl Into<String>) -> Self {
        StrategyCore {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_symbols(&mut self, symbols: Vec<CompositeCode>) {
        self.symbols = symbols;
    }

    pub fn set_capital(&mut self, amount: Decimal) {
        self.positions.set_capital(amount);
    }

    pub fn set_params(&mut self, params: serde_json::Map<String, Value>) {
        self.params = params;
    }

    /// Read a numeric parameter, accepting both JSON numbers and strings.
    pub fn param_decimal(&self, key: &str) -> Option<Decimal> {
        match self.params.get(key)? {
            Value::String(s) => Decimal::from_str(s).ok(),
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        }
    }

    /// Finish loading: start position tracking for the subscribed
    /// instruments.
    pub fn init(&mut self) {
        self.positions.on_init(&self.symbols);
        self.initialized = true;
    }

    pub fn subscribes_to(&self, code: &CompositeCode) -> bool {
        self.symbols.contains(code)
    }

    pub fn mark_to_market(&mut self, tick: &TickEvent) {
        self.positions.mark_to_market(tick);
    }
}

/// A trading strategy.
///
/// Implementations embed a [`StrategyCore`] and override the event hooks
/// they care about. The defaults keep the ledgers consistent, so overriding
/// hooks should either call the ledger updates themselves or delegate back.
pub trait Strategy: Send {
    fn core(&self) -> &StrategyCore;

    fn core_mut(&mut self) -> &mut StrategyCore;

    /// Called for every tick of a subscribed instrument. The default marks
    /// positions to market and trades nothing.
    fn on_tick(&mut self, tick: &TickEvent) -> Vec<Action> {
        self.core_mut().mark_to_market(tick);
        Vec::new()
    }

    /// Called when the router acknowledges one of this strategy's orders.
    fn on_new_order(&mut self, order: &OrderEvent) {
        self.core_mut().orders.on_new_order(order.clone());
    }

    /// Called when one of this strategy's orders fills.
    fn on_fill(&mut self, fill: &FillEvent) {
        let core = self.core_mut();
        core.orders.on_fill(fill);
        core.positions.on_fill(fill);
    }

    /// Heartbeat hook: discover fills for standing orders. The default
    /// polls the venue for each standing order.
    fn on_order_status(&mut self, broker: &dyn BrokerGateway) -> Vec<FillEvent> {
        poll_standing_orders(self.core(), broker)
    }
}

/// Poll the venue for each standing order and emit a fill for every order
/// that has completed. Lookup failures are logged and the order is retried
/// on the next heartbeat. Ledgers are untouched here; fills are applied
/// when they come back through the bus.
pub fn poll_standing_orders(core: &StrategyCore, broker: &dyn BrokerGateway) -> Vec<FillEvent> {
    let mut fills = Vec::new();
    for order in core.orders.standing_orders() {
        let Some(client_order_id) = order.client_order_id.clone() else {
            continue;
        };
        let venue_order = match broker.get_order(&client_order_id) {
            Ok(venue_order) => venue_order,
            Err(e) => {
                tracing::warn!("status poll failed for {}: {}", client_order_id, e);
                continue;
            }
        };
        if venue_order.status != VenueOrderStatus::Complete {
            continue;
        }
        // Complete with nothing executed means the order was cancelled.
        if venue_order.base.is_zero() {
            continue;
        }
        fills.push(FillEvent::new(
            core.id,
            client_order_id,
            order.symbol.clone(),
            order.side,
            venue_order.base,
            venue_order.counter,
            venue_order.fee_base,
            venue_order.created_at,
            venue_order.completed_at.unwrap_or(venue_order.created_at),
        ));
    }
    fills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerError, LimitOrderParams, MarketOrderParams, VenueOrder, VenueTicker};
    use chrono::Utc;
    use kestrel_core::Side;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct PassiveStrategy {
        core: StrategyCore,
    }

    impl Strategy for PassiveStrategy {
        fn core(&self) -> &StrategyCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut StrategyCore {
            &mut self.core
        }
    }

    /// Broker stub with a fixed order-status table.
    #[derive(Default)]
    struct TableBroker {
        orders: Mutex<HashMap<String, VenueOrder>>,
    }

    impl TableBroker {
        fn insert(&self, client_order_id: &str, status: VenueOrderStatus) {
            let order = VenueOrder {
                venue_order_id: format!("v-{client_order_id}"),
                status,
                base: dec!(0.5),
                counter: dec!(4000),
                fee_base: dec!(0.001),
                created_at: Utc::now(),
                completed_at: Some(Utc::now()),
            };
            self.orders
                .lock()
                .unwrap()
                .insert(client_order_id.to_string(), order);
        }
    }

    impl BrokerGateway for TableBroker {
        fn get_ticker(&self, _pair: &str) -> Result<VenueTicker, BrokerError> {
            Err(BrokerError::Request("no ticker".to_string()))
        }
        fn place_market_order(&self, _params: MarketOrderParams) -> Result<String, BrokerError> {
            Err(BrokerError::Request("read only".to_string()))
        }
        fn place_limit_order(&self, _params: LimitOrderParams) -> Result<String, BrokerError> {
            Err(BrokerError::Request("read only".to_string()))
        }
        fn get_order(&self, client_order_id: &str) -> Result<VenueOrder, BrokerError> {
            self.orders
                .lock()
                .unwrap()
                .get(client_order_id)
                .cloned()
                .ok_or_else(|| BrokerError::UnknownOrder(client_order_id.to_string()))
        }
        fn cancel_order(&self, _venue_order_id: &str) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    fn strategy() -> PassiveStrategy {
        let mut core = StrategyCore::new("passive");
        core.id = StrategyId::new(1);
        core.set_symbols(vec![CompositeCode::new("ETHMYR", "luno")]);
        core.set_capital(dec!(10000));
        core.init();
        PassiveStrategy { core }
    }

    fn tracked_order(id: &str) -> OrderEvent {
        let mut order = OrderEvent::limit(
            StrategyId::new(1),
            "ETHMYR",
            Side::Buy,
            dec!(0.5),
            dec!(8000),
        );
        order.client_order_id = Some(id.to_string());
        order
    }

    #[test]
    fn test_default_on_tick_marks_to_market() {
        let mut strat = strategy();
        strat.on_fill(&FillEvent::new(
            StrategyId::new(1),
            "a",
            "ETHMYR",
            Side::Buy,
            dec!(1),
            dec!(8000),
            dec!(0),
            Utc::now(),
            Utc::now(),
        ));

        let tick = TickEvent::new(
            CompositeCode::new("ETHMYR", "luno"),
            Utc::now(),
            dec!(8100),
            dec!(8102),
        );
        let actions = strat.on_tick(&tick);
        assert!(actions.is_empty());
        assert_eq!(strat.core().positions.equity(), dec!(2000) + dec!(8101));
    }

    #[test]
    fn test_poll_emits_fill_only_for_complete() {
        let mut strat = strategy();
        strat.on_new_order(&tracked_order("done"));
        strat.on_new_order(&tracked_order("resting"));
        strat.on_new_order(&tracked_order("lost"));

        let broker = TableBroker::default();
        broker.insert("done", VenueOrderStatus::Complete);
        broker.insert("resting", VenueOrderStatus::Pending);
        // "lost" is unknown to the broker; the poll skips it.

        let fills = strat.on_order_status(&broker);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].client_order_id, "done");
        assert_eq!(fills[0].execution_price, dec!(8000));
        // Ledger untouched until the fill comes back through the bus.
        assert_eq!(strat.core().orders.standing_count(), 3);
    }

    #[test]
    fn test_param_decimal() {
        let mut core = StrategyCore::new("p");
        let mut params = serde_json::Map::new();
        params.insert("vol".to_string(), Value::String("0.25".to_string()));
        params.insert("depth".to_string(), serde_json::json!(5));
        core.set_params(params);

        assert_eq!(core.param_decimal("vol"), Some(dec!(0.25)));
        assert_eq!(core.param_decimal("depth"), Some(dec!(5)));
        assert_eq!(core.param_decimal("missing"), None);
    }
}
