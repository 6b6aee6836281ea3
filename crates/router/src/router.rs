//! The strategy router.

use crate::collaborators::{AlertSink, TradeStore};
use chrono::Utc;
use kestrel_bus::BusHandle;
use kestrel_core::{CompositeCode, Event, FillEvent, OrderEvent, OrderKind, Side, StrategyId, TickEvent};
use kestrel_strategy::{
    Action, BrokerError, BrokerGateway, LimitOrderParams, MarketOrderParams, Strategy,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("strategy {name} is active but has no capital allocated")]
    MissingCapital { name: String },
    #[error("strategy {name} is active but subscribes to no instruments")]
    MissingSymbols { name: String },
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Per-strategy configuration, keyed by strategy name in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategySettings {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub capital: Option<Decimal>,
    /// Composite codes, `SYMBOL.venue`.
    #[serde(default)]
    pub symbols: Vec<CompositeCode>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

struct Inner {
    strategies: BTreeMap<StrategyId, Box<dyn Strategy>>,
    /// Active subscribers per instrument, in id order.
    by_code: HashMap<CompositeCode, Vec<StrategyId>>,
}

/// Owns the loaded strategies and connects them to the buses and the venue.
///
/// All strategy state lives behind one lock; event dispatch and action
/// execution are serialized, which is what keeps the ledgers consistent
/// without per-strategy locking.
pub struct StrategyRouter {
    inner: Mutex<Inner>,
    action_bus: BusHandle,
    broker: Arc<dyn BrokerGateway>,
    store: Arc<dyn TradeStore>,
    alerts: Arc<dyn AlertSink>,
}

impl StrategyRouter {
    pub fn new(
        action_bus: BusHandle,
        broker: Arc<dyn BrokerGateway>,
        store: Arc<dyn TradeStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        StrategyRouter {
            inner: Mutex::new(Inner {
                strategies: BTreeMap::new(),
                by_code: HashMap::new(),
            }),
            action_bus,
            broker,
            store,
            alerts,
        }
    }

    /// Load strategies and apply their settings.
    ///
    /// Ids are dense and 1-based, assigned in the order the strategies were
    /// registered. An active strategy without capital or without
    /// subscriptions fails the whole load; a half-configured live engine is
    /// worse than one that refuses to start.
    pub fn load(
        &self,
        built: Vec<Box<dyn Strategy>>,
        settings: &HashMap<String, StrategySettings>,
    ) -> Result<(), RouterError> {
        let mut inner = self.inner.lock();
        inner.strategies.clear();
        inner.by_code.clear();

        for (index, mut strategy) in built.into_iter().enumerate() {
            let id = StrategyId::new(index as u32 + 1);
            let core = strategy.core_mut();
            core.id = id;

            if let Some(config) = settings.get(&core.name) {
                core.active = config.active;
                core.set_symbols(config.symbols.clone());
                core.set_params(config.params.clone());
                match config.capital {
                    Some(capital) => core.set_capital(capital),
                    None if config.active => {
                        return Err(RouterError::MissingCapital {
                            name: core.name.clone(),
                        });
                    }
                    None => {}
                }
            }
            if core.active && core.symbols.is_empty() {
                return Err(RouterError::MissingSymbols {
                    name: core.name.clone(),
                });
            }
            core.init();

            if core.active {
                for code in core.symbols.clone() {
                    inner.by_code.entry(code).or_default().push(id);
                }
                tracing::info!("loaded strategy {} ({})", core.name, id);
            } else {
                tracing::info!("strategy {} loaded inactive", core.name);
            }
            inner.strategies.insert(id, strategy);
        }
        Ok(())
    }

    /// Deliver a tick to every active subscriber and execute the actions
    /// they return.
    pub fn on_tick(&self, tick: &TickEvent) {
        let mut inner = self.inner.lock();
        let subscribers = match inner.by_code.get(&tick.code) {
            Some(ids) => ids.clone(),
            None => return,
        };
        for id in subscribers {
            let Some(strategy) = inner.strategies.get_mut(&id) else {
                continue;
            };
            if !strategy.core().active {
                continue;
            }
            let actions = strategy.on_tick(tick);
            self.execute_actions(&mut inner, id, actions);
        }
    }

    /// Dispatch an acknowledged order back to its strategy's ledger.
    pub fn on_new_order(&self, order: &OrderEvent) {
        let mut inner = self.inner.lock();
        match inner.strategies.get_mut(&order.strategy_id) {
            Some(strategy) => strategy.on_new_order(order),
            None => tracing::warn!("order for unknown strategy {}: {}", order.strategy_id, order),
        }
    }

    /// Dispatch a fill to its strategy, then record and announce it.
    pub fn on_fill(&self, fill: &FillEvent) {
        {
            let mut inner = self.inner.lock();
            match inner.strategies.get_mut(&fill.strategy_id) {
                Some(strategy) => strategy.on_fill(fill),
                None => {
                    tracing::warn!("fill for unknown strategy {}: {}", fill.strategy_id, fill)
                }
            }
        }
        if let Err(e) = self.store.record_fill(fill) {
            tracing::error!("failed to persist fill {}: {}", fill.client_order_id, e);
        }
        if let Err(e) = self.alerts.notify(&fill.to_string()) {
            tracing::error!("failed to send fill alert: {}", e);
        }
    }

    /// Heartbeat: let every active strategy poll its standing orders and
    /// publish any discovered fills on the action bus.
    pub fn on_order_status(&self) {
        let fills: Vec<FillEvent> = {
            let mut inner = self.inner.lock();
            inner
                .strategies
                .values_mut()
                .filter(|s| s.core().active)
                .flat_map(|s| s.on_order_status(self.broker.as_ref()))
                .collect()
        };
        for fill in fills {
            tracing::info!("discovered fill: {}", fill);
            if let Err(e) = self.action_bus.put(Event::Fill(fill)) {
                tracing::error!("failed to publish fill: {}", e);
            }
        }
    }

    /// Instruments any active strategy subscribes to.
    pub fn active_symbols(&self) -> Vec<CompositeCode> {
        self.inner.lock().by_code.keys().cloned().collect()
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        self.inner.lock().strategies.keys().copied().collect()
    }

    pub fn is_active(&self, id: StrategyId) -> bool {
        self.inner
            .lock()
            .strategies
            .get(&id)
            .is_some_and(|s| s.core().active)
    }

    pub fn standing_order_count(&self, id: StrategyId) -> usize {
        self.inner
            .lock()
            .strategies
            .get(&id)
            .map_or(0, |s| s.core().orders.standing_count())
    }

    pub fn cash(&self, id: StrategyId) -> Option<Decimal> {
        self.inner
            .lock()
            .strategies
            .get(&id)
            .map(|s| s.core().positions.cash())
    }

    pub fn equity(&self, id: StrategyId) -> Option<Decimal> {
        self.inner
            .lock()
            .strategies
            .get(&id)
            .map(|s| s.core().positions.equity())
    }

    pub fn inventory(&self, id: StrategyId, symbol: &str) -> Option<Decimal> {
        self.inner
            .lock()
            .strategies
            .get(&id)
            .map(|s| s.core().positions.inventory(symbol))
    }

    fn execute_actions(&self, inner: &mut Inner, id: StrategyId, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Submit(order) => self.submit(id, order),
                Action::Cancel { client_order_id } => {
                    self.cancel(inner, id, &client_order_id);
                }
                Action::CancelAll => {
                    let standing = inner
                        .strategies
                        .get(&id)
                        .map(|s| s.core().orders.standing_orders())
                        .unwrap_or_default();
                    for order in standing {
                        if let Some(client_order_id) = &order.client_order_id {
                            self.cancel(inner, id, client_order_id);
                        }
                    }
                }
            }
        }
    }

    /// Stamp the order with a client id and submission time, send it to the
    /// venue and publish the acknowledged order on the action bus. Broker
    /// failures are logged and the order is dropped; nothing is published
    /// for an order the venue never saw.
    fn submit(&self, id: StrategyId, mut order: OrderEvent) {
        order.strategy_id = id;
        let client_order_id = Uuid::new_v4().to_string();
        order.client_order_id = Some(client_order_id.clone());
        order.submitted_at = Some(Utc::now());

        let placed = match order.kind {
            OrderKind::Market => self.broker.place_market_order(MarketOrderParams {
                pair: order.symbol.clone(),
                side: order.side,
                client_order_id,
                base_volume: match order.side {
                    Side::Sell => Some(order.base_volume),
                    Side::Buy => None,
                },
                counter_volume: match order.side {
                    Side::Buy => order.counter_volume,
                    Side::Sell => None,
                },
            }),
            OrderKind::Limit => self.broker.place_limit_order(LimitOrderParams {
                pair: order.symbol.clone(),
                side: order.side,
                client_order_id,
                price: order.price,
                base_volume: order.base_volume,
                post_only: order.post_only,
                time_in_force: order.time_in_force,
            }),
        };
        match placed {
            Ok(venue_order_id) => {
                order.venue_order_id = Some(venue_order_id);
                tracing::info!("submitted: {}", order);
                if let Err(e) = self.action_bus.put(Event::Order(order)) {
                    tracing::error!("failed to publish order: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("order rejected by broker: {} ({})", e, order);
            }
        }
    }

    /// Cancel at the venue first, then move the order out of the standing
    /// ledger. Orders without a venue id were never acknowledged and are
    /// left alone.
    fn cancel(&self, inner: &mut Inner, id: StrategyId, client_order_id: &str) {
        let Some(strategy) = inner.strategies.get_mut(&id) else {
            return;
        };
        let core = strategy.core_mut();
        let venue_order_id = match core.orders.get(client_order_id) {
            Some(order) => order.venue_order_id.clone(),
            None => {
                tracing::warn!("cancel for unknown order {}", client_order_id);
                return;
            }
        };
        let Some(venue_order_id) = venue_order_id else {
            tracing::warn!("cancel for unacknowledged order {}", client_order_id);
            return;
        };
        match self.broker.cancel_order(&venue_order_id) {
            Ok(()) => {
                core.orders.on_cancel(client_order_id);
                tracing::info!("cancelled order {}", client_order_id);
            }
            Err(e) => {
                tracing::error!("cancel failed for {}: {}", client_order_id, e);
            }
        }
    }
}
