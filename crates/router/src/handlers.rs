//! Bus handler adapters for the router.
//!
//! Ticks arrive on the market-data bus; order acknowledgements, fills and
//! the status heartbeat arrive on the action bus. Each handler is a thin
//! shim from an [`Event`] variant to the matching router method.

use crate::router::StrategyRouter;
use kestrel_bus::{EventBus, EventHandler, HandlerError};
use kestrel_core::{Event, EventKind};
use std::sync::Arc;

pub struct TickHandler(pub Arc<StrategyRouter>);

impl EventHandler for TickHandler {
    fn name(&self) -> &str {
        "router.on_tick"
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        if let Event::Tick(tick) = event {
            self.0.on_tick(tick);
        }
        Ok(())
    }
}

pub struct OrderHandler(pub Arc<StrategyRouter>);

impl EventHandler for OrderHandler {
    fn name(&self) -> &str {
        "router.on_new_order"
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        if let Event::Order(order) = event {
            self.0.on_new_order(order);
        }
        Ok(())
    }
}

pub struct FillHandler(pub Arc<StrategyRouter>);

impl EventHandler for FillHandler {
    fn name(&self) -> &str {
        "router.on_fill"
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        if let Event::Fill(fill) = event {
            self.0.on_fill(fill);
        }
        Ok(())
    }
}

pub struct OrderStatusHandler(pub Arc<StrategyRouter>);

impl EventHandler for OrderStatusHandler {
    fn name(&self) -> &str {
        "router.on_order_status"
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        if matches!(event, Event::CheckOrderStatus) {
            self.0.on_order_status();
        }
        Ok(())
    }
}

/// Wire the router into both buses.
pub fn register_all(market_bus: &EventBus, action_bus: &EventBus, router: Arc<StrategyRouter>) {
    market_bus.register_handler(EventKind::Tick, Arc::new(TickHandler(Arc::clone(&router))));
    action_bus.register_handler(EventKind::Order, Arc::new(OrderHandler(Arc::clone(&router))));
    action_bus.register_handler(EventKind::Fill, Arc::new(FillHandler(Arc::clone(&router))));
    action_bus.register_handler(
        EventKind::CheckOrderStatus,
        Arc::new(OrderStatusHandler(router)),
    );
}
