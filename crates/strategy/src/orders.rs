//! Standing-order ledger, one per strategy.

use kestrel_core::{FillEvent, OrderEvent};
use std::collections::HashMap;

/// Orders a strategy has in flight, keyed by client order id.
///
/// An order enters on acknowledgement, leaves on cancel (moved to the
/// cancelled map) or on fill (dropped).
#[derive(Debug, Default)]
pub struct OrderLedger {
    standing: HashMap<String, OrderEvent>,
    canceled: HashMap<String, OrderEvent>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acknowledged order. Orders without a client order id were
    /// never submitted and cannot be tracked.
    pub fn on_new_order(&mut self, order: OrderEvent) {
        match &order.client_order_id {
            Some(id) => {
                self.standing.insert(id.clone(), order);
            }
            None => {
                tracing::warn!("dropping untracked order without client id: {}", order);
            }
        }
    }

    /// Move an order from standing to cancelled, returning it.
    pub fn on_cancel(&mut self, client_order_id: &str) -> Option<OrderEvent> {
        let order = self.standing.remove(client_order_id)?;
        self.canceled.insert(client_order_id.to_string(), order.clone());
        Some(order)
    }

    /// Drop the filled order. Unknown ids are a no-op: the fill may race a
    /// cancel, or belong to an order completed on a previous poll.
    pub fn on_fill(&mut self, fill: &FillEvent) {
        self.standing.remove(&fill.client_order_id);
    }

    pub fn get(&self, client_order_id: &str) -> Option<&OrderEvent> {
        self.standing.get(client_order_id)
    }

    pub fn standing_orders(&self) -> Vec<OrderEvent> {
        self.standing.values().cloned().collect()
    }

    pub fn canceled_orders(&self) -> Vec<OrderEvent> {
        self.canceled.values().cloned().collect()
    }

    pub fn standing_count(&self) -> usize {
        self.standing.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kestrel_core::{Side, StrategyId};
    use rust_decimal_macros::dec;

    fn order(id: &str) -> OrderEvent {
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
    fn test_ack_then_fill_clears_standing() {
        let mut ledger = OrderLedger::new();
        ledger.on_new_order(order("a"));
        assert_eq!(ledger.standing_count(), 1);

        let fill = FillEvent::new(
            StrategyId::new(1),
            "a",
            "ETHMYR",
            Side::Buy,
            dec!(0.5),
            dec!(4000),
            dec!(0),
            Utc::now(),
            Utc::now(),
        );
        ledger.on_fill(&fill);
        assert_eq!(ledger.standing_count(), 0);
    }

    #[test]
    fn test_cancel_moves_to_canceled() {
        let mut ledger = OrderLedger::new();
        ledger.on_new_order(order("a"));

        let canceled = ledger.on_cancel("a").unwrap();
        assert_eq!(canceled.client_order_id.as_deref(), Some("a"));
        assert_eq!(ledger.standing_count(), 0);
        assert_eq!(ledger.canceled_orders().len(), 1);

        assert!(ledger.on_cancel("a").is_none());
    }

    #[test]
    fn test_order_without_client_id_not_tracked() {
        let mut ledger = OrderLedger::new();
        let mut untracked = order("a");
        untracked.client_order_id = None;
        ledger.on_new_order(untracked);
        assert_eq!(ledger.standing_count(), 0);
    }

    #[test]
    fn test_fill_for_unknown_order_is_noop() {
        let mut ledger = OrderLedger::new();
        let fill = FillEvent::new(
            StrategyId::new(1),
            "ghost",
            "ETHMYR",
            Side::Sell,
            dec!(1),
            dec!(100),
            dec!(0),
            Utc::now(),
            Utc::now(),
        );
        ledger.on_fill(&fill);
        assert_eq!(ledger.standing_count(), 0);
    }
}
