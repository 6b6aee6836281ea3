//! Full order path against the paper broker: ticks in, order out, fill
//! discovered by the status poll, ledgers updated.

use kestrel_core::{FillEvent, StrategyId};
use kestrel_router::{CollaboratorError, NullAlertSink, TradeStore};
use kestrel_runner::{PaperBroker, TradingApp, TradingConfig};
use kestrel_strategy::{BrokerGateway, NaiveTestStrategy, Strategy, StrategyCore, StrategyRegistry};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct MemStore {
    fills: Mutex<Vec<FillEvent>>,
}

impl TradeStore for MemStore {
    fn record_fill(&self, fill: &FillEvent) -> Result<(), CollaboratorError> {
        self.fills.lock().unwrap().push(fill.clone());
        Ok(())
    }
}

/// Loaded but never activated; must see no events and hold no positions.
struct Bystander {
    core: StrategyCore,
}

impl Strategy for Bystander {
    fn core(&self) -> &StrategyCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

#[test]
fn test_tick_to_fill_round_trip() {
    let mut registry = StrategyRegistry::new();
    registry.register(NaiveTestStrategy::NAME, || {
        Box::new(NaiveTestStrategy::new())
    });
    registry.register("bystander", || {
        Box::new(Bystander {
            core: StrategyCore::new("bystander"),
        })
    });

    let config = TradingConfig::from_str(
        r#"{
            "heartbeat_secs": 1,
            "strategies": {
                "naive_test": {
                    "active": true,
                    "capital": "10000",
                    "symbols": ["ETHMYR.luno"],
                    "params": {"base_volume": "0.1"}
                },
                "bystander": {
                    "active": false
                }
            }
        }"#,
    )
    .unwrap();

    let broker = Arc::new(PaperBroker::new());
    broker.set_mid("ETHMYR", dec!(8000));
    let store = Arc::new(MemStore::default());

    let app = TradingApp::new(
        config,
        &registry,
        Arc::clone(&broker) as Arc<dyn BrokerGateway>,
        Arc::clone(&store) as Arc<dyn TradeStore>,
        Arc::new(NullAlertSink),
    )
    .unwrap();
    app.start();

    let router = Arc::clone(app.router());
    let naive = StrategyId::new(1);
    let bystander = StrategyId::new(2);
    assert!(router.is_active(naive));
    assert!(!router.is_active(bystander));

    // The test strategy trades on its fifth tick; each heartbeat emits one.
    for _ in 0..5 {
        app.heartbeat_once();
    }
    wait_until("order acknowledgement", || {
        router.standing_order_count(naive) == 1
    });

    // Next heartbeat's status poll discovers the completed market order.
    app.heartbeat_once();
    wait_until("fill", || router.standing_order_count(naive) == 0);
    wait_until("position update", || {
        router.inventory(naive, "ETHMYR").unwrap() > dec!(0)
    });

    // Bought roughly 0.1 base; the paper walk moves the price a little.
    let held = router.inventory(naive, "ETHMYR").unwrap();
    assert!(held > dec!(0.09) && held < dec!(0.11), "held {held}");
    let cash = router.cash(naive).unwrap();
    assert!(cash < dec!(10000), "cash {cash}");

    let fills = store.fills.lock().unwrap();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].strategy_id, naive);
    drop(fills);

    // The inactive strategy saw none of it.
    assert_eq!(router.standing_order_count(bystander), 0);
    assert_eq!(router.inventory(bystander, "ETHMYR"), Some(dec!(0)));
    assert_eq!(router.cash(bystander), Some(dec!(0)));

    app.stop();
}
