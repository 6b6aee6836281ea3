//! Engine assembly and lifecycle.

use crate::config::TradingConfig;
use kestrel_book::{AuthPayload, BookEngine, WsTransport};
use kestrel_bus::EventBus;
use kestrel_core::{Event, TickEvent};
use kestrel_router::{AlertSink, RouterError, StrategyRouter, TradeStore, register_all};
use kestrel_strategy::{BrokerGateway, StrategyRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The assembled engine: two buses, the router, the broker and one book
/// feed per traded instrument.
///
/// Ticks flow on the market-data bus, everything order-related on the
/// action bus, so a burst of market data can never starve fill processing.
pub struct TradingApp {
    config: TradingConfig,
    market_bus: EventBus,
    action_bus: EventBus,
    router: Arc<StrategyRouter>,
    broker: Arc<dyn BrokerGateway>,
    feeds: Mutex<Vec<JoinHandle<()>>>,
}

impl TradingApp {
    /// Build the buses, load the strategies and wire the handlers.
    pub fn new(
        config: TradingConfig,
        registry: &StrategyRegistry,
        broker: Arc<dyn BrokerGateway>,
        store: Arc<dyn TradeStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Result<Self, RouterError> {
        let market_bus = EventBus::new("market");
        let action_bus = EventBus::new("action");

        let router = Arc::new(StrategyRouter::new(
            action_bus.handle(),
            Arc::clone(&broker),
            store,
            alerts,
        ));
        router.load(registry.build_all(), &config.strategies)?;
        register_all(&market_bus, &action_bus, Arc::clone(&router));

        Ok(TradingApp {
            config,
            market_bus,
            action_bus,
            router,
            broker,
            feeds: Mutex::new(Vec::new()),
        })
    }

    pub fn router(&self) -> &Arc<StrategyRouter> {
        &self.router
    }

    /// Start both dispatch threads and, when a feed URL is configured, one
    /// book engine task per traded instrument. Feed tasks need a tokio
    /// runtime; without a feed URL this can run outside one.
    pub fn start(&self) {
        self.market_bus.start();
        self.action_bus.start();

        let Some(feed_url) = &self.config.feed_url else {
            tracing::info!("no feed url configured, ticks come from the heartbeat only");
            return;
        };
        let auth = AuthPayload {
            api_key_id: self.config.api_key_id.clone(),
            api_key_secret: self.config.api_key_secret.clone(),
        };
        let mut feeds = self.feeds.lock();
        for code in self.router.active_symbols() {
            let transport = WsTransport::new(format!("{}/{}", feed_url, code.symbol));
            let mut engine =
                BookEngine::new(code.clone(), auth.clone(), transport, self.market_bus.handle());
            tracing::info!("starting book feed for {}", code);
            feeds.push(tokio::spawn(async move {
                engine.run().await;
            }));
        }
    }

    /// One heartbeat: schedule a fill-discovery poll and refresh the ticker
    /// for every traded instrument. All failures are logged; the heartbeat
    /// itself never fails.
    pub fn heartbeat_once(&self) {
        if let Err(e) = self.action_bus.put(Event::CheckOrderStatus) {
            tracing::error!("failed to schedule order status check: {}", e);
        }
        for code in self.router.active_symbols() {
            match self.broker.get_ticker(&code.symbol) {
                Ok(ticker) => {
                    let tick = TickEvent::new(code, ticker.timestamp, ticker.bid, ticker.ask);
                    if let Err(e) = self.market_bus.put(Event::Tick(tick)) {
                        tracing::error!("failed to publish heartbeat tick: {}", e);
                    }
                }
                Err(e) => {
                    tracing::warn!("ticker poll failed for {}: {}", code, e);
                }
            }
        }
    }

    /// Start everything and heartbeat forever.
    pub async fn run(&self) {
        self.start();
        let interval = Duration::from_secs(self.config.heartbeat_secs);
        loop {
            self.heartbeat_once();
            tokio::time::sleep(interval).await;
        }
    }

    /// Tear down feeds and both buses. Queued events are dropped.
    pub fn stop(&self) {
        for feed in self.feeds.lock().drain(..) {
            feed.abort();
        }
        self.market_bus.stop();
        self.action_bus.stop();
    }
}
