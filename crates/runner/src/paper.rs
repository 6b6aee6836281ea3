//! In-process paper broker.
//!
//! Simulates just enough of a venue to exercise the full order path:
//! tickers follow a random walk, market orders complete immediately at the
//! last mid price, limit orders rest until cancelled.

use chrono::Utc;
use kestrel_core::Side;
use kestrel_strategy::{
    BrokerError, BrokerGateway, LimitOrderParams, MarketOrderParams, VenueOrder, VenueOrderStatus,
    VenueTicker,
};
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

const STARTING_MID: Decimal = dec!(100);
/// Half-spread as a fraction of mid.
const HALF_SPREAD: Decimal = dec!(0.0005);

pub struct PaperBroker {
    /// Last mid price per pair, seeded lazily on first ticker request.
    mids: Mutex<HashMap<String, Decimal>>,
    /// Orders keyed by client order id.
    orders: Mutex<HashMap<String, VenueOrder>>,
    next_id: AtomicU64,
}

impl PaperBroker {
    pub fn new() -> Self {
        PaperBroker {
            mids: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Seed the mid price for a pair instead of the default.
    pub fn set_mid(&self, pair: &str, mid: Decimal) {
        self.mids.lock().insert(pair.to_string(), mid);
    }

    fn venue_order_id(&self) -> String {
        format!("P{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Walk the mid by up to ±10 basis points.
    fn walk(&self, pair: &str) -> Decimal {
        let mut mids = self.mids.lock();
        let mid = mids.entry(pair.to_string()).or_insert(STARTING_MID);
        let bps: i64 = rand::thread_rng().gen_range(-10..=10);
        *mid *= Decimal::ONE + Decimal::new(bps, 4);
        *mid
    }

    fn last_mid(&self, pair: &str) -> Result<Decimal, BrokerError> {
        self.mids
            .lock()
            .get(pair)
            .copied()
            .ok_or_else(|| BrokerError::Request(format!("no price observed for {pair}")))
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerGateway for PaperBroker {
    fn get_ticker(&self, pair: &str) -> Result<VenueTicker, BrokerError> {
        let mid = self.walk(pair);
        Ok(VenueTicker {
            timestamp: Utc::now(),
            bid: mid * (Decimal::ONE - HALF_SPREAD),
            ask: mid * (Decimal::ONE + HALF_SPREAD),
        })
    }

    fn place_market_order(&self, params: MarketOrderParams) -> Result<String, BrokerError> {
        let mid = self.last_mid(&params.pair)?;
        let (base, counter) = match params.side {
            Side::Buy => {
                let counter = params.counter_volume.ok_or_else(|| {
                    BrokerError::Rejected("market buy needs counter volume".to_string())
                })?;
                (counter / mid, counter)
            }
            Side::Sell => {
                let base = params.base_volume.ok_or_else(|| {
                    BrokerError::Rejected("market sell needs base volume".to_string())
                })?;
                (base, base * mid)
            }
        };
        let venue_order_id = self.venue_order_id();
        let now = Utc::now();
        self.orders.lock().insert(
            params.client_order_id,
            VenueOrder {
                venue_order_id: venue_order_id.clone(),
                status: VenueOrderStatus::Complete,
                base,
                counter,
                fee_base: Decimal::ZERO,
                created_at: now,
                completed_at: Some(now),
            },
        );
        Ok(venue_order_id)
    }

    fn place_limit_order(&self, params: LimitOrderParams) -> Result<String, BrokerError> {
        let venue_order_id = self.venue_order_id();
        self.orders.lock().insert(
            params.client_order_id,
            VenueOrder {
                venue_order_id: venue_order_id.clone(),
                status: VenueOrderStatus::Pending,
                base: Decimal::ZERO,
                counter: Decimal::ZERO,
                fee_base: Decimal::ZERO,
                created_at: Utc::now(),
                completed_at: None,
            },
        );
        Ok(venue_order_id)
    }

    fn get_order(&self, client_order_id: &str) -> Result<VenueOrder, BrokerError> {
        self.orders
            .lock()
            .get(client_order_id)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownOrder(client_order_id.to_string()))
    }

    fn cancel_order(&self, venue_order_id: &str) -> Result<(), BrokerError> {
        let mut orders = self.orders.lock();
        let order = orders
            .values_mut()
            .find(|o| o.venue_order_id == venue_order_id)
            .ok_or_else(|| BrokerError::UnknownOrder(venue_order_id.to_string()))?;
        order.status = VenueOrderStatus::Complete;
        order.completed_at = Some(Utc::now());
        Ok(())
    }
}
