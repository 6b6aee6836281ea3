//! Connection state machine for one instrument's book feed.
//!
//! One engine per tracked instrument, each in its own task. The engine
//! authenticates, swallows the initial snapshot, then applies diffs until
//! the stream desynchronizes or the transport fails, at which point it
//! drops all book state and reconnects. Connect attempts are throttled by a
//! minimum backoff interval; the wait is computed and slept explicitly
//! rather than signalled through an error.

use crate::book::OrderBook;
use crate::view::{BookView, DEFAULT_DEPTH};
use crate::wire::{AuthPayload, SnapshotMessage, UpdateMessage};
use async_trait::async_trait;
use chrono::Utc;
use kestrel_bus::BusHandle;
use kestrel_core::{CompositeCode, Event, TickEvent};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("stream closed")]
    Closed,
}

/// Persistent streaming connection to one instrument's diff feed.
///
/// `connect` performs the whole handshake: open, authenticate, and return
/// the mandatory initial snapshot. `next_update` blocks until the next diff
/// (`None` for keepalives that carry no payload).
#[async_trait]
pub trait BookTransport: Send {
    async fn connect(&mut self, auth: &AuthPayload) -> Result<SnapshotMessage, TransportError>;

    async fn next_update(&mut self) -> Result<Option<UpdateMessage>, TransportError>;
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct BookEngineConfig {
    /// Depth for the derived signals.
    pub depth: usize,
    /// Minimum interval between connection attempts.
    pub min_backoff: Duration,
}

impl Default for BookEngineConfig {
    fn default() -> Self {
        BookEngineConfig {
            depth: DEFAULT_DEPTH,
            min_backoff: Duration::from_secs(10),
        }
    }
}

/// Connection lifecycle. Terminal only when the owning task is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Synced,
    Reconnecting,
}

impl ConnectionState {
    pub fn is_synced(&self) -> bool {
        matches!(self, ConnectionState::Synced)
    }
}

/// Order-book reconstruction engine for one instrument.
pub struct BookEngine<T: BookTransport> {
    code: CompositeCode,
    auth: AuthPayload,
    transport: T,
    config: BookEngineConfig,
    book: OrderBook,
    state: ConnectionState,
    last_attempt: Option<Instant>,
    ticks: BusHandle,
}

impl<T: BookTransport> BookEngine<T> {
    pub fn new(code: CompositeCode, auth: AuthPayload, transport: T, ticks: BusHandle) -> Self {
        Self::with_config(code, auth, transport, ticks, BookEngineConfig::default())
    }

    pub fn with_config(
        code: CompositeCode,
        auth: AuthPayload,
        transport: T,
        ticks: BusHandle,
        config: BookEngineConfig,
    ) -> Self {
        BookEngine {
            code,
            auth,
            transport,
            config,
            book: OrderBook::new(),
            state: ConnectionState::Disconnected,
            last_attempt: None,
            ticks,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn view(&self) -> BookView {
        self.book.view()
    }

    /// Mid price of the current consolidated view.
    pub fn mid_price(&self) -> Option<rust_decimal::Decimal> {
        self.view().mid_price()
    }

    /// VAMP at the configured depth.
    pub fn vamp(&self) -> Option<rust_decimal::Decimal> {
        self.view().vamp(self.config.depth)
    }

    /// Order imbalance at the configured depth.
    pub fn imbalance(&self) -> Option<rust_decimal::Decimal> {
        self.view().imbalance(self.config.depth)
    }

    /// Run until the owning task is aborted: connect, stream, resync, repeat.
    pub async fn run(&mut self) {
        loop {
            self.run_once().await;
        }
    }

    /// One connect-stream-teardown cycle.
    async fn run_once(&mut self) {
        match self.connect().await {
            Ok(()) => self.stream().await,
            Err(e) => {
                tracing::warn!("book {}: connect failed: {}", self.code, e);
            }
        }
        self.state = ConnectionState::Reconnecting;
        self.book.clear();
    }

    /// Throttled connect: honor the minimum backoff since the previous
    /// attempt, authenticate, and install the initial snapshot atomically.
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.state = ConnectionState::Connecting;
        if let Some(last) = self.last_attempt {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_backoff {
                let wait = self.config.min_backoff - elapsed;
                tracing::info!(
                    "book {}: throttling reconnect, waiting {:?}",
                    self.code,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
        }
        self.last_attempt = Some(Instant::now());

        let snapshot = self.transport.connect(&self.auth).await?;
        self.book.apply_snapshot(&snapshot);
        self.state = ConnectionState::Synced;
        tracing::info!(
            "book {}: synced at sequence {}",
            self.code,
            self.book.sequence()
        );
        self.publish_tick();
        Ok(())
    }

    /// Apply diffs until a sequence gap or transport failure.
    async fn stream(&mut self) {
        loop {
            match self.transport.next_update().await {
                Ok(Some(update)) => match self.book.apply(&update) {
                    Ok(trades) => {
                        for trade in &trades {
                            tracing::debug!(
                                "book {}: trade {:?} {} @ {}",
                                self.code,
                                trade.origin,
                                trade.base,
                                trade.price
                            );
                        }
                        self.publish_tick();
                    }
                    Err(gap) => {
                        tracing::warn!("book {}: {}, resynchronizing", self.code, gap);
                        return;
                    }
                },
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("book {}: transport error: {}, reconnecting", self.code, e);
                    return;
                }
            }
        }
    }

    /// Publish the consolidated top of book as a tick on the market-data
    /// bus. Skipped while either side is empty.
    fn publish_tick(&self) {
        let view = self.book.view();
        let (Some(bid), Some(ask)) = (view.best_bid(), view.best_ask()) else {
            return;
        };
        let tick = TickEvent::new(self.code.clone(), Utc::now(), bid.price, ask.price)
            .with_sizes(bid.volume, ask.volume);
        if let Err(e) = self.ticks.put(Event::Tick(tick)) {
            tracing::warn!("book {}: dropping tick: {}", self.code, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{CreateUpdate, WireOrder, WireSide};
    use kestrel_bus::EventBus;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted transport: a queue of connect results and a queue of
    /// streamed updates, shared across reconnects.
    struct ScriptedTransport {
        snapshots: VecDeque<SnapshotMessage>,
        updates: VecDeque<Result<Option<UpdateMessage>, TransportError>>,
        connects: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        fn new(
            snapshots: Vec<SnapshotMessage>,
            updates: Vec<Result<Option<UpdateMessage>, TransportError>>,
        ) -> (Self, Arc<AtomicUsize>) {
            let connects = Arc::new(AtomicUsize::new(0));
            (
                ScriptedTransport {
                    snapshots: snapshots.into(),
                    updates: updates.into(),
                    connects: Arc::clone(&connects),
                },
                connects,
            )
        }
    }

    #[async_trait]
    impl BookTransport for ScriptedTransport {
        async fn connect(&mut self, _auth: &AuthPayload) -> Result<SnapshotMessage, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.snapshots
                .pop_front()
                .ok_or_else(|| TransportError::Connection("script exhausted".to_string()))
        }

        async fn next_update(&mut self) -> Result<Option<UpdateMessage>, TransportError> {
            self.updates.pop_front().unwrap_or(Err(TransportError::Closed))
        }
    }

    fn auth() -> AuthPayload {
        AuthPayload {
            api_key_id: "key".to_string(),
            api_key_secret: "secret".to_string(),
        }
    }

    fn code() -> CompositeCode {
        CompositeCode::new("ETHMYR", "luno")
    }

    fn snapshot(sequence: u64) -> SnapshotMessage {
        SnapshotMessage {
            sequence,
            bids: vec![WireOrder::new("b1", dec!(100), dec!(1))],
            asks: vec![WireOrder::new("a1", dec!(101), dec!(1))],
        }
    }

    fn fast_config() -> BookEngineConfig {
        BookEngineConfig {
            depth: DEFAULT_DEPTH,
            min_backoff: Duration::from_millis(0),
        }
    }

    fn engine_with(
        transport: ScriptedTransport,
        bus: &EventBus,
    ) -> BookEngine<ScriptedTransport> {
        BookEngine::with_config(code(), auth(), transport, bus.handle(), fast_config())
    }

    #[tokio::test]
    async fn test_connect_installs_snapshot_and_publishes_tick() {
        let bus = EventBus::new("mkt");
        let (transport, _) = ScriptedTransport::new(vec![snapshot(10)], vec![]);
        let mut engine = engine_with(transport, &bus);

        engine.connect().await.unwrap();
        assert!(engine.state().is_synced());
        assert_eq!(engine.book().sequence(), 10);
        assert_eq!(engine.mid_price(), Some(dec!(100.5)));
    }

    #[tokio::test]
    async fn test_sequence_gap_forces_full_resync() {
        let bus = EventBus::new("mkt");
        let mut create = UpdateMessage::empty(11);
        create.create_update = Some(CreateUpdate {
            order_id: "b2".to_string(),
            side: WireSide::Bid,
            price: dec!(99),
            volume: dec!(2),
        });
        let (transport, connects) = ScriptedTransport::new(
            vec![snapshot(10), snapshot(50)],
            vec![
                Ok(Some(create)),
                // Gap: 13 instead of 12.
                Ok(Some(UpdateMessage::empty(13))),
            ],
        );
        let mut engine = engine_with(transport, &bus);

        engine.run_once().await;
        assert_eq!(engine.state(), ConnectionState::Reconnecting);
        assert!(engine.book().is_empty());

        engine.run_once().await;
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(engine.book().sequence(), 0); // cleared again after Closed
    }

    #[tokio::test]
    async fn test_resync_book_reflects_second_snapshot() {
        let bus = EventBus::new("mkt");
        let (transport, _) = ScriptedTransport::new(
            vec![snapshot(10), snapshot(50)],
            vec![Ok(Some(UpdateMessage::empty(99)))],
        );
        let mut engine = engine_with(transport, &bus);

        engine.run_once().await; // gap at first update
        engine.connect().await.unwrap();
        assert_eq!(engine.book().sequence(), 50);
        assert!(engine.state().is_synced());
    }

    #[tokio::test]
    async fn test_transport_error_triggers_reconnect() {
        let bus = EventBus::new("mkt");
        let (transport, connects) = ScriptedTransport::new(
            vec![snapshot(10), snapshot(20)],
            vec![Err(TransportError::Connection("reset".to_string()))],
        );
        let mut engine = engine_with(transport, &bus);

        engine.run_once().await;
        engine.run_once().await;
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backoff_enforced_between_attempts() {
        let bus = EventBus::new("mkt");
        let (transport, _) = ScriptedTransport::new(vec![snapshot(1), snapshot(2)], vec![]);
        let mut engine = BookEngine::with_config(
            code(),
            auth(),
            transport,
            bus.handle(),
            BookEngineConfig {
                depth: DEFAULT_DEPTH,
                min_backoff: Duration::from_millis(80),
            },
        );

        let started = Instant::now();
        engine.connect().await.unwrap();
        engine.connect().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    struct Capture(Arc<std::sync::Mutex<Vec<Event>>>);

    impl kestrel_bus::EventHandler for Capture {
        fn name(&self) -> &str {
            "capture"
        }
        fn handle(&self, event: &Event) -> Result<(), kestrel_bus::HandlerError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_applied_updates_publish_ticks_to_bus() {
        let bus = EventBus::new("mkt");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        bus.register_handler(
            kestrel_core::EventKind::Tick,
            Arc::new(Capture(Arc::clone(&seen))),
        );
        bus.start();

        let (transport, _) = ScriptedTransport::new(
            vec![snapshot(10)],
            vec![Ok(Some(UpdateMessage::empty(11))), Ok(None)],
        );
        let mut engine = engine_with(transport, &bus);
        engine.run_once().await;

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while std::time::Instant::now() < deadline {
            if seen.lock().unwrap().len() >= 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        // One tick from the snapshot, one from the applied diff.
        assert!(seen.lock().unwrap().len() >= 2);
        bus.stop();
    }
}
