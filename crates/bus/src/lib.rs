//! Typed event bus.
//!
//! A bus owns a FIFO queue and a dedicated dispatch thread. Handlers are
//! registered per [`EventKind`] and invoked synchronously on the dispatch
//! thread, in registration order. The system runs two independent buses -
//! one for market data, one for orders/fills/status checks - so tick
//! throughput cannot be starved by order processing or vice versa.
//!
//! A failing handler never kills the loop: the failure is logged and
//! counted, and dispatch continues with the next handler.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use kestrel_core::{Event, EventKind};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// How long the dispatch loop blocks on the queue before re-checking the
/// running flag.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum BusError {
    /// The bus has been stopped and its queue torn down.
    #[error("bus `{0}` is closed")]
    Closed(String),
}

/// Boxed error type for handler failures.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A handler for one kind of event.
///
/// `name()` identifies the handler for idempotent registration and removal.
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Cheap cloneable producer handle for a bus.
///
/// Components that only publish (the book engine, the router's fill
/// discovery) hold one of these instead of the full bus.
#[derive(Clone)]
pub struct BusHandle {
    name: Arc<String>,
    tx: Sender<Event>,
}

impl BusHandle {
    /// Enqueue an event. Non-blocking and thread-safe.
    pub fn put(&self, event: Event) -> Result<(), BusError> {
        self.tx
            .send(event)
            .map_err(|_| BusError::Closed(self.name.as_ref().clone()))
    }
}

type HandlerMap = HashMap<EventKind, Vec<Arc<dyn EventHandler>>>;

/// A FIFO event queue with per-kind handlers and a dedicated dispatch thread.
pub struct EventBus {
    name: Arc<String>,
    tx: Sender<Event>,
    /// Taken by the dispatch thread on `start`.
    rx: Mutex<Option<Receiver<Event>>>,
    handlers: Arc<RwLock<HandlerMap>>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    failures: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, rx) = unbounded();
        EventBus {
            name: Arc::new(name.into()),
            tx,
            rx: Mutex::new(Some(rx)),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Producer handle for this bus.
    pub fn handle(&self) -> BusHandle {
        BusHandle {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
        }
    }

    /// Enqueue an event. Non-blocking and thread-safe; events enqueued
    /// before `start` are dispatched once the loop is running.
    pub fn put(&self, event: Event) -> Result<(), BusError> {
        self.tx
            .send(event)
            .map_err(|_| BusError::Closed(self.name.as_ref().clone()))
    }

    /// Register a handler for an event kind.
    ///
    /// Idempotent: registering a handler whose name is already present for
    /// that kind is a no-op. Dispatch order equals registration order.
    pub fn register_handler(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write();
        let slot = handlers.entry(kind).or_default();
        if slot.iter().any(|h| h.name() == handler.name()) {
            tracing::debug!(
                "bus `{}`: handler `{}` already registered for {:?}",
                self.name,
                handler.name(),
                kind
            );
            return;
        }
        slot.push(handler);
    }

    /// Remove one handler by name. No-op if absent.
    pub fn unregister_handler(&self, kind: EventKind, name: &str) {
        let mut handlers = self.handlers.write();
        if let Some(slot) = handlers.get_mut(&kind) {
            slot.retain(|h| h.name() != name);
        }
    }

    /// Number of handler invocations that returned an error since start.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Spawn the dispatch thread. Calling `start` twice is a no-op.
    pub fn start(&self) {
        let Some(rx) = self.rx.lock().take() else {
            tracing::warn!("bus `{}` already started", self.name);
            return;
        };
        self.running.store(true, Ordering::SeqCst);

        let name = Arc::clone(&self.name);
        let handlers = Arc::clone(&self.handlers);
        let running = Arc::clone(&self.running);
        let failures = Arc::clone(&self.failures);

        let handle = std::thread::Builder::new()
            .name(format!("bus-{}", self.name))
            .spawn(move || dispatch_loop(&name, rx, handlers, running, failures))
            .expect("failed to spawn bus dispatch thread");
        *self.thread.lock() = Some(handle);
    }

    /// Signal the loop to stop and wait for it to exit. The loop finishes
    /// its current bounded wait first; there is no mid-dispatch cancellation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("bus `{}` dispatch thread panicked", self.name);
            }
        }
    }
}

fn dispatch_loop(
    name: &str,
    rx: Receiver<Event>,
    handlers: Arc<RwLock<HandlerMap>>,
    running: Arc<AtomicBool>,
    failures: Arc<AtomicU64>,
) {
    tracing::info!("bus `{}` dispatch loop started", name);
    while running.load(Ordering::SeqCst) {
        let event = match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Snapshot the handler list so handlers can (un)register without
        // holding the lock across dispatch.
        let kind = event.kind();
        let snapshot: Vec<Arc<dyn EventHandler>> =
            handlers.read().get(&kind).cloned().unwrap_or_default();

        for handler in snapshot {
            if let Err(e) = handler.handle(&event) {
                failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "bus `{}`: handler `{}` failed on {:?}: {}",
                    name,
                    handler.name(),
                    kind,
                    e
                );
            }
        }
    }
    tracing::info!("bus `{}` dispatch loop stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kestrel_core::{CompositeCode, TickEvent};
    use rust_decimal_macros::dec;
    use std::time::Instant;

    struct Recorder {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
        tag: String,
        fail: bool,
    }

    impl Recorder {
        fn new(name: &str, seen: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Recorder {
                name: name.to_string(),
                seen,
                tag: name.to_string(),
                fail: false,
            })
        }

        fn failing(name: &str, seen: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Recorder {
                name: name.to_string(),
                seen,
                tag: name.to_string(),
                fail: true,
            })
        }
    }

    impl EventHandler for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle(&self, event: &Event) -> Result<(), HandlerError> {
            if self.fail {
                return Err("boom".into());
            }
            let label = match event {
                Event::Tick(t) => format!("{}:{}", self.tag, t.symbol),
                other => format!("{}:{:?}", self.tag, other.kind()),
            };
            self.seen.lock().push(label);
            Ok(())
        }
    }

    fn tick(symbol: &str) -> Event {
        let code = CompositeCode::new(symbol, "luno");
        Event::Tick(TickEvent::new(code, Utc::now(), dec!(100), dec!(101)))
    }

    fn wait_until(deadline_ms: u64, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(deadline_ms);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_fifo_delivery_in_registration_order() {
        let bus = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_handler(EventKind::Tick, Recorder::new("a", Arc::clone(&seen)));
        bus.register_handler(EventKind::Tick, Recorder::new("b", Arc::clone(&seen)));
        bus.start();

        bus.put(tick("ETHMYR")).unwrap();
        bus.put(tick("XBTMYR")).unwrap();

        assert!(wait_until(2000, || seen.lock().len() == 4));
        assert_eq!(
            *seen.lock(),
            vec!["a:ETHMYR", "b:ETHMYR", "a:XBTMYR", "b:XBTMYR"]
        );
        bus.stop();
    }

    #[test]
    fn test_registration_is_idempotent() {
        let bus = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = Recorder::new("a", Arc::clone(&seen));
        bus.register_handler(EventKind::Tick, Arc::clone(&handler) as Arc<dyn EventHandler>);
        bus.register_handler(EventKind::Tick, handler);
        bus.start();

        bus.put(tick("ETHMYR")).unwrap();
        assert!(wait_until(2000, || !seen.lock().is_empty()));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(seen.lock().len(), 1);
        bus.stop();
    }

    #[test]
    fn test_unregister_removes_exactly_one() {
        let bus = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_handler(EventKind::Tick, Recorder::new("a", Arc::clone(&seen)));
        bus.register_handler(EventKind::Tick, Recorder::new("b", Arc::clone(&seen)));
        bus.unregister_handler(EventKind::Tick, "a");
        bus.start();

        bus.put(tick("ETHMYR")).unwrap();
        assert!(wait_until(2000, || !seen.lock().is_empty()));
        assert_eq!(*seen.lock(), vec!["b:ETHMYR"]);
        bus.stop();
    }

    #[test]
    fn test_handler_failure_keeps_loop_alive_and_is_counted() {
        let bus = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_handler(EventKind::Tick, Recorder::failing("bad", Arc::clone(&seen)));
        bus.register_handler(EventKind::Tick, Recorder::new("good", Arc::clone(&seen)));
        bus.start();

        bus.put(tick("ETHMYR")).unwrap();
        bus.put(tick("XBTMYR")).unwrap();

        assert!(wait_until(2000, || seen.lock().len() == 2));
        assert_eq!(*seen.lock(), vec!["good:ETHMYR", "good:XBTMYR"]);
        assert_eq!(bus.failure_count(), 2);
        bus.stop();
    }

    #[test]
    fn test_handlers_only_receive_their_kind() {
        let bus = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_handler(EventKind::CheckOrderStatus, Recorder::new("s", Arc::clone(&seen)));
        bus.start();

        bus.put(tick("ETHMYR")).unwrap();
        bus.put(Event::CheckOrderStatus).unwrap();

        assert!(wait_until(2000, || !seen.lock().is_empty()));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(*seen.lock(), vec!["s:CheckOrderStatus"]);
        bus.stop();
    }

    #[test]
    fn test_events_enqueued_before_start_are_dispatched() {
        let bus = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_handler(EventKind::Tick, Recorder::new("a", Arc::clone(&seen)));

        bus.put(tick("ETHMYR")).unwrap();
        bus.start();

        assert!(wait_until(2000, || !seen.lock().is_empty()));
        bus.stop();
    }

    #[test]
    fn test_handle_publishes_to_same_queue() {
        let bus = EventBus::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_handler(EventKind::Tick, Recorder::new("a", Arc::clone(&seen)));
        bus.start();

        let handle = bus.handle();
        handle.put(tick("ETHMYR")).unwrap();

        assert!(wait_until(2000, || !seen.lock().is_empty()));
        bus.stop();
    }
}
