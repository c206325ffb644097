//! In-process publish/subscribe fan-out of [`SyncEvent`]s.
//!
//! Delivery is synchronous and in subscription order. The bus does not
//! deduplicate: every physical message is delivered once per handler, and
//! idempotency is the reducers' concern. A handler that panics is isolated;
//! the panic is logged and the remaining handlers still run.
//!
//! # Example
//!
//! ```
//! use goban_sync::bus::EventBus;
//! use goban_sync::channel::ChannelId;
//! use goban_sync::event::{EventName, SyncEvent};
//!
//! let bus = EventBus::new();
//! let sub = bus.on(EventName::Connect, |event| {
//!     println!("connected: {}", event.channel());
//! });
//! bus.publish(&SyncEvent::Connected { channel: ChannelId::Lobby });
//! sub.unsubscribe();
//! assert_eq!(bus.listener_count(EventName::Connect), 0);
//! ```

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::event::{EventName, SyncEvent};

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_name: HashMap<EventName, Vec<(HandlerId, Handler)>>,
}

/// Cheap-to-clone handle to a shared set of listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Listeners>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`. Keep the returned [`Subscription`] to
    /// remove it later.
    pub fn on<F>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.lock();
        let id = HandlerId(listeners.next_id);
        listeners.next_id += 1;
        listeners
            .by_name
            .entry(name)
            .or_default()
            .push((id, Arc::new(handler)));
        debug!(event = %name, ?id, "handler subscribed");
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            name,
            id,
        }
    }

    /// Remove a handler. Unknown ids are ignored.
    pub fn off(&self, name: EventName, id: HandlerId) {
        remove(&self.listeners, name, id);
    }

    /// Deliver `event` to every handler subscribed to its name.
    pub fn publish(&self, event: &SyncEvent) {
        let name = event.name();
        // Snapshot so handlers can (un)subscribe while being called.
        let handlers: Vec<(HandlerId, Handler)> = self
            .lock()
            .by_name
            .get(&name)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(event = %name, channel = %event.channel(), "no handlers registered");
            return;
        }

        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(event = %name, ?id, "event handler panicked; continuing delivery");
            }
        }
    }

    /// Number of handlers currently registered for `name`.
    pub fn listener_count(&self, name: EventName) -> usize {
        self.lock().by_name.get(&name).map_or(0, Vec::len)
    }

    /// Forward every event named in `names` into an async stream.
    ///
    /// The handlers are removed when the stream is dropped.
    pub fn stream(&self, names: &[EventName]) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriptions = names
            .iter()
            .map(|&name| {
                let tx = tx.clone();
                self.on(name, move |event| {
                    // Receiver gone means the stream is being torn down.
                    let _ = tx.send(event.clone());
                })
            })
            .collect();
        EventStream {
            rx,
            subscriptions,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.lock();
        let total: usize = listeners.by_name.values().map(Vec::len).sum();
        f.debug_struct("EventBus").field("handlers", &total).finish()
    }
}

fn remove(listeners: &Mutex<Listeners>, name: EventName, id: HandlerId) {
    let mut listeners = listeners.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handlers) = listeners.by_name.get_mut(&name) {
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        if handlers.len() != before {
            debug!(event = %name, ?id, "handler unsubscribed");
        }
    }
}

/// Handle returned by [`EventBus::on`].
///
/// Dropping it does **not** unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe).
#[derive(Debug)]
#[must_use = "dropping a Subscription leaves the handler registered forever"]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    name: EventName,
    id: HandlerId,
}

impl Subscription {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn name(&self) -> EventName {
        self.name
    }

    /// Remove the handler. A no-op if the bus is already gone.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            remove(&listeners, self.name, self.id);
        }
    }
}

/// Async view over a set of event names. See [`EventBus::stream`].
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<SyncEvent>,
    subscriptions: Vec<Subscription>,
}

impl EventStream {
    /// Next event, or `None` once the stream has been closed.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
    }
}
