//! Synchronous named publish/subscribe hub.
//!
//! Handlers are grouped by channel name and invoked on the emitting
//! thread, in registration order. The handler list is snapshotted when an
//! emission starts: handlers added while it is running are first invoked
//! by the next emission.
//!
//! A handler that returns an error or panics is logged and skipped; the
//! remaining handlers still run and nothing reaches the caller of
//! [`EventBus::emit`].

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use realm_types::RealmEvent;

use crate::subscription::{lock, Subscription};

type Handler<P> = Arc<dyn Fn(&P) -> anyhow::Result<()> + Send + Sync>;

struct Listener<P> {
    id: u64,
    handler: Handler<P>,
}

struct Channels<P> {
    listeners: Mutex<HashMap<String, Vec<Listener<P>>>>,
    next_id: AtomicU64,
}

impl<P> Channels<P> {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, event: &str, id: u64, handler: Handler<P>) {
        lock(&self.listeners)
            .entry(event.to_owned())
            .or_default()
            .push(Listener { id, handler });
    }

    fn remove(&self, event: &str, id: u64) {
        let mut listeners = lock(&self.listeners);
        if let Some(channel) = listeners.get_mut(event) {
            channel.retain(|listener| listener.id != id);
            if channel.is_empty() {
                listeners.remove(event);
            }
        }
    }
}

/// A named publish/subscribe hub carrying payloads of type `P`.
///
/// Cloning yields another handle to the same hub.
pub struct EventBus<P> {
    inner: Arc<Channels<P>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> EventBus<P> {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Channels {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` on `event`.
    ///
    /// The returned handle removes exactly this handler.
    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id();
        self.inner.insert(event, id, Arc::new(handler));
        self.remover(event, id)
    }

    /// Register `handler` on `event` for a single invocation.
    ///
    /// The handler unregisters itself before it runs, so it fires at most
    /// once even if it emits `event` again. Cancelling after it fired is a
    /// no-op.
    pub fn once<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: FnOnce(&P) -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.inner.next_id();
        let slot = Mutex::new(Some(handler));
        let channels = Arc::downgrade(&self.inner);
        let channel = event.to_owned();
        let wrapper = move |payload: &P| {
            let Some(handler) = lock(&slot).take() else {
                return Ok(());
            };
            if let Some(channels) = channels.upgrade() {
                channels.remove(&channel, id);
            }
            handler(payload)
        };
        self.inner.insert(event, id, Arc::new(wrapper));
        self.remover(event, id)
    }

    /// Invoke every handler currently registered on `event` with `payload`.
    ///
    /// Returns the number of handlers invoked. Emitting on a channel with
    /// no handlers is a no-op.
    pub fn emit(&self, event: &str, payload: &P) -> usize {
        let handlers: Vec<Handler<P>> = lock(&self.inner.listeners)
            .get(event)
            .map(|channel| {
                channel
                    .iter()
                    .map(|listener| Arc::clone(&listener.handler))
                    .collect()
            })
            .unwrap_or_default();

        for handler in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::error!(channel = event, error = %error, "Event handler failed");
                }
                Err(_) => {
                    tracing::error!(channel = event, "Event handler panicked");
                }
            }
        }

        handlers.len()
    }

    /// Remove every handler on `event`, or on every channel when `None`.
    pub fn clear(&self, event: Option<&str>) {
        let mut listeners = lock(&self.inner.listeners);
        match event {
            Some(event) => {
                listeners.remove(event);
            }
            None => listeners.clear(),
        }
    }

    /// Number of handlers registered on `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        lock(&self.inner.listeners).get(event).map_or(0, Vec::len)
    }

    fn remover(&self, event: &str, id: u64) -> Subscription {
        let channels = Arc::downgrade(&self.inner);
        let event = event.to_owned();
        Subscription::new(move || {
            if let Some(channels) = channels.upgrade() {
                channels.remove(&event, id);
            }
        })
    }
}

impl EventBus<RealmEvent> {
    /// Emit `event` on the channel it belongs to.
    pub fn publish(&self, event: &RealmEvent) -> usize {
        self.emit(event.name(), event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn push(&self, entry: impl Into<String>) {
            lock(&self.0).push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            lock(&self.0).clone()
        }
    }

    fn tagged(recorder: &Recorder, tag: &'static str) -> impl Fn(&u32) -> anyhow::Result<()> + use<> {
        let recorder = recorder.clone();
        move |payload| {
            recorder.push(format!("{tag}:{payload}"));
            Ok(())
        }
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let _a = bus.on("x", tagged(&seen, "a"));
        let _b = bus.on("x", tagged(&seen, "b"));
        let _c = bus.on("x", tagged(&seen, "c"));

        assert_eq!(bus.emit("x", &7), 3);
        assert_eq!(seen.entries(), vec!["a:7", "b:7", "c:7"]);
    }

    #[test]
    fn failing_handler_does_not_stop_siblings() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let _a = bus.on("x", tagged(&seen, "a"));
        let _b = bus.on("x", |_| Err(anyhow::anyhow!("handler exploded")));
        let _c = bus.on("x", |_: &u32| -> anyhow::Result<()> { panic!("handler panicked") });
        let _d = bus.on("x", tagged(&seen, "d"));

        assert_eq!(bus.emit("x", &1), 4);
        assert_eq!(seen.entries(), vec!["a:1", "d:1"]);
    }

    #[test]
    fn emit_without_handlers_is_a_noop() {
        let bus = EventBus::<u32>::new();
        assert_eq!(bus.emit("nobody-listens", &0), 0);
    }

    #[test]
    fn cancel_removes_exactly_one_handler() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let a = bus.on("x", tagged(&seen, "a"));
        let _b = bus.on("x", tagged(&seen, "b"));

        a.cancel();
        a.cancel();
        bus.emit("x", &2);

        assert_eq!(seen.entries(), vec!["b:2"]);
        assert_eq!(bus.handler_count("x"), 1);
    }

    #[test]
    fn once_fires_at_most_once() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let recorder = seen.clone();
        let sub = bus.once("x", move |payload| {
            recorder.push(format!("once:{payload}"));
            Ok(())
        });

        bus.emit("x", &1);
        bus.emit("x", &2);
        bus.emit("x", &3);
        sub.cancel();

        assert_eq!(seen.entries(), vec!["once:1"]);
        assert_eq!(bus.handler_count("x"), 0);
    }

    #[test]
    fn once_can_be_cancelled_before_firing() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let recorder = seen.clone();
        let sub = bus.once("x", move |_| {
            recorder.push("fired");
            Ok(())
        });
        sub.cancel();
        bus.emit("x", &1);
        assert!(seen.entries().is_empty());
    }

    #[test]
    fn once_reemitting_its_own_event_does_not_recurse() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let recorder = seen.clone();
        let inner_bus = bus.clone();
        let _sub = bus.once("x", move |payload| {
            recorder.push(format!("once:{payload}"));
            inner_bus.emit("x", &99);
            Ok(())
        });

        bus.emit("x", &1);
        assert_eq!(seen.entries(), vec!["once:1"]);
    }

    #[test]
    fn clear_named_channel_removes_its_handlers() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let _a = bus.on("x", tagged(&seen, "a"));
        let _b = bus.on("x", tagged(&seen, "b"));
        let _y = bus.on("y", tagged(&seen, "y"));

        bus.clear(Some("x"));
        bus.emit("x", &1);
        bus.emit("y", &1);

        assert_eq!(seen.entries(), vec!["y:1"]);
    }

    #[test]
    fn clear_all_removes_every_channel() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let _a = bus.on("x", tagged(&seen, "a"));
        let _y = bus.on("y", tagged(&seen, "y"));

        bus.clear(None);
        bus.emit("x", &1);
        bus.emit("y", &1);

        assert!(seen.entries().is_empty());
    }

    #[test]
    fn handler_added_during_emission_waits_for_next_emission() {
        let bus = EventBus::<u32>::new();
        let seen = Recorder::default();
        let late = seen.clone();
        let registering_bus = bus.clone();
        let _registrar = bus.once("x", move |_| {
            let late = late.clone();
            registering_bus.on("x", move |payload| {
                late.push(format!("late:{payload}"));
                Ok(())
            });
            Ok(())
        });

        bus.emit("x", &1);
        assert!(seen.entries().is_empty());
        bus.emit("x", &2);
        assert_eq!(seen.entries(), vec!["late:2"]);
    }

    #[test]
    fn publish_routes_by_event_name() {
        let bus = EventBus::<RealmEvent>::new();
        let seen = Recorder::default();
        let recorder = seen.clone();
        let _sub = bus.on(realm_types::events::ECONOMY_REFRESH, move |event| {
            recorder.push(event.name());
            Ok(())
        });

        assert_eq!(bus.publish(&RealmEvent::EconomyRefresh), 1);
        assert_eq!(bus.publish(&RealmEvent::SessionChanged(None)), 0);
        assert_eq!(seen.entries(), vec!["economy:refresh"]);
    }
}
