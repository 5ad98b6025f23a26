//! Reactive state container.
//!
//! A [`Store`] holds one immutable snapshot of a [`StateShape`] behind an
//! [`Arc`]. Every mutation builds a new value and swaps the pointer, so a
//! snapshot obtained from [`Store::state`] never changes under its holder
//! and can be compared against later snapshots.
//!
//! Subscribers are invoked synchronously, in registration order, after
//! the store lock has been released. A subscriber may therefore read or
//! mutate the store from inside its callback. Failing or panicking
//! subscribers are logged and skipped.
//!
//! Transitions are delivered strictly in the order they were applied.
//! Each one is queued while the store lock is held, and a single thread
//! at a time drains the queue. A mutation made while another delivery is
//! in progress (from a callback, or from another thread) is queued behind
//! it and delivered by the draining thread, so the last change every
//! subscriber sees is the snapshot the store holds.
//!
//! # Contexts
//!
//! Every transition carries an [`UpdateContext`] describing why it
//! happened. Two kinds are reserved: [`UpdateContext::HYDRATE`] for the
//! priming call made by [`Store::subscribe`] and [`UpdateContext::RESET`]
//! for [`Store::reset`].

use std::borrow::Cow;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::subscription::{lock, Subscription};

/// A state value the store can hold.
///
/// `merge` implements the shallow merge used by [`Store::patch`]: every
/// key present in the patch replaces the current value wholesale.
pub trait StateShape: Clone + Send + Sync + 'static {
    /// Partial update with one optional slot per top-level key.
    type Patch: Send;

    /// Build the next state from `self` and `patch`.
    #[must_use]
    fn merge(&self, patch: Self::Patch) -> Self;
}

/// Why a transition happened.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateContext {
    /// Short tag such as `session:init` or `ui:view`.
    pub kind: Cow<'static, str>,
    /// Optional structured details.
    pub fields: Map<String, Value>,
}

impl UpdateContext {
    /// Kind used for the priming call of a new subscriber.
    pub const HYDRATE: &'static str = "hydrate";
    /// Kind used by [`Store::reset`].
    pub const RESET: &'static str = "reset";

    /// A context with no fields.
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Attach a field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// Whether this context has the given kind.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl Default for UpdateContext {
    fn default() -> Self {
        Self::new("update")
    }
}

impl From<&'static str> for UpdateContext {
    fn from(kind: &'static str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for UpdateContext {
    fn from(kind: String) -> Self {
        Self::new(kind)
    }
}

/// A transition delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Change<S> {
    /// The snapshot after the transition.
    pub state: Arc<S>,
    /// The snapshot before it. Present for [`Store::patch`] and
    /// [`Store::update`], absent for wholesale replacements and the
    /// priming call.
    pub previous: Option<Arc<S>>,
    /// Why the transition happened.
    pub context: UpdateContext,
}

impl<S> Change<S> {
    /// Whether the value picked by `select` differs between the previous
    /// and the current snapshot. Always true when there is no previous
    /// snapshot.
    pub fn touched<T: PartialEq>(&self, select: impl Fn(&S) -> T) -> bool {
        self.previous
            .as_ref()
            .is_none_or(|previous| select(previous) != select(&self.state))
    }
}

/// An [`Arc`] compared by pointer identity.
///
/// Selecting a `Shared` from [`Store::derive`] reports a change whenever
/// the selected allocation is replaced, even if the new value is equal.
#[derive(Debug)]
pub struct Shared<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Shared<T> {
    /// Wrap a clone of `value`.
    pub fn of(value: &Arc<T>) -> Self {
        Self(Arc::clone(value))
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

type Subscriber<S> = Arc<dyn Fn(&Change<S>) -> anyhow::Result<()> + Send + Sync>;

struct Entry<S> {
    callback: Subscriber<S>,
    /// Version current when the subscriber joined; older transitions skip it.
    since: u64,
}

struct Subscribers<S> {
    entries: Mutex<BTreeMap<u64, Entry<S>>>,
    next_id: AtomicU64,
}

struct Head<S> {
    state: Arc<S>,
    version: u64,
}

impl<S> Head<S> {
    fn advance(&mut self, state: Arc<S>) -> u64 {
        self.version = self.version.saturating_add(1);
        self.state = state;
        self.version
    }
}

/// A transition waiting to be delivered, to everyone or to one subscriber.
struct Delivery<S> {
    version: u64,
    target: Option<u64>,
    change: Change<S>,
}

struct Outbox<S> {
    pending: VecDeque<Delivery<S>>,
    draining: bool,
}

// Lock order: `head`, then `outbox` or `subscribers.entries`.
struct Inner<S> {
    initial: S,
    head: Mutex<Head<S>>,
    outbox: Mutex<Outbox<S>>,
    subscribers: Arc<Subscribers<S>>,
}

/// Reactive container for a single state value.
///
/// Cloning yields another handle to the same store.
pub struct Store<S: StateShape> {
    inner: Arc<Inner<S>>,
}

impl<S: StateShape> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StateShape> Store<S> {
    /// Create a store holding a copy of `initial`.
    ///
    /// The original is kept so that [`reset`](Self::reset) can restore it.
    pub fn new(initial: S) -> Self {
        let state = Arc::new(initial.clone());
        Self {
            inner: Arc::new(Inner {
                initial,
                head: Mutex::new(Head { state, version: 0 }),
                outbox: Mutex::new(Outbox {
                    pending: VecDeque::new(),
                    draining: false,
                }),
                subscribers: Arc::new(Subscribers {
                    entries: Mutex::new(BTreeMap::new()),
                    next_id: AtomicU64::new(1),
                }),
            }),
        }
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<S> {
        Arc::clone(&lock(&self.inner.head).state)
    }

    /// Replace the state wholesale.
    pub fn set_state(&self, next: S, context: impl Into<UpdateContext>) {
        self.replace(next, context.into());
    }

    /// Shallow-merge `patch` into the current state.
    pub fn patch(&self, patch: S::Patch, context: impl Into<UpdateContext>) {
        self.update(move |_| patch, context);
    }

    /// Shallow-merge the patch computed by `updater` from the current
    /// state.
    ///
    /// `updater` runs while the store is locked: it must not call back
    /// into this store.
    pub fn update<F>(&self, updater: F, context: impl Into<UpdateContext>)
    where
        F: FnOnce(&S) -> S::Patch,
    {
        let context = context.into();
        {
            let mut head = lock(&self.inner.head);
            let previous = Arc::clone(&head.state);
            let state = Arc::new(previous.merge(updater(&previous)));
            let version = head.advance(Arc::clone(&state));
            self.enqueue(Delivery {
                version,
                target: None,
                change: Change {
                    state,
                    previous: Some(previous),
                    context,
                },
            });
        }
        self.drain();
    }

    /// Restore a fresh copy of the initial state.
    pub fn reset(&self) {
        self.replace(
            self.inner.initial.clone(),
            UpdateContext::new(UpdateContext::RESET),
        );
    }

    fn replace(&self, next: S, context: UpdateContext) {
        {
            let mut head = lock(&self.inner.head);
            let state = Arc::new(next);
            let version = head.advance(Arc::clone(&state));
            self.enqueue(Delivery {
                version,
                target: None,
                change: Change {
                    state,
                    previous: None,
                    context,
                },
            });
        }
        self.drain();
    }

    /// Register `callback` for every transition.
    ///
    /// The callback is invoked once with the current snapshot under a
    /// [`UpdateContext::HYDRATE`] context, then for every later transition.
    /// The priming call happens before `subscribe` returns unless a
    /// delivery is already in progress, in which case it is queued behind
    /// the transitions already applied.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change<S>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let subscribers = &self.inner.subscribers;
        let id = subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let head = lock(&self.inner.head);
            lock(&subscribers.entries).insert(
                id,
                Entry {
                    callback: Arc::new(callback),
                    since: head.version,
                },
            );
            self.enqueue(Delivery {
                version: head.version,
                target: Some(id),
                change: Change {
                    state: Arc::clone(&head.state),
                    previous: None,
                    context: UpdateContext::new(UpdateContext::HYDRATE),
                },
            });
        }
        self.drain();

        let registry = Arc::downgrade(subscribers);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock(&registry.entries).remove(&id);
            }
        })
    }

    /// Call `on_change` whenever the value picked by `selector` changes.
    ///
    /// The value selected at registration is the baseline and is never
    /// reported. Values are compared with [`PartialEq`], so selecting an
    /// `Arc<Vec<_>>` compares contents and a reload returning equal data
    /// is not reported. Select a [`Shared`] to compare by identity and
    /// report every replacement of the allocation.
    pub fn derive<T, Sel, F>(&self, selector: Sel, on_change: F) -> Subscription
    where
        T: Clone + PartialEq + Send + 'static,
        Sel: Fn(&S) -> T + Send + Sync + 'static,
        F: Fn(&T, &Arc<S>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let baseline = Mutex::new(selector(&self.state()));
        self.subscribe(move |change| {
            let next = selector(&change.state);
            {
                let mut previous = lock(&baseline);
                if *previous == next {
                    return Ok(());
                }
                *previous = next.clone();
            }
            on_change(&next, &change.state)
        })
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers.entries).len()
    }

    /// Called with `head` locked so the queue follows version order.
    fn enqueue(&self, delivery: Delivery<S>) {
        lock(&self.inner.outbox).pending.push_back(delivery);
    }

    /// Deliver queued transitions unless another call is already doing so.
    fn drain(&self) {
        {
            let mut outbox = lock(&self.inner.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        loop {
            let next = {
                let mut outbox = lock(&self.inner.outbox);
                let next = outbox.pending.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            match next {
                Some(delivery) => self.deliver(&delivery),
                None => return,
            }
        }
    }

    fn deliver(&self, delivery: &Delivery<S>) {
        let entries = &self.inner.subscribers.entries;
        let recipients: Vec<(u64, Subscriber<S>)> = lock(entries)
            .iter()
            .filter(|(id, entry)| match delivery.target {
                Some(target) => **id == target,
                None => entry.since < delivery.version,
            })
            .map(|(id, entry)| (*id, Arc::clone(&entry.callback)))
            .collect();

        for (id, subscriber) in recipients {
            // Skip subscribers cancelled by an earlier callback of this cycle.
            if !lock(entries).contains_key(&id) {
                continue;
            }
            invoke(id, &subscriber, &delivery.change);
        }
    }
}

fn invoke<S>(id: u64, subscriber: &Subscriber<S>, change: &Change<S>) {
    match panic::catch_unwind(AssertUnwindSafe(|| subscriber(change))) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::error!(
                subscriber = id,
                context = %change.context.kind,
                error = %error,
                "Store subscription error"
            );
        }
        Err(_) => {
            tracing::error!(
                subscriber = id,
                context = %change.context.kind,
                "Store subscriber panicked"
            );
        }
    }
}
