//! The [`Revalidator`], tying stores, event channel and fetcher together.
//!
//! All store access of a revalidator is serialized by a single lock around its
//! [`Configuration`]. The lock is only ever held for short, synchronous sections: never across an
//! `.await`, never while listeners run and never while user-provided fetchers or expiration
//! policies are invoked. `mutate_with` updaters are the one exception, they run under the lock so
//! that read-modify-write is atomic.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use parking_lot::Mutex;

use crate::{
    CacheItem, Configuration, Event, EventChannel, EventKind, FetchError, Instant, IntoKeys,
    Listener, Options, ResolveError, StoreKind,
};

mod query;

struct Inner<T, E> {
    config: Mutex<Configuration<T, E>>,
    next_id: AtomicU64,
}

/// An in-memory, key-addressed cache of asynchronously fetched values.
///
/// Values are produced by a [`Fetcher`](crate::Fetcher) and served following stale-while-revalidate
/// semantics: expired values can be served right away while they are refreshed in the background.
/// Concurrent requests for the same key are deduplicated onto one pending [`Resolution`].
///
/// Every state change is published on the configured [`EventChannel`], see [`EventKind`] for the
/// different kinds of events.
///
/// A `Revalidator` is cheap to clone, all clones share the same state.
///
/// [`Resolution`]: crate::Resolution
pub struct Revalidator<T, E = FetchError> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Revalidator<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Revalidator<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revalidator")
            .field("config", &*self.inner.config.lock())
            .finish()
    }
}

impl<T, E> Default for Revalidator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<ResolveError> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Revalidator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<ResolveError> + 'static,
{
    /// Creates a revalidator with the default configuration.
    ///
    /// Without a configured fetcher every resolution fails with [`ResolveError::NoFetcher`].
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Creates a revalidator with the default configuration patched by `options`.
    pub fn with_options(options: Options<T, E>) -> Self {
        let mut config = Configuration::default();
        config.apply(options);

        Self {
            inner: Arc::new(Inner {
                config: Mutex::new(config),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Replaces the parts of the configuration that are set in `options`.
    ///
    /// Operations that are already running keep using the configuration they started with.
    pub fn configure(&self, options: Options<T, E>) {
        self.inner.config.lock().apply(options);
    }

    /// A copy of the current configuration.
    pub fn configuration(&self) -> Configuration<T, E> {
        self.inner.config.lock().clone()
    }

    /// Writes `value` for `key`, bypassing the fetcher.
    ///
    /// Without `expires_at` the value is stale right away, so the next query that does not accept
    /// stale values revalidates it.
    pub fn mutate(&self, key: &str, value: T, expires_at: Option<Instant>) {
        self.mutate_with(key, move |_, _| value, expires_at);
    }

    /// Computes a new value for `key` from the current one and writes it.
    ///
    /// The updater receives the currently cached value and its expiration, if any. It runs while
    /// the revalidator is locked and must not call back into it.
    pub fn mutate_with<F>(&self, key: &str, updater: F, expires_at: Option<Instant>) -> T
    where
        F: FnOnce(Option<&T>, Option<Instant>) -> T,
    {
        let (events, value) = {
            let config = self.inner.config.lock();
            let current = config.items.get(key);
            let value = updater(
                current.as_ref().map(|item| &item.value),
                current.as_ref().map(|item| item.expires_at),
            );
            let expires_at = expires_at.unwrap_or_else(Instant::now);
            config
                .items
                .set(key, CacheItem::new(value.clone(), expires_at));
            (Arc::clone(&config.events), value)
        };

        tracing::trace!(key, "Mutated cached value");
        events.emit(
            &EventKind::Mutated.topic(key),
            &Event::Mutated(value.clone()),
        );
        value
    }

    /// Seeds one or more keys with `value`.
    ///
    /// Without `expires_at` the values are stale right away.
    pub fn hydrate(&self, keys: impl IntoKeys, value: T, expires_at: Option<Instant>) {
        let keys = keys.into_keys();
        let events = {
            let config = self.inner.config.lock();
            let expires_at = expires_at.unwrap_or_else(Instant::now);
            for key in &keys {
                config
                    .items
                    .set(key, CacheItem::new(value.clone(), expires_at));
            }
            Arc::clone(&config.events)
        };

        tracing::trace!(keys = keys.len(), "Hydrated cached values");
        for key in &keys {
            events.emit(
                &EventKind::Hydrated.topic(key),
                &Event::Hydrated(value.clone()),
            );
        }
    }

    /// Removes the cached values of `keys`.
    ///
    /// Pending resolutions are not affected. Keys without a cached value are skipped.
    pub fn forget(&self, keys: impl IntoKeys) {
        self.forget_keys(Some(keys.into_keys()));
    }

    /// Removes all cached values.
    pub fn forget_all(&self) {
        self.forget_keys(None);
    }

    fn forget_keys(&self, keys: Option<Vec<String>>) {
        let (events, forgotten) = {
            let config = self.inner.config.lock();
            let keys = keys.unwrap_or_else(|| config.items.keys());
            let mut forgotten = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(item) = config.items.get(&key) {
                    config.items.delete(&key);
                    forgotten.push((key, item.value));
                }
            }
            (Arc::clone(&config.events), forgotten)
        };

        for (key, value) in forgotten {
            tracing::debug!(key, "Forgot cached value");
            metric!(counter("revalidator.forgotten") += 1);
            events.emit(&EventKind::Forgotten.topic(&key), &Event::Forgotten(value));
        }
    }

    /// Aborts the pending resolutions of `keys`.
    ///
    /// The cancel token handed to the fetcher is signalled with `reason`, and the resolution is
    /// removed so that the next query starts a new one. It is up to the fetcher to fail the
    /// aborted resolution. Keys without a pending resolution are skipped.
    pub fn abort(&self, keys: impl IntoKeys, reason: Option<&str>) {
        self.abort_keys(Some(keys.into_keys()), reason);
    }

    /// Aborts all pending resolutions.
    pub fn abort_all(&self, reason: Option<&str>) {
        self.abort_keys(None, reason);
    }

    fn abort_keys(&self, keys: Option<Vec<String>>, reason: Option<&str>) {
        let (events, aborted) = {
            let config = self.inner.config.lock();
            let keys = keys.unwrap_or_else(|| config.resolvers.keys());
            let mut aborted = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(resolver) = config.resolvers.get(&key) {
                    config.resolvers.delete(&key);
                    aborted.push((key, resolver));
                }
            }
            (Arc::clone(&config.events), aborted)
        };

        // `aborted` has to be published before the fetcher gets a chance to fail
        for (key, resolver) in aborted {
            tracing::debug!(key, id = resolver.id(), reason, "Aborting resolution");
            metric!(counter("revalidator.aborted") += 1);
            events.emit(
                &EventKind::Aborted.topic(&key),
                &Event::Aborted(resolver.resolution.clone()),
            );
            resolver.token.cancel(reason.map(ToOwned::to_owned));
        }
    }

    /// The keys currently present in one of the stores.
    pub fn keys(&self, kind: StoreKind) -> Vec<String> {
        let config = self.inner.config.lock();
        match kind {
            StoreKind::Items => config.items.keys(),
            StoreKind::Resolvers => config.resolvers.keys(),
        }
    }

    /// The instant the cached value of `key` becomes stale.
    pub fn expiration(&self, key: &str) -> Option<Instant> {
        let config = self.inner.config.lock();
        config.items.get(key).map(|item| item.expires_at)
    }

    /// The cached value of `key`, regardless of whether it is stale.
    pub fn snapshot(&self, key: &str) -> Option<T> {
        let config = self.inner.config.lock();
        config.items.get(key).map(|item| item.value)
    }

    /// Calls `listener` for every event of `kind` concerning `key`.
    ///
    /// When subscribing to [`EventKind::Refetching`] while a resolution for `key` is pending, the
    /// listener is called with it right away.
    pub fn subscribe<F>(&self, key: &str, kind: EventKind, listener: F) -> Subscription<T, E>
    where
        F: Fn(&Event<T, E>) + Send + Sync + 'static,
    {
        self.subscribe_listener(key, kind, Arc::new(listener))
    }

    /// Like [`subscribe`](Self::subscribe), for an existing [`Listener`].
    ///
    /// Subscribing the same listener twice to the same key and kind has no effect.
    pub fn subscribe_listener(
        &self,
        key: &str,
        kind: EventKind,
        listener: Listener<Event<T, E>>,
    ) -> Subscription<T, E> {
        let (events, pending) = {
            let config = self.inner.config.lock();
            let pending = match kind {
                EventKind::Refetching => config.resolvers.get(key),
                _ => None,
            };
            (Arc::clone(&config.events), pending)
        };

        let topic = kind.topic(key);
        events.subscribe(&topic, Arc::clone(&listener));
        if let Some(resolver) = pending {
            listener(&Event::Refetching(resolver.resolution));
        }

        Subscription {
            events,
            topic,
            listener,
        }
    }
}

/// A listener registered via [`Revalidator::subscribe`].
///
/// Dropping the subscription keeps the listener registered, call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription<T, E> {
    events: Arc<dyn EventChannel<Event<T, E>>>,
    topic: String,
    listener: Listener<Event<T, E>>,
}

impl<T, E> Subscription<T, E> {
    /// The topic the listener is registered on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Removes the listener from the event channel it was registered on.
    pub fn unsubscribe(self) {
        self.events.unsubscribe(&self.topic, &self.listener);
    }
}

impl<T, E> fmt::Debug for Subscription<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
