use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::{
    CacheItem, Emitter, Event, EventChannel, Fetcher, MemoryStore, MissingFetcher, ResolveError,
    Resolver, Store,
};

/// Computes how long a freshly resolved value stays fresh.
pub type Expiration<T> = Arc<dyn Fn(&T) -> Duration + Send + Sync>;

/// An [`Expiration`] that keeps every value fresh for `duration`.
pub fn expire_after<T: 'static>(duration: Duration) -> Expiration<T> {
    Arc::new(move |_: &T| duration)
}

/// The complete, current policy of a [`Revalidator`](crate::Revalidator).
///
/// Every operation captures a copy of this when it starts, so swapping any part of it via
/// [`configure`](crate::Revalidator::configure) only affects operations started afterwards.
pub struct Configuration<T, E> {
    pub items: Arc<dyn Store<CacheItem<T>>>,
    pub resolvers: Arc<dyn Store<Resolver<T, E>>>,
    pub events: Arc<dyn EventChannel<Event<T, E>>>,
    pub expiration: Expiration<T>,
    pub fetcher: Arc<dyn Fetcher<T, E>>,
    /// Serve expired values while refreshing them in the background.
    pub stale: bool,
    /// Evict the cached value when a refresh fails.
    pub remove_on_error: bool,
    /// Always refresh, ignoring cached values.
    pub fresh: bool,
}

impl<T, E> Configuration<T, E> {
    /// Replaces every field that is set in `options`.
    pub fn apply(&mut self, options: Options<T, E>) {
        let Options {
            items,
            resolvers,
            events,
            expiration,
            fetcher,
            stale,
            remove_on_error,
            fresh,
        } = options;

        if let Some(items) = items {
            self.items = items;
        }
        if let Some(resolvers) = resolvers {
            self.resolvers = resolvers;
        }
        if let Some(events) = events {
            self.events = events;
        }
        if let Some(expiration) = expiration {
            self.expiration = expiration;
        }
        if let Some(fetcher) = fetcher {
            self.fetcher = fetcher;
        }
        if let Some(stale) = stale {
            self.stale = stale;
        }
        if let Some(remove_on_error) = remove_on_error {
            self.remove_on_error = remove_on_error;
        }
        if let Some(fresh) = fresh {
            self.fresh = fresh;
        }
    }

    /// Applies per-call overrides on top of this configuration.
    pub(crate) fn override_with(&mut self, options: QueryOptions<T, E>) {
        let QueryOptions {
            expiration,
            fetcher,
            stale,
            remove_on_error,
            fresh,
        } = options;

        self.apply(Options {
            expiration,
            fetcher,
            stale,
            remove_on_error,
            fresh,
            ..Options::default()
        });
    }
}

impl<T, E> Default for Configuration<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<ResolveError> + 'static,
{
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            items: Arc::new(MemoryStore::new()),
            resolvers: Arc::new(MemoryStore::new()),
            events: Arc::new(Emitter::new()),
            expiration: expire_after(defaults.expiration),
            fetcher: Arc::new(MissingFetcher),
            stale: defaults.stale,
            remove_on_error: defaults.remove_on_error,
            fresh: defaults.fresh,
        }
    }
}

impl<T, E> Clone for Configuration<T, E> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            resolvers: Arc::clone(&self.resolvers),
            events: Arc::clone(&self.events),
            expiration: Arc::clone(&self.expiration),
            fetcher: Arc::clone(&self.fetcher),
            stale: self.stale,
            remove_on_error: self.remove_on_error,
            fresh: self.fresh,
        }
    }
}

impl<T, E> fmt::Debug for Configuration<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("stale", &self.stale)
            .field("remove_on_error", &self.remove_on_error)
            .field("fresh", &self.fresh)
            .finish_non_exhaustive()
    }
}

/// A partial [`Configuration`]: fields left unset keep their previous value.
pub struct Options<T, E> {
    items: Option<Arc<dyn Store<CacheItem<T>>>>,
    resolvers: Option<Arc<dyn Store<Resolver<T, E>>>>,
    events: Option<Arc<dyn EventChannel<Event<T, E>>>>,
    expiration: Option<Expiration<T>>,
    fetcher: Option<Arc<dyn Fetcher<T, E>>>,
    stale: Option<bool>,
    remove_on_error: Option<bool>,
    fresh: Option<bool>,
}

impl<T, E> Default for Options<T, E> {
    fn default() -> Self {
        Self {
            items: None,
            resolvers: None,
            events: None,
            expiration: None,
            fetcher: None,
            stale: None,
            remove_on_error: None,
            fresh: None,
        }
    }
}

impl<T: 'static, E: 'static> Options<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: Store<CacheItem<T>> + 'static,
    {
        self.items = Some(store);
        self
    }

    pub fn resolvers_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: Store<Resolver<T, E>> + 'static,
    {
        self.resolvers = Some(store);
        self
    }

    pub fn event_channel<C>(mut self, channel: Arc<C>) -> Self
    where
        C: EventChannel<Event<T, E>> + 'static,
    {
        self.events = Some(channel);
        self
    }

    pub fn expiration<F>(mut self, expiration: F) -> Self
    where
        F: Fn(&T) -> Duration + Send + Sync + 'static,
    {
        self.expiration = Some(Arc::new(expiration));
        self
    }

    /// Keeps every resolved value fresh for `duration`.
    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.expiration = Some(expire_after(duration));
        self
    }

    pub fn fetcher<F>(mut self, fetcher: F) -> Self
    where
        F: Fetcher<T, E> + 'static,
    {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Like [`fetcher`](Self::fetcher), for a fetcher that is shared with other revalidators.
    pub fn shared_fetcher(mut self, fetcher: Arc<dyn Fetcher<T, E>>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn stale(mut self, stale: bool) -> Self {
        self.stale = Some(stale);
        self
    }

    pub fn remove_on_error(mut self, remove_on_error: bool) -> Self {
        self.remove_on_error = Some(remove_on_error);
        self
    }

    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = Some(fresh);
        self
    }
}

impl<T: 'static, E: 'static> From<&CacheConfig> for Options<T, E> {
    fn from(config: &CacheConfig) -> Self {
        Self::new()
            .expire_after(config.expiration)
            .stale(config.stale)
            .remove_on_error(config.remove_on_error)
            .fresh(config.fresh)
    }
}

/// Overrides for a single [`query`](crate::Revalidator::query) call.
pub struct QueryOptions<T, E> {
    expiration: Option<Expiration<T>>,
    fetcher: Option<Arc<dyn Fetcher<T, E>>>,
    stale: Option<bool>,
    remove_on_error: Option<bool>,
    fresh: Option<bool>,
}

impl<T, E> Default for QueryOptions<T, E> {
    fn default() -> Self {
        Self {
            expiration: None,
            fetcher: None,
            stale: None,
            remove_on_error: None,
            fresh: None,
        }
    }
}

impl<T: 'static, E: 'static> QueryOptions<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expiration<F>(mut self, expiration: F) -> Self
    where
        F: Fn(&T) -> Duration + Send + Sync + 'static,
    {
        self.expiration = Some(Arc::new(expiration));
        self
    }

    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.expiration = Some(expire_after(duration));
        self
    }

    pub fn fetcher<F>(mut self, fetcher: F) -> Self
    where
        F: Fetcher<T, E> + 'static,
    {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn stale(mut self, stale: bool) -> Self {
        self.stale = Some(stale);
        self
    }

    pub fn remove_on_error(mut self, remove_on_error: bool) -> Self {
        self.remove_on_error = Some(remove_on_error);
        self
    }

    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = Some(fresh);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::FetchError;

    use super::*;

    #[test]
    fn test_partial_apply() {
        let mut config = Configuration::<u32, FetchError>::default();
        let items = Arc::clone(&config.items);

        config.apply(Options::new().stale(false).expire_after(Duration::from_secs(5)));

        assert!(!config.stale);
        assert!(!config.remove_on_error);
        assert_eq!((config.expiration)(&0), Duration::from_secs(5));
        assert!(Arc::ptr_eq(&config.items, &items));

        // an empty patch changes nothing
        config.apply(Options::default());
        assert!(!config.stale);
        assert_eq!((config.expiration)(&0), Duration::from_secs(5));
    }

    #[test]
    fn test_query_overrides() {
        let mut config = Configuration::<u32, FetchError>::default();
        config.override_with(QueryOptions::new().fresh(true).expiration(|v| {
            Duration::from_millis(u64::from(*v))
        }));

        assert!(config.fresh);
        assert!(config.stale);
        assert_eq!((config.expiration)(&250), Duration::from_millis(250));
    }

    #[test]
    fn test_from_cache_config() {
        let cache = CacheConfig {
            expiration: Duration::from_secs(30),
            stale: false,
            ..Default::default()
        };
        let mut config = Configuration::<u32, FetchError>::default();
        config.apply(Options::from(&cache));

        assert_eq!((config.expiration)(&1), Duration::from_secs(30));
        assert!(!config.stale);
        assert!(!config.fresh);
    }
}
