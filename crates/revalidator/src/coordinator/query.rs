use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::channel::oneshot;
use futures::future::BoxFuture;

use super::{Inner, Revalidator};
use crate::types::expires_after;
use crate::utils::futures::CallOnDrop;
use crate::{
    CacheItem, CancelToken, Configuration, Event, EventKind, FetchContext, Instant, QueryOptions,
    ResolveError, Resolution, Resolver, Store,
};

impl<T, E> Revalidator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<ResolveError> + 'static,
{
    /// Returns the value of `key`, fetching it if necessary.
    ///
    /// - A fresh cached value is returned right away.
    /// - An expired value is returned right away as well if stale values are allowed, while a
    ///   refresh runs in the background. Failures of that refresh are only observable through
    ///   [`EventKind::Error`] events.
    /// - Otherwise the value is fetched. If a resolution for `key` is already pending, this waits
    ///   for it instead of starting another one.
    pub async fn query(&self, key: &str) -> Result<T, E> {
        self.query_with(key, QueryOptions::default()).await
    }

    /// Like [`query`](Self::query), with per-call overrides of the configuration.
    pub async fn query_with(&self, key: &str, options: QueryOptions<T, E>) -> Result<T, E> {
        let (config, cached) = {
            let guard = self.inner.config.lock();
            let mut config = guard.clone();
            config.override_with(options);
            let cached = if config.fresh {
                None
            } else {
                config.items.get(key)
            };
            (config, cached)
        };

        if config.fresh {
            metric!(counter("revalidator.query") += 1, "result" => "fresh");
            return self.refresh(key, config).await;
        }

        let Some(item) = cached else {
            metric!(counter("revalidator.query") += 1, "result" => "miss");
            return self.refresh(key, config).await;
        };

        if !item.is_expired_at(Instant::now()) {
            metric!(counter("revalidator.query") += 1, "result" => "hit");
            return Ok(item.value);
        }

        if config.stale {
            metric!(counter("revalidator.query") += 1, "result" => "stale");
            tracing::trace!(key, "Serving stale value while refreshing");
            // the refresh task runs to completion without anyone awaiting it
            let _resolution = self.refresh(key, config);
            return Ok(item.value);
        }

        metric!(counter("revalidator.query") += 1, "result" => "miss");
        self.refresh(key, config).await
    }

    /// Returns the pending resolution of `key`, starting a new one if there is none.
    fn refresh(&self, key: &str, config: Configuration<T, E>) -> Resolution<T, E> {
        let (id, sender, resolution, token) = {
            let _serialized = self.inner.config.lock();
            if let Some(resolver) = config.resolvers.get(key) {
                tracing::trace!(key, id = resolver.id(), "Joining pending resolution");
                metric!(counter("revalidator.refresh") += 1, "deduplicated" => "true");
                return resolver.resolution;
            }

            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let (sender, resolution) = Resolution::channel(id);
            let token = CancelToken::new();
            config.resolvers.set(
                key,
                Resolver {
                    resolution: resolution.clone(),
                    token: token.clone(),
                },
            );
            (id, sender, resolution, token)
        };

        // From here on, unwinding or dropping the task removes the resolver again, waiters then
        // fail with `ResolveError::Dropped`.
        let done = {
            let inner = Arc::clone(&self.inner);
            let resolvers = Arc::clone(&config.resolvers);
            let key = key.to_owned();
            CallOnDrop::new(move || {
                let _serialized = inner.config.lock();
                remove_resolver(&*resolvers, &key, id);
            })
        };

        tracing::debug!(key, id, "Starting resolution");
        metric!(counter("revalidator.refresh") += 1, "deduplicated" => "false");

        let fetch = config.fetcher.fetch(key, FetchContext { token });
        config.events.emit(
            &EventKind::Refetching.topic(key),
            &Event::Refetching(resolution.clone()),
        );

        tokio::spawn(complete(
            Arc::clone(&self.inner),
            key.to_owned(),
            id,
            config,
            fetch,
            sender,
            done,
        ));

        resolution
    }
}

/// Drives `fetch` to completion and publishes its outcome.
async fn complete<T, E>(
    inner: Arc<Inner<T, E>>,
    key: String,
    id: u64,
    config: Configuration<T, E>,
    fetch: BoxFuture<'static, Result<T, E>>,
    sender: oneshot::Sender<Result<T, E>>,
    _done: CallOnDrop,
) where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<ResolveError> + 'static,
{
    let started = Instant::now();
    let result = fetch.await;
    metric!(timer("revalidator.fetch.duration") = started.elapsed());

    let item = match &result {
        Ok(value) => {
            let expires_at = expires_after(Instant::now(), (config.expiration)(value));
            Some(CacheItem::new(value.clone(), expires_at))
        }
        Err(_) => None,
    };

    {
        let _serialized = inner.config.lock();
        remove_resolver(&*config.resolvers, &key, id);
        match item {
            Some(item) => config.items.set(&key, item),
            None if config.remove_on_error => config.items.delete(&key),
            None => {}
        }
    }

    match &result {
        Ok(value) => {
            tracing::debug!(key, id, "Resolution completed");
            metric!(counter("revalidator.resolved") += 1);
            config.events.emit(
                &EventKind::Resolved.topic(&key),
                &Event::Resolved(value.clone()),
            );
        }
        Err(error) => {
            tracing::debug!(key, id, "Resolution failed");
            metric!(counter("revalidator.error") += 1);
            config
                .events
                .emit(&EventKind::Error.topic(&key), &Event::Error(error.clone()));
        }
    }

    // nobody waiting is fine
    let _ = sender.send(result);
}

/// Removes the resolver of `key` only if it is the one with `id`.
///
/// A resolution that was aborted and superseded by a newer one must not remove its successor.
fn remove_resolver<T, E>(resolvers: &dyn Store<Resolver<T, E>>, key: &str, id: u64) {
    if resolvers
        .get(key)
        .is_some_and(|resolver| resolver.id() == id)
    {
        resolvers.delete(key);
    }
}
