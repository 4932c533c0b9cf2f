use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use revalidator::{Emitter, Event, EventChannel, FetchContext, FetchError, Fetcher, Listener, Store};

/// A fetcher returning `"<key>-v<n>"` for its n-th call, after `delay`.
pub fn counting_fetcher(
    calls: &Arc<AtomicUsize>,
    delay: Duration,
) -> impl Fetcher<String, FetchError> + 'static {
    let calls = Arc::clone(calls);
    move |key: String, _ctx: FetchContext| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::time::sleep(delay).await;
            Ok::<_, FetchError>(format!("{key}-v{call}"))
        }
    }
}

/// A fetcher that only completes once aborted.
pub fn abortable_fetcher() -> impl Fetcher<String, FetchError> + 'static {
    |_key: String, ctx: FetchContext| async move {
        ctx.token.cancelled().await;
        Err::<String, _>(FetchError::aborted(ctx.token.reason()))
    }
}

/// An [`EventChannel`] that records the topic of every emitted event.
#[derive(Default)]
pub struct RecordingChannel {
    inner: Emitter<Event<String, FetchError>>,
    topics: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

impl EventChannel<Event<String, FetchError>> for RecordingChannel {
    fn subscribe(&self, topic: &str, listener: Listener<Event<String, FetchError>>) {
        self.inner.subscribe(topic, listener);
    }

    fn unsubscribe(&self, topic: &str, listener: &Listener<Event<String, FetchError>>) {
        self.inner.unsubscribe(topic, listener);
    }

    fn emit(&self, topic: &str, payload: &Event<String, FetchError>) {
        self.topics.lock().unwrap().push(topic.to_owned());
        self.inner.emit(topic, payload);
    }
}

/// A [`Store`] that records every write.
pub struct LoggingStore<V> {
    map: Mutex<BTreeMap<String, V>>,
    writes: Mutex<Vec<String>>,
}

impl<V> Default for LoggingStore<V> {
    fn default() -> Self {
        Self {
            map: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }
}

impl<V> LoggingStore<V> {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

impl<V: Clone + Send> Store<V> for LoggingStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: V) {
        self.writes.lock().unwrap().push(format!("set {key}"));
        self.map.lock().unwrap().insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) {
        self.writes.lock().unwrap().push(format!("delete {key}"));
        self.map.lock().unwrap().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.map.lock().unwrap().keys().cloned().collect()
    }
}
