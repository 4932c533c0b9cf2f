//! Topic based publish/subscribe for revalidator events.
//!
//! Every event is published on a topic of the form `"<kind>:<key>"`, for example
//! `"resolved:users/42"`. The [`EventChannel`] itself knows nothing about keys or kinds, it just
//! multiplexes payloads to the listeners of a topic.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Resolution;

/// A callback registered on an [`EventChannel`].
///
/// Two listeners are considered the same if they point to the same allocation, so subscribing a
/// clone of an already subscribed listener is a no-op.
pub type Listener<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// A named-topic publish/subscribe mechanism.
pub trait EventChannel<P>: Send + Sync {
    /// Registers `listener` on `topic`.
    ///
    /// Subscribing the same listener twice to the same topic does nothing.
    fn subscribe(&self, topic: &str, listener: Listener<P>);

    /// Removes `listener` from `topic`.
    ///
    /// Unknown topics and listeners are ignored.
    fn unsubscribe(&self, topic: &str, listener: &Listener<P>);

    /// Invokes all listeners of `topic` with `payload`, in subscription order.
    fn emit(&self, topic: &str, payload: &P);
}

/// The default [`EventChannel`].
///
/// Listeners are invoked without holding the internal lock, so they are free to subscribe or
/// unsubscribe other listeners, or emit further events.
pub struct Emitter<P> {
    topics: Mutex<HashMap<String, Vec<Listener<P>>>>,
}

impl<P> Emitter<P> {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// The number of listeners currently registered on `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, Vec::len)
    }
}

impl<P> Default for Emitter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Emitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.lock();
        f.debug_struct("Emitter")
            .field("topics", &topics.len())
            .finish()
    }
}

impl<P> EventChannel<P> for Emitter<P> {
    fn subscribe(&self, topic: &str, listener: Listener<P>) {
        let mut topics = self.topics.lock();
        let listeners = topics.entry(topic.to_owned()).or_default();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    fn unsubscribe(&self, topic: &str, listener: &Listener<P>) {
        let mut topics = self.topics.lock();
        if let Some(listeners) = topics.get_mut(topic) {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            if listeners.is_empty() {
                topics.remove(topic);
            }
        }
    }

    fn emit(&self, topic: &str, payload: &P) {
        let listeners = match self.topics.lock().get(topic) {
            Some(listeners) => listeners.clone(),
            None => return,
        };

        for listener in listeners {
            listener(payload);
        }
    }
}

/// The different kinds of events emitted by the [`Revalidator`](crate::Revalidator).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new resolution was started for a key.
    Refetching,
    /// A resolution completed successfully and its value was cached.
    Resolved,
    /// A value was written via `mutate`.
    Mutated,
    /// A pending resolution was aborted.
    Aborted,
    /// A cached value was removed via `forget`.
    Forgotten,
    /// A value was written via `hydrate`.
    Hydrated,
    /// A resolution failed.
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Refetching,
        EventKind::Resolved,
        EventKind::Mutated,
        EventKind::Aborted,
        EventKind::Forgotten,
        EventKind::Hydrated,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Refetching => "refetching",
            EventKind::Resolved => "resolved",
            EventKind::Mutated => "mutated",
            EventKind::Aborted => "aborted",
            EventKind::Forgotten => "forgotten",
            EventKind::Hydrated => "hydrated",
            EventKind::Error => "error",
        }
    }

    /// The topic events of this kind for `key` are published on.
    pub fn topic(&self, key: &str) -> String {
        format!("{}:{key}", self.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind `{0}`")]
pub struct UnknownEventKind(String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_owned()))
    }
}

/// An event emitted by the [`Revalidator`](crate::Revalidator).
///
/// Each variant carries the payload specific to its [`EventKind`].
#[derive(Clone)]
pub enum Event<T, E> {
    /// Carries the pending resolution, which can be awaited.
    Refetching(Resolution<T, E>),
    /// Carries the freshly resolved value.
    Resolved(T),
    /// Carries the mutated value.
    Mutated(T),
    /// Carries the aborted resolution, which will fail once the fetcher honors the abort.
    Aborted(Resolution<T, E>),
    /// Carries the value that was removed.
    Forgotten(T),
    /// Carries the hydrated value.
    Hydrated(T),
    /// Carries the error of the failed resolution.
    Error(E),
}

impl<T, E> Event<T, E> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Refetching(_) => EventKind::Refetching,
            Event::Resolved(_) => EventKind::Resolved,
            Event::Mutated(_) => EventKind::Mutated,
            Event::Aborted(_) => EventKind::Aborted,
            Event::Forgotten(_) => EventKind::Forgotten,
            Event::Hydrated(_) => EventKind::Hydrated,
            Event::Error(_) => EventKind::Error,
        }
    }

    /// The value carried by `resolved`, `mutated`, `forgotten` and `hydrated` events.
    pub fn value(&self) -> Option<&T> {
        match self {
            Event::Resolved(value)
            | Event::Mutated(value)
            | Event::Forgotten(value)
            | Event::Hydrated(value) => Some(value),
            _ => None,
        }
    }

    /// The resolution carried by `refetching` and `aborted` events.
    pub fn resolution(&self) -> Option<&Resolution<T, E>> {
        match self {
            Event::Refetching(resolution) | Event::Aborted(resolution) => Some(resolution),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Event::Error(error) => Some(error),
            _ => None,
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Event<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Refetching(resolution) => f.debug_tuple("Refetching").field(resolution).finish(),
            Event::Resolved(value) => f.debug_tuple("Resolved").field(value).finish(),
            Event::Mutated(value) => f.debug_tuple("Mutated").field(value).finish(),
            Event::Aborted(resolution) => f.debug_tuple("Aborted").field(resolution).finish(),
            Event::Forgotten(value) => f.debug_tuple("Forgotten").field(value).finish(),
            Event::Hydrated(value) => f.debug_tuple("Hydrated").field(value).finish(),
            Event::Error(error) => f.debug_tuple("Error").field(error).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Listener<u32> {
        let log = Arc::clone(log);
        Arc::new(move |payload: &u32| log.lock().push(format!("{name}:{payload}")))
    }

    #[test]
    fn test_emit_in_subscription_order() {
        let emitter = Emitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        emitter.subscribe("resolved:a", recording(&log, "first"));
        emitter.subscribe("resolved:a", recording(&log, "second"));
        emitter.subscribe("resolved:b", recording(&log, "other"));

        emitter.emit("resolved:a", &1);
        emitter.emit("nobody-listens", &2);

        assert_eq!(*log.lock(), ["first:1", "second:1"]);
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let emitter = Emitter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let listener: Listener<u32> = {
            let calls = Arc::clone(&calls);
            Arc::new(move |_: &u32| {
                calls.fetch_add(1, Ordering::Relaxed);
            })
        };

        emitter.subscribe("t", Arc::clone(&listener));
        emitter.subscribe("t", Arc::clone(&listener));
        assert_eq!(emitter.listener_count("t"), 1);

        emitter.emit("t", &0);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unsubscribe_unknown() {
        let emitter = Emitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recording(&log, "l");
        let stranger = recording(&log, "stranger");

        emitter.unsubscribe("no-such-topic", &listener);

        emitter.subscribe("t", Arc::clone(&listener));
        emitter.unsubscribe("t", &stranger);
        assert_eq!(emitter.listener_count("t"), 1);

        emitter.unsubscribe("t", &listener);
        assert_eq!(emitter.listener_count("t"), 0);

        emitter.emit("t", &0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let emitter = Arc::new(Emitter::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<Listener<u32>>>> = Default::default();
        let listener: Listener<u32> = {
            let emitter = Arc::clone(&emitter);
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            Arc::new(move |_: &u32| {
                calls.fetch_add(1, Ordering::Relaxed);
                if let Some(me) = slot.lock().take() {
                    emitter.unsubscribe("t", &me);
                }
            })
        };
        *slot.lock() = Some(Arc::clone(&listener));
        emitter.subscribe("t", listener);

        emitter.emit("t", &1);
        emitter.emit("t", &2);

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_event_kind_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert_eq!(EventKind::Resolved.topic("users/42"), "resolved:users/42");
        assert!("refetched".parse::<EventKind>().is_err());
    }
}
