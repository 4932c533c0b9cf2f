use std::time::Duration;

use crate::Instant;

/// How far in the future values expire whose time to live does not fit into an [`Instant`].
const NEVER: Duration = Duration::from_secs(86400 * 365 * 30);

/// The instant `ttl` after `now`.
///
/// Durations too large to represent, such as [`Duration::MAX`], mean the value never expires.
pub(crate) fn expires_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).unwrap_or_else(|| now + NEVER)
}

/// A resolved value together with the instant it becomes stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheItem<T> {
    pub value: T,
    pub expires_at: Instant,
}

impl<T> CacheItem<T> {
    pub fn new(value: T, expires_at: Instant) -> Self {
        Self { value, expires_at }
    }

    /// Whether this item is stale at `now`.
    ///
    /// An item is already stale at the exact instant it expires.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Selects one of the two stores of a [`Revalidator`](crate::Revalidator).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// The store of resolved [`CacheItem`]s.
    #[default]
    Items,
    /// The store of pending [`Resolver`](crate::Resolver)s.
    Resolvers,
}

/// One key or a list of keys.
pub trait IntoKeys {
    fn into_keys(self) -> Vec<String>;
}

impl IntoKeys for &str {
    fn into_keys(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl IntoKeys for String {
    fn into_keys(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoKeys for &String {
    fn into_keys(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<S: AsRef<str>> IntoKeys for Vec<S> {
    fn into_keys(self) -> Vec<String> {
        self.iter().map(|key| key.as_ref().to_owned()).collect()
    }
}

impl<S: AsRef<str>> IntoKeys for &[S] {
    fn into_keys(self) -> Vec<String> {
        self.iter().map(|key| key.as_ref().to_owned()).collect()
    }
}

impl<S: AsRef<str>, const N: usize> IntoKeys for [S; N] {
    fn into_keys(self) -> Vec<String> {
        self.iter().map(|key| key.as_ref().to_owned()).collect()
    }
}
