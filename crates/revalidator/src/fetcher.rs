use std::future::Future;

use futures::future::BoxFuture;

use crate::{CancelToken, ResolveError};

/// Context passed to every [`Fetcher::fetch`] call.
#[derive(Clone, Debug, Default)]
pub struct FetchContext {
    /// Signalled when the pending resolution is aborted.
    pub token: CancelToken,
}

/// The producer of values for a [`Revalidator`](crate::Revalidator).
///
/// A fetcher is invoked at most once per key at any given time, and is expected to honor the
/// [`CancelToken`] in its [`FetchContext`] by failing its future once the token is cancelled.
///
/// Any `Fn(String, FetchContext) -> impl Future<Output = Result<T, E>>` closure is a fetcher.
pub trait Fetcher<T, E>: Send + Sync {
    fn fetch(&self, key: &str, ctx: FetchContext) -> BoxFuture<'static, Result<T, E>>;
}

impl<T, E, F, Fut> Fetcher<T, E> for F
where
    F: Fn(String, FetchContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn fetch(&self, key: &str, ctx: FetchContext) -> BoxFuture<'static, Result<T, E>> {
        Box::pin(self(key.to_owned(), ctx))
    }
}

/// The fetcher used when none was configured: every call fails with
/// [`ResolveError::NoFetcher`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MissingFetcher;

impl<T, E> Fetcher<T, E> for MissingFetcher
where
    E: From<ResolveError> + Send + 'static,
    T: Send + 'static,
{
    fn fetch(&self, key: &str, _ctx: FetchContext) -> BoxFuture<'static, Result<T, E>> {
        tracing::warn!(key, "No fetcher configured");
        let result: Result<T, E> = Err(ResolveError::NoFetcher.into());
        Box::pin(async move { result })
    }
}

