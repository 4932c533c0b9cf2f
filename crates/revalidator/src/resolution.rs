use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::{CancelToken, ResolveError};

type ResolutionChannel<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// A handle to a pending (or completed) fetch for a key.
///
/// All callers that were deduplicated onto the same fetch hold clones of the same resolution and
/// observe the same outcome. Awaiting a resolution never starts any work: the fetch is driven by
/// a task spawned by the [`Revalidator`](crate::Revalidator), whether or not anyone awaits it.
pub struct Resolution<T, E> {
    id: u64,
    channel: ResolutionChannel<T, E>,
}

impl<T, E> Resolution<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<ResolveError> + 'static,
{
    /// Creates a new resolution with the sending half that completes it.
    ///
    /// Dropping the sender without sending fails the resolution with [`ResolveError::Dropped`].
    pub(crate) fn channel(id: u64) -> (oneshot::Sender<Result<T, E>>, Self) {
        let (sender, receiver) = oneshot::channel();
        let channel = receiver
            .map(|result| result.unwrap_or_else(|_canceled| Err(ResolveError::Dropped.into())))
            .boxed()
            .shared();

        (sender, Self { id, channel })
    }

    /// The outcome of this resolution, if it has completed and was polled since.
    pub fn peek(&self) -> Option<&Result<T, E>> {
        self.channel.peek()
    }
}

impl<T, E> Resolution<T, E> {
    /// An identifier unique among all resolutions of one revalidator.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T, E> Clone for Resolution<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            channel: self.channel.clone(),
        }
    }
}

impl<T: Clone, E: Clone> Future for Resolution<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().channel.poll_unpin(cx)
    }
}

impl<T, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The bookkeeping record for a pending fetch, kept in the resolvers store.
pub struct Resolver<T, E> {
    pub(crate) resolution: Resolution<T, E>,
    pub(crate) token: CancelToken,
}

impl<T, E> Resolver<T, E> {
    pub fn resolution(&self) -> &Resolution<T, E> {
        &self.resolution
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub(crate) fn id(&self) -> u64 {
        self.resolution.id
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            resolution: self.resolution.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resolution", &self.resolution)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
