use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// A cooperative cancellation signal handed to a [`Fetcher`](crate::Fetcher).
///
/// The revalidator signals the token when the pending resolution is aborted. It is up to the
/// fetcher to observe the signal (via [`cancelled`](Self::cancelled) or
/// [`is_cancelled`](Self::is_cancelled)) and fail its future.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    token: CancellationToken,
    reason: Arc<OnceLock<Option<String>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation with an optional reason.
    ///
    /// Only the first call has an effect, later reasons are ignored.
    pub fn cancel(&self, reason: Option<String>) {
        // the reason has to be visible before any waiter is woken up
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason given to [`cancel`](Self::cancel), if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().and_then(|reason| reason.as_deref())
    }

    /// Waits until the token is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
