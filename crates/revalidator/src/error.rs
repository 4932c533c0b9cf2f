use std::time::Duration;

use thiserror::Error;

/// Errors raised by the [`Revalidator`](crate::Revalidator) itself, as opposed to errors coming
/// from a [`Fetcher`](crate::Fetcher).
///
/// Every fetcher error type has to be constructible from this, see the `E: From<ResolveError>`
/// bound on the revalidator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The resolution was started without a fetcher being configured.
    #[error("no fetcher configured")]
    NoFetcher,
    /// The task driving the fetcher went away without producing a result.
    ///
    /// This happens when the runtime shuts down while a resolution is still pending.
    #[error("resolution dropped before completion")]
    Dropped,
}

/// The default error type of a [`Revalidator`](crate::Revalidator).
///
/// This error is opaque and cheap to clone, as it is shared between all callers that were
/// deduplicated onto the same resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The revalidator could not run the fetcher at all.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The fetch was cancelled via `abort`.
    ///
    /// The attached string is the reason given to `abort`.
    #[error("aborted: {}", .0.as_deref().unwrap_or("no reason given"))]
    Aborted(Option<String>),
    /// The resource does not exist.
    #[error("not found")]
    NotFound,
    /// The resource could not be fetched due to missing permissions.
    ///
    /// The attached string contains the remote response.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The resource could not be fetched in time.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The resource was fetched, but could not be decoded.
    #[error("malformed: {0}")]
    Malformed(String),
    /// The resource could not be fetched due to another problem, like connection loss or a 5xx
    /// server response.
    #[error("fetch failed: {0}")]
    Failed(String),
}

impl FetchError {
    /// Creates an [`Aborted`](Self::Aborted) error from the reason of a cancelled token.
    pub fn aborted(reason: Option<&str>) -> Self {
        Self::Aborted(reason.map(ToOwned::to_owned))
    }

    /// Creates a [`Failed`](Self::Failed) error from any std error, logging it on the way.
    #[track_caller]
    pub fn from_std_error<E: std::error::Error + 'static>(e: E) -> Self {
        let dynerr: &dyn std::error::Error = &e; // tracing expects a `&dyn Error`
        tracing::debug!(error = dynerr, "fetch failed");
        Self::Failed(e.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::from_std_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            FetchError::from(ResolveError::NoFetcher).to_string(),
            "no fetcher configured"
        );
        assert_eq!(FetchError::aborted(None).to_string(), "aborted: no reason given");
        assert_eq!(
            FetchError::aborted(Some("navigated away")).to_string(),
            "aborted: navigated away"
        );
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(5)).to_string(),
            "fetch timed out after 5s"
        );
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        assert_eq!(
            FetchError::from(err),
            FetchError::Failed("connection reset".into())
        );
    }
}
