use std::fmt;
use std::marker::PhantomData;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use revalidator::{FetchContext, FetchError, Fetcher};
use serde::de::DeserializeOwned;
use url::Url;

use crate::FetchTimeouts;

/// A [`Fetcher`] that `GET`s keys over HTTP and decodes the JSON response into `T`.
///
/// Keys are either absolute URLs, or paths relative to the configured
/// [`base_url`](Self::base_url).
pub struct HttpFetcher<T> {
    client: reqwest::Client,
    base_url: Option<Url>,
    timeouts: FetchTimeouts,
    _value: PhantomData<fn() -> T>,
}

impl<T> HttpFetcher<T> {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
            timeouts: FetchTimeouts::default(),
            _value: PhantomData,
        }
    }

    /// Resolves relative keys against `base_url`.
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Overrides the timeouts applied on top of the client's own.
    ///
    /// These should match the timeouts the client was created with.
    pub fn timeouts(mut self, timeouts: FetchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The URL that is requested for `key`.
    pub fn url_for(&self, key: &str) -> Result<Url, FetchError> {
        let parsed = match &self.base_url {
            Some(base_url) => base_url.join(key),
            None => Url::parse(key),
        };
        parsed.map_err(|e| FetchError::Malformed(format!("invalid url `{key}`: {e}")))
    }
}

impl<T> Clone for HttpFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            timeouts: self.timeouts,
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for HttpFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("base_url", &self.base_url)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl<T> Fetcher<T, FetchError> for HttpFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn fetch(&self, key: &str, ctx: FetchContext) -> BoxFuture<'static, Result<T, FetchError>> {
        let url = self.url_for(key);
        let client = self.client.clone();
        let timeouts = self.timeouts;

        Box::pin(async move {
            let url = url?;
            tokio::select! {
                biased;

                _ = ctx.token.cancelled() => {
                    tracing::debug!("Request to `{url}` aborted");
                    Err(FetchError::aborted(ctx.token.reason()))
                }
                result = fetch_json(&client, url.clone(), &timeouts) => result,
            }
        })
    }
}

async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: Url,
    timeouts: &FetchTimeouts,
) -> Result<T, FetchError> {
    let source = url.to_string();

    let request = client.get(url).send();
    let response = tokio::time::timeout(timeouts.head, request)
        .await
        .map_err(|_| FetchError::Timeout(timeouts.head))?
        .map_err(|e| transport_error(e, timeouts))?;

    let status = response.status();
    if !status.is_success() {
        return Err(error_for_status(&source, status));
    }
    tracing::trace!("Success hitting `{source}`");

    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, timeouts))?;
    serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Malformed response from `{source}`: {e}");
        FetchError::Malformed(e.to_string())
    })
}

fn transport_error(error: reqwest::Error, timeouts: &FetchTimeouts) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeouts.connect)
    } else {
        FetchError::from_std_error(error)
    }
}

/// Infers the [`FetchError`] from the status code of an unsuccessful response.
fn error_for_status(source: &str, status: StatusCode) -> FetchError {
    debug_assert!(!status.is_success());

    if matches!(status, StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED) {
        tracing::debug!("Insufficient permissions to fetch `{source}`: {status}");
        FetchError::PermissionDenied(status.to_string())
    } else if status.is_client_error() {
        // If it's a client error, chances are it's a 404.
        tracing::debug!("Unexpected client error status code from `{source}`: {status}");
        FetchError::NotFound
    } else {
        tracing::debug!("Unexpected status code from `{source}`: {status}");
        FetchError::Failed(status.to_string())
    }
}
