use std::time::Duration;

/// Timeouts applied to every request of an [`HttpFetcher`](crate::HttpFetcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    /// The timeout for establishing a connection.
    pub connect: Duration,
    /// The timeout for receiving the response headers.
    pub head: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(500),
            head: Duration::from_secs(5),
        }
    }
}

/// Creates a [`reqwest::Client`] with the provided timeouts.
pub fn create_client(timeouts: &FetchTimeouts) -> reqwest::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .user_agent(concat!("revalidator/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(timeouts.connect)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}
