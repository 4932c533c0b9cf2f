//! A JSON over HTTP [`Fetcher`](revalidator::Fetcher) for revalidators.
//!
//! [`HttpFetcher`] requests keys with `GET` and decodes the response bodies as JSON. The
//! process-wide [`global`] revalidator uses it to cache arbitrary JSON documents by URL.

use std::sync::OnceLock;

use revalidator::{Options, Revalidator};
use serde_json::Value;

mod client;
mod fetcher;

pub use client::*;
pub use fetcher::*;

static GLOBAL: OnceLock<Revalidator<Value>> = OnceLock::new();

/// A process-wide revalidator caching JSON documents by absolute URL.
///
/// It is created on first use with the default configuration and an [`HttpFetcher`] using
/// [`FetchTimeouts::default`]. Use [`Revalidator::configure`] to change its policy.
pub fn global() -> &'static Revalidator<Value> {
    GLOBAL.get_or_init(|| {
        let options = match create_client(&FetchTimeouts::default()) {
            Ok(client) => Options::new().fetcher(HttpFetcher::new(client)),
            Err(error) => {
                let error = &error as &dyn std::error::Error;
                tracing::error!(error, "Failed to create HTTP client for the global revalidator");
                Options::new()
            }
        };
        Revalidator::with_options(options)
    })
}
