//! An in-memory cache for asynchronously fetched values, with stale-while-revalidate semantics.
//!
//! The [`Revalidator`] serves cached values while they are fresh, serves stale values while
//! refreshing them in the background, and deduplicates concurrent fetches of the same key. Pending
//! fetches can be aborted, cached values can be mutated optimistically, and every change is
//! published as a typed [`Event`].
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use revalidator::{FetchContext, FetchError, Options, Revalidator};
//!
//! # async fn run() -> Result<(), FetchError> {
//! let cache: Revalidator<String> = Revalidator::with_options(
//!     Options::new()
//!         .expire_after(Duration::from_secs(30))
//!         .fetcher(|key: String, _ctx: FetchContext| async move {
//!             Ok::<_, FetchError>(format!("value of {key}"))
//!         }),
//! );
//!
//! let value = cache.query("users/42").await?;
//! assert_eq!(value, "value of users/42");
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub mod metrics;

pub mod config;
pub mod logging;
pub mod utils;

mod cancel;
mod coordinator;
mod error;
mod events;
mod fetcher;
mod options;
mod resolution;
mod store;
mod types;

pub use cancel::*;
pub use coordinator::*;
pub use error::*;
pub use events::*;
pub use fetcher::*;
pub use options::*;
pub use resolution::*;
pub use store::*;
pub use types::*;

/// The clock used for expiration, which can be paused and advanced in tests.
pub use tokio::time::Instant;
