//! Helpers for testing revalidators against a real HTTP server.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using a [`Server`] or [`HitCounter`], make sure that it is held until all requests to
//!    it have been made. The server stops serving when dropped, and all further connections to it
//!    will fail. To avoid this, assign it to a variable: `let server = HitCounter::new();`.

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::extract::{self, OriginalUri, Request};
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::{Json, Router};
use reqwest::{StatusCode, Url};
use serde_json::json;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `revalidator` crates and mutes all
///    other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("revalidator=trace,revalidator_http=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    pub handle: tokio::task::JoinHandle<()>,
    pub socket: SocketAddr,
}

impl Server {
    /// Creates a new test server serving the given `axum` router.
    pub fn new(router: Router) -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router.into_make_service())
                .await
                .unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A [`Server`] serving JSON fixtures, which counts the hits of every path.
///
/// Routes:
///  - `/json/*path`: responds with `{"path": "/json/<path>"}`.
///  - `/counter/*path`: responds with `{"path": "/counter/<path>", "hits": <n>}`, where `n` is
///    the number of times this path was requested, including the current request.
///  - `/delay/:time/*path`: waits for the given humantime duration, then responds like `/json`.
///  - `/respond_statuscode/:num/*tail`: responds with an empty body and the given status code.
///  - `/garbage_data/*tail`: responds with `tail` as plain text, which is not valid JSON.
pub struct HitCounter {
    server: Server,
    hits: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl HitCounter {
    pub fn new() -> Self {
        let hits = Arc::new(Mutex::new(BTreeMap::new()));

        let hitcounter = {
            let hits = hits.clone();
            move |OriginalUri(uri): OriginalUri, req: Request, next: Next| {
                let hits = hits.clone();
                async move {
                    {
                        let mut hits = hits.lock().unwrap();
                        let hits = hits.entry(uri.path().to_owned()).or_default();
                        *hits += 1;
                    }

                    next.run(req).await
                }
            }
        };

        let counter = {
            let hits = hits.clone();
            move |OriginalUri(uri): OriginalUri| {
                let hits = hits.clone();
                async move {
                    let count = hits.lock().unwrap().get(uri.path()).copied().unwrap_or(0);
                    Json(json!({ "path": uri.path(), "hits": count }))
                }
            }
        };

        let router = Router::new()
            .route(
                "/json/*path",
                get(|OriginalUri(uri): OriginalUri| async move {
                    Json(json!({ "path": uri.path() }))
                }),
            )
            .route("/counter/*path", get(counter))
            .route(
                "/delay/:time/*path",
                get(
                    |extract::Path((time, _)): extract::Path<(String, String)>,
                     OriginalUri(uri): OriginalUri| async move {
                        let duration = humantime::parse_duration(&time).unwrap();
                        tokio::time::sleep(duration).await;

                        Json(json!({ "path": uri.path() }))
                    },
                ),
            )
            .route(
                "/respond_statuscode/:num/*tail",
                get(
                    |extract::Path((num, _)): extract::Path<(u16, String)>| async move {
                        StatusCode::from_u16(num).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                    },
                ),
            )
            .route(
                "/garbage_data/*tail",
                get(|extract::Path(tail): extract::Path<String>| async move { tail }),
            )
            .layer(middleware::from_fn(hitcounter));

        let server = Server::new(router);

        Self { server, hits }
    }

    /// Returns the number of requests made since the last call, and resets the counters.
    pub fn accesses(&self) -> usize {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_values().sum()
    }

    /// Returns the hits per path since the last call, and resets the counters.
    pub fn all_hits(&self) -> Vec<(String, usize)> {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_iter().collect()
    }

    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }
}

impl Default for HitCounter {
    fn default() -> Self {
        Self::new()
    }
}
