//! Exposes the command line application.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use revalidator::config::Config;
use revalidator::{Event, EventKind, FetchError, Options, Revalidator, Subscription, logging};
use revalidator_http::{FetchTimeouts, HttpFetcher, create_client};
use serde_json::{Value, json};
use url::Url;

/// Queries JSON documents over HTTP through an in-memory stale-while-revalidate cache.
#[derive(Parser, Debug)]
#[command(name = "revalidator", author, version, about, long_about)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query keys, printing every result as a JSON line.
    Get(GetArgs),
}

#[derive(Args, Debug)]
struct GetArgs {
    /// The keys to query.
    ///
    /// Keys are either absolute URLs, or paths relative to `--base-url`.
    #[arg(required = true)]
    keys: Vec<String>,

    /// How many rounds of queries to run.
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// The pause between two rounds, for example `500ms` or `2s`.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1s")]
    interval: Duration,

    /// Wait for a refresh instead of serving expired values.
    #[arg(long)]
    no_stale: bool,

    /// Always refresh, ignoring cached values.
    #[arg(long)]
    fresh: bool,

    /// Print every event emitted for the queried keys.
    #[arg(long)]
    events: bool,

    /// The URL relative keys are resolved against.
    #[arg(long)]
    base_url: Option<Url>,
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config.as_deref()).context("failed loading config")?;

    logging::init_logging(&config);
    if let Some(ref statsd) = config.metrics.statsd {
        revalidator::metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )
        .context("failed to configure statsd")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create the tokio runtime")?;

    match cli.command {
        Command::Get(args) => runtime.block_on(get(&config, args)),
    }
}

async fn get(config: &Config, args: GetArgs) -> Result<()> {
    let timeouts = FetchTimeouts::default();
    let client = create_client(&timeouts).context("failed to create the HTTP client")?;
    let mut fetcher = HttpFetcher::new(client).timeouts(timeouts);
    if let Some(base_url) = args.base_url {
        fetcher = fetcher.base_url(base_url);
    }

    let mut options = Options::from(&config.cache).fetcher(fetcher);
    if args.no_stale {
        options = options.stale(false);
    }
    if args.fresh {
        options = options.fresh(true);
    }
    let cache = Revalidator::<Value>::with_options(options);

    let mut subscriptions: Vec<Subscription<Value, FetchError>> = Vec::new();
    if args.events {
        for key in &args.keys {
            for kind in EventKind::ALL {
                let owned = key.clone();
                let subscription =
                    cache.subscribe(key, kind, move |event| print_event(&owned, event));
                subscriptions.push(subscription);
            }
        }
    }

    for round in 0..args.repeat {
        if round > 0 {
            tokio::time::sleep(args.interval).await;
        }

        for key in &args.keys {
            let line = match cache.query(key).await {
                Ok(value) => json!({ "round": round, "key": key, "value": value }),
                Err(error) => {
                    let dynerr = &error as &dyn std::error::Error;
                    tracing::warn!(error = dynerr, key, "Query failed");
                    json!({ "round": round, "key": key, "error": error.to_string() })
                }
            };
            println!("{line}");
        }
    }

    for subscription in subscriptions {
        subscription.unsubscribe();
    }

    Ok(())
}

fn print_event(key: &str, event: &Event<Value, FetchError>) {
    let detail = match event {
        Event::Refetching(resolution) | Event::Aborted(resolution) => {
            json!({ "resolution": resolution.id() })
        }
        Event::Error(error) => json!({ "error": error.to_string() }),
        _ => json!({ "value": event.value() }),
    };
    println!(
        "{}",
        json!({ "event": event.kind().as_str(), "key": key, "detail": detail })
    );
}
