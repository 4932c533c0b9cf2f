use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use revalidator::{Options, QueryOptions, Revalidator};
use tokio::time::sleep;

use crate::utils::counting_fetcher;

fn revalidator(calls: &Arc<AtomicUsize>) -> Revalidator<String> {
    Revalidator::with_options(
        Options::new()
            .expire_after(Duration::from_millis(100))
            .fetcher(counting_fetcher(calls, Duration::from_millis(10))),
    )
}

#[tokio::test(start_paused = true)]
async fn test_revalidates_after_expiry() {
    revalidator_test::setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = revalidator(&calls);

    assert_eq!(cache.query("k").await.unwrap(), "k-v1");
    sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.query("k").await.unwrap(), "k-v1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(100)).await;
    let value = cache
        .query_with("k", QueryOptions::new().stale(false))
        .await
        .unwrap();
    assert_eq!(value, "k-v2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_serves_stale_while_revalidating() {
    revalidator_test::setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = revalidator(&calls);

    assert_eq!(cache.query("k").await.unwrap(), "k-v1");
    sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.query("k").await.unwrap(), "k-v1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.snapshot("k").as_deref(), Some("k-v1"));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.snapshot("k").as_deref(), Some("k-v2"));
    assert_eq!(cache.query("k").await.unwrap(), "k-v2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
