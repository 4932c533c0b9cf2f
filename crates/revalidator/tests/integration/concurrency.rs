use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use revalidator::{Options, Revalidator};

use crate::utils::counting_fetcher;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dedupe_across_threads() {
    revalidator_test::setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Revalidator::<String>::with_options(
        Options::new().fetcher(counting_fetcher(&calls, Duration::from_millis(50))),
    );

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.query("shared").await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "shared-v1");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutate_with_is_atomic() {
    revalidator_test::setup();
    let cache = Revalidator::<u64>::new();

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache.mutate_with("counter", |value, _| value.copied().unwrap_or(0) + 1, None)
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(cache.snapshot("counter"), Some(100));
}
