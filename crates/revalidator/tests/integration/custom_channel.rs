use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use revalidator::{Options, QueryOptions, Revalidator};

use crate::utils::{RecordingChannel, abortable_fetcher, counting_fetcher};

#[tokio::test(start_paused = true)]
async fn test_event_sequence() {
    revalidator_test::setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let channel = Arc::new(RecordingChannel::default());
    let cache = Revalidator::<String>::with_options(
        Options::new()
            .event_channel(Arc::clone(&channel))
            .expire_after(Duration::from_millis(100))
            .fetcher(counting_fetcher(&calls, Duration::from_millis(10))),
    );

    cache.query("a").await.unwrap();
    cache.mutate("a", "mutated".into(), None);
    cache.hydrate(["b", "c"], "hydrated".into(), None);
    cache.forget(["a", "b", "missing"]);

    let slow = tokio::spawn({
        let cache = cache.clone();
        async move {
            cache
                .query_with("slow", QueryOptions::new().fetcher(abortable_fetcher()))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    cache.abort_all(Some("shutdown"));
    assert!(slow.await.unwrap().is_err());

    cache.forget_all();

    insta::assert_debug_snapshot!(channel.topics(), @r###"
    [
        "refetching:a",
        "resolved:a",
        "mutated:a",
        "hydrated:b",
        "hydrated:c",
        "forgotten:a",
        "forgotten:b",
        "refetching:slow",
        "aborted:slow",
        "error:slow",
        "forgotten:c",
    ]
    "###);
}

#[tokio::test(start_paused = true)]
async fn test_listeners_receive_from_custom_channel() {
    revalidator_test::setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let channel = Arc::new(RecordingChannel::default());
    let cache = Revalidator::<String>::with_options(
        Options::new()
            .event_channel(Arc::clone(&channel))
            .fetcher(counting_fetcher(&calls, Duration::ZERO)),
    );

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let subscription = cache.subscribe("k", revalidator::EventKind::Resolved, {
        let seen = Arc::clone(&seen);
        move |event| {
            if let Some(value) = event.value() {
                seen.lock().unwrap().push(value.clone());
            }
        }
    });

    cache.query("k").await.unwrap();
    subscription.unsubscribe();
    cache.query_with("k", QueryOptions::new().fresh(true)).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), ["k-v1"]);
    assert_eq!(
        channel.topics(),
        ["refetching:k", "resolved:k", "refetching:k", "resolved:k"]
    );
}
