use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use revalidator::{CacheItem, FetchError, Options, Resolver, Revalidator, StoreKind};

use crate::utils::{LoggingStore, counting_fetcher};

#[tokio::test(start_paused = true)]
async fn test_stores_are_used() {
    revalidator_test::setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let items = Arc::new(LoggingStore::<CacheItem<String>>::default());
    let resolvers = Arc::new(LoggingStore::<Resolver<String, FetchError>>::default());
    let cache = Revalidator::<String>::with_options(
        Options::new()
            .items_store(Arc::clone(&items))
            .resolvers_store(Arc::clone(&resolvers))
            .fetcher(counting_fetcher(&calls, Duration::from_millis(10))),
    );

    assert_eq!(cache.query("a").await.unwrap(), "a-v1");
    cache.mutate("b", "local".into(), None);
    cache.forget("a");

    assert_eq!(items.writes(), ["set a", "set b", "delete a"]);
    assert_eq!(resolvers.writes(), ["set a", "delete a"]);
    assert_eq!(cache.keys(StoreKind::Items), ["b"]);
    assert!(cache.keys(StoreKind::Resolvers).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_prepopulated_store() {
    revalidator_test::setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let items = Arc::new(LoggingStore::<CacheItem<String>>::default());
    let expires_at = revalidator::Instant::now() + Duration::from_secs(60);
    revalidator::Store::set(&*items, "warm", CacheItem::new("from disk".into(), expires_at));

    let cache = Revalidator::<String>::with_options(
        Options::new()
            .items_store(items)
            .fetcher(counting_fetcher(&calls, Duration::ZERO)),
    );

    assert_eq!(cache.query("warm").await.unwrap(), "from disk");
    assert_eq!(cache.expiration("warm"), Some(expires_at));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}
