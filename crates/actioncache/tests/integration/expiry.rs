use std::time::Duration;

use actioncache::CacheOptions;

use crate::{setup_cache, sleep, user};

#[tokio::test(start_paused = true)]
async fn test_expires_after_timeout() {
    let (cache, calls) = setup_cache(|config| {
        config.cache.timeout = Some(Duration::from_millis(100));
    });

    let payload = Some(actioncache::Payload::object().with("name", "x"));
    cache.dispatch("renameUser", payload.clone()).unwrap().await.unwrap();
    assert!(cache.has("renameUser", payload.as_ref()));

    sleep(150).await;
    assert!(!cache.has("renameUser", payload.as_ref()));

    cache.dispatch("renameUser", payload.clone()).unwrap().await.unwrap();
    assert!(cache.has("renameUser", payload.as_ref()));
    assert_eq!(calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_from_execution_start() {
    let (cache, calls) = setup_cache(|config| {
        config.cache.timeout = Some(Duration::from_millis(1500));
    });

    cache.dispatch("fetchUser", user(1)).unwrap().await.unwrap();
    assert!(cache.has("fetchUser", user(1).as_ref()));

    // The execution took one second of the timeout already.
    sleep(400).await;
    assert!(cache.has("fetchUser", user(1).as_ref()));
    sleep(200).await;
    assert!(!cache.has("fetchUser", user(1).as_ref()));
    assert_eq!(calls.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_timeout_never_expires() {
    let (cache, calls) = setup_cache(|_| {});

    cache.dispatch("fetchUser", user(1)).unwrap().await.unwrap();
    sleep(24 * 60 * 60 * 1000).await;

    assert!(cache.has("fetchUser", user(1).as_ref()));
    cache.dispatch("fetchUser", user(1)).unwrap().await.unwrap();
    assert_eq!(calls.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_per_dispatch_timeout() {
    let (cache, calls) = setup_cache(|config| {
        config.cache.timeout = Some(Duration::from_millis(100));
    });

    let options = Some(CacheOptions::with_timeout(Duration::from_secs(60)));
    cache
        .dispatch_with("fetchUser", user(1), options)
        .unwrap()
        .await
        .unwrap();
    cache.dispatch("fetchUser", user(2)).unwrap().await.unwrap();

    assert!(cache.has("fetchUser", user(1).as_ref()));
    assert!(!cache.has("fetchUser", user(2).as_ref()));
    assert_eq!(calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_expired_pending_execution_is_replaced() {
    let (cache, calls) = setup_cache(|config| {
        config.cache.timeout = Some(Duration::from_millis(100));
    });

    let first = cache.dispatch("fetchUser", user(1)).unwrap();
    sleep(200).await;

    // The first execution is still running, but its record expired.
    assert!(!cache.has("fetchUser", user(1).as_ref()));
    let second = cache.dispatch("fetchUser", user(1)).unwrap();
    assert!(!first.ptr_eq(&second));

    let (first, second) = futures::join!(first, second);
    assert_eq!(first.unwrap().id, second.unwrap().id);
    assert_eq!(calls.get(), 2);
}
