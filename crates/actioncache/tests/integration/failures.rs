use std::sync::Arc;

use actioncache::{CacheError, Payload};

use crate::{setup_cache, sleep};

#[tokio::test]
async fn test_unknown_action() {
    let (cache, calls) = setup_cache(|_| {});

    let err = cache.dispatch("deleteUser", None).unwrap_err();
    assert_eq!(err, CacheError::UnknownAction("deleteUser".to_owned()));
    assert_eq!(err.to_string(), "unknown action: deleteUser");
    assert!(cache.state().is_empty());
    assert_eq!(calls.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_evicted_and_retried() {
    let (cache, calls) = setup_cache(|_| {});

    let first = cache.dispatch("brokenUser", None).unwrap();
    let second = cache.dispatch("brokenUser", None).unwrap();
    assert!(cache.has("brokenUser", None));

    let (first, second) = futures::join!(first, second);
    let (first, second) = (first.unwrap_err(), second.unwrap_err());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*first, "attempt 1 failed");
    assert!(!cache.has("brokenUser", None));

    let retry = cache.dispatch("brokenUser", None).unwrap().await.unwrap_err();
    assert_eq!(*retry, "attempt 2 failed");
    assert_eq!(calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_has_while_failing_execution_is_pending() {
    let (cache, _calls) = setup_cache(|_| {});

    let dispatch = tokio::spawn(cache.dispatch("brokenUser", None).unwrap());
    sleep(50).await;
    assert!(cache.has("brokenUser", None));

    dispatch.await.unwrap().unwrap_err();
    assert!(!cache.has("brokenUser", None));
}

#[tokio::test]
async fn test_sync_failure_is_delivered_uncached() {
    let (cache, calls) = setup_cache(|_| {});

    let err = cache.dispatch("renameUser", None).unwrap().await.unwrap_err();
    assert_eq!(*err, "missing name");
    assert!(!cache.has("renameUser", None));

    let payload = Payload::object().with("name", "alice");
    let renamed = cache.dispatch("renameUser", Some(payload)).unwrap().await.unwrap();
    assert_eq!(renamed.name, "alice");
    assert_eq!(calls.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_async_failure_without_id() {
    let (cache, calls) = setup_cache(|_| {});

    let err = cache
        .dispatch("fetchUser", Some(Payload::object()))
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(*err, "missing id");
    assert!(cache.state().is_empty());
    assert_eq!(calls.get(), 1);
}
