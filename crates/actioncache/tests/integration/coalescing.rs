use std::sync::Arc;
use std::time::Duration;

use actioncache::Payload;
use serde_json::json;

use crate::{setup_cache, user};

#[tokio::test(start_paused = true)]
async fn test_concurrent_dispatches_execute_once() {
    let (cache, calls) = setup_cache(|_| {});

    let first = cache.dispatch("fetchUser", user(1)).unwrap();
    let second = cache.dispatch("fetchUser", user(1)).unwrap();
    assert!(first.ptr_eq(&second));

    let started = tokio::time::Instant::now();
    let (first, second) = futures::join!(first, second);
    assert!(started.elapsed() >= Duration::from_millis(1000));

    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name, "user 1");
    assert_eq!(calls.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_structurally_equal_payloads_coalesce() {
    let (cache, calls) = setup_cache(|_| {});

    let from_json: Payload = json!({"id": 1}).into();
    let built = Payload::object().with("id", 1u64);

    let first = cache.dispatch("fetchUser", Some(from_json)).unwrap();
    let second = cache.dispatch("fetchUser", Some(built)).unwrap();
    assert!(first.ptr_eq(&second));

    let (first, second) = futures::join!(first, second);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(calls.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_dispatch_attaches_to_pending() {
    let (cache, calls) = setup_cache(|_| {});

    let first = cache.dispatch("fetchUser", user(1)).unwrap();
    let first = tokio::spawn(first);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(cache.has("fetchUser", user(1).as_ref()));
    let second = cache.dispatch("fetchUser", user(1)).unwrap().await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_callers_do_not_cancel() {
    let (cache, calls) = setup_cache(|_| {});

    let mut first = cache.dispatch("fetchUser", user(1)).unwrap();
    // Poll once to start the execution, then give up.
    assert!(futures::poll!(&mut first).is_pending());
    drop(first);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let fetched = cache.dispatch("fetchUser", user(1)).unwrap().await.unwrap();
    assert_eq!(fetched.id, 1);
    assert_eq!(calls.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_many_callers_across_tasks() {
    let (cache, calls) = setup_cache(|_| {});

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.dispatch("fetchUser", user(i % 4)).unwrap().await })
        })
        .collect();

    let mut users = Vec::new();
    for task in tasks {
        users.push(task.await.unwrap().unwrap());
    }

    assert_eq!(calls.get(), 4);
    for (i, user) in users.iter().enumerate() {
        assert_eq!(user.id, i as u64 % 4);
        assert!(Arc::ptr_eq(user, &users[i % 4]));
    }
}
