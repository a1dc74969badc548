use std::io::Write;
use std::time::Duration;

use actioncache::config::Config;
use actioncache::{ActionCache, Payload};

use crate::{Users, sleep};

#[tokio::test(start_paused = true)]
async fn test_cache_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cache:\n  timeout: 250ms").unwrap();

    let config = Config::get(Some(file.path())).unwrap();
    assert_eq!(config.cache.timeout, Some(Duration::from_millis(250)));

    let users = Users::default();
    let calls = users.calls.clone();
    let cache = ActionCache::new(users, config.cache);
    assert_eq!(cache.options().timeout, Some(Duration::from_millis(250)));

    let payload = Payload::object().with("name", "x");
    cache
        .dispatch("renameUser", Some(payload.clone()))
        .unwrap()
        .await
        .unwrap();
    assert!(cache.has("renameUser", Some(&payload)));

    sleep(300).await;
    assert!(!cache.has("renameUser", Some(&payload)));
    assert_eq!(cache.state().len(), 1);
    assert_eq!(calls.get(), 1);
}
