use std::sync::Arc;

use actioncache::config::Config;
use actioncache::{Action, ActionCache, ActionInvoker, Invocation, Payload};
use actioncache_test as test;

pub use test::{Counter, sleep};

/// A user as returned by the [`Users`] service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

/// A hand-written invoker over a fake user directory.
///
/// All actions count their invocations in [`Users::calls`]:
///
///  - `fetchUser` takes a second and returns the user with the `id` from the payload.
///  - `renameUser` returns right away, and fails synchronously without a `name`.
///  - `brokenUser` takes 100ms and then fails.
#[derive(Clone, Debug, Default)]
pub struct Users {
    pub calls: Counter,
}

impl Users {
    fn fetch(&self) -> Action<User, String> {
        let calls = self.calls.clone();
        Arc::new(move |payload: Option<Payload>| -> Invocation<User, String> {
            calls.incr();
            let id = field(payload.as_ref(), "id").and_then(|id| id.parse::<u64>().ok());
            Invocation::pending(async move {
                sleep(1000).await;
                let id = id.ok_or_else(|| "missing id".to_owned())?;
                Ok(User {
                    id,
                    name: format!("user {id}"),
                })
            })
        })
    }

    fn rename(&self) -> Action<User, String> {
        let calls = self.calls.clone();
        Arc::new(move |payload: Option<Payload>| -> Invocation<User, String> {
            calls.incr();
            match field(payload.as_ref(), "name") {
                Some(name) => Invocation::ready(User { id: 0, name }),
                None => Invocation::failed("missing name".to_owned()),
            }
        })
    }

    fn broken(&self) -> Action<User, String> {
        let calls = self.calls.clone();
        Arc::new(move |_: Option<Payload>| -> Invocation<User, String> {
            let attempt = calls.incr();
            Invocation::pending(async move {
                sleep(100).await;
                Err(format!("attempt {attempt} failed"))
            })
        })
    }
}

impl ActionInvoker for Users {
    type Output = User;
    type Error = String;

    fn resolve(&self, name: &str) -> Option<Action<User, String>> {
        match name {
            "fetchUser" => Some(self.fetch()),
            "renameUser" => Some(self.rename()),
            "brokenUser" => Some(self.broken()),
            _ => None,
        }
    }
}

fn field(payload: Option<&Payload>, name: &str) -> Option<String> {
    match payload {
        Some(Payload::Object(map)) => match map.get(name)? {
            Payload::String(s) => Some(s.clone()),
            Payload::Number(n) => Some(n.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// A payload selecting the user with the given `id`.
pub fn user(id: u64) -> Option<Payload> {
    Some(Payload::object().with("id", id))
}

/// Setup tests and create a cache over a fresh [`Users`] service.
///
/// The `update_config` closure can modify the default configuration before the cache is created.
pub fn setup_cache(update_config: impl FnOnce(&mut Config)) -> (ActionCache<Users>, Counter) {
    test::setup();

    let mut config = Config::default();
    update_config(&mut config);

    let users = Users::default();
    let calls = users.calls.clone();
    (ActionCache::new(users, config.cache), calls)
}
