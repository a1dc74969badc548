use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::caching::Payload;

/// The result of invoking an action: either available right away, or still being computed.
pub enum Invocation<T, E> {
    /// The action ran synchronously, and succeeded or failed right away.
    Ready(Result<T, E>),
    /// The action returned a future that will settle later.
    Pending(BoxFuture<'static, Result<T, E>>),
}

impl<T, E> Invocation<T, E> {
    pub fn ready(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    pub fn failed(error: E) -> Self {
        Self::Ready(Err(error))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    /// Whether the action already failed synchronously.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Ready(Err(_)))
    }

    /// Normalizes the invocation into a future, where a ready result becomes an already
    /// resolved future.
    pub fn into_future(self) -> BoxFuture<'static, Result<T, E>>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        match self {
            Self::Ready(result) => futures::future::ready(result).boxed(),
            Self::Pending(future) => future,
        }
    }
}

impl<T, E> From<Result<T, E>> for Invocation<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Self::Ready(result)
    }
}

impl<T, E> fmt::Debug for Invocation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(Ok(_)) => f.write_str("Invocation::Ready(Ok(..))"),
            Self::Ready(Err(_)) => f.write_str("Invocation::Ready(Err(..))"),
            Self::Pending(_) => f.write_str("Invocation::Pending"),
        }
    }
}

/// A resolved action, bound to whatever context it needs, taking the payload as its only input.
pub type Action<T, E> = Arc<dyn Fn(Option<Payload>) -> Invocation<T, E> + Send + Sync>;

/// The capability to look up and execute actions by name.
///
/// An [`ActionCache`](super::ActionCache) is bound to one invoker for its entire lifetime.
pub trait ActionInvoker: Send + Sync + 'static {
    /// The value a successful action produces.
    type Output: Send + Sync + 'static;
    /// The error a failed action produces.
    type Error: Send + Sync + 'static;

    /// Resolves the action registered as `name`, or `None` if there is no such action.
    fn resolve(&self, name: &str) -> Option<Action<Self::Output, Self::Error>>;
}

impl<I: ActionInvoker + ?Sized> ActionInvoker for Arc<I> {
    type Output = I::Output;
    type Error = I::Error;

    fn resolve(&self, name: &str) -> Option<Action<Self::Output, Self::Error>> {
        (**self).resolve(name)
    }
}

/// A named registry of actions, which is the simplest [`ActionInvoker`].
///
/// ```
/// use actioncache::{ActionCache, ActionRegistry};
///
/// let registry = ActionRegistry::<u64, String>::new()
///     .register_sync("double", |payload| match payload {
///         Some(actioncache::Payload::Number(n)) => Ok(n.as_u64().unwrap_or_default() * 2),
///         _ => Err("expected a number".to_owned()),
///     })
///     .register("fetch", |_payload| async { Ok(42) });
///
/// let cache = ActionCache::new(registry, Default::default());
/// assert!(cache.dispatch("unknown", None).is_err());
/// ```
pub struct ActionRegistry<T, E> {
    actions: BTreeMap<String, Action<T, E>>,
}

impl<T, E> Default for ActionRegistry<T, E> {
    fn default() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }
}

impl<T, E> ActionRegistry<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asynchronous action.
    pub fn register<F, Fut>(self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Option<Payload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.register_invocation(name, move |payload| Invocation::pending(action(payload)))
    }

    /// Registers an action that runs to completion synchronously.
    pub fn register_sync<F>(self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Option<Payload>) -> Result<T, E> + Send + Sync + 'static,
    {
        self.register_invocation(name, move |payload| Invocation::Ready(action(payload)))
    }

    /// Registers an action that decides per call whether to return right away or a future.
    ///
    /// Registering a name twice replaces the earlier action.
    pub fn register_invocation<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Option<Payload>) -> Invocation<T, E> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    /// The names of all registered actions, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

impl<T, E> fmt::Debug for ActionRegistry<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions.keys()).finish()
    }
}

impl<T, E> ActionInvoker for ActionRegistry<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    fn resolve(&self, name: &str) -> Option<Action<T, E>> {
        self.actions.get(name).cloned()
    }
}
