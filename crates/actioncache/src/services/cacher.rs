use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::caching::{
    CacheError, CacheKey, CacheOptions, CacheRecord, CacheState, CacheStore, Outcome, Payload,
    SharedOutcome,
};
use crate::utils::defer::defer;

use super::invoker::{ActionInvoker, Invocation};

type StoreRef<T, E> = Arc<Mutex<CacheStore<T, E>>>;

/// A result cache in front of an [`ActionInvoker`].
///
/// Every [`dispatch`](Self::dispatch) is keyed by the action name and its payload. A dispatch
/// either attaches to the record already cached for its key, or executes the action and installs
/// a new record for everyone else to attach to. This deduplicates concurrent dispatches of the
/// same action and payload (request coalescing), and serves repeated dispatches from the cache
/// until the record expires or is removed.
///
/// Failed executions are never cached: their record is removed before the failure is delivered.
///
/// The cache does not spawn tasks. A pending execution is driven by whoever polls a [`Dispatch`]
/// attached to it, and since the record holds on to it, a later dispatch resumes it even if all
/// earlier callers dropped their handles.
///
/// Cloning an `ActionCache` creates another handle to the same cache.
pub struct ActionCache<I: ActionInvoker> {
    invoker: Arc<I>,
    options: CacheOptions,
    store: StoreRef<I::Output, I::Error>,
}

impl<I: ActionInvoker> Clone for ActionCache<I> {
    fn clone(&self) -> Self {
        Self {
            invoker: Arc::clone(&self.invoker),
            options: self.options,
            store: Arc::clone(&self.store),
        }
    }
}

impl<I: ActionInvoker> fmt::Debug for ActionCache<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.store.try_lock().map(|s| s.len());
        f.debug_struct("ActionCache")
            .field("options", &self.options)
            .field("entries", &entries)
            .finish()
    }
}

impl<I: ActionInvoker> ActionCache<I> {
    /// Creates a cache bound to `invoker`, with the given cache-wide defaults.
    pub fn new(invoker: I, options: CacheOptions) -> Self {
        Self {
            invoker: Arc::new(invoker),
            options,
            store: Default::default(),
        }
    }

    /// The invoker this cache is bound to.
    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// The cache-wide default options.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Dispatches `action` with the cache-wide default options.
    ///
    /// See [`dispatch_with`](Self::dispatch_with).
    pub fn dispatch(
        &self,
        action: &str,
        payload: Option<Payload>,
    ) -> Result<Dispatch<I::Output, I::Error>, CacheError> {
        self.dispatch_with(action, payload, None)
    }

    /// Dispatches `action` through the cache.
    ///
    /// The returned [`Dispatch`] resolves to the outcome of the action. If a live record exists
    /// for the action and payload, the dispatch is attached to it, and the action is not executed
    /// again. Otherwise the action is executed and its outcome cached, expiring after the timeout
    /// from `options`, or from the cache-wide defaults if `options` does not set one.
    ///
    /// Payloads that cannot be keyed are dispatched straight to the action, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Fails with [`CacheError::UnknownAction`] right away if the invoker does not know `action`.
    /// Failures of the action itself are delivered through the returned [`Dispatch`].
    pub fn dispatch_with(
        &self,
        action: &str,
        payload: Option<Payload>,
        options: Option<CacheOptions>,
    ) -> Result<Dispatch<I::Output, I::Error>, CacheError> {
        let entry = self
            .invoker
            .resolve(action)
            .ok_or_else(|| CacheError::UnknownAction(action.to_owned()))?;
        metric!(counter("caches.access") += 1, "action" => action);

        let key = match CacheKey::generate(action, payload.as_ref()) {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!(action, "Dispatching uncached: {}", err);
                metric!(counter("caches.bypass") += 1, "action" => action);
                return Ok(Dispatch::uncached(entry(payload)));
            }
        };

        let now = Instant::now();
        let (id, value, sender) = {
            let mut store = self.store.lock();

            if let Some(record) = store.get(&key) {
                if !record.is_expired(now) {
                    if record.is_settled() {
                        tracing::trace!(%key, "Serving from cache");
                        metric!(counter("caches.memory.hit") += 1, "action" => action);
                    } else {
                        // A concurrent dispatch was deduplicated.
                        tracing::trace!(%key, "Attaching to pending execution");
                        metric!(counter("caches.channel.hit") += 1, "action" => action);
                    }
                    return Ok(Dispatch::cached(record.value.clone()));
                }
                metric!(counter("caches.expired") += 1, "action" => action);
            }

            let timeout = CacheOptions::resolve(options.as_ref(), &self.options);
            let id = store.next_id();
            let (sender, receiver) = oneshot::channel();
            let value = settle(Arc::downgrade(&self.store), key.clone(), id, now, receiver)
                .boxed()
                .shared();
            store.insert(
                key.clone(),
                CacheRecord {
                    id,
                    value: value.clone(),
                    expires_at: timeout.map(|timeout| now + timeout),
                },
            );
            metric!(gauge("caches.entries") = store.len() as u64);
            (id, value, sender)
        };

        tracing::debug!(%key, "Executing action");
        metric!(counter("caches.computation") += 1, "action" => action);

        // The action runs outside of the lock, so it may dispatch on this cache itself. If it
        // panics, the record it would have settled must not linger.
        let evict_on_panic = defer(|| {
            self.store.lock().remove_record(&key, id);
        });
        let invocation = entry(payload);
        evict_on_panic.disarm();

        if invocation.is_failed() {
            // A synchronous failure is never cached. Dispatches that attached in the meantime
            // still observe it through the channel.
            self.store.lock().remove_record(&key, id);
        }
        sender.send(invocation).ok();

        Ok(Dispatch::cached(value))
    }

    /// Whether a live record exists for `action` and `payload`.
    ///
    /// This includes executions that are still pending. Expired records are reported as absent,
    /// but not removed.
    pub fn has(&self, action: &str, payload: Option<&Payload>) -> bool {
        let Ok(key) = CacheKey::generate(action, payload) else {
            return false;
        };
        let now = Instant::now();
        self.store
            .lock()
            .get(&key)
            .is_some_and(|record| !record.is_expired(now))
    }

    /// Removes the record for `action` and `payload`, expired or not.
    ///
    /// Returns whether there was a record to remove. Dispatches already attached to it still
    /// resolve normally.
    pub fn delete(&self, action: &str, payload: Option<&Payload>) -> bool {
        let Ok(key) = CacheKey::generate(action, payload) else {
            return false;
        };
        self.store.lock().remove(&key)
    }

    /// Removes all records of `action`, or all records if `action` is `None`.
    ///
    /// Returns whether any records of `action` were removed. Clearing everything always returns
    /// `true`, even if the cache was empty.
    pub fn clear(&self, action: Option<&str>) -> bool {
        let mut store = self.store.lock();
        match action {
            Some(action) => store.remove_action(action),
            None => {
                store.clear();
                true
            }
        }
    }

    /// A live, read-only view of the cached records.
    pub fn state(&self) -> CacheState<I::Output, I::Error> {
        CacheState::new(Arc::clone(&self.store))
    }
}

/// Drives a single execution to completion, and removes its record if it fails.
///
/// The invocation arrives through `receiver` because the action is only invoked after its record
/// was installed. If the sender is dropped without sending, the action panicked.
async fn settle<T, E>(
    store: Weak<Mutex<CacheStore<T, E>>>,
    key: CacheKey,
    id: u64,
    started: Instant,
    receiver: oneshot::Receiver<Invocation<T, E>>,
) -> Outcome<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let result = match receiver.await {
        Ok(invocation) => invocation.into_future().await,
        Err(oneshot::Canceled) => panic!("action for `{key}` panicked before returning"),
    };
    metric!(timer("caches.computation.duration") = started.elapsed(), "action" => key.action());

    match result {
        Ok(value) => Ok(Arc::new(value)),
        Err(error) => {
            let evicted = store
                .upgrade()
                .is_some_and(|store| store.lock().remove_record(&key, id));
            if evicted {
                tracing::debug!(%key, "Execution failed, evicted from cache");
                metric!(counter("caches.evicted") += 1, "action" => key.action());
            }
            Err(Arc::new(error))
        }
    }
}

enum DispatchInner<T, E> {
    Cached(SharedOutcome<T, E>),
    Uncached(BoxFuture<'static, Outcome<T, E>>),
}

/// The future returned by [`ActionCache::dispatch`].
///
/// All dispatches attached to the same execution resolve to clones of the same [`Arc`]s, so the
/// value or error can be compared by identity with [`Arc::ptr_eq`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Dispatch<T, E> {
    inner: DispatchInner<T, E>,
}

impl<T, E> Dispatch<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn cached(value: SharedOutcome<T, E>) -> Self {
        Self {
            inner: DispatchInner::Cached(value),
        }
    }

    fn uncached(invocation: Invocation<T, E>) -> Self {
        let future = invocation
            .into_future()
            .map(|result| result.map(Arc::new).map_err(Arc::new))
            .boxed();
        Self {
            inner: DispatchInner::Uncached(future),
        }
    }

    /// Whether this dispatch is backed by a cache record, rather than bypassing the cache.
    pub fn is_cached(&self) -> bool {
        matches!(self.inner, DispatchInner::Cached(_))
    }

    /// Whether both dispatches are attached to the very same execution.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (DispatchInner::Cached(a), DispatchInner::Cached(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl<T, E> Future for Dispatch<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            DispatchInner::Cached(shared) => shared.poll_unpin(cx),
            DispatchInner::Uncached(future) => future.poll_unpin(cx),
        }
    }
}

impl<T, E> fmt::Debug for Dispatch<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            DispatchInner::Cached(_) => "cached",
            DispatchInner::Uncached(_) => "uncached",
        };
        f.debug_tuple("Dispatch").field(&kind).finish()
    }
}
