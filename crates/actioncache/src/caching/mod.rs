//! # Caching infrastructure
//!
//! This module contains the building blocks of the action cache: the [`Payload`] model, the
//! [`CacheKey`] derived from an action name and its payload, and the store that maps keys to
//! cached executions. The dispatch logic that ties these together lives in
//! [`ActionCache`](crate::services::ActionCache).
//!
//! ## [`CacheKey`]
//!
//! A key consists of the action name and a serialized form of the payload, and is displayed as
//! `"<action>:<payload>"`. Primitive payloads are coerced to their plain string form (so the
//! string `"1"` and the number `1` share a key), structured payloads go through a canonical
//! JSON-style encoding with sorted object keys. An absent payload is serialized as `undefined`.
//!
//! Payloads that contain themselves through a [`SharedPayload`] cannot be encoded. Key generation
//! then fails with [`Unrepresentable`], and the dispatch falls back to running the action without
//! touching the cache at all.
//!
//! ## Records and expiry
//!
//! Each key maps to one record, which holds a shared handle to the outcome of a single
//! execution, and an optional expiry instant. A record is installed the moment a dispatch misses,
//! so concurrent dispatches attach to the pending execution instead of starting their own.
//!
//! - A successful execution stays cached until its record expires, or is deleted or cleared.
//! - A failed execution removes its own record before the failure reaches any caller, so failures
//!   are never served from the cache.
//!
//! Expiry is lazy: there is no background sweeper. An expired record answers `false` to
//! [`has`](crate::services::ActionCache::has) and is replaced by the next dispatch for its key,
//! but it occupies memory until then.
//!
//! ### Metrics
//!
//! - `caches.access`: All dispatches of known actions.
//! - `caches.memory.hit`: Dispatches served by a settled record.
//! - `caches.channel.hit`: Dispatches coalesced onto a pending execution.
//! - `caches.computation`: Actual action executions started by the cache.
//! - `caches.expired`: Expired records replaced by a fresh execution.
//! - `caches.evicted`: Records removed because their execution failed.
//! - `caches.bypass`: Dispatches with unrepresentable payloads, executed uncached.
//! - `caches.computation.duration`: Time from a miss until its execution settled.
//! - `caches.entries`: A gauge of the number of records after each install.

mod cache_error;
mod cache_key;
mod options;
mod payload;
mod store;

pub use cache_error::*;
pub use cache_key::*;
pub use options::*;
pub use payload::*;
pub use store::{CacheState, Outcome};

pub(crate) use store::{CacheRecord, CacheStore, SharedOutcome};
