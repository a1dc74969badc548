//! An in-process result cache for asynchronous actions.
//!
//! The [`ActionCache`](services::ActionCache) sits in front of an
//! [`ActionInvoker`](services::ActionInvoker) and caches the outcome of each dispatch, keyed by
//! the action name and its [`Payload`](caching::Payload). Concurrent dispatches of the same
//! action and payload are coalesced into a single execution.

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod logging;
pub mod services;
pub mod utils;

pub use caching::{CacheError, CacheKey, CacheOptions, CacheState, Outcome, Payload, SharedPayload};
pub use services::{Action, ActionCache, ActionInvoker, ActionRegistry, Dispatch, Invocation};
