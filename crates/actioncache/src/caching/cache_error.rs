use thiserror::Error;

/// An error that happens synchronously when dispatching through the cache.
///
/// Failures of the action itself are never wrapped in this type. They are delivered unchanged
/// through the [`Dispatch`](crate::services::Dispatch) future.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The action is not registered with the invoker.
    #[error("unknown action: {0}")]
    UnknownAction(String),
}
