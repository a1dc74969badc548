use std::time::Duration;

use serde::Deserialize;

/// Expiry options, both for a whole cache and for a single dispatch.
///
/// Options given to a dispatch take precedence over the cache-wide defaults. Without a timeout
/// anywhere, cached results never expire by time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// How long a result stays cached, counted from the moment its execution started.
    ///
    /// A zero timeout means "never expires".
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl CacheOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Resolves the effective timeout for a dispatch.
    ///
    /// An explicit per-dispatch timeout wins even if it is zero, which then disables expiry for
    /// that dispatch regardless of the cache default.
    pub fn resolve(dispatch: Option<&Self>, defaults: &Self) -> Option<Duration> {
        dispatch
            .and_then(|options| options.timeout)
            .or(defaults.timeout)
            .filter(|timeout| !timeout.is_zero())
    }
}
