// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

pub mod coalescing;
pub mod config;
pub mod expiry;
pub mod failures;
pub mod utils;

pub use utils::*;
