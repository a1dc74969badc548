//! The action cache and the invoker abstraction it dispatches to.

mod cacher;
mod invoker;

pub use cacher::*;
pub use invoker::*;
