//! Deferred-invocation cache.
//!
//! Tag processing records invocations here during a render cycle; the
//! post-parse hook drains them exactly once on the final render. The cache
//! is scoped to one render cycle, so cross-cycle partitioning is simply a
//! matter of constructing one cache per cycle.

mod lock;
mod store;

pub use store::{DeferredCallCache, TEMPLATE_POST_PARSE};
