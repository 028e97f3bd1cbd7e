//! Bucketed storage for deferred tag invocations.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::tags::{DeferredInvocation, TagParams, UnknownOperationError};

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Bucket consumed by the post-parse hook on the final render.
pub const TEMPLATE_POST_PARSE: &str = "template_post_parse";

/// Keyed store of invocations whose output could only be computed once the
/// full template was known.
///
/// Entries within a bucket keep their recording order; replay depends on it
/// because later invocations may read state mutated by earlier ones. A
/// duplicate placeholder key replaces the earlier entry in place, so the
/// newest payload runs at the original position.
#[derive(Debug, Default)]
pub struct DeferredCallCache {
    buckets: RwLock<HashMap<String, Vec<DeferredInvocation>>>,
}

impl DeferredCallCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation under a bucket. Idempotent per placeholder key:
    /// recording the same key twice keeps one entry.
    pub fn record(&self, bucket: &str, invocation: DeferredInvocation) {
        let mut buckets = rw_write(&self.buckets, SOURCE, "record");
        let entries = buckets.entry(bucket.to_string()).or_default();
        match entries.iter_mut().find(|entry| entry.key == invocation.key) {
            Some(entry) => *entry = invocation,
            None => entries.push(invocation),
        }
    }

    /// Record from raw collaborator input: the operation name is parsed
    /// against the supported set and rejected if unknown.
    pub fn record_raw(
        &self,
        bucket: &str,
        key: &str,
        operation: &str,
        params: TagParams,
    ) -> Result<(), UnknownOperationError> {
        self.record(bucket, DeferredInvocation::from_raw(key, operation, params)?);
        Ok(())
    }

    /// Take every invocation recorded under a bucket, in recording order,
    /// emptying the bucket for the rest of the render cycle. A bucket that
    /// was never populated (or was already drained) yields an empty vector;
    /// absent deferred work is a normal outcome, not a failure.
    pub fn drain(&self, bucket: &str) -> Vec<DeferredInvocation> {
        rw_write(&self.buckets, SOURCE, "drain")
            .remove(bucket)
            .unwrap_or_default()
    }

    /// Number of pending invocations in a bucket.
    pub fn pending(&self, bucket: &str) -> usize {
        rw_read(&self.buckets, SOURCE, "pending")
            .get(bucket)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        rw_read(&self.buckets, SOURCE, "is_empty")
            .values()
            .all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use crate::domain::tags::{OperationName, TagParams};

    use super::*;

    fn invocation(key: &str, operation: OperationName) -> DeferredInvocation {
        DeferredInvocation::new(key, operation, TagParams::new())
    }

    #[test]
    fn drain_returns_recording_order_then_empties() {
        let cache = DeferredCallCache::new();
        cache.record(TEMPLATE_POST_PARSE, invocation("a", OperationName::Css));
        cache.record(TEMPLATE_POST_PARSE, invocation("b", OperationName::Js));
        cache.record(TEMPLATE_POST_PARSE, invocation("c", OperationName::Display));

        let drained = cache.drain(TEMPLATE_POST_PARSE);
        let keys: Vec<&str> = drained.iter().map(|inv| inv.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        assert!(cache.drain(TEMPLATE_POST_PARSE).is_empty());
    }

    #[test]
    fn unpopulated_bucket_drains_empty() {
        let cache = DeferredCallCache::new();
        assert!(cache.drain("never_recorded").is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn duplicate_key_overwrites_in_place() {
        let cache = DeferredCallCache::new();
        cache.record(TEMPLATE_POST_PARSE, invocation("a", OperationName::Css));
        cache.record(TEMPLATE_POST_PARSE, invocation("b", OperationName::Js));
        cache.record(TEMPLATE_POST_PARSE, invocation("a", OperationName::Display));

        let drained = cache.drain(TEMPLATE_POST_PARSE);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key, "a");
        assert_eq!(drained[0].operation, OperationName::Display);
        assert_eq!(drained[1].key, "b");
    }

    #[test]
    fn record_raw_rejects_unknown_operations() {
        let cache = DeferredCallCache::new();
        let err = cache
            .record_raw(TEMPLATE_POST_PARSE, "a", "embed", TagParams::new())
            .unwrap_err();
        assert_eq!(err.0, "embed");

        cache
            .record_raw(TEMPLATE_POST_PARSE, "a", "display", TagParams::new())
            .expect("known operation should record");
        assert_eq!(cache.pending(TEMPLATE_POST_PARSE), 1);
    }

    #[test]
    fn buckets_are_independent() {
        let cache = DeferredCallCache::new();
        cache.record("one", invocation("a", OperationName::Css));
        cache.record("two", invocation("b", OperationName::Js));

        assert_eq!(cache.pending("one"), 1);
        assert_eq!(cache.drain("two").len(), 1);
        assert_eq!(cache.pending("one"), 1);
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let cache = DeferredCallCache::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .buckets
                .write()
                .expect("buckets lock should be acquired");
            panic!("poison buckets lock");
        }));

        cache.record(TEMPLATE_POST_PARSE, invocation("a", OperationName::Css));
        assert_eq!(cache.pending(TEMPLATE_POST_PARSE), 1);
    }
}
