//! Memo of evaluation results keyed by `(run, block)`, with an in-flight registry.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use log::debug;
use lru::LruCache;

use crate::model::{BlockId, EvalResult, RunId};

pub const DEFAULT_RESULT_CACHE_SIZE: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub run: RunId,
    pub block: BlockId,
}

impl ResultKey {
    pub fn new(run: &RunId, block: &BlockId) -> Self {
        Self {
            run: run.clone(),
            block: block.clone(),
        }
    }
}

/// Outcome of [`ResultCache::lookup`].
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Hit(EvalResult),
    /// Another caller already asked the authority; this one has been attached to it.
    Pending,
    /// Nobody asked yet. The key is now registered as in flight; the caller must send the request.
    Miss,
}

pub struct ResultCache {
    results: LruCache<ResultKey, EvalResult>,
    /// Outstanding requests and how many callers are waiting on each.
    in_flight: HashMap<ResultKey, usize>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_CACHE_SIZE)
    }
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            results: LruCache::new(capacity),
            in_flight: HashMap::new(),
        }
    }

    pub fn get(&mut self, run: &RunId, block: &BlockId) -> Option<&EvalResult> {
        self.results.get(&ResultKey::new(run, block))
    }

    pub fn contains(&self, run: &RunId, block: &BlockId) -> bool {
        self.results.contains(&ResultKey::new(run, block))
    }

    /// Check the cache and register interest in one step.
    pub fn lookup(&mut self, run: &RunId, block: &BlockId) -> Lookup {
        let key = ResultKey::new(run, block);
        if let Some(result) = self.results.get(&key) {
            return Lookup::Hit(result.clone());
        }
        match self.in_flight.get_mut(&key) {
            Some(waiters) => {
                *waiters += 1;
                Lookup::Pending
            }
            None => {
                self.in_flight.insert(key, 1);
                Lookup::Miss
            }
        }
    }

    pub fn is_in_flight(&self, run: &RunId, block: &BlockId) -> bool {
        self.in_flight.contains_key(&ResultKey::new(run, block))
    }

    /// Store a result. An existing entry for the same key is never replaced.
    pub fn insert(&mut self, run: &RunId, block: &BlockId, result: EvalResult) -> bool {
        let key = ResultKey::new(run, block);
        if self.results.contains(&key) {
            return false;
        }
        self.results.put(key, result);
        true
    }

    /// Resolve an in-flight request.
    ///
    /// Returns how many callers were waiting, or `None` for a response nobody
    /// asked for (it is not cached).
    pub fn complete(&mut self, run: &RunId, block: &BlockId, result: EvalResult) -> Option<usize> {
        let key = ResultKey::new(run, block);
        let Some(waiters) = self.in_flight.remove(&key) else {
            debug!("Unsolicited result for {}/{}", run, block);
            return None;
        };
        self.insert(run, block, result);
        Some(waiters)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Forget every result and outstanding request.
    pub fn clear(&mut self) {
        self.results.clear();
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EvalOutput;
    use serde_json::json;

    fn ids() -> (RunId, BlockId) {
        (RunId::from("r1"), BlockId::from("b1"))
    }

    #[test]
    fn test_second_lookup_waits_on_first() {
        let mut cache = ResultCache::default();
        let (run, block) = ids();
        assert_eq!(cache.lookup(&run, &block), Lookup::Miss);
        assert_eq!(cache.lookup(&run, &block), Lookup::Pending);

        let result = EvalResult::ok(EvalOutput::Value(json!([1, 2, 3])));
        assert_eq!(cache.complete(&run, &block, result.clone()), Some(2));
        assert_eq!(cache.lookup(&run, &block), Lookup::Hit(result));
        assert!(!cache.is_in_flight(&run, &block));
    }

    #[test]
    fn test_entries_are_never_overwritten() {
        let mut cache = ResultCache::default();
        let (run, block) = ids();
        assert!(cache.insert(&run, &block, EvalResult::failed("first")));
        assert!(!cache.insert(&run, &block, EvalResult::failed("second")));
        assert_eq!(
            cache.get(&run, &block).and_then(|r| r.error.clone()),
            Some("first".to_string())
        );
    }

    #[test]
    fn test_unsolicited_response_is_dropped() {
        let mut cache = ResultCache::default();
        let (run, block) = ids();
        assert_eq!(cache.complete(&run, &block, EvalResult::default()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_runs_are_kept_apart() {
        let mut cache = ResultCache::default();
        let block = BlockId::from("b1");
        cache.insert(&RunId::from("r1"), &block, EvalResult::failed("old"));
        cache.insert(&RunId::from("r2"), &block, EvalResult::default());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&RunId::from("r1"), &block).unwrap().is_error());
    }

    #[test]
    fn test_clear_forgets_in_flight() {
        let mut cache = ResultCache::new(0);
        let (run, block) = ids();
        cache.lookup(&run, &block);
        cache.clear();
        assert!(!cache.is_in_flight(&run, &block));
        assert_eq!(cache.lookup(&run, &block), Lookup::Miss);
    }
}
