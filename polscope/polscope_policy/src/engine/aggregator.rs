//! Result aggregation.
//!
//! This module merges results from several queries and reduces result
//! lists to bitmaps of element ordinals, which diff tooling compares.

use polscope_core::error::Result;
use polscope_core::{ElementHandle, PolicyAccessor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::model::{SearchResult, SparseBitSet};

/// Merge result lists, joining the proofs of results for the same element.
///
/// # Arguments
///
/// * `lists` - Result lists, typically from several queries.
///
/// # Returns
///
/// * `Ok(Vec<SearchResult>)` - One result per element, in the order the
///   elements were first seen.
/// * `Err` - If two results claim the same element but disagree about it.
pub fn merge_results<I>(lists: I) -> Result<Vec<SearchResult>>
where
    I: IntoIterator<Item = Vec<SearchResult>>,
{
    let mut merged: Vec<SearchResult> = Vec::new();
    let mut positions: HashMap<ElementHandle, usize> = HashMap::new();

    for result in lists.into_iter().flatten() {
        match positions.get(&result.element) {
            Some(&index) => merged[index].merge(result)?,
            None => {
                positions.insert(result.element, merged.len());
                merged.push(result);
            }
        }
    }

    debug!(results = merged.len(), "merged results");
    Ok(merged)
}

/// The difference between two element sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDiff {
    /// Elements only in the new set.
    pub added: SparseBitSet,

    /// Elements only in the old set.
    pub removed: SparseBitSet,

    /// Elements in both sets.
    pub common: SparseBitSet,
}

impl ElementDiff {
    /// Compare two element sets.
    pub fn between(old: &SparseBitSet, new: &SparseBitSet) -> Self {
        Self {
            added: new.difference(old),
            removed: old.difference(new),
            common: old.intersection(new),
        }
    }

    /// Check whether the sets were equal.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Reduces results to ordinal sets.
pub struct ResultAggregator<'a> {
    /// The policy the results came from.
    accessor: &'a dyn PolicyAccessor,
}

impl<'a> ResultAggregator<'a> {
    /// Create a new result aggregator.
    ///
    /// # Arguments
    ///
    /// * `accessor` - The policy the results came from.
    pub fn new(accessor: &'a dyn PolicyAccessor) -> Self {
        Self { accessor }
    }

    /// Build the set of ordinals of the matched elements.
    ///
    /// # Returns
    ///
    /// * `Ok(SparseBitSet)` - One bit per element ordinal.
    /// * `Err` - If an element is unknown to the policy.
    pub fn ordinal_set(&self, results: &[SearchResult]) -> Result<SparseBitSet> {
        let mut set = SparseBitSet::new();
        for result in results {
            set.set(self.accessor.ordinal(result.element)?, true);
        }
        Ok(set)
    }

    /// Compare the results of two runs against the same policy.
    pub fn diff(&self, old: &[SearchResult], new: &[SearchResult]) -> Result<ElementDiff> {
        let diff = ElementDiff::between(&self.ordinal_set(old)?, &self.ordinal_set(new)?);
        debug!(
            added = diff.added.len(),
            removed = diff.removed.len(),
            common = diff.common.len(),
            "compared results"
        );
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Proof, TestCondition};
    use crate::store::test_fixtures::mls_policy;
    use polscope_core::types::ElementKind;

    fn result(policy: &dyn PolicyAccessor, name: &str, proof: &str) -> SearchResult {
        let handle = policy.resolve_by_name(ElementKind::Type, name).unwrap();
        let mut result = SearchResult::new(handle, name);
        result
            .proofs
            .push(Proof::new(TestCondition::Name, ElementKind::String, None, proof));
        result
    }

    #[test]
    fn test_merge_results_preserves_first_seen_order() {
        let policy = mls_policy();
        let first = vec![result(&policy, "sshd_t", "a"), result(&policy, "httpd_t", "b")];
        let second = vec![result(&policy, "etc_t", "c"), result(&policy, "sshd_t", "d")];

        let merged = merge_results(vec![first, second]).unwrap();
        let names: Vec<&str> = merged.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sshd_t", "httpd_t", "etc_t"]);

        let proofs: Vec<&str> = merged[0].proofs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(proofs, vec!["a", "d"]);
    }

    #[test]
    fn test_merge_nothing() {
        assert!(merge_results(Vec::<Vec<SearchResult>>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_diff() {
        let policy = mls_policy();
        let aggregator = ResultAggregator::new(&policy);
        let old = vec![result(&policy, "httpd_t", "x"), result(&policy, "sshd_t", "x")];
        let new = vec![result(&policy, "sshd_t", "x"), result(&policy, "etc_t", "x")];

        let diff = aggregator.diff(&old, &new).unwrap();
        let ordinal = |name| {
            policy
                .ordinal(policy.resolve_by_name(ElementKind::Type, name).unwrap())
                .unwrap()
        };
        assert_eq!(diff.added.iter().collect::<Vec<_>>(), vec![ordinal("etc_t")]);
        assert_eq!(diff.removed.iter().collect::<Vec<_>>(), vec![ordinal("httpd_t")]);
        assert_eq!(diff.common.iter().collect::<Vec<_>>(), vec![ordinal("sshd_t")]);
        assert!(!diff.is_unchanged());

        assert!(aggregator.diff(&old, &old).unwrap().is_unchanged());
    }
}
