//! Query evaluation.
//!
//! This module runs a query against a policy: it gathers top-level
//! candidates, evaluates each test against them, and combines the test
//! outcomes according to the query's match mode.

use polscope_core::error::{Result, UsageError};
use polscope_core::{ElementHandle, PolicyAccessor};
use tracing::{debug, debug_span, trace};

use super::extractor::{Candidate, ValueExtractor};
use crate::model::{
    FileContextList, MatchContext, MatchMode, Proof, Query, SearchResult, Test, TestCondition,
};

/// Query evaluation engine.
///
/// The evaluator only reads the policy; the same evaluator may run any
/// number of queries.
pub struct QueryEvaluator<'a> {
    /// The policy.
    accessor: &'a dyn PolicyAccessor,

    /// File contexts, when supplied.
    fclist: Option<&'a FileContextList>,
}

impl<'a> QueryEvaluator<'a> {
    /// Create a new query evaluator.
    ///
    /// # Arguments
    ///
    /// * `accessor` - The policy to search.
    /// * `fclist` - File contexts for queries with `FcEntry` tests.
    ///
    /// # Returns
    ///
    /// A new query evaluator.
    pub fn new(accessor: &'a dyn PolicyAccessor, fclist: Option<&'a FileContextList>) -> Self {
        Self { accessor, fclist }
    }

    /// Evaluate a query.
    ///
    /// # Arguments
    ///
    /// * `query` - The query to run.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<SearchResult>)` - The matching elements in policy order,
    ///   each with the proofs of every test it passed.
    /// * `Err` - If a file-context test has no list, a parameter does not
    ///   resolve, or the policy cannot answer.
    pub fn evaluate(&self, query: &Query) -> Result<Vec<SearchResult>> {
        let span = debug_span!(
            "query",
            element_kind = %query.element_kind(),
            match_mode = %query.match_mode()
        );
        let _enter = span.enter();

        if self.fclist.is_none() && query.needs_file_contexts() {
            return Err(UsageError::MissingFileContexts(TestCondition::FcEntry.keyword().to_string()).into());
        }

        // Parameters are resolved against this policy without touching the query.
        let tests = query
            .tests()
            .iter()
            .map(|test| test.bound(self.accessor))
            .collect::<Result<Vec<_>>>()?;

        let candidates = self.top_level_candidates(query)?;
        debug!(candidates = candidates.len(), tests = tests.len(), "gathered candidates");

        let extractor = ValueExtractor::new(self.accessor, self.fclist);
        let mut results = Vec::new();

        for handle in candidates {
            let xnames = self.accessor.all_names(handle)?;
            let ctx = MatchContext {
                accessor: self.accessor,
                xnames: &xnames,
            };

            let mut passed = 0;
            let mut proofs = Vec::new();
            for test in &tests {
                let test_proofs = self.evaluate_test(&extractor, test, handle, &ctx)?;
                if !test_proofs.is_empty() {
                    passed += 1;
                    proofs.extend(test_proofs);
                }
            }

            let matched = match query.match_mode() {
                MatchMode::All => passed == tests.len(),
                MatchMode::Any => passed > 0,
            };
            trace!(%handle, passed, matched, "evaluated candidate");

            if matched {
                let mut result = SearchResult::new(handle, self.accessor.render_name(handle)?);
                result.proofs = proofs;
                results.push(result);
            }
        }

        debug!(results = results.len(), "query complete");
        Ok(results)
    }

    /// Get the elements of the query's kind, without aliases unless the
    /// query asks for them.
    fn top_level_candidates(&self, query: &Query) -> Result<Vec<ElementHandle>> {
        let all = self.accessor.enumerate(query.element_kind())?;
        if query.include_aliases() {
            return Ok(all);
        }
        let mut candidates = Vec::with_capacity(all.len());
        for handle in all {
            if !self.accessor.is_alias(handle)? {
                candidates.push(handle);
            }
        }
        Ok(candidates)
    }

    /// Evaluate one test for one top-level candidate.
    ///
    /// # Returns
    ///
    /// One proof per sub-element that satisfies every criterion.
    fn evaluate_test(
        &self,
        extractor: &ValueExtractor<'_>,
        test: &Test,
        handle: ElementHandle,
        ctx: &MatchContext<'_>,
    ) -> Result<Vec<Proof>> {
        let mut proofs = Vec::new();
        for candidate in extractor.candidates(test.condition(), handle)? {
            if self.survives(extractor, test, &candidate, ctx)? {
                proofs.push(extractor.proof(test.condition(), &candidate)?);
            }
        }
        trace!(%handle, condition = %test.condition(), proofs = proofs.len(), "evaluated test");
        Ok(proofs)
    }

    fn survives(
        &self,
        extractor: &ValueExtractor<'_>,
        test: &Test,
        candidate: &Candidate,
        ctx: &MatchContext<'_>,
    ) -> Result<bool> {
        for criterion in test.criteria() {
            let matched = match extractor.extract(criterion.operator(), candidate)? {
                Some(value) => criterion.parameter().matches(criterion.operator(), &value, ctx)?,
                None => false,
            };
            if matched == criterion.negated() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
