//! # polscope Policy
//!
//! `polscope_policy` is the query and comparison engine of polscope. It
//! answers questions about a loaded type-enforcement and MLS policy
//! through a `PolicyAccessor`, returning matched elements with the
//! evidence that made them match.
//!
//! Key concepts:
//!
//! 1. **Sparse bitmap**: A set of ordinals stored as 64-bit pages, used for
//!    membership sets and for diffing result sets.
//!
//! 2. **MLS level and range**: A sensitivity with categories, and a pair of
//!    levels, with the dominance algebra between them.
//!
//! 3. **Query**: Tests over one element kind, each with criteria comparing
//!    sub-elements against parameters.
//!
//! 4. **Proof**: The sub-element that made a test pass for a result.

pub mod engine;
pub mod model;
pub mod store;

// Re-export key types for convenience
pub use engine::{merge_results, ElementDiff, QueryEvaluator, ResultAggregator};
pub use model::{
    Criterion, FileContextList, LevelCompare, MatchMode, MlsLevel, MlsRange, Operator, Parameter,
    Proof, Query, RangeMatch, SearchResult, SparseBitSet, Test, TestCondition,
};
pub use store::{InMemoryPolicy, PolicySnapshot};
