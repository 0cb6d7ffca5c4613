//! Query evaluation engine.
//!
//! This module provides functionality for running queries and combining
//! their results.

mod aggregator;
mod evaluator;
mod extractor;

pub use aggregator::{merge_results, ElementDiff, ResultAggregator};
pub use evaluator::QueryEvaluator;
pub use extractor::{Candidate, ValueExtractor};
