//! Core traits that define the polscope interfaces.
//!
//! - `PolicyAccessor`: read-only access to a loaded policy, consumed by the
//!   MLS model and the query engine.

pub mod accessor;

pub use accessor::PolicyAccessor;
